#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use backoffice_api::{
    app,
    config::AppConfig,
    db,
    entities::{brand, category, unit, variant_attribute, variant_value},
    services::{
        brands::BrandInput,
        catalog::{AttributeInput, UnitInput, ValueInput},
        categories::CategoryInput,
    },
    AppState,
};
use serde_json::Value;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;

const TEST_JWT_SECRET: &str =
    "integration-secret-0123456789-abcdefghijklmnopqrstuvwxyz-ABCDEFGHIJKLMNOP";

pub const ADMIN_USER: &str = "admin-user";

/// Application wired to a fresh, migrated and seeded in-memory database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "development".to_string(),
        );

        let pool = db::connect_in_memory()
            .await
            .expect("failed to create test database");
        let state = AppState::new(Arc::new(pool), cfg);

        state
            .services
            .access
            .seed_defaults()
            .await
            .expect("seed access defaults");
        state
            .services
            .access
            .assign_role(ADMIN_USER, "admin")
            .await
            .expect("assign admin role");
        let token = state
            .auth
            .issue_for_user(&*state.db, ADMIN_USER)
            .await
            .expect("issue admin token")
            .access_token;

        let router = app(state.clone(), CorsLayer::permissive());

        Self {
            router,
            state,
            token,
        }
    }

    pub fn admin_token(&self) -> &str {
        &self.token
    }

    /// Token for a user holding `role`, with the role's stored permissions.
    pub async fn token_for_role(&self, user_id: &str, role: &str) -> String {
        self.state
            .services
            .access
            .assign_role(user_id, role)
            .await
            .expect("assign role");
        self.state
            .auth
            .issue_for_user(&*self.state.db, user_id)
            .await
            .expect("issue token")
            .access_token
    }

    /// Token carrying exactly the given permissions and no roles.
    pub fn token_with_permissions(&self, user_id: &str, permissions: &[&str]) -> String {
        self.state
            .auth
            .issue_token(
                user_id,
                Vec::new(),
                permissions.iter().map(|p| p.to_string()).collect(),
            )
            .expect("issue token")
            .access_token
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router response")
    }

    /// Request as the seeded admin.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let token = self.token.clone();
        self.request(method, uri, body, Some(&token)).await
    }

    /// Admin request that must answer `expected`; returns the JSON body.
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let response = self.request_authenticated(method.clone(), uri, body).await;
        let status = response.status();
        let json = response_json(response).await;
        assert_eq!(status, expected, "{method} {uri} answered {json}");
        json
    }

    pub async fn create_brand(&self, name: &str, code: Option<&str>) -> brand::Model {
        self.state
            .services
            .brands
            .create(BrandInput {
                name: name.into(),
                code: code.map(str::to_owned),
                ..Default::default()
            })
            .await
            .expect("create brand")
    }

    pub async fn create_category(&self, name: &str, code: &str) -> category::Model {
        self.state
            .services
            .categories
            .create(CategoryInput {
                name: name.into(),
                code: code.into(),
                ..Default::default()
            })
            .await
            .expect("create category")
            .category
    }

    pub async fn create_unit(&self, name: &str, short_name: &str) -> unit::Model {
        self.state
            .services
            .catalog
            .create_unit(UnitInput {
                name: name.into(),
                short_name: short_name.into(),
                allow_decimal: false,
                is_active: None,
            })
            .await
            .expect("create unit")
    }

    /// Creates an attribute and one value per entry of `values`.
    pub async fn create_attribute(
        &self,
        name: &str,
        values: &[&str],
    ) -> (variant_attribute::Model, Vec<variant_value::Model>) {
        let catalog = &self.state.services.catalog;
        let attribute = catalog
            .create_attribute(AttributeInput {
                name: name.into(),
                ordinal: 0,
            })
            .await
            .expect("create attribute");

        let mut created = Vec::with_capacity(values.len());
        for value in values {
            created.push(
                catalog
                    .create_value(ValueInput {
                        variant_attribute_id: attribute.id,
                        value: (*value).into(),
                    })
                    .await
                    .expect("create value"),
            );
        }
        (attribute, created)
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    }
}
