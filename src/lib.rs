//! Back-office API library
//!
//! Products with SKU-allocated variants, the catalog lookups they reference
//! (brands, categories, units, variant attributes), and role-based access
//! control over all of it.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use chrono::Utc;
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::{AuthConfig, AuthRouterExt, AuthService};
use crate::db::PageLimits;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let limits = PageLimits {
            default_size: config.api_default_page_size,
            max_size: config.api_max_page_size,
        };
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));
        let services = handlers::AppServices::new(db.clone(), limits);
        Self {
            db,
            config,
            auth,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ApiError>;

pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{access, brands, catalog, categories, products};

    // Products
    let products_read = Router::new()
        .route("/products", get(products::list_products))
        .route("/products/lookups", get(products::product_lookups))
        .route("/products/:id", get(products::get_product))
        .with_permission(perm::PRODUCTS_READ);

    let products_create = Router::new()
        .route("/products", post(products::create_product))
        .with_permission(perm::PRODUCTS_CREATE);

    let products_update = Router::new()
        .route("/products/:id", axum::routing::put(products::update_product))
        .with_permission(perm::PRODUCTS_UPDATE);

    let products_delete = Router::new()
        .route(
            "/products/:id",
            axum::routing::delete(products::delete_product),
        )
        .with_permission(perm::PRODUCTS_DELETE);

    // Brands
    let brands_read = Router::new()
        .route("/brands", get(brands::list_brands))
        .route("/brands/:id", get(brands::get_brand))
        .with_permission(perm::BRANDS_READ);

    let brands_manage = Router::new()
        .route("/brands", post(brands::create_brand))
        .route(
            "/brands/:id",
            axum::routing::put(brands::update_brand).delete(brands::delete_brand),
        )
        .with_permission(perm::BRANDS_MANAGE);

    // Categories
    let categories_read = Router::new()
        .route("/categories", get(categories::list_categories))
        .route("/categories/:id", get(categories::get_category))
        .with_permission(perm::CATEGORIES_READ);

    let categories_manage = Router::new()
        .route("/categories", post(categories::create_category))
        .route(
            "/categories/:id",
            axum::routing::put(categories::update_category).delete(categories::delete_category),
        )
        .with_permission(perm::CATEGORIES_MANAGE);

    // Units and variant attributes
    let catalog_read = Router::new()
        .route("/units", get(catalog::list_units))
        .route("/variant-attributes", get(catalog::list_attributes))
        .with_permission(perm::CATALOG_READ);

    let catalog_manage = Router::new()
        .route("/units", post(catalog::create_unit))
        .route("/variant-attributes", post(catalog::create_attribute))
        .route("/variant-values", post(catalog::create_value))
        .with_permission(perm::CATALOG_MANAGE);

    // Roles and permissions
    let access_manage = Router::new()
        .route(
            "/permissions",
            get(access::list_permissions).post(access::create_permission),
        )
        .route(
            "/permissions/:id",
            axum::routing::put(access::update_permission).delete(access::delete_permission),
        )
        .route("/roles", get(access::list_roles).post(access::create_role))
        .route(
            "/roles/:id",
            get(access::get_role)
                .put(access::update_role)
                .delete(access::delete_role),
        )
        .route("/users/:user_id/roles", post(access::assign_role))
        .route("/users/:user_id/access", get(access::user_access))
        .with_permission(perm::ROLES_MANAGE);

    let whoami = Router::new()
        .route("/auth/me", get(access::me))
        .with_auth();

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .nest("/health", handlers::health::health_routes())
        .merge(products_read)
        .merge(products_create)
        .merge(products_update)
        .merge(products_delete)
        .merge(brands_read)
        .merge(brands_manage)
        .merge(categories_read)
        .merge(categories_manage)
        .merge(catalog_read)
        .merge(catalog_manage)
        .merge(access_manage)
        .merge(whoami)
}

async fn api_status() -> Json<ApiResponse<Value>> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "backoffice-api",
        "timestamp": Utc::now().to_rfc3339(),
    });

    Json(ApiResponse::success(status_data))
}

/// CORS policy from configuration: explicit origins, or permissive where allowed.
pub fn cors_layer(cfg: &config::AppConfig) -> Result<CorsLayer, String> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(cfg.cors_allow_credentials))
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            environment = %cfg.environment,
            "Using permissive CORS because explicit origins were not configured"
        );
        Ok(CorsLayer::permissive())
    } else {
        Err("Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".into())
    }
}

/// The full HTTP application: `/api/v1`, Swagger UI and the shared layers.
pub fn app(state: AppState, cors: CorsLayer) -> Router {
    let auth = state.auth.clone();
    Router::<AppState>::new()
        .route("/", get(|| async { "backoffice-api up" }))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // AuthService is read from request extensions by the auth middleware
        .layer(Extension(auth))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
