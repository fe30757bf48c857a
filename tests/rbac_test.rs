mod common;

use axum::http::{Method, StatusCode};
use backoffice_api::auth::consts as perm;
use common::{response_json, TestApp};
use serde_json::json;

fn new_product() -> serde_json::Value {
    json!({ "name": "Gated" })
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/products", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_MISSING");

    let response = app
        .request(Method::POST, "/api/v1/products", Some(new_product()), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_and_foreign_tokens_are_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/products", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let foreign = backoffice_api::auth::AuthService::new(backoffice_api::auth::AuthConfig::new(
        "z".repeat(64),
        "backoffice-api".into(),
        "backoffice-auth".into(),
        std::time::Duration::from_secs(600),
    ))
    .issue_token("intruder", vec!["admin".into()], Vec::new())
    .expect("token")
    .access_token;
    let response = app
        .request(Method::GET, "/api/v1/products", None, Some(&foreign))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID_TOKEN");
}

#[tokio::test]
async fn sale_role_reads_products_but_cannot_create_them() {
    let app = TestApp::new().await;
    let token = app.token_for_role("cashier-1", "sale").await;

    let response = app
        .request(Method::GET, "/api/v1/products", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::POST, "/api/v1/products", Some(new_product()), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INSUFFICIENT_PERMISSIONS");

    let response = app
        .request(Method::GET, "/api/v1/roles", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stock_role_manages_products() {
    let app = TestApp::new().await;
    let token = app.token_for_role("clerk-1", "stock").await;

    let response = app
        .request(Method::POST, "/api/v1/products", Some(new_product()), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let id = body["data"]["id"].as_str().expect("id").to_string();
    assert_eq!(body["data"]["created_by"], "clerk-1");

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/products/{id}"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(Method::GET, "/api/v1/brands", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_role_passes_every_gate() {
    let app = TestApp::new().await;
    for uri in [
        "/api/v1/products",
        "/api/v1/brands",
        "/api/v1/categories",
        "/api/v1/units",
        "/api/v1/variant-attributes",
        "/api/v1/permissions",
        "/api/v1/roles",
    ] {
        let response = app.request_authenticated(Method::GET, uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn resource_wildcard_covers_every_action() {
    let app = TestApp::new().await;
    let token = app.token_with_permissions("ops-1", &["products:*"]);

    let response = app
        .request(Method::POST, "/api/v1/products", Some(new_product()), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(Method::GET, "/api/v1/categories", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn exact_permission_covers_only_its_action() {
    let app = TestApp::new().await;
    let token = app.token_with_permissions("viewer-1", &[perm::BRANDS_READ]);

    let response = app
        .request(Method::GET, "/api/v1/brands", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/api/v1/brands",
            Some(json!({ "name": "Nope" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn me_reflects_the_token() {
    let app = TestApp::new().await;
    let token = app.token_for_role("cashier-2", "sale").await;

    let response = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["user_id"], "cashier-2");
    assert_eq!(body["data"]["roles"], json!(["sale"]));
    let permissions = body["data"]["permissions"].as_array().expect("permissions");
    assert!(permissions.contains(&json!(perm::PRODUCTS_READ)));
    assert!(!permissions.contains(&json!(perm::PRODUCTS_CREATE)));
}

#[tokio::test]
async fn roles_and_assignments_over_http() {
    let app = TestApp::new().await;

    let permissions = app
        .json(Method::GET, "/api/v1/permissions", None, StatusCode::OK)
        .await;
    let brands_read = permissions["data"]
        .as_array()
        .expect("permissions")
        .iter()
        .find(|p| p["name"] == perm::BRANDS_READ)
        .expect("seeded permission")["id"]
        .clone();

    let role = app
        .json(
            Method::POST,
            "/api/v1/roles",
            Some(json!({ "name": "auditor", "permissions": [brands_read] })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(role["data"]["permissions"], json!([perm::BRANDS_READ]));
    let role_id = role["data"]["id"].as_str().expect("role id").to_string();

    app.json(
        Method::POST,
        "/api/v1/users/auditor-7/roles",
        Some(json!({ "role": "auditor" })),
        StatusCode::OK,
    )
    .await;

    let access = app
        .json(
            Method::GET,
            "/api/v1/users/auditor-7/access",
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(access["data"]["roles"], json!(["auditor"]));
    assert_eq!(access["data"]["permissions"], json!([perm::BRANDS_READ]));

    let token = app
        .state
        .auth
        .issue_for_user(&*app.state.db, "auditor-7")
        .await
        .expect("token")
        .access_token;
    let response = app
        .request(Method::GET, "/api/v1/brands", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Still assigned, so the role stays.
    app.json(
        Method::DELETE,
        &format!("/api/v1/roles/{role_id}"),
        None,
        StatusCode::CONFLICT,
    )
    .await;

    app.json(
        Method::POST,
        "/api/v1/users/auditor-7/roles",
        Some(json!({ "role": "no-such-role" })),
        StatusCode::NOT_FOUND,
    )
    .await;
}
