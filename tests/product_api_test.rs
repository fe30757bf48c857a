mod common;

use std::str::FromStr;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}

fn skus(product: &Value) -> Vec<String> {
    let mut skus: Vec<String> = product["variants"]
        .as_array()
        .expect("variants array")
        .iter()
        .map(|v| v["sku"].as_str().expect("sku").to_string())
        .collect();
    skus.sort();
    skus
}

#[tokio::test]
async fn create_edit_update_and_delete_a_product_over_http() {
    let app = TestApp::new().await;
    let brand = app.create_brand("Acme", Some("ACM")).await;
    let category = app.create_category("Apparel", "APP").await;
    let unit = app.create_unit("Piece", "pc").await;
    let (_, sizes) = app.create_attribute("Size", &["S", "M", "L"]).await;

    let created = app
        .json(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Tee",
                "description": "Cotton tee",
                "has_variants": true,
                "brand_id": brand.id,
                "category_id": category.id,
                "unit_id": unit.id,
                "variants": [
                    { "price": "9.90", "stock": "4", "variant_value_ids": [sizes[0].id] },
                    { "price": 10, "stock": 2.5, "variant_value_ids": [sizes[1].id] }
                ]
            })),
            StatusCode::CREATED,
        )
        .await;

    assert_eq!(created["success"], true);
    let product = &created["data"];
    let id = product["id"].as_str().expect("product id").to_string();
    assert_eq!(product["sku"], "SKU-0001");
    assert_eq!(product["created_by"], common::ADMIN_USER);
    assert_eq!(skus(product), vec!["SKU-0001-01", "SKU-0001-02"]);

    let edit = app
        .json(Method::GET, &format!("/api/v1/products/{id}"), None, StatusCode::OK)
        .await;
    let variants = edit["data"]["variants"].as_array().expect("variants").clone();
    assert_eq!(variants.len(), 2);
    let small = variants
        .iter()
        .find(|v| v["sku"] == "SKU-0001-01")
        .expect("first variant");
    assert_eq!(decimal(&small["price"]), dec!(9.90));
    assert_eq!(small["values"][0]["value"], "S");
    assert_eq!(small["values"][0]["attribute"]["name"], "Size");

    let updated = app
        .json(
            Method::PUT,
            &format!("/api/v1/products/{id}"),
            Some(json!({
                "name": "Tee v2",
                "has_variants": true,
                "variants": [
                    {
                        "id": small["id"],
                        "price": "12.00",
                        "stock": "1",
                        "variant_value_ids": [sizes[2].id]
                    }
                ]
            })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(updated["data"]["name"], "Tee v2");
    assert_eq!(updated["data"]["sku"], "SKU-0001");
    assert_eq!(skus(&updated["data"]), vec!["SKU-0001-01"]);
    assert_eq!(decimal(&updated["data"]["variants"][0]["price"]), dec!(12));
    assert_eq!(updated["data"]["variants"][0]["values"][0]["value"], "L");

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/products/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    app.json(
        Method::GET,
        &format!("/api/v1/products/{id}"),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn listing_is_a_table_page_with_search_and_paging() {
    let app = TestApp::new().await;
    for name in ["Blue mug", "Red mug", "Teapot"] {
        app.json(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": name })),
            StatusCode::CREATED,
        )
        .await;
    }

    let page = app
        .json(
            Method::GET,
            "/api/v1/products?search=MUG&sort=name&order=asc&draw=7",
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(page["recordsTotal"], 3);
    assert_eq!(page["recordsFiltered"], 2);
    assert_eq!(page["draw"], 7);
    let names: Vec<&str> = page["data"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|row| row["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["Blue mug", "Red mug"]);

    let second = app
        .json(
            Method::GET,
            "/api/v1/products?sort=name&order=asc&limit=2&page=2",
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(second["recordsFiltered"], 3);
    assert_eq!(second["data"].as_array().expect("rows").len(), 1);
    assert_eq!(second["data"][0]["name"], "Teapot");
}

#[tokio::test]
async fn huge_page_number_is_an_empty_page() {
    let app = TestApp::new().await;
    app.json(
        Method::POST,
        "/api/v1/products",
        Some(json!({ "name": "Only one" })),
        StatusCode::CREATED,
    )
    .await;

    let page = app
        .json(
            Method::GET,
            &format!("/api/v1/products?limit=10&page={}", u64::MAX),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(page["recordsTotal"], 1);
    assert!(page["data"].as_array().expect("rows").is_empty());
}

#[tokio::test]
async fn deleted_products_drop_out_of_the_listing() {
    let app = TestApp::new().await;
    let created = app
        .json(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Gone soon" })),
            StatusCode::CREATED,
        )
        .await;
    let id = created["data"]["id"].as_str().expect("id").to_string();

    app.request_authenticated(Method::DELETE, &format!("/api/v1/products/{id}"), None)
        .await;

    let page = app
        .json(Method::GET, "/api/v1/products", None, StatusCode::OK)
        .await;
    assert_eq!(page["recordsTotal"], 0);
    assert!(page["data"].as_array().expect("rows").is_empty());
}

#[tokio::test]
async fn invalid_fields_answer_422_with_every_field_listed() {
    let app = TestApp::new().await;

    let body = app
        .json(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "",
                "variants": [
                    { "price": 1, "stock": 1, "sku": "x".repeat(300) }
                ]
            })),
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .await;

    let errors: Vec<&str> = body["errors"]
        .as_array()
        .expect("field errors")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(errors.contains(&"name: name is required"), "{errors:?}");
    assert!(
        errors.iter().any(|e| e.starts_with("variants[0].sku:")),
        "{errors:?}"
    );
}

#[tokio::test]
async fn unknown_references_are_field_errors() {
    let app = TestApp::new().await;

    let body = app
        .json(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Orphan",
                "brand_id": uuid::Uuid::new_v4(),
                "variants": [
                    { "price": 1, "stock": 1, "variant_value_ids": [uuid::Uuid::new_v4()] }
                ]
            })),
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .await;

    let errors = body["errors"].as_array().expect("field errors");
    assert!(errors
        .iter()
        .any(|e| e.as_str().is_some_and(|s| s.starts_with("brand_id:"))));

    let page = app
        .json(Method::GET, "/api/v1/products", None, StatusCode::OK)
        .await;
    assert_eq!(page["recordsTotal"], 0);
}

#[tokio::test]
async fn duplicate_explicit_sku_is_rejected() {
    let app = TestApp::new().await;
    app.json(
        Method::POST,
        "/api/v1/products",
        Some(json!({ "name": "One", "sku": "DUP-1" })),
        StatusCode::CREATED,
    )
    .await;

    let body = app
        .json(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Two", "sku": "DUP-1" })),
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .await;
    assert_eq!(body["errors"][0], "sku: The SKU has already been taken.");
}

#[tokio::test]
async fn missing_product_is_404_with_request_id() {
    let app = TestApp::new().await;
    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/products/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));

    let body = response_json(response).await;
    assert_eq!(body["error"], "Not Found");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn lookups_bundle_the_form_pickers() {
    let app = TestApp::new().await;
    app.create_brand("Acme", None).await;
    app.create_unit("Kilogram", "kg").await;
    app.create_attribute("Color", &["Red"]).await;

    let body = app
        .json(Method::GET, "/api/v1/products/lookups", None, StatusCode::OK)
        .await;
    let data = &body["data"];
    assert_eq!(data["brands"][0]["name"], "Acme");
    assert_eq!(data["units"][0]["short_name"], "kg");
    assert_eq!(data["attributes"][0]["name"], "Color");
    assert_eq!(data["attributes"][0]["values"][0]["value"], "Red");
    assert_eq!(data["variant_values"][0]["attribute"]["name"], "Color");
}
