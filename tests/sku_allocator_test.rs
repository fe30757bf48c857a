mod common;

use axum::http::StatusCode;
use backoffice_api::{
    db::{transaction, SoftDelete},
    entities::product_variant,
    errors::ServiceError,
    services::{
        products::{ProductDetail, ProductInput},
        sku,
        variants::{self, VariantInput},
    },
};
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

fn product(name: &str) -> ProductInput {
    ProductInput {
        name: name.into(),
        ..Default::default()
    }
}

fn variant(sku: Option<&str>) -> VariantInput {
    VariantInput {
        sku: sku.map(str::to_owned),
        price: dec!(12.50),
        stock: dec!(3),
        ..Default::default()
    }
}

fn variant_skus(detail: &ProductDetail) -> Vec<String> {
    let mut skus: Vec<String> = detail.variants.iter().map(|v| v.variant.sku.clone()).collect();
    skus.sort();
    skus
}

#[tokio::test]
async fn products_without_sku_take_the_next_sequence_number() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;

    let first = products.create(product("Mug"), None).await.unwrap();
    let second = products.create(product("Cup"), None).await.unwrap();

    assert_eq!(first.product.sku, "SKU-0001");
    assert_eq!(second.product.sku, "SKU-0002");
}

#[tokio::test]
async fn explicit_product_sku_is_skipped_by_the_allocator() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;

    let mut explicit = product("Teapot");
    explicit.sku = Some("SKU-0001".into());
    products.create(explicit, None).await.unwrap();

    let generated = products.create(product("Kettle"), None).await.unwrap();
    assert_eq!(generated.product.sku, "SKU-0002");
}

#[tokio::test]
async fn deleted_product_keeps_its_sku_reserved() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;

    let retired = products.create(product("Old"), None).await.unwrap();
    products
        .destroy(retired.product.id, Some("admin".into()))
        .await
        .unwrap();

    let next = products.create(product("New"), None).await.unwrap();
    assert_eq!(next.product.sku, "SKU-0002");
    assert!(sku::product_sku_exists(&*app.state.db, "SKU-0001", None)
        .await
        .unwrap());
}

#[tokio::test]
async fn explicit_product_sku_already_taken_is_a_field_error() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;

    let mut first = product("Lamp");
    first.sku = Some("LAMP".into());
    products.create(first, None).await.unwrap();

    let mut again = product("Lamp 2");
    again.sku = Some("LAMP".into());
    match products.create(again, None).await {
        Err(ServiceError::InvalidFields(errors)) => {
            assert_eq!(errors, vec!["sku: The SKU has already been taken.".to_string()]);
        }
        other => panic!("expected field errors, got {other:?}"),
    }
}

#[tokio::test]
async fn variants_are_numbered_in_submission_order() {
    let app = TestApp::new().await;

    let mut input = product("Shirt");
    input.has_variants = true;
    input.variants = vec![variant(None), variant(None), variant(None)];
    let created = app.state.services.products.create(input, None).await.unwrap();

    assert_eq!(
        variant_skus(&created),
        vec!["SKU-0001-01", "SKU-0001-02", "SKU-0001-03"]
    );
}

#[tokio::test]
async fn variant_suffix_follows_an_explicit_base_sku() {
    let app = TestApp::new().await;

    let mut input = product("Hoodie");
    input.sku = Some("HOOD".into());
    input.variants = vec![variant(None), variant(None)];
    let created = app.state.services.products.create(input, None).await.unwrap();

    assert_eq!(variant_skus(&created), vec!["HOOD-01", "HOOD-02"]);
}

#[tokio::test]
async fn generated_variant_sku_avoids_skus_requested_later_in_the_payload() {
    let app = TestApp::new().await;

    let mut input = product("Scarf");
    input.variants = vec![variant(None), variant(Some("SKU-0001-01"))];
    let created = app.state.services.products.create(input, None).await.unwrap();

    assert_eq!(variant_skus(&created), vec!["SKU-0001-01", "SKU-0001-02"]);
}

#[tokio::test]
async fn explicit_variant_sku_repeated_in_payload_is_rejected() {
    let app = TestApp::new().await;

    let mut input = product("Socks");
    input.variants = vec![variant(Some("SOCK-1")), variant(Some("SOCK-1"))];
    match app.state.services.products.create(input, None).await {
        Err(ServiceError::InvalidFields(errors)) => {
            assert_eq!(
                errors,
                vec!["variants[1].sku: duplicates the SKU of variants[0]".to_string()]
            );
        }
        other => panic!("expected field errors, got {other:?}"),
    }
}

#[tokio::test]
async fn allocator_probes_the_database_behind_the_connection() {
    let app = TestApp::new().await;
    let db = &*app.state.db;

    assert_eq!(sku::allocate_base_sku(db).await.unwrap(), "SKU-0001");

    let mut input = product("Cap");
    input.variants = vec![variant(None)];
    app.state.services.products.create(input, None).await.unwrap();

    assert_eq!(sku::allocate_base_sku(db).await.unwrap(), "SKU-0002");
    assert_eq!(
        sku::allocate_variant_sku(db, "SKU-0001", 1).await.unwrap(),
        "SKU-0001-02"
    );
}

#[tokio::test]
async fn sku_taken_after_the_precheck_surfaces_as_conflict_and_rolls_back() {
    let app = TestApp::new().await;
    let db = &*app.state.db;
    let parent = app
        .state
        .services
        .products
        .create(product("Scarf"), None)
        .await
        .unwrap()
        .product;

    // A concurrent writer claims the SKU inside the window between check and insert.
    let txn = transaction::begin(db).await.unwrap();
    let outcome: Result<Vec<product_variant::Model>, ServiceError> = async {
        product_variant::ActiveModel {
            product_id: Set(parent.id),
            sku: Set("SKU-0001-01".into()),
            price: Set(dec!(1)),
            stock: Set(dec!(1)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        variants::create_all(&txn, &parent, &[variant(Some("SKU-0001-01"))]).await
    }
    .await;
    let result = transaction::finish(txn, outcome).await;

    let err = result.expect_err("unique index must reject the second insert");
    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");
    assert_eq!(err.status_code(), StatusCode::CONFLICT);

    let left_behind = product_variant::Entity::find_with_trashed()
        .filter(product_variant::Column::ProductId.eq(parent.id))
        .all(db)
        .await
        .unwrap();
    assert!(left_behind.is_empty(), "{left_behind:?}");
    assert!(!sku::variant_sku_exists(db, "SKU-0001-01", None).await.unwrap());
}
