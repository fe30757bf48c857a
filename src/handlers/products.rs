use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    Extension,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    db::ListParams,
    entities::{brand, unit},
    errors::ApiError,
    handlers::common::{actor, created_response, no_content_response, table_response, validate_input},
    services::{
        catalog::{AttributeWithValues, ValueWithAttribute},
        categories::CategoryWithChildren,
        products::{ProductDetail, ProductInput},
    },
    ApiResponse, ApiResult, AppState,
};

/// Everything the product form needs to populate its pickers
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductLookups {
    pub variant_values: Vec<ValueWithAttribute>,
    pub attributes: Vec<AttributeWithValues>,
    pub brands: Vec<brand::Model>,
    pub categories: Vec<CategoryWithChildren>,
    pub units: Vec<unit::Model>,
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ListParams),
    responses(
        (status = 200, description = "Table page of live products: {data, recordsTotal, recordsFiltered, draw}", body = serde_json::Value),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let page = state.services.products.list(&params).await?;
    Ok(table_response(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/lookups",
    responses(
        (status = 200, description = "Picker data for the product form", body = ApiResponse<ProductLookups>)
    ),
    tag = "products"
)]
pub async fn product_lookups(State(state): State<AppState>) -> ApiResult<ProductLookups> {
    let products = &state.services.products;
    let lookups = ProductLookups {
        variant_values: products.variant_values().await?,
        attributes: products.attributes().await?,
        brands: products.brands().await?,
        categories: products.categories().await?,
        units: products.units().await?,
    };
    Ok(Json(ApiResponse::success(lookups)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product with its live variants", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Product not found or deleted", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductDetail> {
    let product = state.services.products.edit(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Product and variants created", body = ApiResponse<ProductDetail>),
        (status = 409, description = "SKU collision", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid fields", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ProductInput>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let product = state
        .services
        .products
        .create(payload, actor(&user))
        .await?;
    Ok(created_response(product))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/:id",
    request_body = ProductInput,
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product updated and variants reconciled", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Product or variant not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU collision", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid fields", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductInput>,
) -> ApiResult<ProductDetail> {
    validate_input(&payload)?;
    let product = state
        .services
        .products
        .update(id, payload, actor(&user))
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product and its variants soft-deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.services.products.destroy(id, actor(&user)).await?;
    Ok(no_content_response())
}
