use axum::{
    extract::State,
    response::{Json, Response},
};

use crate::{
    entities::unit,
    errors::ApiError,
    handlers::common::{created_response, validate_input},
    services::catalog::{AttributeInput, AttributeWithValues, UnitInput, ValueInput},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/units",
    responses((status = 200, description = "Units by name", body = ApiResponse<Vec<unit::Model>>)),
    tag = "catalog"
)]
pub async fn list_units(State(state): State<AppState>) -> ApiResult<Vec<unit::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.catalog.list_units().await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/units",
    request_body = UnitInput,
    responses(
        (status = 201, description = "Unit created", body = ApiResponse<unit::Model>),
        (status = 422, description = "Invalid fields", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn create_unit(
    State(state): State<AppState>,
    Json(payload): Json<UnitInput>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    Ok(created_response(
        state.services.catalog.create_unit(payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/variant-attributes",
    responses((status = 200, description = "Attributes in display order with their values", body = ApiResponse<Vec<AttributeWithValues>>)),
    tag = "catalog"
)]
pub async fn list_attributes(State(state): State<AppState>) -> ApiResult<Vec<AttributeWithValues>> {
    Ok(Json(ApiResponse::success(
        state.services.catalog.list_attributes().await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/variant-attributes",
    request_body = AttributeInput,
    responses(
        (status = 201, description = "Attribute created", body = ApiResponse<crate::entities::variant_attribute::Model>),
        (status = 422, description = "Invalid fields", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn create_attribute(
    State(state): State<AppState>,
    Json(payload): Json<AttributeInput>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    Ok(created_response(
        state.services.catalog.create_attribute(payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/variant-values",
    request_body = ValueInput,
    responses(
        (status = 201, description = "Value created", body = ApiResponse<crate::entities::variant_value::Model>),
        (status = 422, description = "Invalid fields or unknown attribute", body = crate::errors::ErrorResponse)
    ),
    tag = "catalog"
)]
pub async fn create_value(
    State(state): State<AppState>,
    Json(payload): Json<ValueInput>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    Ok(created_response(
        state.services.catalog.create_value(payload).await?,
    ))
}
