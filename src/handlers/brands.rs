use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use uuid::Uuid;

use crate::{
    db::ListParams,
    entities::brand,
    errors::ApiError,
    handlers::common::{created_response, no_content_response, table_response, validate_input},
    services::brands::BrandInput,
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/brands",
    params(ListParams),
    responses(
        (status = 200, description = "Table page of brands", body = serde_json::Value)
    ),
    tag = "brands"
)]
pub async fn list_brands(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    Ok(table_response(state.services.brands.list(&params).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/brands/:id",
    params(("id" = Uuid, Path, description = "Brand ID")),
    responses(
        (status = 200, description = "Brand", body = ApiResponse<brand::Model>),
        (status = 404, description = "Brand not found", body = crate::errors::ErrorResponse)
    ),
    tag = "brands"
)]
pub async fn get_brand(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<brand::Model> {
    Ok(Json(ApiResponse::success(state.services.brands.get(id).await?)))
}

#[utoipa::path(
    post,
    path = "/api/v1/brands",
    request_body = BrandInput,
    responses(
        (status = 201, description = "Brand created", body = ApiResponse<brand::Model>),
        (status = 409, description = "Code already taken", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid fields", body = crate::errors::ErrorResponse)
    ),
    tag = "brands"
)]
pub async fn create_brand(
    State(state): State<AppState>,
    Json(payload): Json<BrandInput>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    Ok(created_response(state.services.brands.create(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/brands/:id",
    request_body = BrandInput,
    params(("id" = Uuid, Path, description = "Brand ID")),
    responses(
        (status = 200, description = "Brand updated", body = ApiResponse<brand::Model>),
        (status = 404, description = "Brand not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already taken", body = crate::errors::ErrorResponse)
    ),
    tag = "brands"
)]
pub async fn update_brand(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BrandInput>,
) -> ApiResult<brand::Model> {
    validate_input(&payload)?;
    Ok(Json(ApiResponse::success(
        state.services.brands.update(id, payload).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/brands/:id",
    params(("id" = Uuid, Path, description = "Brand ID")),
    responses(
        (status = 204, description = "Brand deleted"),
        (status = 409, description = "Brand still used by products", body = crate::errors::ErrorResponse)
    ),
    tag = "brands"
)]
pub async fn delete_brand(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.services.brands.delete(id).await?;
    Ok(no_content_response())
}
