use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
};
use uuid::Uuid;

use crate::{
    db::ListParams,
    errors::ApiError,
    handlers::common::{created_response, no_content_response, table_response, validate_input},
    services::categories::{CategoryInput, CategoryWithParent},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    params(ListParams),
    responses(
        (status = 200, description = "Table page of categories with parent names", body = serde_json::Value)
    ),
    tag = "categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    Ok(table_response(state.services.categories.list(&params).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/:id",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category with its parent", body = ApiResponse<CategoryWithParent>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<CategoryWithParent> {
    Ok(Json(ApiResponse::success(
        state.services.categories.get(id).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<CategoryWithParent>),
        (status = 409, description = "Code already taken", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid fields", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CategoryInput>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    Ok(created_response(
        state.services.categories.create(payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/:id",
    request_body = CategoryInput,
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<CategoryWithParent>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already taken", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invalid fields", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryInput>,
) -> ApiResult<CategoryWithParent> {
    validate_input(&payload)?;
    Ok(Json(ApiResponse::success(
        state.services.categories.update(id, payload).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/categories/:id",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 409, description = "Category still used by products", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.services.categories.delete(id).await?;
    Ok(no_content_response())
}
