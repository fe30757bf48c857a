use axum::{
    extract::{Path, State},
    response::{Json, Response},
    Extension,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::{permission, role},
    errors::ApiError,
    handlers::common::{created_response, no_content_response, validate_input},
    services::access::{PermissionInput, RoleInput, RoleWithPermissions},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignRoleRequest {
    #[validate(length(min = 1))]
    pub role: String,
}

/// Roles and effective permissions of one user
#[derive(Debug, Serialize, ToSchema)]
pub struct UserAccess {
    pub user_id: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "The caller as seen by the token", body = ApiResponse<AuthUser>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "access"
)]
pub async fn me(Extension(user): Extension<AuthUser>) -> ApiResult<AuthUser> {
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/permissions",
    responses((status = 200, description = "Permissions by name", body = ApiResponse<Vec<permission::Model>>)),
    tag = "access"
)]
pub async fn list_permissions(State(state): State<AppState>) -> ApiResult<Vec<permission::Model>> {
    Ok(Json(ApiResponse::success(
        state.services.access.list_permissions().await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/permissions",
    request_body = PermissionInput,
    responses(
        (status = 201, description = "Permission created", body = ApiResponse<permission::Model>),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse)
    ),
    tag = "access"
)]
pub async fn create_permission(
    State(state): State<AppState>,
    Json(payload): Json<PermissionInput>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    Ok(created_response(
        state.services.access.create_permission(payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/permissions/:id",
    request_body = PermissionInput,
    params(("id" = Uuid, Path, description = "Permission ID")),
    responses(
        (status = 200, description = "Permission renamed", body = ApiResponse<permission::Model>),
        (status = 404, description = "Permission not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse)
    ),
    tag = "access"
)]
pub async fn update_permission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PermissionInput>,
) -> ApiResult<permission::Model> {
    validate_input(&payload)?;
    Ok(Json(ApiResponse::success(
        state.services.access.update_permission(id, payload).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/permissions/:id",
    params(("id" = Uuid, Path, description = "Permission ID")),
    responses(
        (status = 204, description = "Permission deleted and removed from every role"),
        (status = 404, description = "Permission not found", body = crate::errors::ErrorResponse)
    ),
    tag = "access"
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.services.access.delete_permission(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/roles",
    responses((status = 200, description = "Roles with their permission names", body = ApiResponse<Vec<RoleWithPermissions>>)),
    tag = "access"
)]
pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Vec<RoleWithPermissions>> {
    Ok(Json(ApiResponse::success(
        state.services.access.list_roles().await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/roles/:id",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role with its permission names", body = ApiResponse<RoleWithPermissions>),
        (status = 404, description = "Role not found", body = crate::errors::ErrorResponse)
    ),
    tag = "access"
)]
pub async fn get_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<RoleWithPermissions> {
    Ok(Json(ApiResponse::success(
        state.services.access.get_role(id).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/roles",
    request_body = RoleInput,
    responses(
        (status = 201, description = "Role created", body = ApiResponse<RoleWithPermissions>),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse),
        (status = 422, description = "Unknown permission ids", body = crate::errors::ErrorResponse)
    ),
    tag = "access"
)]
pub async fn create_role(
    State(state): State<AppState>,
    Json(payload): Json<RoleInput>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    Ok(created_response(
        state.services.access.create_role(payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/roles/:id",
    request_body = RoleInput,
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role renamed and permission set synced", body = ApiResponse<RoleWithPermissions>),
        (status = 404, description = "Role not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::errors::ErrorResponse)
    ),
    tag = "access"
)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RoleInput>,
) -> ApiResult<RoleWithPermissions> {
    validate_input(&payload)?;
    Ok(Json(ApiResponse::success(
        state.services.access.update_role(id, payload).await?,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/roles/:id",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 409, description = "Role still assigned to users", body = crate::errors::ErrorResponse)
    ),
    tag = "access"
)]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.services.access.delete_role(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/users/:user_id/roles",
    request_body = AssignRoleRequest,
    params(("user_id" = String, Path, description = "Identity-provider user id")),
    responses(
        (status = 200, description = "Role assigned", body = ApiResponse<role::Model>),
        (status = 404, description = "Role not found", body = crate::errors::ErrorResponse)
    ),
    tag = "access"
)]
pub async fn assign_role(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<role::Model> {
    validate_input(&payload)?;
    Ok(Json(ApiResponse::success(
        state
            .services
            .access
            .assign_role(&user_id, payload.role.trim())
            .await?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/:user_id/access",
    params(("user_id" = String, Path, description = "Identity-provider user id")),
    responses((status = 200, description = "Stored roles and effective permissions", body = ApiResponse<UserAccess>)),
    tag = "access"
)]
pub async fn user_access(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<UserAccess> {
    let access = &state.services.access;
    let roles = access.roles_for_user(&user_id).await?;
    let permissions = access.effective_permissions(&user_id).await?;
    Ok(Json(ApiResponse::success(UserAccess {
        user_id,
        roles,
        permissions,
    })))
}
