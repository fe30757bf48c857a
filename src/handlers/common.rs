use crate::{errors::ApiError, ApiResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::Validate;

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Table listings are returned as-is, without the `ApiResponse` wrapper.
pub fn table_response<T: Serialize>(page: T) -> Response {
    (StatusCode::OK, Json(page)).into_response()
}

/// Validate request input, reporting every failing field
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input.validate().map_err(ApiError::from)
}

/// Acting user recorded in audit columns
pub fn actor(user: &crate::auth::AuthUser) -> Option<String> {
    Some(user.user_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[derive(Validate)]
    struct Named {
        #[validate(length(min = 1))]
        name: String,
    }

    #[tokio::test]
    async fn created_wraps_in_api_response() {
        let response = created_response(serde_json::json!({"id": 1}));
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], 1);
    }

    #[test]
    fn validate_input_lists_fields() {
        let err = validate_input(&Named { name: String::new() }).unwrap_err();
        match err {
            ApiError::ValidationErrors(fields) => assert_eq!(fields, vec!["name: length"]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
