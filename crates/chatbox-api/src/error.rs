use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use chatbox_db::StoreError;
use chatbox_types::api::ErrorBody;

use crate::token::TokenError;

/// Every failure a handler can report. Converted to a status code and a JSON
/// `{error, code}` body at the response boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing bearer token or bad credentials.
    #[error("{0}")]
    Unauthenticated(String),

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::TokenExpired,
            TokenError::Invalid => ApiError::InvalidToken,
            TokenError::Signing(e) => ApiError::Internal(format!("token signing failed: {}", e)),
        }
    }
}

/// Malformed or incomplete request bodies answer with the same `{error, code}`
/// shape as every other failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            ApiError::InvalidToken => (StatusCode::FORBIDDEN, "INVALID_TOKEN", self.to_string()),
            ApiError::TokenExpired => (StatusCode::FORBIDDEN, "TOKEN_EXPIRED", self.to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            ApiError::Storage(err) => classify_store_error(err),
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::DuplicateUsername => (StatusCode::CONFLICT, "CONFLICT", err.to_string()),
        StoreError::UserNotFound(_) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND", "User not found".to_string())
        }
        StoreError::MessageNotFound(_) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND", "Message not found".to_string())
        }
        StoreError::EmptyMessage => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string()),
        StoreError::Corrupt(_) | StoreError::LockPoisoned | StoreError::Sqlite(_) => {
            error!(error = %err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}


#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn poisoned_store_lock_hides_details() {
        let (status, body) = render(ApiError::Storage(StoreError::LockPoisoned)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"], "An internal error occurred");
    }

    #[tokio::test]
    async fn internal_message_is_not_leaked() {
        let (status, body) = render(ApiError::Internal("disk on fire".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An internal error occurred");
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let (status, body) = render(ApiError::Storage(StoreError::DuplicateUsername)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }
}
