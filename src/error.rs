use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::response::Envelope;

/// Failure taxonomy for the API. Every variant is converted at the handler
/// boundary into an HTTP status plus the JSON envelope; nothing is retried.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadInput(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    Storage {
        message: String,
        #[source]
        source: sqlx::Error,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn storage(message: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::storage("Internal server error", e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unauthorized(msg) => {
                warn!(message = %msg, "unauthorized");
                (StatusCode::UNAUTHORIZED, msg)
            }
            ApiError::Storage { message, source } => {
                error!(error = %source, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(Envelope::error(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn bad_input_maps_to_400_envelope() {
        let res = ApiError::BadInput("Something's wrong with your input".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Something's wrong with your input");
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn conflict_maps_to_409() {
        let res = ApiError::Conflict("Username already taken".into()).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let json = body_json(res).await;
        assert_eq!(json["message"], "Username already taken");
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let res = ApiError::NotFound("User not found".into()).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unauthorized_maps_to_401() {
        let res = ApiError::Unauthorized("Password incorrect".into()).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn storage_maps_to_500_with_caller_message() {
        let res = ApiError::storage("Failed to delete user", sqlx::Error::PoolClosed).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(res).await;
        assert_eq!(json["message"], "Failed to delete user");
    }

    #[tokio::test]
    async fn internal_maps_to_500_and_hides_detail() {
        let res = ApiError::Internal(anyhow::anyhow!("signing key exploded")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(res).await;
        assert_eq!(json["message"], "Internal server error");
    }
}
