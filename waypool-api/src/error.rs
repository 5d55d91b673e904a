use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Domain(waypool_core::Error),
    Anyhow(anyhow::Error),
}

impl From<waypool_core::Error> for AppError {
    fn from(err: waypool_core::Error) -> Self {
        Self::Domain(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use waypool_core::Error::*;

        let (status, error_message) = match self {
            AppError::Domain(NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            AppError::Domain(Forbidden(msg)) => (StatusCode::FORBIDDEN, msg),
            AppError::Domain(Conflict(msg)) => (StatusCode::CONFLICT, msg),
            AppError::Domain(InvalidArgument(msg)) => (StatusCode::BAD_REQUEST, msg),
            AppError::Domain(Unavailable(msg)) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Domain(Internal(msg)) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
