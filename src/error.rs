//! Error taxonomy shared by the services and the HTTP layer.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    /// The LLM endpoint refused the request; carries its raw error payload.
    #[error("AI Service Error")]
    Upstream(Value),

    #[error("Failed to parse AI response: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) | AppError::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Parse(_) | AppError::Store(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Upstream(details) => {
                error!(%details, "LLM endpoint returned an error");
                ErrorBody {
                    error: "AI Service Error".to_string(),
                    details: Some(details),
                }
            }
            AppError::Parse(reason) => {
                error!(%reason, "model output could not be parsed");
                ErrorBody {
                    error: "Failed to parse AI response".to_string(),
                    details: None,
                }
            }
            AppError::Store(err) => {
                error!(?err, "database error");
                ErrorBody {
                    error: "Database error".to_string(),
                    details: None,
                }
            }
            AppError::Internal(err) => {
                error!(?err, "internal server error");
                ErrorBody {
                    error: "Internal server error".to_string(),
                    details: None,
                }
            }
            other => ErrorBody {
                error: other.to_string(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
