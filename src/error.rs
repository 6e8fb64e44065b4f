use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum AppError {
    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Index build failed: {0}")]
    IndexBuildError(String),

    #[error("Search index is not ready; no successful build yet")]
    IndexNotReady,

    #[error("Language model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid tool call: {0}")]
    ToolArgumentError(String),

    #[error("Tool loop exceeded {0} rounds without a final reply")]
    ToolLoopExceeded(usize),

    #[error("Embedding failed: {0}")]
    EmbeddingError(String),

    #[error("Snapshot error: {0}")]
    SnapshotError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::EmptyQuery | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ToolArgumentError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::IndexNotReady => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ModelUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::IndexBuildError(_)
            | AppError::ToolLoopExceeded(_)
            | AppError::EmbeddingError(_)
            | AppError::SnapshotError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        match &self {
            AppError::EmptyQuery | AppError::ValidationError(_) => {
                tracing::warn!(error = %message, "Validation error");
            }
            AppError::IndexNotReady => {
                tracing::warn!("Search attempted before index was built");
            }
            AppError::ModelUnavailable(e) => {
                tracing::error!(error = %e, "Language model error");
            }
            AppError::ToolArgumentError(e) => {
                tracing::warn!(error = %e, "Tool argument error");
            }
            _ => {
                tracing::error!(error = %message, "Internal error");
            }
        }

        let body = Json(ErrorResponse {
            error: message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<ort::Error> for AppError {
    fn from(err: ort::Error) -> Self {
        AppError::EmbeddingError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
