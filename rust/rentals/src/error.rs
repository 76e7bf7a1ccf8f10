use crate::repository::RepositoryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("missing {0} parameter")]
    MissingParameter(&'static str),

    #[error("{0}")]
    InvalidRequest(String),

    /// A storage failure. Only `message` is shown to clients.
    #[error("{message}")]
    Repository {
        message: &'static str,
        #[source]
        source: RepositoryError,
    },
}

impl ServiceError {
    /// Wraps a repository failure behind a client-facing message. Invalid
    /// listing parameters stay client errors.
    pub fn repository(message: &'static str, err: RepositoryError) -> Self {
        match err {
            RepositoryError::InvalidFilter(filter) => Self::InvalidRequest(filter.to_string()),
            source => Self::Repository { message, source },
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ServiceError::MissingParameter(_) | ServiceError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Repository { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{"error": {"message": ...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: ErrorMessage {
                message: message.into(),
            },
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let ServiceError::Repository { message, source } = &self {
            error!(error = ?source, "{message}");
        }

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
