use std::io;

use axum::{http::StatusCode, response::IntoResponse, response::Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {key}: {source}")]
    Write {
        key: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove {key}: {source}")]
    Remove {
        key: &'static str,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Invalid(String),
    #[error("import payload is not valid: {0}")]
    Import(#[source] serde_json::Error),
    #[error("failed to export data: {0}")]
    Export(#[source] serde_json::Error),
}

pub type PlannerResult<T> = Result<T, PlannerError>;

impl IntoResponse for PlannerError {
    fn into_response(self) -> Response {
        let status = match &self {
            PlannerError::Invalid(_) | PlannerError::Import(_) => StatusCode::BAD_REQUEST,
            PlannerError::Store(_) | PlannerError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}
