use crate::calculator::CalculatorError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure of a similarity request, each variant mapping to one HTTP status.
#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Backend(String),

    #[error("{0}")]
    Calculation(String),
}

impl SimilarityError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SimilarityError::Validation(_) => StatusCode::BAD_REQUEST,
            SimilarityError::NotFound(_) => StatusCode::NOT_FOUND,
            SimilarityError::Backend(_) | SimilarityError::Calculation(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SimilarityError::Validation(_) => "validation",
            SimilarityError::NotFound(_) => "not_found",
            SimilarityError::Backend(_) => "backend",
            SimilarityError::Calculation(_) => "calculation",
        }
    }

    /// Wrap a store failure, keeping its context chain in the message.
    pub fn backend(err: anyhow::Error) -> Self {
        SimilarityError::Backend(format!("{:#}", err))
    }
}

impl From<CalculatorError> for SimilarityError {
    fn from(err: CalculatorError) -> Self {
        SimilarityError::Calculation(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: String,
    kind: &'a str,
}

impl IntoResponse for SimilarityError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
            kind: self.kind(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
