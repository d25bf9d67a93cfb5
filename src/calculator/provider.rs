//! Similarity calculator trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a calculator is asked to (re)compute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CalculationRequest {
    /// Recompute the similarities of a single artist.
    ForArtist { artist_id: String },
    /// Recompute up to `limit` artists, oldest similarities first.
    Batch { limit: usize },
}

impl CalculationRequest {
    pub fn for_artist(artist_id: impl Into<String>) -> Self {
        CalculationRequest::ForArtist {
            artist_id: artist_id.into(),
        }
    }

    pub fn artist_id(&self) -> Option<&str> {
        match self {
            CalculationRequest::ForArtist { artist_id } => Some(artist_id),
            CalculationRequest::Batch { .. } => None,
        }
    }
}

/// Completion signal reported by a calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculationOutcome {
    /// Results are already persisted when the call returns.
    Completed,
    /// A background job was started; results show up in the store later.
    Accepted,
}

impl CalculationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationOutcome::Completed => "completed",
            CalculationOutcome::Accepted => "accepted",
        }
    }
}

/// Errors that can occur when invoking a similarity calculator.
#[derive(Debug, Error)]
pub enum CalculatorError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Calculator timed out")]
    Timeout,

    #[error("Calculator API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid calculator response: {0}")]
    InvalidResponse(String),

    /// The calculator answered `{success: false, error}`.
    #[error("{0}")]
    Rejected(String),

    #[error("Calculation failed: {0}")]
    Internal(String),
}

/// Something able to (re)compute artist similarity records.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait SimilarityCalculator: Send + Sync {
    /// Short name used in logs and metrics (e.g. "http", "local").
    fn name(&self) -> &str;

    async fn calculate(
        &self,
        request: &CalculationRequest,
    ) -> Result<CalculationOutcome, CalculatorError>;
}
