//! Similarity calculation triggers.

mod http_client;
mod local;
mod provider;
mod text_similarity;

pub use http_client::HttpSimilarityCalculator;
pub use local::{combined_score, LocalSimilarityCalculator};
#[cfg(any(test, feature = "mock"))]
pub use provider::MockSimilarityCalculator;
pub use provider::{CalculationOutcome, CalculationRequest, CalculatorError, SimilarityCalculator};
