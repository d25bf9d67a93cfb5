//! Artist Similarity Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod calculator;
pub mod config;
pub mod server;
pub mod similarity;
pub mod similarity_store;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use server::{make_app, run_server, RequestsLoggingLevel};
pub use similarity::{SimilarityError, SimilarityService};
pub use similarity_store::{SimilarityStore, SqliteSimilarityStore};
