//! Data models for the similarity database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source tag of embeddings computed from an artist's Wikipedia article.
pub const WIKIPEDIA_SOURCE: &str = "wikipedia";

/// Identity record of an artist, owned by the relational side of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub genre: Option<String>,
    pub popularity: Option<i64>,
    pub image: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Embedding of a reference text about an artist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleEmbedding {
    pub artist_id: String,
    pub source: String,
    pub embedding: Vec<f32>,
}

/// A raw nearest-neighbor hit returned by the vector search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborMatch {
    pub artist_id: String,
    pub similarity: f64,
}

/// Per-factor breakdown of a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimilarityFactors {
    pub genre_similarity: f64,
    pub name_similarity: f64,
    pub content_similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimilarityMetadata {
    pub factors: SimilarityFactors,
}

/// A computed, directional (artist1 -> artist2) similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    pub artist1_id: String,
    pub artist2_id: String,
    /// Always within [0, 1].
    pub similarity_score: f64,
    pub metadata: SimilarityMetadata,
    pub computed_at: DateTime<Utc>,
}

/// Summary statistics for the similarity database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityStats {
    pub artists: usize,
    pub embeddings: usize,
    pub similarity_records: usize,
}
