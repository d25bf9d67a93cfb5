//! SimilarityStore trait definition.

use super::models::{ArticleEmbedding, Artist, NeighborMatch, SimilarityRecord, SimilarityStats};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Trait for the relational + vector backend behind the similarity pipeline.
pub trait SimilarityStore: Send + Sync {
    // =========================================================================
    // Artists
    // =========================================================================

    /// Batch-fetch attribute records. Unknown ids are simply absent from the
    /// result; order is unspecified.
    fn get_attributes(&self, artist_ids: &[String]) -> Result<Vec<Artist>>;

    /// Insert or update an artist record.
    fn upsert_artist(&self, artist: &Artist) -> Result<()>;

    // =========================================================================
    // Embeddings
    // =========================================================================

    /// Get the embedding of `artist_id` for the given source, if any.
    fn get_embedding(&self, artist_id: &str, source: &str) -> Result<Option<ArticleEmbedding>>;

    /// Insert or replace the embedding for an (artist, source) pair.
    fn upsert_embedding(&self, embedding: &ArticleEmbedding) -> Result<()>;

    /// Nearest neighbors of `query` among embeddings of `source`, keeping
    /// only hits with `similarity >= threshold`, best first, at most `limit`.
    fn find_nearest(
        &self,
        query: &[f32],
        source: &str,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<NeighborMatch>>;

    /// Ids of artists that have an embedding of `source`, ordered by id.
    fn get_embedded_artist_ids(&self, source: &str, limit: Option<usize>) -> Result<Vec<String>>;

    // =========================================================================
    // Similarity records
    // =========================================================================

    /// When the similarities of `artist1_id` were last computed: the newer of
    /// its computation marker and its most recent record. `None` if never.
    fn last_computed_at(&self, artist1_id: &str) -> Result<Option<DateTime<Utc>>>;

    /// All records of `artist1_id`, best score first.
    fn get_similarities(&self, artist1_id: &str) -> Result<Vec<SimilarityRecord>>;

    /// Atomically replace every record of `artist1_id` with `records` and
    /// mark the artist computed at `computed_at`. `records` may be empty.
    fn replace_similarities(
        &self,
        artist1_id: &str,
        records: &[SimilarityRecord],
        computed_at: DateTime<Utc>,
    ) -> Result<()>;

    // =========================================================================
    // Statistics
    // =========================================================================

    fn get_stats(&self) -> Result<SimilarityStats>;
}
