//! In-process similarity calculator working directly on the store.

use super::provider::{
    CalculationOutcome, CalculationRequest, CalculatorError, SimilarityCalculator,
};
use super::text_similarity::{genre_similarity, name_similarity};
use crate::similarity_store::{
    Artist, SimilarityFactors, SimilarityMetadata, SimilarityRecord, SimilarityStore,
    WIKIPEDIA_SOURCE,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const CONTENT_WEIGHT: f64 = 0.7;
const GENRE_WEIGHT: f64 = 0.2;
const NAME_WEIGHT: f64 = 0.1;

/// Combine the per-factor similarities into a score within [0, 1].
pub fn combined_score(factors: &SimilarityFactors) -> f64 {
    let score = CONTENT_WEIGHT * factors.content_similarity
        + GENRE_WEIGHT * factors.genre_similarity
        + NAME_WEIGHT * factors.name_similarity;
    score.clamp(0.0, 1.0)
}

fn genres_of(artist: &Artist) -> Vec<String> {
    if !artist.genres.is_empty() {
        return artist.genres.clone();
    }
    artist.genre.iter().cloned().collect()
}

/// Computes similarity records from stored embeddings and attributes, and
/// persists them before returning.
pub struct LocalSimilarityCalculator {
    store: Arc<dyn SimilarityStore>,
    match_threshold: f64,
    match_count: usize,
}

impl LocalSimilarityCalculator {
    pub fn new(store: Arc<dyn SimilarityStore>, match_threshold: f64, match_count: usize) -> Self {
        Self {
            store,
            match_threshold,
            match_count,
        }
    }

    /// Recompute and replace the records of one artist. Returns the number
    /// of records written.
    pub fn calculate_artist(&self, artist_id: &str) -> Result<usize> {
        let Some(query) = self.store.get_embedding(artist_id, WIKIPEDIA_SOURCE)? else {
            debug!("No {} embedding for {}, nothing to calculate", WIKIPEDIA_SOURCE, artist_id);
            return Ok(0);
        };

        // Every other embedded artist is a candidate; the combined score
        // decides what is kept.
        let neighbors: Vec<_> = self
            .store
            .find_nearest(&query.embedding, WIKIPEDIA_SOURCE, -1.0, usize::MAX)?
            .into_iter()
            .filter(|n| n.artist_id != artist_id)
            .collect();

        let mut ids: Vec<String> = neighbors.iter().map(|n| n.artist_id.clone()).collect();
        ids.push(artist_id.to_string());
        let attributes: HashMap<String, Artist> = self
            .store
            .get_attributes(&ids)?
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();
        let source = attributes.get(artist_id);

        let computed_at = Utc::now();
        let mut records: Vec<SimilarityRecord> = neighbors
            .into_iter()
            .map(|neighbor| {
                let target = attributes.get(&neighbor.artist_id);
                let (genre, name) = match (source, target) {
                    (Some(s), Some(t)) => (
                        genre_similarity(&genres_of(s), &genres_of(t)),
                        name_similarity(&s.name, &t.name),
                    ),
                    _ => (0.0, 0.0),
                };
                let factors = SimilarityFactors {
                    genre_similarity: genre,
                    name_similarity: name,
                    content_similarity: neighbor.similarity.clamp(0.0, 1.0),
                };
                SimilarityRecord {
                    artist1_id: artist_id.to_string(),
                    artist2_id: neighbor.artist_id,
                    similarity_score: combined_score(&factors),
                    metadata: SimilarityMetadata { factors },
                    computed_at,
                }
            })
            .filter(|r| r.similarity_score >= self.match_threshold)
            .collect();

        records.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.artist2_id.cmp(&b.artist2_id))
        });
        records.truncate(self.match_count);

        self.store.replace_similarities(artist_id, &records, computed_at)?;
        debug!("Stored {} similarity records for {}", records.len(), artist_id);
        Ok(records.len())
    }

    /// Recompute up to `limit` artists, starting from those whose records
    /// are missing or oldest. Returns (artists processed, failures).
    pub fn calculate_batch(&self, limit: usize) -> Result<(usize, usize)> {
        let mut candidates = Vec::new();
        for id in self.store.get_embedded_artist_ids(WIKIPEDIA_SOURCE, None)? {
            let latest = self.store.last_computed_at(&id)?;
            candidates.push((latest, id));
        }
        // None sorts before Some, so never-computed artists come first.
        candidates.sort();

        let mut processed = 0;
        let mut failures = 0;
        for (_, id) in candidates.into_iter().take(limit) {
            match self.calculate_artist(&id) {
                Ok(_) => processed += 1,
                Err(e) => {
                    warn!("Failed to calculate similarities for {}: {:#}", id, e);
                    failures += 1;
                }
            }
        }
        info!(
            "Batch similarity calculation done: {} artists processed, {} failed",
            processed, failures
        );
        Ok((processed, failures))
    }
}

#[async_trait]
impl SimilarityCalculator for LocalSimilarityCalculator {
    fn name(&self) -> &str {
        "local"
    }

    async fn calculate(
        &self,
        request: &CalculationRequest,
    ) -> Result<CalculationOutcome, CalculatorError> {
        let worker = LocalSimilarityCalculator {
            store: Arc::clone(&self.store),
            match_threshold: self.match_threshold,
            match_count: self.match_count,
        };
        let request = request.clone();

        let result = tokio::task::spawn_blocking(move || match &request {
            CalculationRequest::ForArtist { artist_id } => worker.calculate_artist(artist_id).map(|_| ()),
            CalculationRequest::Batch { limit } => worker.calculate_batch(*limit).map(|_| ()),
        })
        .await
        .map_err(|e| CalculatorError::Internal(e.to_string()))?;

        result.map_err(|e| CalculatorError::Internal(format!("{:#}", e)))?;
        Ok(CalculationOutcome::Completed)
    }
}
