//! In-memory store double shared by the similarity unit tests.

use crate::similarity_store::{
    ArticleEmbedding, Artist, NeighborMatch, SimilarityRecord, SimilarityStats, SimilarityStore,
};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answers the nearest-neighbor query from a fixed list and serves
/// attributes from a map. Counts `get_attributes` calls.
pub struct FakeSimilarityStore {
    pub neighbors: Vec<NeighborMatch>,
    pub attributes: HashMap<String, Artist>,
    pub has_embedding: bool,
    pub fail_reads: bool,
    pub attribute_calls: AtomicUsize,
}

impl FakeSimilarityStore {
    pub fn with_neighbors(scores: &[(&str, f64)]) -> Self {
        Self {
            neighbors: scores
                .iter()
                .map(|(id, s)| NeighborMatch {
                    artist_id: id.to_string(),
                    similarity: *s,
                })
                .collect(),
            attributes: HashMap::new(),
            has_embedding: true,
            fail_reads: false,
            attribute_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_artist(mut self, id: &str, name: &str) -> Self {
        self.attributes.insert(
            id.to_string(),
            Artist {
                id: id.to_string(),
                name: name.to_string(),
                genre: Some("rock".to_string()),
                popularity: Some(42),
                image: Some(format!("https://img.example/{}.jpg", id)),
                genres: vec!["rock".to_string()],
            },
        );
        self
    }

    pub fn attribute_calls(&self) -> usize {
        self.attribute_calls.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads {
            return Err(anyhow!("connection refused"));
        }
        Ok(())
    }
}

impl SimilarityStore for FakeSimilarityStore {
    fn get_attributes(&self, artist_ids: &[String]) -> Result<Vec<Artist>> {
        self.check_reads()?;
        self.attribute_calls.fetch_add(1, Ordering::SeqCst);
        // Reverse order to make sure callers don't rely on it.
        Ok(artist_ids
            .iter()
            .rev()
            .filter_map(|id| self.attributes.get(id).cloned())
            .collect())
    }

    fn upsert_artist(&self, _: &Artist) -> Result<()> {
        Ok(())
    }

    fn get_embedding(&self, artist_id: &str, source: &str) -> Result<Option<ArticleEmbedding>> {
        self.check_reads()?;
        Ok(self.has_embedding.then(|| ArticleEmbedding {
            artist_id: artist_id.to_string(),
            source: source.to_string(),
            embedding: vec![1.0, 0.0],
        }))
    }

    fn upsert_embedding(&self, _: &ArticleEmbedding) -> Result<()> {
        Ok(())
    }

    fn find_nearest(
        &self,
        _: &[f32],
        _: &str,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<NeighborMatch>> {
        self.check_reads()?;
        let mut hits: Vec<NeighborMatch> = self
            .neighbors
            .iter()
            .filter(|n| n.similarity >= threshold)
            .cloned()
            .collect();
        hits.truncate(limit);
        Ok(hits)
    }

    fn get_embedded_artist_ids(&self, _: &str, _: Option<usize>) -> Result<Vec<String>> {
        Ok(vec![])
    }

    fn last_computed_at(&self, _: &str) -> Result<Option<DateTime<Utc>>> {
        self.check_reads()?;
        Ok(None)
    }

    fn get_similarities(&self, _: &str) -> Result<Vec<SimilarityRecord>> {
        Ok(vec![])
    }

    fn replace_similarities(&self, _: &str, _: &[SimilarityRecord], _: DateTime<Utc>) -> Result<()> {
        Ok(())
    }

    fn get_stats(&self) -> Result<SimilarityStats> {
        Ok(SimilarityStats {
            artists: self.attributes.len(),
            embeddings: self.neighbors.len(),
            similarity_records: 0,
        })
    }
}
