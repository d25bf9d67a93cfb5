//! Nearest-neighbor lookup over Wikipedia article embeddings.

use super::error::SimilarityError;
use crate::similarity_store::{NeighborMatch, SimilarityStore, WIKIPEDIA_SOURCE};
use serde::Serialize;
use std::cmp::Ordering;

/// A neighbor of the queried artist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarArtist {
    pub artist_id: String,
    pub similarity_score: f64,
}

/// Parameters of the nearest-neighbor query.
#[derive(Debug, Clone, Copy)]
pub struct LookupSettings {
    pub match_threshold: f64,
    pub match_count: usize,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            match_threshold: 0.7,
            match_count: 10,
        }
    }
}

/// Up to `match_count` artists whose embedding is at least
/// `match_threshold`-similar to `artist_id`'s, best first, ties by id.
/// The artist itself is never part of the result.
pub fn find_similar_artists(
    store: &dyn SimilarityStore,
    artist_id: &str,
    settings: &LookupSettings,
) -> Result<Vec<SimilarArtist>, SimilarityError> {
    let embedding = store
        .get_embedding(artist_id, WIKIPEDIA_SOURCE)
        .map_err(SimilarityError::backend)?
        .ok_or_else(|| {
            SimilarityError::NotFound(format!(
                "No {} embedding found for artist {}",
                WIKIPEDIA_SOURCE, artist_id
            ))
        })?;

    if settings.match_count == 0 {
        return Ok(Vec::new());
    }

    // One extra slot absorbs the artist's own embedding.
    let neighbors = store
        .find_nearest(
            &embedding.embedding,
            WIKIPEDIA_SOURCE,
            settings.match_threshold,
            settings.match_count + 1,
        )
        .map_err(SimilarityError::backend)?;

    let mut matches: Vec<NeighborMatch> = neighbors
        .into_iter()
        .filter(|n| n.artist_id != artist_id && n.similarity >= settings.match_threshold)
        .collect();
    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.artist_id.cmp(&b.artist_id))
    });
    matches.truncate(settings.match_count);

    Ok(matches
        .into_iter()
        .map(|n| SimilarArtist {
            artist_id: n.artist_id,
            similarity_score: n.similarity,
        })
        .collect())
}
