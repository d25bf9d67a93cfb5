//! Joins neighbor results with artist attribute records.

use super::error::SimilarityError;
use super::lookup::SimilarArtist;
use crate::similarity_store::{Artist, SimilarityStore};
use serde::Serialize;
use std::collections::HashMap;

/// A similar artist as returned to clients. Attribute fields are `None`
/// when the store has no record for the artist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedSimilarArtist {
    pub artist_id: String,
    pub similarity_score: f64,
    pub name: Option<String>,
    pub genre: Option<String>,
    pub popularity: Option<i64>,
    pub image: Option<String>,
}

/// Attach attributes to `matches` with a single batched store call,
/// preserving their order and count.
pub fn enrich(
    store: &dyn SimilarityStore,
    matches: Vec<SimilarArtist>,
) -> Result<Vec<EnrichedSimilarArtist>, SimilarityError> {
    if matches.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = matches.iter().map(|m| m.artist_id.clone()).collect();
    let attributes: HashMap<String, Artist> = store
        .get_attributes(&ids)
        .map_err(SimilarityError::backend)?
        .into_iter()
        .map(|a| (a.id.clone(), a))
        .collect();

    Ok(matches
        .into_iter()
        .map(|m| {
            let artist = attributes.get(&m.artist_id);
            EnrichedSimilarArtist {
                name: artist.map(|a| a.name.clone()),
                genre: artist.and_then(|a| a.genre.clone()),
                popularity: artist.and_then(|a| a.popularity),
                image: artist.and_then(|a| a.image.clone()),
                artist_id: m.artist_id,
                similarity_score: m.similarity_score,
            }
        })
        .collect())
}
