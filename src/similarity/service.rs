//! Orchestration of similar-artist requests.
//!
//! START -> freshness -> (stale: trigger and wait | fresh: skip) -> lookup
//! -> enrichment -> DONE. Any stage failing ends the request with its
//! `SimilarityError`.

use super::completion::CompletionPolicy;
use super::enrichment::{enrich, EnrichedSimilarArtist};
use super::error::SimilarityError;
use super::freshness::{FreshnessPolicy, RefreshMode};
use super::lookup::{find_similar_artists, LookupSettings};
use crate::calculator::{CalculationOutcome, CalculationRequest, SimilarityCalculator};
use crate::server::metrics;
use crate::similarity_store::{SimilarityStats, SimilarityStore, WIKIPEDIA_SOURCE};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

lazy_static! {
    static ref ARTIST_ID_REGEX: Regex =
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]{0,127}$").expect("valid artist id regex");
}

/// Tunables of the similarity pipeline.
#[derive(Debug, Clone)]
pub struct SimilarityServiceOptions {
    pub staleness: chrono::Duration,
    pub lookup: LookupSettings,
    pub completion: CompletionPolicy,
    /// Artists recomputed by a batch calculation without an explicit limit.
    pub default_batch_limit: usize,
}

impl Default for SimilarityServiceOptions {
    fn default() -> Self {
        Self {
            staleness: chrono::Duration::days(7),
            lookup: LookupSettings::default(),
            completion: CompletionPolicy::default(),
            default_batch_limit: 50,
        }
    }
}

pub struct SimilarityService {
    store: Arc<dyn SimilarityStore>,
    calculator: Arc<dyn SimilarityCalculator>,
    freshness: FreshnessPolicy,
    lookup: LookupSettings,
    default_batch_limit: usize,
}

/// Reject ids that cannot name an artist before touching the store.
pub fn validate_artist_id(artist_id: &str) -> Result<&str, SimilarityError> {
    let artist_id = artist_id.trim();
    if artist_id.is_empty() {
        return Err(SimilarityError::Validation(
            "Missing artist id".to_string(),
        ));
    }
    if !ARTIST_ID_REGEX.is_match(artist_id) {
        return Err(SimilarityError::Validation(format!(
            "Invalid artist id: {}",
            artist_id
        )));
    }
    Ok(artist_id)
}

impl SimilarityService {
    pub fn new(
        store: Arc<dyn SimilarityStore>,
        calculator: Arc<dyn SimilarityCalculator>,
        options: SimilarityServiceOptions,
    ) -> Self {
        let freshness = FreshnessPolicy::new(
            store.clone(),
            calculator.clone(),
            options.staleness,
            options.completion,
        );
        Self {
            store,
            calculator,
            freshness,
            lookup: options.lookup,
            default_batch_limit: options.default_batch_limit,
        }
    }

    pub fn freshness(&self) -> &FreshnessPolicy {
        &self.freshness
    }

    /// Similar artists of `artist_id`, recomputing first when the stored
    /// similarities are stale or `mode` is `Force`.
    pub async fn similar_artists(
        &self,
        artist_id: &str,
        mode: RefreshMode,
    ) -> Result<Vec<EnrichedSimilarArtist>, SimilarityError> {
        let result = self.run_pipeline(artist_id, mode).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_similarity_request(mode.as_str(), outcome);
        result
    }

    async fn run_pipeline(
        &self,
        artist_id: &str,
        mode: RefreshMode,
    ) -> Result<Vec<EnrichedSimilarArtist>, SimilarityError> {
        let artist_id = validate_artist_id(artist_id)?;
        debug!(artist_id, mode = mode.as_str(), "similarity: start");

        let fresh = mode == RefreshMode::IfStale && self.freshness.has_similarities(artist_id)?;
        if fresh {
            debug!(artist_id, "similarity: fresh, skipping calculation");
        } else {
            // A calculation cannot produce anything without an embedding.
            self.require_embedding(artist_id)?;
            debug!(artist_id, "similarity: stale, triggering calculation");
            match mode {
                RefreshMode::IfStale => self.freshness.ensure_fresh(artist_id).await?,
                RefreshMode::Force => self.freshness.recompute(artist_id).await?,
            }
        }

        debug!(artist_id, "similarity: lookup");
        let started = Instant::now();
        let matches = find_similar_artists(self.store.as_ref(), artist_id, &self.lookup)?;
        metrics::record_lookup(started.elapsed());

        debug!(artist_id, matches = matches.len(), "similarity: enrich");
        let enriched = enrich(self.store.as_ref(), matches)?;

        debug!(artist_id, results = enriched.len(), "similarity: done");
        Ok(enriched)
    }

    fn require_embedding(&self, artist_id: &str) -> Result<(), SimilarityError> {
        match self
            .store
            .get_embedding(artist_id, WIKIPEDIA_SOURCE)
            .map_err(SimilarityError::backend)?
        {
            Some(_) => Ok(()),
            None => Err(SimilarityError::NotFound(format!(
                "No {} embedding found for artist {}",
                WIKIPEDIA_SOURCE, artist_id
            ))),
        }
    }

    /// Ask the calculator to recompute up to `limit` artists.
    pub async fn calculate_batch(
        &self,
        limit: Option<usize>,
    ) -> Result<CalculationOutcome, SimilarityError> {
        let limit = limit.unwrap_or(self.default_batch_limit);
        if limit == 0 {
            return Err(SimilarityError::Validation(
                "limit must be greater than 0".to_string(),
            ));
        }

        let started = Instant::now();
        let calculator = self.calculator.name().to_string();
        match self
            .calculator
            .calculate(&CalculationRequest::Batch { limit })
            .await
        {
            Ok(outcome) => {
                metrics::record_calculation_trigger(&calculator, outcome.as_str(), started.elapsed());
                info!(
                    "Batch calculation of up to {} artists {} in {:?}",
                    limit,
                    outcome.as_str(),
                    started.elapsed()
                );
                Ok(outcome)
            }
            Err(e) => {
                metrics::record_calculation_trigger(&calculator, "error", started.elapsed());
                Err(e.into())
            }
        }
    }

    pub fn stats(&self) -> Result<SimilarityStats, SimilarityError> {
        self.store.get_stats().map_err(SimilarityError::backend)
    }
}
