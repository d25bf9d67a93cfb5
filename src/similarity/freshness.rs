//! Decides whether an artist's similarities must be recomputed, and runs
//! the recompute when they must.

use super::completion::CompletionPolicy;
use super::error::SimilarityError;
use super::single_flight::SingleFlight;
use crate::calculator::{CalculationOutcome, CalculationRequest, SimilarityCalculator};
use crate::server::metrics;
use crate::similarity_store::SimilarityStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Whether a recompute may be skipped when the stored records are fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    IfStale,
    Force,
}

impl RefreshMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshMode::IfStale => "if_stale",
            RefreshMode::Force => "force",
        }
    }
}

pub struct FreshnessPolicy {
    store: Arc<dyn SimilarityStore>,
    calculator: Arc<dyn SimilarityCalculator>,
    staleness: Duration,
    completion: CompletionPolicy,
    flights: SingleFlight,
}

impl FreshnessPolicy {
    pub fn new(
        store: Arc<dyn SimilarityStore>,
        calculator: Arc<dyn SimilarityCalculator>,
        staleness: Duration,
        completion: CompletionPolicy,
    ) -> Self {
        Self {
            store,
            calculator,
            staleness,
            completion,
            flights: SingleFlight::new(),
        }
    }

    /// True iff `artist_id` was computed within the staleness window, even
    /// if that computation kept no records.
    pub fn has_similarities(&self, artist_id: &str) -> Result<bool, SimilarityError> {
        self.has_similarities_at(artist_id, Utc::now())
    }

    fn has_similarities_at(
        &self,
        artist_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SimilarityError> {
        let since = now.checked_sub_signed(self.staleness).ok_or_else(|| {
            SimilarityError::Backend(format!(
                "Staleness window of {} days is out of range",
                self.staleness.num_days()
            ))
        })?;
        let last_computed = self
            .store
            .last_computed_at(artist_id)
            .map_err(SimilarityError::backend)?;
        Ok(last_computed.is_some_and(|at| at >= since))
    }

    /// Make sure `artist_id` has fresh similarity records, recomputing them
    /// when they are missing or stale.
    pub async fn ensure_fresh(&self, artist_id: &str) -> Result<(), SimilarityError> {
        if self.has_similarities(artist_id)? {
            debug!("Similarities of {} are fresh", artist_id);
            return Ok(());
        }
        self.refresh(artist_id, RefreshMode::IfStale).await
    }

    /// Recompute `artist_id` regardless of the stored records.
    pub async fn recompute(&self, artist_id: &str) -> Result<(), SimilarityError> {
        self.refresh(artist_id, RefreshMode::Force).await
    }

    async fn refresh(&self, artist_id: &str, mode: RefreshMode) -> Result<(), SimilarityError> {
        let requested_at = Utc::now();
        let mut flight = self.flights.acquire(artist_id).await;

        // Someone else recomputed while we were queued.
        if flight.last_completed().is_some_and(|at| at >= requested_at) {
            debug!("Recompute of {} completed by a concurrent request", artist_id);
            return Ok(());
        }
        if mode == RefreshMode::IfStale && self.has_similarities(artist_id)? {
            debug!("Similarities of {} became fresh while waiting", artist_id);
            return Ok(());
        }

        let started = Instant::now();
        let triggered_at = Utc::now();
        let request = CalculationRequest::for_artist(artist_id);
        let calculator = self.calculator.name().to_string();

        let result = match self.calculator.calculate(&request).await {
            Ok(CalculationOutcome::Completed) => Ok(CalculationOutcome::Completed),
            Ok(CalculationOutcome::Accepted) => {
                debug!("Calculation of {} accepted, waiting for results", artist_id);
                self.completion
                    .wait_for_records(self.store.as_ref(), artist_id, triggered_at)
                    .await
                    .map(|_| CalculationOutcome::Accepted)
            }
            Err(e) => Err(SimilarityError::from(e)),
        };

        match result {
            Ok(outcome) => {
                metrics::record_calculation_trigger(&calculator, outcome.as_str(), started.elapsed());
                info!(
                    "Recomputed similarities of {} ({}, {}) in {:?}",
                    artist_id,
                    mode.as_str(),
                    outcome.as_str(),
                    started.elapsed()
                );
                flight.mark_completed(Utc::now());
                Ok(())
            }
            Err(e) => {
                metrics::record_calculation_trigger(&calculator, "error", started.elapsed());
                warn!("Similarity calculation for {} failed: {}", artist_id, e);
                Err(e)
            }
        }
    }
}
