//! Waiting for asynchronous calculations to land in the store.
//!
//! Polls with exponential backoff: `initial_delay * multiplier^attempt`,
//! capped at `max_delay`, until `max_wait` has elapsed.

use super::error::SimilarityError;
use crate::similarity_store::SimilarityStore;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CompletionPolicy {
    /// Delay before the first poll.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each poll.
    pub multiplier: f64,
    /// Cap for the exponential growth.
    pub max_delay: Duration,
    /// Total time to wait before giving up.
    pub max_wait: Duration,
}

impl CompletionPolicy {
    /// Delay before poll number `attempt` (0-based).
    pub fn delay(&self, attempt: i32) -> Duration {
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Wait until `artist_id` is marked computed at or after `since`. A
    /// computation that kept no records counts too.
    pub async fn wait_for_records(
        &self,
        store: &dyn SimilarityStore,
        artist_id: &str,
        since: DateTime<Utc>,
    ) -> Result<(), SimilarityError> {
        // Stored timestamps have millisecond resolution.
        let since = DateTime::<Utc>::from_timestamp_millis(since.timestamp_millis()).unwrap_or(since);
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            let remaining = self.max_wait.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(SimilarityError::Calculation(format!(
                    "Timed out after {}s waiting for similarities of {}",
                    self.max_wait.as_secs(),
                    artist_id
                )));
            }
            tokio::time::sleep(self.delay(attempt).min(remaining)).await;

            let latest = store
                .last_computed_at(artist_id)
                .map_err(SimilarityError::backend)?;
            if latest.is_some_and(|at| at >= since) {
                debug!(
                    "Similarities of {} visible after {} polls",
                    artist_id,
                    attempt + 1
                );
                return Ok(());
            }
            attempt += 1;
        }
    }
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            max_wait: Duration::from_secs(60),
        }
    }
}
