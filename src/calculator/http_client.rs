//! Client for an external similarity calculation service.

use super::provider::{
    CalculationOutcome, CalculationRequest, CalculatorError, SimilarityCalculator,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Calls `POST {base_url}/calculate-similarities` on a remote calculator.
///
/// The service answers `{success, error?, completed?}`. A successful answer
/// without `completed: true` means the job runs in the background.
pub struct HttpSimilarityCalculator {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CalculateResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
}

impl HttpSimilarityCalculator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl SimilarityCalculator for HttpSimilarityCalculator {
    fn name(&self) -> &str {
        "http"
    }

    async fn calculate(
        &self,
        request: &CalculationRequest,
    ) -> Result<CalculationOutcome, CalculatorError> {
        let url = format!("{}/calculate-similarities", self.base_url);
        debug!(url = %url, request = ?request, "Triggering similarity calculation");

        let response = self
            .client
            .post(&url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CalculatorError::Timeout
                } else {
                    CalculatorError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CalculatorError::Connection(e.to_string()))?;

        // Error statuses may still carry a `{success: false, error}` payload.
        let parsed = serde_json::from_str::<CalculateResponse>(&body);
        if !status.is_success() {
            return Err(match parsed {
                Ok(CalculateResponse {
                    error: Some(message),
                    ..
                }) => CalculatorError::Rejected(message),
                _ => CalculatorError::Api {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }

        let parsed = parsed.map_err(|e| {
            CalculatorError::InvalidResponse(format!("Failed to parse calculator response: {}", e))
        })?;

        if !parsed.success {
            let message = parsed
                .error
                .unwrap_or_else(|| "calculation failed".to_string());
            warn!("Similarity calculator rejected {:?}: {}", request, message);
            return Err(CalculatorError::Rejected(message));
        }

        Ok(if parsed.completed.unwrap_or(false) {
            CalculationOutcome::Completed
        } else {
            CalculationOutcome::Accepted
        })
    }
}
