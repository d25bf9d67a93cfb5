//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per endpoint. When API routes or request
//! formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::Value;
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Home
    // ========================================================================

    pub async fn get_home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Similar artists
    // ========================================================================

    /// GET /v1/similar-artists?id=
    pub async fn get_similar_artists(&self, artist_id: &str) -> Response {
        self.client
            .get(format!("{}/v1/similar-artists", self.base_url))
            .query(&[("id", artist_id)])
            .send()
            .await
            .expect("Get similar artists request failed")
    }

    /// GET /v1/similar-artists without an id
    pub async fn get_similar_artists_without_id(&self) -> Response {
        self.client
            .get(format!("{}/v1/similar-artists", self.base_url))
            .send()
            .await
            .expect("Get similar artists request failed")
    }

    /// POST /v1/similar-artists?id= (forces a recalculation)
    pub async fn refresh_similar_artists(&self, artist_id: &str) -> Response {
        self.client
            .post(format!("{}/v1/similar-artists", self.base_url))
            .query(&[("id", artist_id)])
            .send()
            .await
            .expect("Refresh similar artists request failed")
    }

    // ========================================================================
    // Batch calculation
    // ========================================================================

    /// POST /v1/similarities/calculate with an optional JSON body
    pub async fn calculate_similarities(&self, body: Option<Value>) -> Response {
        let request = self
            .client
            .post(format!("{}/v1/similarities/calculate", self.base_url));
        let request = match body {
            Some(body) => request.json(&body),
            None => request,
        };
        request.send().await.expect("Calculate request failed")
    }

    /// POST /v1/similarities/calculate with a raw body
    pub async fn calculate_similarities_raw(&self, body: &'static str) -> Response {
        self.client
            .post(format!("{}/v1/similarities/calculate", self.base_url))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Calculate request failed")
    }
}
