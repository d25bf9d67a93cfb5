//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own similarity database.

use super::constants::*;
use super::fixtures::create_test_store;
use artist_similarity_server::calculator::{
    CalculationOutcome, CalculationRequest, CalculatorError, LocalSimilarityCalculator,
    SimilarityCalculator,
};
use artist_similarity_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use artist_similarity_server::similarity::{
    CompletionPolicy, SimilarityService, SimilarityServiceOptions,
};
use artist_similarity_server::similarity_store::{SimilarityStore, SqliteSimilarityStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// How the test server's calculator reports completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalculatorMode {
    /// Records are written before the trigger returns.
    Local,
    /// The trigger returns immediately and records show up later.
    Background,
}

/// Wraps the in-process calculator, counting triggers and optionally
/// deferring the work to a background task.
struct CountingCalculator {
    inner: Arc<LocalSimilarityCalculator>,
    mode: CalculatorMode,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SimilarityCalculator for CountingCalculator {
    fn name(&self) -> &str {
        "counting"
    }

    async fn calculate(
        &self,
        request: &CalculationRequest,
    ) -> Result<CalculationOutcome, CalculatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            CalculatorMode::Local => self.inner.calculate(request).await,
            CalculatorMode::Background => {
                let inner = self.inner.clone();
                let request = request.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(BACKGROUND_CALCULATION_DELAY_MS))
                        .await;
                    let _ = inner.calculate(&request).await;
                });
                Ok(CalculationOutcome::Accepted)
            }
        }
    }
}

/// Test server instance with an isolated similarity database
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Store for direct database access in tests
    pub store: Arc<dyn SimilarityStore>,

    /// Number of calculation triggers issued by the server
    pub calculation_calls: Arc<AtomicUsize>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port with a synchronous calculator
    pub async fn spawn() -> Self {
        Self::spawn_with(CalculatorMode::Local).await
    }

    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be created, the port cannot be bound
    /// or the server doesn't become ready within timeout.
    pub async fn spawn_with(mode: CalculatorMode) -> Self {
        let (temp_db_dir, db_path) = create_test_store().expect("Failed to create test store");

        let store: Arc<dyn SimilarityStore> =
            Arc::new(SqliteSimilarityStore::new(&db_path).expect("Failed to open test store"));

        let options = SimilarityServiceOptions {
            completion: CompletionPolicy {
                initial_delay: Duration::from_millis(20),
                multiplier: 2.0,
                max_delay: Duration::from_millis(200),
                max_wait: Duration::from_secs(5),
            },
            ..SimilarityServiceOptions::default()
        };

        let calculation_calls = Arc::new(AtomicUsize::new(0));
        let calculator = Arc::new(CountingCalculator {
            inner: Arc::new(LocalSimilarityCalculator::new(
                store.clone(),
                options.lookup.match_threshold,
                options.lookup.match_count,
            )),
            mode,
            calls: calculation_calls.clone(),
        });

        let service = Arc::new(SimilarityService::new(store.clone(), calculator, options));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            ..ServerConfig::default()
        };
        let app = make_app(config, service);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            store,
            calculation_calls,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    pub fn calculation_calls(&self) -> usize {
        self.calculation_calls.load(Ordering::SeqCst)
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
