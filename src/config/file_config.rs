use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    // Feature configs
    pub similarity: Option<SimilarityConfig>,
    pub calculator: Option<CalculatorConfig>,
    pub http_cache: Option<HttpCacheConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SimilarityConfig {
    pub staleness_days: Option<u64>,
    pub match_threshold: Option<f64>,
    pub match_count: Option<usize>,
    // Polling for calculations that complete asynchronously
    pub poll_initial_delay_ms: Option<u64>,
    pub poll_multiplier: Option<f64>,
    pub poll_max_delay_ms: Option<u64>,
    pub poll_max_wait_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CalculatorConfig {
    /// Base URL of an external calculator. The in-process one is used when unset.
    pub url: Option<String>,
    pub timeout_sec: Option<u64>,
    pub batch_refresh_interval_hours: Option<u64>,
    pub batch_refresh_limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct HttpCacheConfig {
    pub max_age_sec: Option<u64>,
    pub stale_while_revalidate_sec: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
