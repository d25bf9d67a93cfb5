mod file_config;

pub use file_config::{CalculatorConfig, FileConfig, HttpCacheConfig, SimilarityConfig};

use crate::server::RequestsLoggingLevel;
use crate::similarity::{CompletionPolicy, LookupSettings, SimilarityServiceOptions};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub calculator_url: Option<String>,
    pub calculator_timeout_sec: u64,
    pub staleness_days: u64,
    pub batch_refresh_interval_hours: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_path: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Feature configs (with defaults)
    pub similarity: SimilaritySettings,
    pub calculator: CalculatorSettings,
    pub http_cache: HttpCacheSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        // The database file may be created, its directory must exist
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }
        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        // Similarity settings - merge file config with CLI and defaults
        let defaults = SimilaritySettings::default();
        let sim_file = file.similarity.unwrap_or_default();
        let similarity = SimilaritySettings {
            staleness_days: sim_file.staleness_days.unwrap_or(if cli.staleness_days > 0 {
                cli.staleness_days
            } else {
                defaults.staleness_days
            }),
            match_threshold: sim_file.match_threshold.unwrap_or(defaults.match_threshold),
            match_count: sim_file.match_count.unwrap_or(defaults.match_count),
            poll_initial_delay_ms: sim_file
                .poll_initial_delay_ms
                .unwrap_or(defaults.poll_initial_delay_ms),
            poll_multiplier: sim_file.poll_multiplier.unwrap_or(defaults.poll_multiplier),
            poll_max_delay_ms: sim_file
                .poll_max_delay_ms
                .unwrap_or(defaults.poll_max_delay_ms),
            poll_max_wait_secs: sim_file
                .poll_max_wait_secs
                .unwrap_or(defaults.poll_max_wait_secs),
        };
        similarity.validate()?;

        let calc_defaults = CalculatorSettings::default();
        let calc_file = file.calculator.unwrap_or_default();
        let calculator = CalculatorSettings {
            url: calc_file.url.or_else(|| cli.calculator_url.clone()),
            timeout_sec: calc_file.timeout_sec.unwrap_or(if cli.calculator_timeout_sec > 0 {
                cli.calculator_timeout_sec
            } else {
                calc_defaults.timeout_sec
            }),
            batch_refresh_interval_hours: calc_file
                .batch_refresh_interval_hours
                .unwrap_or(cli.batch_refresh_interval_hours),
            batch_refresh_limit: calc_file
                .batch_refresh_limit
                .unwrap_or(calc_defaults.batch_refresh_limit),
        };
        if calculator.batch_refresh_limit == 0 {
            bail!("calculator.batch_refresh_limit must be greater than 0");
        }

        let cache_defaults = HttpCacheSettings::default();
        let cache_file = file.http_cache.unwrap_or_default();
        let http_cache = HttpCacheSettings {
            max_age_sec: cache_file.max_age_sec.unwrap_or(cache_defaults.max_age_sec),
            stale_while_revalidate_sec: cache_file
                .stale_while_revalidate_sec
                .unwrap_or(cache_defaults.stale_while_revalidate_sec),
        };

        Ok(Self {
            db_path,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            similarity,
            calculator,
            http_cache,
        })
    }

    /// Pipeline options derived from the similarity and calculator settings.
    pub fn service_options(&self) -> SimilarityServiceOptions {
        SimilarityServiceOptions {
            staleness: chrono::Duration::days(self.similarity.staleness_days as i64),
            lookup: self.similarity.lookup_settings(),
            completion: self.similarity.completion_policy(),
            default_batch_limit: self.calculator.batch_refresh_limit,
        }
    }
}

/// Upper bound of `similarity.staleness_days`, about a century.
const MAX_STALENESS_DAYS: u64 = 36_500;

#[derive(Debug, Clone)]
pub struct SimilaritySettings {
    pub staleness_days: u64,
    pub match_threshold: f64,
    pub match_count: usize,
    pub poll_initial_delay_ms: u64,
    pub poll_multiplier: f64,
    pub poll_max_delay_ms: u64,
    pub poll_max_wait_secs: u64,
}

impl SimilaritySettings {
    fn validate(&self) -> Result<()> {
        if self.staleness_days == 0 {
            bail!("similarity.staleness_days must be greater than 0");
        }
        if self.staleness_days > MAX_STALENESS_DAYS {
            bail!(
                "similarity.staleness_days must be at most {}, got {}",
                MAX_STALENESS_DAYS,
                self.staleness_days
            );
        }
        if !(0.0..=1.0).contains(&self.match_threshold) {
            bail!(
                "similarity.match_threshold must be within [0, 1], got {}",
                self.match_threshold
            );
        }
        if self.match_count == 0 {
            bail!("similarity.match_count must be greater than 0");
        }
        if self.poll_initial_delay_ms == 0 {
            bail!("similarity.poll_initial_delay_ms must be greater than 0");
        }
        if self.poll_multiplier < 1.0 {
            bail!(
                "similarity.poll_multiplier must be at least 1.0, got {}",
                self.poll_multiplier
            );
        }
        if self.poll_max_delay_ms < self.poll_initial_delay_ms {
            bail!("similarity.poll_max_delay_ms must not be lower than poll_initial_delay_ms");
        }
        Ok(())
    }

    pub fn lookup_settings(&self) -> LookupSettings {
        LookupSettings {
            match_threshold: self.match_threshold,
            match_count: self.match_count,
        }
    }

    pub fn completion_policy(&self) -> CompletionPolicy {
        CompletionPolicy {
            initial_delay: Duration::from_millis(self.poll_initial_delay_ms),
            multiplier: self.poll_multiplier,
            max_delay: Duration::from_millis(self.poll_max_delay_ms),
            max_wait: Duration::from_secs(self.poll_max_wait_secs),
        }
    }
}

impl Default for SimilaritySettings {
    fn default() -> Self {
        Self {
            staleness_days: 7,
            match_threshold: 0.7,
            match_count: 10,
            poll_initial_delay_ms: 250,
            poll_multiplier: 2.0,
            poll_max_delay_ms: 5000,
            poll_max_wait_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalculatorSettings {
    pub url: Option<String>,
    pub timeout_sec: u64,
    /// 0 disables the periodic batch refresh.
    pub batch_refresh_interval_hours: u64,
    pub batch_refresh_limit: usize,
}

impl Default for CalculatorSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_sec: 120,
            batch_refresh_interval_hours: 0,
            batch_refresh_limit: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpCacheSettings {
    pub max_age_sec: u64,
    pub stale_while_revalidate_sec: u64,
}

impl Default for HttpCacheSettings {
    fn default() -> Self {
        Self {
            max_age_sec: 86400,
            stale_while_revalidate_sec: 3600,
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
