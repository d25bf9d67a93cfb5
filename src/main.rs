use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use artist_similarity_server::calculator::{
    HttpSimilarityCalculator, LocalSimilarityCalculator, SimilarityCalculator,
};
use artist_similarity_server::config;
use artist_similarity_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use artist_similarity_server::similarity::SimilarityService;
use artist_similarity_server::similarity_store::{SimilarityStore, SqliteSimilarityStore};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the similarity SQLite database, created if missing.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port to expose Prometheus metrics on.
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Base URL of an external similarity calculator. When omitted
    /// similarities are computed in-process.
    #[clap(long)]
    pub calculator_url: Option<String>,

    /// Timeout of a single call to the external calculator.
    #[clap(long, default_value_t = 120)]
    pub calculator_timeout_sec: u64,

    /// Age after which stored similarities are recomputed.
    #[clap(long, default_value_t = 7)]
    pub staleness_days: u64,

    /// Interval of the periodic batch recalculation, 0 disables it.
    #[clap(long, default_value_t = 0)]
    pub batch_refresh_interval_hours: u64,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_path: args.db_path.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            calculator_url: args.calculator_url.clone(),
            calculator_timeout_sec: args.calculator_timeout_sec,
            staleness_days: args.staleness_days,
            batch_refresh_interval_hours: args.batch_refresh_interval_hours,
        }
    }
}

async fn run_batch_refresh(service: Arc<SimilarityService>, interval: Duration, limit: usize) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately, skip it
    ticker.tick().await;
    loop {
        ticker.tick().await;
        info!("Running periodic similarity batch calculation...");
        match service.calculate_batch(Some(limit)).await {
            Ok(outcome) => info!("Periodic batch calculation {}", outcome.as_str()),
            Err(e) => error!("Periodic batch calculation failed: {}", e),
        }
        if let Ok(stats) = service.stats() {
            metrics::set_store_items(stats.artists, stats.embeddings, stats.similarity_records);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_path: {:?}", app_config.db_path);
    info!("  port: {}", app_config.port);
    info!(
        "  staleness: {} days, threshold: {}, count: {}",
        app_config.similarity.staleness_days,
        app_config.similarity.match_threshold,
        app_config.similarity.match_count
    );

    if !app_config.db_path.exists() {
        info!("Creating new similarity database at {:?}", app_config.db_path);
    }
    let store: Arc<dyn SimilarityStore> = Arc::new(SqliteSimilarityStore::new(&app_config.db_path)?);

    info!("Initializing metrics...");
    metrics::init_metrics();
    let stats = store.get_stats()?;
    metrics::set_store_items(stats.artists, stats.embeddings, stats.similarity_records);

    let calculator: Arc<dyn SimilarityCalculator> = match &app_config.calculator.url {
        Some(url) => {
            info!("Using external similarity calculator at {}", url);
            Arc::new(HttpSimilarityCalculator::new(
                url.clone(),
                Duration::from_secs(app_config.calculator.timeout_sec),
            ))
        }
        None => {
            info!("Using in-process similarity calculator");
            Arc::new(LocalSimilarityCalculator::new(
                store.clone(),
                app_config.similarity.match_threshold,
                app_config.similarity.match_count,
            ))
        }
    };

    let service = Arc::new(SimilarityService::new(
        store,
        calculator,
        app_config.service_options(),
    ));

    if app_config.calculator.batch_refresh_interval_hours > 0 {
        let interval =
            Duration::from_secs(app_config.calculator.batch_refresh_interval_hours * 3600);
        info!(
            "Periodic batch calculation enabled every {} hours (limit {})",
            app_config.calculator.batch_refresh_interval_hours,
            app_config.calculator.batch_refresh_limit
        );
        tokio::spawn(run_batch_refresh(
            service.clone(),
            interval,
            app_config.calculator.batch_refresh_limit,
        ));
    }

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
        http_cache: app_config.http_cache.clone(),
    };

    info!("Ready to serve at port {}!", app_config.port);
    run_server(server_config, service).await
}
