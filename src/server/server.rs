use anyhow::Result;
use std::time::Duration;

use tracing::info;

use crate::similarity::SimilarityService;
use std::sync::Arc;
use tower_http::services::ServeDir;

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::metrics::metrics_handler;
use super::similarity_routes::make_similarity_routes;
use super::{log_requests, state::*, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
    pub artists: Option<usize>,
    pub embeddings: Option<usize>,
    pub similarity_records: Option<usize>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let store_stats = state.similarity_service.stats().ok();
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: state.version.clone(),
        artists: store_stats.as_ref().map(|s| s.artists),
        embeddings: store_stats.as_ref().map(|s| s.embeddings),
        similarity_records: store_stats.as_ref().map(|s| s.similarity_records),
    };
    Json(stats)
}

pub fn make_app(config: ServerConfig, similarity_service: Arc<SimilarityService>) -> Router {
    let state = ServerState::new(config.clone(), similarity_service);

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    home_router
        .nest("/v1", make_similarity_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state, log_requests))
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_server(config: ServerConfig, similarity_service: Arc<SimilarityService>) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, similarity_service);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    let metrics_listener =
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port)).await?;
    info!("Serving similar artists on port {}", port);
    info!("Metrics available at port {}", metrics_port);

    tokio::select! {
        result = axum::serve(listener, app) => result?,
        result = axum::serve(metrics_listener, make_metrics_app()) => result?,
    }
    Ok(())
}
