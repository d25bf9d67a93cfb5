use axum::extract::FromRef;

use crate::similarity::SimilarityService;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedSimilarityService = Arc<SimilarityService>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub similarity_service: GuardedSimilarityService,
    pub version: String,
}

impl ServerState {
    pub fn new(config: ServerConfig, similarity_service: GuardedSimilarityService) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            similarity_service,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl FromRef<ServerState> for GuardedSimilarityService {
    fn from_ref(input: &ServerState) -> Self {
        input.similarity_service.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
