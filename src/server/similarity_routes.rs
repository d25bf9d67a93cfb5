use axum::{
    body::Bytes,
    extract::{Query, State},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::http_cache;
use super::state::{GuardedSimilarityService, ServerState};
use crate::calculator::CalculationOutcome;
use crate::similarity::{EnrichedSimilarArtist, RefreshMode, SimilarityError};

#[derive(Deserialize, Debug)]
struct SimilarArtistsQuery {
    pub id: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct CalculateBody {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
struct SimilarArtistsResponse {
    success: bool,
    data: Vec<EnrichedSimilarArtist>,
}

#[derive(Serialize)]
struct CalculateResponse {
    success: bool,
    completed: bool,
}

async fn similar_artists(
    service: GuardedSimilarityService,
    query: SimilarArtistsQuery,
    mode: RefreshMode,
) -> Response {
    let id = query.id.unwrap_or_default();
    match service.similar_artists(&id, mode).await {
        Ok(data) => Json(SimilarArtistsResponse {
            success: true,
            data,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_similar_artists(
    State(service): State<GuardedSimilarityService>,
    Query(query): Query<SimilarArtistsQuery>,
) -> Response {
    similar_artists(service, query, RefreshMode::IfStale).await
}

async fn post_similar_artists(
    State(service): State<GuardedSimilarityService>,
    Query(query): Query<SimilarArtistsQuery>,
) -> Response {
    similar_artists(service, query, RefreshMode::Force).await
}

async fn post_calculate(
    State(service): State<GuardedSimilarityService>,
    body: Bytes,
) -> Response {
    let body: CalculateBody = if body.iter().all(u8::is_ascii_whitespace) {
        CalculateBody::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(body) => body,
            Err(e) => {
                return SimilarityError::Validation(format!("Invalid request body: {}", e))
                    .into_response()
            }
        }
    };

    match service.calculate_batch(body.limit).await {
        Ok(outcome) => Json(CalculateResponse {
            success: true,
            completed: outcome == CalculationOutcome::Completed,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn make_similarity_routes(state: ServerState) -> Router {
    let cached_routes: Router = Router::new()
        .route(
            "/similar-artists",
            get(get_similar_artists).post(post_similar_artists),
        )
        .layer(middleware::from_fn_with_state(
            state.config.http_cache.clone(),
            http_cache,
        ))
        .with_state(state.clone());

    let admin_routes: Router = Router::new()
        .route("/similarities/calculate", post(post_calculate))
        .with_state(state);

    cached_routes.merge(admin_routes)
}
