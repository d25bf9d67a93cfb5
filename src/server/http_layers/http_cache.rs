//! HTTP caching middleware

use crate::config::HttpCacheSettings;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request},
    middleware::Next,
    response::IntoResponse,
};

fn cache_control_value(settings: &HttpCacheSettings) -> String {
    format!(
        "max-age={}, stale-while-revalidate={}",
        settings.max_age_sec, settings.stale_while_revalidate_sec
    )
}

/// Marks successful GET responses as cacheable. Error responses and other
/// methods are left alone.
pub async fn http_cache(
    State(settings): State<HttpCacheSettings>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let cacheable = request.method() == Method::GET;
    let response = next.run(request).await.into_response();
    if !cacheable || !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    if let Ok(value) = HeaderValue::from_str(&cache_control_value(&settings)) {
        parts.headers.insert(header::CACHE_CONTROL, value);
    }

    axum::http::Response::from_parts(parts, body)
}
