use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    error::AppResult,
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::{
        http_cache,
        surface::{Surface, SurfacePayload, SurfaceService},
    },
};

pub mod featured;
pub mod trending;

/// Shared application state
pub struct AppState {
    pub surface_service: SurfaceService,
    pub config: Config,
}

/// Query parameters accepted by both surface endpoints
#[derive(Debug, Deserialize)]
pub struct SurfaceQuery {
    pub limit: Option<usize>,
    pub region: Option<String>,
    pub category: Option<String>,
}

/// Creates the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/featured", get(featured::featured))
        .route("/trending", get(trending::trending))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Runs one surface request end to end: clamp the limit, build (or fetch) the
/// payload, then answer conditionally against `If-None-Match`.
///
/// Validator and freshness headers go on the 304 as well as the 200, so
/// intermediaries can refresh their copies off either.
pub(crate) async fn serve_surface(
    state: &AppState,
    surface: Surface,
    params: SurfaceQuery,
    request_headers: &HeaderMap,
    now: DateTime<Utc>,
) -> AppResult<Response> {
    let limit = clamp_limit(params.limit, &state.config);

    let SurfacePayload { response, etag } = state
        .surface_service
        .build(
            surface,
            limit,
            params.region.as_deref(),
            params.category.as_deref(),
            now,
        )
        .await?;

    let period = response.meta.period.clone();
    let if_none_match = request_headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok());
    let not_modified = http_cache::if_none_match_satisfied(if_none_match, &etag);

    let mut reply = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        Json(response).into_response()
    };

    let headers = reply.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(&surface.cache_policy().cache_control()) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(&period) {
        headers.insert(surface.period_header(), value);
    }

    Ok(reply)
}

/// Missing limits fall back to the configured default; anything else is
/// clamped into `1..=max` rather than rejected.
fn clamp_limit(requested: Option<usize>, config: &Config) -> usize {
    requested
        .unwrap_or(config.featured_default_limit)
        .clamp(1, config.featured_max_limit)
}
