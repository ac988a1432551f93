use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
    Extension,
};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    routes::{serve_surface, AppState, SurfaceQuery},
    services::surface::Surface,
};

/// Handler for the short-period trending businesses endpoint
pub async fn trending(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<SurfaceQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    tracing::info!(
        request_id = %request_id,
        limit = ?params.limit,
        region = ?params.region,
        category = ?params.category,
        "Processing trending request"
    );

    serve_surface(&state, Surface::Trending, params, &headers, Utc::now()).await
}
