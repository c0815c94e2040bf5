//! Renderer-facing HTTP surface
//!
//! Serves the aggregated windows as JSON: ordered rows per domain, the latest
//! sample for cards, the field schema for chart legends, and the last weather
//! report. The dashboard front-end consumes these instead of subscribing to
//! the raw feed itself.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::aggregator::FeedAggregator;
use crate::error::{FeedError, Result};
use crate::forecast::ForecastService;
use crate::schema::Domain;

/// Shared state for the HTTP surface
#[derive(Clone)]
pub struct AppState {
    /// One aggregator per served domain
    pub feeds: Arc<HashMap<Domain, FeedAggregator>>,

    /// Forecast poller
    pub forecast: ForecastService,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/feeds/:domain", get(get_feed))
        .route("/feeds/:domain/latest", get(get_feed_latest))
        .route("/feeds/:domain/schema", get(get_feed_schema))
        .route("/forecast", get(get_forecast))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the router until the future is dropped or the listener fails
pub async fn serve(bind: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("HTTP surface listening on {bind}");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| FeedError::connection(format!("HTTP server failed: {e}")))?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

fn lookup<'a>(state: &'a AppState, domain: &str) -> std::result::Result<&'a FeedAggregator, Response> {
    let domain: Domain = domain
        .parse()
        .map_err(|_| (StatusCode::NOT_FOUND, "unknown domain").into_response())?;
    state
        .feeds
        .get(&domain)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "domain not served").into_response())
}

async fn get_feed(State(state): State<AppState>, Path(domain): Path<String>) -> Response {
    match lookup(&state, &domain) {
        Ok(feed) => Json(feed.snapshot().await).into_response(),
        Err(resp) => resp,
    }
}

async fn get_feed_latest(State(state): State<AppState>, Path(domain): Path<String>) -> Response {
    match lookup(&state, &domain) {
        Ok(feed) => match feed.snapshot().await.latest {
            Some(sample) => Json(sample).into_response(),
            None => (StatusCode::NOT_FOUND, "no samples yet").into_response(),
        },
        Err(resp) => resp,
    }
}

async fn get_feed_schema(State(state): State<AppState>, Path(domain): Path<String>) -> Response {
    match lookup(&state, &domain) {
        Ok(feed) => Json(feed.schema()).into_response(),
        Err(resp) => resp,
    }
}

async fn get_forecast(State(state): State<AppState>) -> Response {
    match state.forecast.report().await {
        Some(report) => Json(report).into_response(),
        None => (StatusCode::NOT_FOUND, "no forecast yet").into_response(),
    }
}
