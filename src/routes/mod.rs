use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    cache::AnalyticsCache,
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::{composer::RecommendationComposer, insights::InsightsService},
};

pub mod cache;
pub mod experiments;
pub mod history;
pub mod insights;
pub mod recommendations;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub composer: Arc<RecommendationComposer>,
    pub insights: InsightsService,
    pub cache: AnalyticsCache,
}

impl AppState {
    pub fn new(composer: RecommendationComposer, insights: InsightsService, cache: AnalyticsCache) -> Self {
        Self {
            composer: Arc::new(composer),
            insights,
            cache,
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            // request id runs first so the trace span can pick it up
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/subjects/:subject_id/recommendations",
            get(recommendations::recommend),
        )
        .route("/subjects/:subject_id/insights", get(insights::insights))
        .route(
            "/subjects/:subject_id/history-events",
            post(history::record_event),
        )
        .route("/subjects/:subject_id/cache/refresh", post(cache::refresh))
        .route("/subjects/:subject_id/cache/stats", get(cache::stats))
        .route("/experiments/compare", post(experiments::compare))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
