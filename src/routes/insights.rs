use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{
    cache::CachePerformance,
    error::AppResult,
    models::InsightPayload,
    services::insights::InsightKind,
};

#[derive(Debug, Deserialize)]
pub struct InsightsQuery {
    kind: Option<String>,
    #[serde(default)]
    refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    pub insights: InsightPayload,
    pub cached: bool,
    pub performance: CachePerformance,
}

/// Handler for collection insights; `refresh=true` bypasses the cache
pub async fn insights(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    Query(params): Query<InsightsQuery>,
) -> AppResult<Json<InsightsResponse>> {
    let kind = match params.kind.as_deref() {
        Some(raw) => InsightKind::parse(raw)?,
        None => InsightKind::Comprehensive,
    };

    let result = state
        .insights
        .insight(&subject_id, kind, params.refresh)
        .await?;

    Ok(Json(InsightsResponse {
        insights: result.value,
        cached: result.cached,
        performance: result.performance,
    }))
}
