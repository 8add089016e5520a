use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use super::AppState;
use crate::{cache::CacheStats, error::AppResult};

/// Account-level refresh: drops every cached computation for the subject
pub async fn refresh(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> AppResult<Json<Value>> {
    let cleared = state.cache.clear_user_cache(&subject_id).await?;
    Ok(Json(json!({ "subject_id": subject_id, "cleared_entries": cleared })))
}

pub async fn stats(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> AppResult<Json<CacheStats>> {
    Ok(Json(state.cache.get_cache_stats(&subject_id).await?))
}
