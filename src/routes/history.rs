use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::{error::AppResult, models::HistoryEvent};

#[derive(Debug, Deserialize)]
pub struct HistoryEventRequest {
    pub event: HistoryEvent,
    pub fragrance_id: Option<String>,
}

/// Called by the collection service after a subject's history changed
pub async fn record_event(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    Json(request): Json<HistoryEventRequest>,
) -> AppResult<Json<Value>> {
    tracing::debug!(
        subject_id = %subject_id,
        fragrance_id = ?request.fragrance_id,
        "History event received"
    );
    let invalidated = state
        .insights
        .record_history_event(&subject_id, request.event)
        .await?;
    Ok(Json(json!({ "invalidated_entries": invalidated })))
}
