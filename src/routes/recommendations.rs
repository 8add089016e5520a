use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::AppState;
use crate::{
    error::AppResult,
    models::{RecommendationOptions, RecommendationQuery, RecommendationResponse},
};

/// Handler for the recommendations endpoint.
///
/// Only unparseable options are rejected; every composition outcome,
/// including the global fallback, is a 200.
pub async fn recommend(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    let options = RecommendationOptions::from_query(&query)?;
    let response = state.composer.recommend(&subject_id, options).await;
    Ok(Json(response))
}
