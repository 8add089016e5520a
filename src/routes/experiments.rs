use axum::Json;
use serde::Deserialize;

use crate::{
    error::AppResult,
    services::experiments::{compare_variants, VariantComparison, VariantStats},
};

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub control: VariantStats,
    pub variant: VariantStats,
}

/// Handler for A/B variant comparison
pub async fn compare(Json(request): Json<CompareRequest>) -> AppResult<Json<VariantComparison>> {
    Ok(Json(compare_variants(request.control, request.variant)?))
}
