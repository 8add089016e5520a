use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Season;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Owned,
    Wishlist,
    Tried,
}

impl InteractionKind {
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "owned" | "saved" => InteractionKind::Owned,
            "wishlist" => InteractionKind::Wishlist,
            _ => InteractionKind::Tried,
        }
    }
}

/// One entry of a subject's collection, joined with the fragrance's catalog traits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub fragrance_id: String,
    pub kind: InteractionKind,
    /// The subject's own rating on a 1–5 scale
    pub rating: Option<f64>,
    pub notes: Option<String>,
    pub occasions: Vec<String>,
    pub seasons: Vec<Season>,
    pub family: String,
    pub accords: Vec<String>,
    pub added_at: DateTime<Utc>,
}

impl InteractionRecord {
    /// Weight of this record when deriving preferences
    pub fn weight(&self) -> f64 {
        let rating_weight = self
            .rating
            .map(|r| (r / 5.0).clamp(0.0, 1.0))
            .unwrap_or(0.6);
        let kind_weight = match self.kind {
            InteractionKind::Owned => 1.0,
            InteractionKind::Wishlist => 0.7,
            InteractionKind::Tried => 0.5,
        };
        rating_weight * kind_weight
    }
}

/// History-changing event that invalidates a subject's cached computations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEvent {
    Added,
    Removed,
    Rated,
}
