use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccordPreference, PreferenceProfile, SeasonalPattern};

/// Share of a subject's collection that belongs to one family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyShare {
    pub family: String,
    pub count: usize,
    pub percentage: f64,
}

/// Full analysis of a subject's collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInsights {
    pub subject_id: String,
    pub profile: PreferenceProfile,
    pub total_items: usize,
    pub family_distribution: Vec<FamilyShare>,
    pub average_rating: Option<f64>,
    pub highlights: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// Payload served for one insight kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightPayload {
    Comprehensive(CollectionInsights),
    FamilyAnalysis {
        dominant_families: Vec<String>,
        family_distribution: Vec<FamilyShare>,
    },
    SeasonalPatterns {
        seasonal_patterns: Vec<SeasonalPattern>,
    },
    AccordProfile {
        accord_preferences: Vec<AccordPreference>,
    },
}
