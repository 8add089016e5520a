use serde::{Deserialize, Serialize};

use super::Season;

/// Maximum number of families kept in a profile
pub const MAX_DOMINANT_FAMILIES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityPreference {
    Simple,
    Varied,
    Complex,
}

impl ComplexityPreference {
    /// Whether a fragrance with `accord_count` accords suits this preference
    pub fn accepts(&self, accord_count: usize) -> bool {
        match self {
            ComplexityPreference::Simple => accord_count <= 3,
            ComplexityPreference::Complex => accord_count >= 6,
            ComplexityPreference::Varied => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccordPreference {
    pub accord: String,
    pub strength: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPattern {
    pub season: Season,
    pub preference_strength: f64,
}

/// Preference profile derived from a subject's interaction history.
///
/// Strengths and confidences are kept in `[0, 1]` and `dominant_families`
/// holds at most [`MAX_DOMINANT_FAMILIES`] labels, most preferred first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceProfile {
    pub dominant_families: Vec<String>,
    pub accord_preferences: Vec<AccordPreference>,
    pub seasonal_patterns: Vec<SeasonalPattern>,
    pub complexity_preference: ComplexityPreference,
}

impl PreferenceProfile {
    pub fn prefers_family(&self, family: &str) -> bool {
        self.dominant_families
            .iter()
            .any(|f| f.eq_ignore_ascii_case(family))
    }

    pub fn prefers_accord(&self, accord: &str) -> bool {
        self.accord_preferences
            .iter()
            .any(|p| p.accord.eq_ignore_ascii_case(accord))
    }

    /// Seasons whose preference strength clears `threshold`
    pub fn seasons_above(&self, threshold: f64) -> impl Iterator<Item = Season> + '_ {
        self.seasonal_patterns
            .iter()
            .filter(move |p| p.preference_strength > threshold)
            .map(|p| p.season)
    }
}
