use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PriceRange;
use crate::error::{AppError, AppResult};

pub const DEFAULT_MAX_PER_SECTION: usize = 6;
pub const MAX_PER_SECTION_LIMIT: usize = 20;
pub const DEFAULT_ADVENTURE_LEVEL: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Tier for a number of independent matching signals
    pub fn from_signals(signals: usize) -> Self {
        match signals {
            0 | 1 => Confidence::Low,
            2 => Confidence::Medium,
            _ => Confidence::High,
        }
    }
}

/// Result of scoring one candidate against one profile. Never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatibilityResult {
    pub score: u8,
    pub confidence: Confidence,
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    PerfectMatches,
    Trending,
    Adventurous,
    Seasonal,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::PerfectMatches => "perfect_matches",
            SectionKind::Trending => "trending",
            SectionKind::Adventurous => "adventurous",
            SectionKind::Seasonal => "seasonal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradationState {
    Normal,
    Degraded,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    ColdStart,
    Personalized,
    Fallback,
}

/// Raw query parameters; parsed leniently into [`RecommendationOptions`]
#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    pub max_per_section: Option<String>,
    pub explanations: Option<String>,
    pub adventure: Option<String>,
    pub price_min: Option<String>,
    pub price_max: Option<String>,
}

/// Composition options after clamping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationOptions {
    pub max_per_section: usize,
    pub adventure_level: f64,
    pub price_range: PriceRange,
    pub include_explanations: bool,
}

impl Default for RecommendationOptions {
    fn default() -> Self {
        Self {
            max_per_section: DEFAULT_MAX_PER_SECTION,
            adventure_level: DEFAULT_ADVENTURE_LEVEL,
            price_range: PriceRange::default(),
            include_explanations: false,
        }
    }
}

impl RecommendationOptions {
    /// Builds options from caller input. Out-of-range values are clamped;
    /// only values that cannot be parsed at all are rejected.
    pub fn from_query(query: &RecommendationQuery) -> AppResult<Self> {
        let defaults = Self::default();

        let max_per_section = match &query.max_per_section {
            Some(raw) => {
                // "20.0" and "7.5" are accepted and rounded
                let value = parse_finite("max_per_section", raw)?;
                value.round().clamp(1.0, MAX_PER_SECTION_LIMIT as f64) as usize
            }
            None => defaults.max_per_section,
        };

        let adventure_level = match &query.adventure {
            Some(raw) => parse_finite("adventure", raw)?.clamp(0.0, 1.0),
            None => defaults.adventure_level,
        };

        let include_explanations = match &query.explanations {
            Some(raw) => parse_bool("explanations", raw)?,
            None => defaults.include_explanations,
        };

        let mut min = match &query.price_min {
            Some(raw) => parse_finite("price_min", raw)?.max(0.0),
            None => defaults.price_range.min,
        };
        let mut max = match &query.price_max {
            Some(raw) => parse_finite("price_max", raw)?.max(0.0),
            None => defaults.price_range.max,
        };
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }

        Ok(Self {
            max_per_section,
            adventure_level,
            price_range: PriceRange { min, max },
            include_explanations,
        })
    }

    /// Result count for the adventurous section
    pub fn adventurous_limit(&self) -> usize {
        ((self.max_per_section as f64 * self.adventure_level).round() as usize).max(2)
    }
}

fn parse_field<T: std::str::FromStr>(name: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| AppError::Validation(format!("{} is not a valid number: {:?}", name, raw)))
}

fn parse_finite(name: &str, raw: &str) -> AppResult<f64> {
    let value: f64 = parse_field(name, raw)?;
    if !value.is_finite() {
        return Err(AppError::Validation(format!("{} must be finite", name)));
    }
    Ok(value)
}

fn parse_bool(name: &str, raw: &str) -> AppResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(AppError::Validation(format!(
            "{} must be a boolean: {:?}",
            name, raw
        ))),
    }
}

/// Fields every section entry carries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseEntry {
    pub fragrance_id: String,
    pub name: String,
    pub brand: String,
    pub scent_family: String,
    pub match_percentage: u8,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerfectMatchEntry {
    #[serde(flatten)]
    pub base: BaseEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingEntry {
    #[serde(flatten)]
    pub base: BaseEntry,
    pub trend_score: u8,
    pub social_proof: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdventurousEntry {
    #[serde(flatten)]
    pub base: BaseEntry,
    pub novelty_score: u8,
    pub exploration_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalEntry {
    #[serde(flatten)]
    pub base: BaseEntry,
    pub season_relevance: u8,
    pub weather_context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationMetadata {
    pub generated_at: DateTime<Utc>,
    pub recommendation_type: RecommendationType,
    pub options_echo: RecommendationOptions,
    pub degradation: DegradationState,
}

/// Payload returned to callers of the composer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResponse {
    pub cold_start: bool,
    pub perfect_matches: Vec<PerfectMatchEntry>,
    pub trending: Vec<TrendingEntry>,
    pub adventurous: Vec<AdventurousEntry>,
    pub seasonal: Vec<SeasonalEntry>,
    pub metadata: RecommendationMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_degraded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecommendationResponse {
    pub fn degradation(&self) -> DegradationState {
        self.metadata.degradation
    }
}
