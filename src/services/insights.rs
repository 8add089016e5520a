//! Collection insights: derives a subject's preference profile from their
//! interaction history and serves it, plus narrower slices of the same
//! analysis, through the analytics cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    cache::{AnalyticsCache, CacheKey, CacheOptions, CachedValue},
    error::{AppError, AppResult},
    models::{
        AccordPreference, CollectionInsights, ComplexityPreference, FamilyShare, HistoryEvent,
        InsightPayload, InteractionRecord, PreferenceProfile, Season, SeasonalPattern,
        MAX_DOMINANT_FAMILIES,
    },
    services::providers::HistoryStore,
};

const MAX_ACCORD_PREFERENCES: usize = 10;
const HIGHLIGHT_SEASON_STRENGTH: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Comprehensive,
    FamilyAnalysis,
    SeasonalPatterns,
    AccordProfile,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::Comprehensive => "comprehensive",
            InsightKind::FamilyAnalysis => "family_analysis",
            InsightKind::SeasonalPatterns => "seasonal_patterns",
            InsightKind::AccordProfile => "accord_profile",
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "comprehensive" => Ok(InsightKind::Comprehensive),
            "family_analysis" => Ok(InsightKind::FamilyAnalysis),
            "seasonal_patterns" => Ok(InsightKind::SeasonalPatterns),
            "accord_profile" => Ok(InsightKind::AccordProfile),
            other => Err(AppError::Validation(format!("Unknown insight kind: {}", other))),
        }
    }
}

/// TTL policy per computation kind; narrower insights go stale sooner
pub fn calculate_ttl(kind: InsightKind) -> Duration {
    match kind {
        InsightKind::Comprehensive => Duration::from_secs(30 * 60),
        InsightKind::FamilyAnalysis => Duration::from_secs(15 * 60),
        InsightKind::SeasonalPatterns => Duration::from_secs(20 * 60),
        InsightKind::AccordProfile => Duration::from_secs(15 * 60),
    }
}

/// Generates collection insights through the analytics cache
#[derive(Clone)]
pub struct InsightsService {
    history: Arc<dyn HistoryStore>,
    cache: AnalyticsCache,
}

impl InsightsService {
    pub fn new(history: Arc<dyn HistoryStore>, cache: AnalyticsCache) -> Self {
        Self { history, cache }
    }

    pub async fn comprehensive(
        &self,
        subject_id: &str,
        force_refresh: bool,
    ) -> AppResult<CachedValue<CollectionInsights>> {
        let key = CacheKey::new(subject_id, InsightKind::Comprehensive.as_str());
        let opts = CacheOptions::with_ttl(calculate_ttl(InsightKind::Comprehensive))
            .force_refresh(force_refresh);

        let history = self.history.clone();
        let clock = self.cache.clock();
        let subject = subject_id.to_string();

        self.cache
            .get_or_generate(
                &key,
                move || async move {
                    let records = history.interaction_history(&subject).await?;
                    analyze_collection(&subject, &records, clock.now())
                },
                opts,
            )
            .await
    }

    /// Serves one insight kind, each cached under its own key and TTL
    pub async fn insight(
        &self,
        subject_id: &str,
        kind: InsightKind,
        force_refresh: bool,
    ) -> AppResult<CachedValue<InsightPayload>> {
        if kind == InsightKind::Comprehensive {
            let insights = self.comprehensive(subject_id, force_refresh).await?;
            return Ok(CachedValue {
                value: InsightPayload::Comprehensive(insights.value),
                cached: insights.cached,
                performance: insights.performance,
            });
        }

        let key = CacheKey::new(subject_id, kind.as_str());
        let opts = CacheOptions::with_ttl(calculate_ttl(kind)).force_refresh(force_refresh);

        let history = self.history.clone();
        let clock = self.cache.clock();
        let subject = subject_id.to_string();

        self.cache
            .get_or_generate(
                &key,
                move || async move {
                    let records = history.interaction_history(&subject).await?;
                    let insights = analyze_collection(&subject, &records, clock.now())?;
                    Ok(narrow(insights, kind))
                },
                opts,
            )
            .await
    }

    /// The subject's preference profile, the input to compatibility scoring
    pub async fn preference_profile(&self, subject_id: &str) -> AppResult<PreferenceProfile> {
        Ok(self.comprehensive(subject_id, false).await?.value.profile)
    }

    /// Drops cached computations after the subject's history changed
    pub async fn record_history_event(
        &self,
        subject_id: &str,
        event: HistoryEvent,
    ) -> AppResult<usize> {
        tracing::info!(subject_id = %subject_id, event = ?event, "History changed, invalidating insights");
        self.cache.clear_user_cache(subject_id).await
    }
}

fn narrow(insights: CollectionInsights, kind: InsightKind) -> InsightPayload {
    match kind {
        InsightKind::Comprehensive => InsightPayload::Comprehensive(insights),
        InsightKind::FamilyAnalysis => InsightPayload::FamilyAnalysis {
            dominant_families: insights.profile.dominant_families,
            family_distribution: insights.family_distribution,
        },
        InsightKind::SeasonalPatterns => InsightPayload::SeasonalPatterns {
            seasonal_patterns: insights.profile.seasonal_patterns,
        },
        InsightKind::AccordProfile => InsightPayload::AccordProfile {
            accord_preferences: insights.profile.accord_preferences,
        },
    }
}

/// Full analysis of one subject's collection
pub fn analyze_collection(
    subject_id: &str,
    history: &[InteractionRecord],
    now: DateTime<Utc>,
) -> AppResult<CollectionInsights> {
    if history.is_empty() {
        return Err(AppError::NotFound(format!(
            "Not enough collection data to analyze preferences for {}",
            subject_id
        )));
    }

    let profile = build_profile(history);
    let family_distribution = family_distribution(history);

    let ratings: Vec<f64> = history.iter().filter_map(|r| r.rating).collect();
    let average_rating = if ratings.is_empty() {
        None
    } else {
        Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
    };

    let highlights = highlights(&profile, &family_distribution, history.len());

    Ok(CollectionInsights {
        subject_id: subject_id.to_string(),
        profile,
        total_items: history.len(),
        family_distribution,
        average_rating,
        highlights,
        analyzed_at: now,
    })
}

/// Derives a preference profile. Each record contributes its [`InteractionRecord::weight`].
pub fn build_profile(history: &[InteractionRecord]) -> PreferenceProfile {
    let total_weight: f64 = history.iter().map(InteractionRecord::weight).sum();

    let mut family_weights: BTreeMap<String, f64> = BTreeMap::new();
    for record in history {
        *family_weights
            .entry(record.family.to_lowercase())
            .or_default() += record.weight();
    }
    let dominant_families = ranked(family_weights)
        .into_iter()
        .take(MAX_DOMINANT_FAMILIES)
        .map(|(family, _)| family)
        .collect();

    PreferenceProfile {
        dominant_families,
        accord_preferences: accord_preferences(history),
        seasonal_patterns: seasonal_patterns(history, total_weight),
        complexity_preference: complexity_preference(history),
    }
}

fn accord_preferences(history: &[InteractionRecord]) -> Vec<AccordPreference> {
    // accord -> (weight, number of records containing it)
    let mut stats: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for record in history {
        let distinct: HashSet<String> = record.accords.iter().map(|a| a.to_lowercase()).collect();
        for accord in distinct {
            let entry = stats.entry(accord).or_default();
            entry.0 += record.weight();
            entry.1 += 1;
        }
    }

    let max_weight = stats.values().map(|(w, _)| *w).fold(0.0, f64::max);
    let records = history.len().max(1) as f64;

    let weights: BTreeMap<String, f64> = stats.iter().map(|(a, (w, _))| (a.clone(), *w)).collect();
    ranked(weights)
        .into_iter()
        .take(MAX_ACCORD_PREFERENCES)
        .map(|(accord, weight)| {
            let occurrences = stats.get(&accord).map_or(0, |(_, n)| *n);
            AccordPreference {
                strength: ratio(weight, max_weight),
                confidence: (occurrences as f64 / records).clamp(0.0, 1.0),
                accord,
            }
        })
        .collect()
}

fn seasonal_patterns(history: &[InteractionRecord], total_weight: f64) -> Vec<SeasonalPattern> {
    let mut patterns: Vec<SeasonalPattern> = Season::ALL
        .iter()
        .map(|season| {
            let weight: f64 = history
                .iter()
                .filter(|r| r.seasons.contains(season))
                .map(InteractionRecord::weight)
                .sum();
            SeasonalPattern {
                season: *season,
                preference_strength: ratio(weight, total_weight),
            }
        })
        .filter(|p| p.preference_strength > 0.0)
        .collect();

    patterns.sort_by(|a, b| {
        b.preference_strength
            .total_cmp(&a.preference_strength)
            .then_with(|| a.season.cmp(&b.season))
    });
    patterns
}

fn complexity_preference(history: &[InteractionRecord]) -> ComplexityPreference {
    let total_accords: usize = history.iter().map(|r| r.accords.len()).sum();
    let average = total_accords as f64 / history.len().max(1) as f64;

    if average <= 3.0 {
        ComplexityPreference::Simple
    } else if average >= 6.0 {
        ComplexityPreference::Complex
    } else {
        ComplexityPreference::Varied
    }
}

fn family_distribution(history: &[InteractionRecord]) -> Vec<FamilyShare> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in history {
        *counts.entry(record.family.to_lowercase()).or_default() += 1;
    }

    let total = history.len() as f64;
    let mut shares: Vec<FamilyShare> = counts
        .into_iter()
        .map(|(family, count)| FamilyShare {
            family,
            count,
            percentage: (count as f64 / total * 1000.0).round() / 10.0,
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.family.cmp(&b.family)));
    shares
}

fn highlights(
    profile: &PreferenceProfile,
    distribution: &[FamilyShare],
    total_items: usize,
) -> Vec<String> {
    let mut highlights = Vec::new();

    if let Some(top) = distribution.first() {
        highlights.push(format!(
            "Your collection leans {} ({}% of {} fragrances)",
            top.family, top.percentage, total_items
        ));
    }
    if let Some(accord) = profile.accord_preferences.first() {
        highlights.push(format!("{} shows up across your favorites", accord.accord));
    }
    if let Some(season) = profile
        .seasonal_patterns
        .first()
        .filter(|p| p.preference_strength > HIGHLIGHT_SEASON_STRENGTH)
    {
        highlights.push(format!(
            "You reach for your collection most in {}",
            season.season
        ));
    }
    highlights.push(
        match profile.complexity_preference {
            ComplexityPreference::Simple => "You prefer clean, focused compositions",
            ComplexityPreference::Varied => "Your taste spans simple and layered compositions",
            ComplexityPreference::Complex => "You enjoy rich, layered compositions",
        }
        .to_string(),
    );

    highlights
}

/// Sorts by weight descending, then label ascending
fn ranked(weights: BTreeMap<String, f64>) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = weights.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        0.0
    } else {
        (part / whole).clamp(0.0, 1.0)
    }
}
