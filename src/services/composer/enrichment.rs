//! Turns raw section candidates into ranked, enriched entries.
//!
//! Ranking is deterministic: match percentage descending, then catalog
//! popularity descending, then the order the candidates arrived in.

use crate::{
    models::{
        AdventurousEntry, BaseEntry, CandidateItem, Confidence, PerfectMatchEntry,
        PreferenceProfile, Season, SeasonalEntry, SectionKind, TrendingEntry,
    },
    services::scoring,
};

/// A candidate before ranking, optionally carrying an ML score
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub item: CandidateItem,
    pub ml_score: Option<f64>,
    pub ml_reason: Option<String>,
}

impl From<CandidateItem> for RawCandidate {
    fn from(item: CandidateItem) -> Self {
        Self {
            item,
            ml_score: None,
            ml_reason: None,
        }
    }
}

/// Inputs shared by every section's enrichment
pub struct EnrichContext<'a> {
    pub profile: Option<&'a PreferenceProfile>,
    pub include_explanations: bool,
    pub season: Season,
}

/// Match percentage of the first-ranked candidate of each section when no
/// model score is available
fn section_base(kind: SectionKind) -> usize {
    match kind {
        SectionKind::PerfectMatches => 92,
        SectionKind::Trending => 90,
        SectionKind::Seasonal => 86,
        SectionKind::Adventurous => 78,
    }
}

/// Strictly decreasing by two points per rank; stays above zero for any
/// section size the options allow
pub fn rank_percentage(kind: SectionKind, rank: usize) -> u8 {
    section_base(kind).saturating_sub(2 * rank).max(1) as u8
}

fn ml_percentage(score: f64) -> u8 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Assigns match percentages and sorts into final ranking order
fn rank(kind: SectionKind, candidates: Vec<RawCandidate>) -> Vec<(u8, RawCandidate)> {
    let mut ranked: Vec<(u8, RawCandidate)> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let pct = c
                .ml_score
                .map(ml_percentage)
                .unwrap_or_else(|| rank_percentage(kind, i));
            (pct, c)
        })
        .collect();

    // sort_by is stable, so equal keys keep insertion order
    ranked.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| b.1.item.popularity.total_cmp(&a.1.item.popularity))
    });
    ranked
}

fn base_entry(
    kind: SectionKind,
    candidate: &RawCandidate,
    match_percentage: u8,
    position: usize,
    ctx: &EnrichContext<'_>,
    fallback_explanation: impl FnOnce() -> String,
) -> BaseEntry {
    let compatibility = ctx
        .profile
        .map(|profile| scoring::score(&candidate.item, profile));

    let explanation = if ctx.include_explanations {
        let from_profile = compatibility
            .as_ref()
            .filter(|c| !c.reasoning.is_empty())
            .map(|c| c.reasoning.join("; "));
        let from_model = match kind {
            SectionKind::PerfectMatches => candidate.ml_reason.clone(),
            _ => None,
        };
        Some(
            from_profile
                .or(from_model)
                .unwrap_or_else(fallback_explanation),
        )
    } else {
        None
    };

    BaseEntry {
        fragrance_id: candidate.item.fragrance_id.clone(),
        name: candidate.item.name.clone(),
        brand: candidate.item.brand.clone(),
        scent_family: candidate.item.family.clone(),
        match_percentage,
        confidence: compatibility.map_or(Confidence::Low, |c| c.confidence),
        explanation,
        position,
    }
}

fn max_popularity(candidates: &[(u8, RawCandidate)]) -> f64 {
    candidates
        .iter()
        .map(|(_, c)| c.item.popularity)
        .fold(0.0, f64::max)
}

fn relative_popularity(popularity: f64, max: f64) -> f64 {
    if max <= 0.0 {
        0.0
    } else {
        (popularity / max).clamp(0.0, 1.0)
    }
}

pub fn perfect_matches(
    candidates: Vec<RawCandidate>,
    from_fallback: bool,
    ctx: &EnrichContext<'_>,
) -> Vec<PerfectMatchEntry> {
    let kind = SectionKind::PerfectMatches;
    rank(kind, candidates)
        .into_iter()
        .enumerate()
        .map(|(position, (pct, c))| PerfectMatchEntry {
            base: base_entry(kind, &c, pct, position, ctx, || {
                if from_fallback {
                    format!("A crowd favorite in {}", c.item.family)
                } else {
                    "Picked for you from your collection history".to_string()
                }
            }),
        })
        .collect()
}

pub fn trending(candidates: Vec<RawCandidate>, ctx: &EnrichContext<'_>) -> Vec<TrendingEntry> {
    let kind = SectionKind::Trending;
    let ranked = rank(kind, candidates);
    let max = max_popularity(&ranked);

    ranked
        .into_iter()
        .enumerate()
        .map(|(position, (pct, c))| {
            let social_proof = format!(
                "Rated {:.1}/5 by {} people",
                c.item.rating, c.item.rating_count
            );
            TrendingEntry {
                base: base_entry(kind, &c, pct, position, ctx, || {
                    format!("Trending now. {}", social_proof)
                }),
                trend_score: (relative_popularity(c.item.popularity, max) * 100.0).round() as u8,
                social_proof,
            }
        })
        .collect()
}

pub fn adventurous(candidates: Vec<RawCandidate>, ctx: &EnrichContext<'_>) -> Vec<AdventurousEntry> {
    let kind = SectionKind::Adventurous;
    let ranked = rank(kind, candidates);
    let max = max_popularity(&ranked);

    ranked
        .into_iter()
        .enumerate()
        .map(|(position, (pct, c))| {
            let exploration_reason = exploration_reason(&c.item, ctx.profile);
            AdventurousEntry {
                base: base_entry(kind, &c, pct, position, ctx, || exploration_reason.clone()),
                novelty_score: ((1.0 - relative_popularity(c.item.popularity, max)) * 100.0)
                    .round() as u8,
                exploration_reason,
            }
        })
        .collect()
}

fn exploration_reason(item: &CandidateItem, profile: Option<&PreferenceProfile>) -> String {
    match profile.and_then(|p| p.dominant_families.first()) {
        Some(usual) if !usual.eq_ignore_ascii_case(&item.family) => format!(
            "Steps outside your usual {} picks into {}",
            usual, item.family
        ),
        Some(_) => format!("A lesser-known take on the {} scents you love", item.family),
        None => format!("A less-traveled {} pick outside the mainstream", item.family),
    }
}

pub fn seasonal(candidates: Vec<RawCandidate>, ctx: &EnrichContext<'_>) -> Vec<SeasonalEntry> {
    let kind = SectionKind::Seasonal;
    let weather_context = ctx.season.weather_context().to_string();

    rank(kind, candidates)
        .into_iter()
        .enumerate()
        .map(|(position, (pct, c))| SeasonalEntry {
            base: base_entry(kind, &c, pct, position, ctx, || weather_context.clone()),
            season_relevance: season_relevance(&c.item, ctx.season),
            weather_context: weather_context.clone(),
        })
        .collect()
}

/// 100 for a single-season fragrance, diluted across each additional season tag
fn season_relevance(item: &CandidateItem, season: Season) -> u8 {
    if !item.seasons.contains(&season) {
        return 0;
    }
    (100.0 / item.seasons.len() as f64).round() as u8
}
