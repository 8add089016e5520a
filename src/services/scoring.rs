use crate::models::{CandidateItem, CompatibilityResult, Confidence, PreferenceProfile};

const BASE_SCORE: u32 = 50;
const FAMILY_BONUS: u32 = 20;
const ACCORD_BONUS: u32 = 5;
const SEASON_BONUS: u32 = 10;
const RATING_BONUS: u32 = 10;
const COMPLEXITY_BONUS: u32 = 5;

/// Seasonal patterns at or below this strength are ignored
const SEASON_STRENGTH_THRESHOLD: f64 = 0.3;
const HIGH_RATING: f64 = 4.0;

/// Scores how well `candidate` fits `profile`.
///
/// Additive from a base of 50 and capped at 100. Family, accord overlap,
/// seasonal overlap and community rating each count as one confidence signal;
/// the complexity match adds points but no signal.
pub fn score(candidate: &CandidateItem, profile: &PreferenceProfile) -> CompatibilityResult {
    let mut total = BASE_SCORE;
    let mut signals = 0;
    let mut reasoning = Vec::new();

    if profile.prefers_family(&candidate.family) {
        total += FAMILY_BONUS;
        signals += 1;
        reasoning.push(format!(
            "Matches your preference for {} fragrances",
            candidate.family
        ));
    }

    let shared_accords: Vec<&str> = candidate
        .accords
        .iter()
        .filter(|accord| profile.prefers_accord(accord))
        .map(String::as_str)
        .collect();
    if !shared_accords.is_empty() {
        total += ACCORD_BONUS * shared_accords.len() as u32;
        signals += 1;
        reasoning.push(format!("Shares notes you love: {}", shared_accords.join(", ")));
    }

    let shared_season = profile
        .seasons_above(SEASON_STRENGTH_THRESHOLD)
        .find(|season| candidate.seasons.contains(season));
    if let Some(season) = shared_season {
        total += SEASON_BONUS;
        signals += 1;
        reasoning.push(format!("Suits your {} wearing habits", season));
    }

    if candidate.rating >= HIGH_RATING {
        total += RATING_BONUS;
        signals += 1;
        reasoning.push(format!(
            "Highly rated by the community ({:.1}/5)",
            candidate.rating
        ));
    }

    if profile
        .complexity_preference
        .accepts(candidate.accords.len())
    {
        total += COMPLEXITY_BONUS;
    }

    CompatibilityResult {
        score: total.min(100) as u8,
        confidence: Confidence::from_signals(signals),
        reasoning,
    }
}
