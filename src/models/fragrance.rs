use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Calendar season, northern-hemisphere convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Fall, Season::Winter];

    /// Dec–Feb winter, Mar–May spring, Jun–Aug summer, Sep–Nov fall
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Fall,
            _ => Season::Winter,
        }
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self::from_month(now.month())
    }

    /// Parses the loose tags the catalog and history rows carry
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "spring" => Some(Season::Spring),
            "summer" => Some(Season::Summer),
            "fall" | "autumn" => Some(Season::Fall),
            "winter" => Some(Season::Winter),
            _ => None,
        }
    }

    pub fn weather_context(&self) -> &'static str {
        match self {
            Season::Spring => "Mild days and blooming gardens suit fresh florals and green notes",
            Season::Summer => "Heat and humidity favor bright citrus and airy aquatic scents",
            Season::Fall => "Cooler evenings bring out warm spices and soft woods",
            Season::Winter => "Cold air lets rich amber, resin and vanilla notes linger",
        }
    }
}

impl Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
            Season::Winter => "winter",
        };
        write!(f, "{}", label)
    }
}

/// Inclusive price window in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1000.0,
        }
    }
}

impl PriceRange {
    /// Items without a listed price are never excluded
    pub fn contains(&self, price: Option<f64>) -> bool {
        price.map_or(true, |p| p >= self.min && p <= self.max)
    }
}

/// Direction for popularity-ordered catalog queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopularityOrder {
    MostPopular,
    LeastPopular,
}

/// Filters applied to every catalog query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogFilters {
    pub price: PriceRange,
    pub available_only: bool,
    pub exclude_ids: Vec<String>,
}

impl CatalogFilters {
    pub fn in_price_range(price: PriceRange) -> Self {
        Self {
            price,
            available_only: true,
            exclude_ids: Vec::new(),
        }
    }

    pub fn matches(&self, item: &CandidateItem) -> bool {
        (!self.available_only || item.available)
            && self.price.contains(item.price)
            && !self.exclude_ids.contains(&item.fragrance_id)
    }
}

/// A catalog fragrance as seen by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub fragrance_id: String,
    pub name: String,
    pub brand: String,
    pub family: String,
    pub accords: Vec<String>,
    pub seasons: Vec<Season>,
    /// Community rating on a 0–5 scale
    pub rating: f64,
    pub rating_count: u32,
    pub popularity: f64,
    pub price: Option<f64>,
    pub available: bool,
}

/// A candidate returned by the ML scoring collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub item: CandidateItem,
    /// Model score in 0..=1
    pub score: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// The four illustrative family buckets used for cold-start diversity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyGroup {
    Fresh,
    Floral,
    Oriental,
    Woody,
}

impl FamilyGroup {
    pub const ALL: [FamilyGroup; 4] = [
        FamilyGroup::Fresh,
        FamilyGroup::Floral,
        FamilyGroup::Oriental,
        FamilyGroup::Woody,
    ];

    /// Classifies a family label by its first recognized token,
    /// so `woody_fresh` is woody and `fresh_woody` is fresh.
    pub fn classify(family: &str) -> Option<Self> {
        family
            .to_lowercase()
            .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
            .find_map(Self::from_token)
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "fresh" | "citrus" | "aquatic" | "green" | "aromatic" | "fougere" => {
                Some(FamilyGroup::Fresh)
            }
            "floral" | "rose" | "white" | "fruity" | "powdery" => Some(FamilyGroup::Floral),
            "oriental" | "amber" | "spicy" | "gourmand" | "vanilla" | "sweet" => {
                Some(FamilyGroup::Oriental)
            }
            "woody" | "wood" | "leather" | "chypre" | "earthy" | "musky" | "smoky" => {
                Some(FamilyGroup::Woody)
            }
            _ => None,
        }
    }
}
