#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use scentmatch_engine::{
    cache::{AnalyticsCache, CacheSettings, ManualClock, MemoryCacheBackend},
    error::{AppError, AppResult},
    models::{
        CandidateItem, CatalogFilters, InteractionKind, InteractionRecord, PopularityOrder,
        ScoredCandidate, Season,
    },
    services::{
        composer::{ComposerSettings, RecommendationComposer},
        insights::InsightsService,
        providers::{CatalogStore, HistoryStore, MlScorer},
    },
};

pub fn item(id: &str, family: &str, popularity: f64, seasons: &[Season]) -> CandidateItem {
    CandidateItem {
        fragrance_id: id.to_string(),
        name: format!("Fragrance {}", id),
        brand: "Maison Test".to_string(),
        family: family.to_string(),
        accords: vec!["bergamot".to_string(), "cedar".to_string(), "musk".to_string()],
        seasons: seasons.to_vec(),
        rating: 4.3,
        rating_count: 850,
        popularity,
        price: Some(20.0 + popularity / 10.0),
        available: true,
    }
}

/// A small catalog spanning every family group and season
pub fn sample_catalog() -> Vec<CandidateItem> {
    vec![
        item("c-citrus-1", "citrus", 98.0, &[Season::Summer, Season::Spring]),
        item("c-floral-1", "floral", 96.0, &[Season::Spring]),
        item("c-amber-1", "amber", 94.0, &[Season::Winter]),
        item("c-woody-1", "woody", 92.0, &[Season::Fall, Season::Winter]),
        item("c-aquatic-1", "aquatic", 90.0, &[Season::Summer]),
        item("c-rose-1", "rose", 88.0, &[Season::Spring]),
        item("c-spicy-1", "spicy", 86.0, &[Season::Fall]),
        item("c-leather-1", "leather", 84.0, &[Season::Winter]),
        item("c-green-1", "green", 60.0, &[Season::Spring]),
        item("c-gourmand-1", "gourmand", 40.0, &[Season::Winter]),
        item("c-chypre-1", "chypre", 20.0, &[Season::Fall]),
    ]
}

pub fn record(id: &str, family: &str, accords: &[&str], rating: f64) -> InteractionRecord {
    InteractionRecord {
        fragrance_id: id.to_string(),
        kind: InteractionKind::Owned,
        rating: Some(rating),
        notes: None,
        occasions: vec!["evening".to_string()],
        seasons: vec![Season::Winter],
        family: family.to_string(),
        accords: accords.iter().map(|a| a.to_string()).collect(),
        added_at: Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap(),
    }
}

pub fn sample_history(n: usize) -> Vec<InteractionRecord> {
    (0..n)
        .map(|i| record(&format!("h{}", i), "woody", &["cedar", "vanilla"], 5.0))
        .collect()
}

#[derive(Default)]
pub struct FakeCatalog {
    pub items: Vec<CandidateItem>,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn with_items(items: Vec<CandidateItem>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn slow(items: Vec<CandidateItem>, delay: Duration) -> Self {
        Self {
            items,
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn filtered(&self, filters: &CatalogFilters) -> AppResult<Vec<CandidateItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::DependencyUnavailable("catalog offline".to_string()));
        }
        Ok(self
            .items
            .iter()
            .filter(|i| filters.matches(i))
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl CatalogStore for FakeCatalog {
    async fn query_by_popularity(
        &self,
        filters: &CatalogFilters,
        limit: usize,
        order: PopularityOrder,
    ) -> AppResult<Vec<CandidateItem>> {
        self.wait().await;
        let mut items = self.filtered(filters)?;
        items.sort_by(|a, b| {
            let by_popularity = match order {
                PopularityOrder::MostPopular => b.popularity.total_cmp(&a.popularity),
                PopularityOrder::LeastPopular => a.popularity.total_cmp(&b.popularity),
            };
            by_popularity.then_with(|| a.fragrance_id.cmp(&b.fragrance_id))
        });
        items.truncate(limit);
        Ok(items)
    }

    async fn query_by_seasonal_tag(
        &self,
        season: Season,
        filters: &CatalogFilters,
        limit: usize,
    ) -> AppResult<Vec<CandidateItem>> {
        self.wait().await;
        let mut items: Vec<CandidateItem> = self
            .filtered(filters)?
            .into_iter()
            .filter(|i| i.seasons.contains(&season))
            .collect();
        items.sort_by(|a, b| b.popularity.total_cmp(&a.popularity));
        items.truncate(limit);
        Ok(items)
    }
}

#[derive(Default)]
pub struct FakeHistory {
    pub records: Mutex<HashMap<String, Vec<InteractionRecord>>>,
    pub fail: bool,
    /// Applied to full history reads only; counts stay fast
    pub delay: Option<Duration>,
}

impl FakeHistory {
    pub fn with(subject_id: &str, records: Vec<InteractionRecord>) -> Self {
        let history = Self::default();
        history.set(subject_id, records);
        history
    }

    pub fn set(&self, subject_id: &str, records: Vec<InteractionRecord>) {
        self.records
            .lock()
            .unwrap()
            .insert(subject_id.to_string(), records);
    }

    fn snapshot(&self, subject_id: &str) -> AppResult<Vec<InteractionRecord>> {
        if self.fail {
            return Err(AppError::DependencyUnavailable("history offline".to_string()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(subject_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl HistoryStore for FakeHistory {
    async fn interaction_count(&self, subject_id: &str) -> AppResult<usize> {
        Ok(self.snapshot(subject_id)?.len())
    }

    async fn interaction_history(&self, subject_id: &str) -> AppResult<Vec<InteractionRecord>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.snapshot(subject_id)
    }
}

pub enum MlMode {
    Ok(Vec<ScoredCandidate>),
    Fail,
    Slow(Duration),
}

pub struct FakeMl {
    pub mode: MlMode,
    pub calls: AtomicUsize,
}

impl FakeMl {
    pub fn new(mode: MlMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MlScorer for FakeMl {
    async fn personalized_candidates(
        &self,
        _subject_id: &str,
        limit: usize,
        _exclude_owned: bool,
    ) -> AppResult<Vec<ScoredCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            MlMode::Ok(candidates) => Ok(candidates.iter().take(limit).cloned().collect()),
            MlMode::Fail => Err(AppError::DependencyUnavailable("ml offline".to_string())),
            MlMode::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(vec![])
            }
        }
    }
}

pub fn scored(id: &str, family: &str, score: f64) -> ScoredCandidate {
    ScoredCandidate {
        item: item(id, family, 50.0, &[Season::Winter]),
        score,
        reason: Some("Similar to fragrances you rated highly".to_string()),
    }
}

/// Mid-January: winter
pub fn winter_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub history: Arc<FakeHistory>,
    pub ml: Arc<FakeMl>,
    pub clock: Arc<ManualClock>,
    pub cache: AnalyticsCache,
    pub insights: InsightsService,
    pub composer: Arc<RecommendationComposer>,
}

impl Harness {
    pub fn new(catalog: FakeCatalog, history: FakeHistory, ml: FakeMl) -> Self {
        Self::with_settings(catalog, history, ml, ComposerSettings::default())
    }

    pub fn with_settings(
        catalog: FakeCatalog,
        history: FakeHistory,
        ml: FakeMl,
        settings: ComposerSettings,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let history = Arc::new(history);
        let ml = Arc::new(ml);
        let clock = Arc::new(ManualClock::new(winter_noon()));
        let cache = AnalyticsCache::new(
            Arc::new(MemoryCacheBackend::new()),
            clock.clone(),
            CacheSettings {
                refresh_threshold_ratio: 0.0,
                ..CacheSettings::default()
            },
        );
        let insights = InsightsService::new(history.clone(), cache.clone());
        let composer = Arc::new(RecommendationComposer::new(
            catalog.clone(),
            history.clone(),
            ml.clone(),
            insights.clone(),
            clock.clone(),
            settings,
        ));

        Self {
            catalog,
            history,
            ml,
            clock,
            cache,
            insights,
            composer,
        }
    }
}
