//! Recommendation composer
//!
//! Chooses between the cold-start and personalized strategies, runs the four
//! section generators concurrently, and degrades section by section when a
//! dependency misbehaves:
//!
//! 1. `normal`: every section came from its primary source
//! 2. `degraded`: at least one section fell back to popularity data
//! 3. `unavailable`: the catalog itself failed, every section is empty

pub mod enrichment;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    cache::Clock,
    error::{AppError, AppResult, RETRY_AFTER_SECS},
    models::{
        CatalogFilters, DegradationState, FamilyGroup, PopularityOrder, PreferenceProfile,
        RecommendationMetadata, RecommendationOptions, RecommendationResponse,
        RecommendationType, Season, SectionKind,
    },
    services::{
        insights::InsightsService,
        providers::{CatalogStore, HistoryStore, MlScorer},
    },
};

use enrichment::{EnrichContext, RawCandidate};

/// Subjects with fewer recorded interactions than this get the cold-start strategy
pub const COLD_START_THRESHOLD: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct ComposerSettings {
    /// Budget for each catalog / history / ML call
    pub dependency_timeout: Duration,
    /// Budget for the whole personalized composition
    pub composition_timeout: Duration,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            dependency_timeout: Duration::from_secs(2),
            composition_timeout: Duration::from_secs(5),
        }
    }
}

pub struct RecommendationComposer {
    catalog: Arc<dyn CatalogStore>,
    history: Arc<dyn HistoryStore>,
    ml: Arc<dyn MlScorer>,
    insights: InsightsService,
    clock: Arc<dyn Clock>,
    settings: ComposerSettings,
}

impl RecommendationComposer {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        history: Arc<dyn HistoryStore>,
        ml: Arc<dyn MlScorer>,
        insights: InsightsService,
        clock: Arc<dyn Clock>,
        settings: ComposerSettings,
    ) -> Self {
        Self {
            catalog,
            history,
            ml,
            insights,
            clock,
            settings,
        }
    }

    /// Always produces a payload: failures of the whole composition are
    /// turned into the global fallback.
    pub async fn recommend(
        &self,
        subject_id: &str,
        options: RecommendationOptions,
    ) -> RecommendationResponse {
        match self.compose(subject_id, options.clone()).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    subject_id = %subject_id,
                    error = %e,
                    "Composition failed, serving global fallback"
                );
                self.global_fallback(options)
            }
        }
    }

    /// Composes all four sections. Only a catalog outage or an exhausted
    /// composition budget is returned as an error.
    pub async fn compose(
        &self,
        subject_id: &str,
        options: RecommendationOptions,
    ) -> AppResult<RecommendationResponse> {
        let history_depth = self
            .bounded("history", self.history.interaction_count(subject_id))
            .await;

        let (depth, history_failed) = match history_depth {
            Ok(depth) => (depth, false),
            Err(e) => {
                tracing::warn!(
                    subject_id = %subject_id,
                    error = %e,
                    "History unavailable, using cold-start strategy"
                );
                (0, true)
            }
        };

        if depth < COLD_START_THRESHOLD {
            tracing::info!(subject_id = %subject_id, depth, "Composing cold-start recommendations");
            return self.cold_start(options, history_failed).await;
        }

        tracing::info!(subject_id = %subject_id, depth, "Composing personalized recommendations");
        match tokio::time::timeout(
            self.settings.composition_timeout,
            self.personalized(subject_id, options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::DependencyTimeout(format!(
                "composition exceeded {:?}",
                self.settings.composition_timeout
            ))),
        }
    }

    async fn cold_start(
        &self,
        options: RecommendationOptions,
        history_failed: bool,
    ) -> AppResult<RecommendationResponse> {
        let max = options.max_per_section;
        let filters = CatalogFilters::in_price_range(options.price_range);
        let popular = self
            .bounded(
                "catalog",
                self.catalog
                    .query_by_popularity(&filters, max * 4, PopularityOrder::MostPopular),
            )
            .await?;

        let mut buckets: [Vec<RawCandidate>; 4] = Default::default();
        for item in popular {
            let Some(group) = FamilyGroup::classify(&item.family) else {
                continue;
            };
            let index = FamilyGroup::ALL
                .iter()
                .position(|g| *g == group)
                .unwrap_or_default();
            if buckets[index].len() < max {
                buckets[index].push(RawCandidate::from(item));
            }
        }

        let [fresh, floral, oriental, woody] = buckets;
        let ctx = EnrichContext {
            profile: None,
            include_explanations: options.include_explanations,
            season: Season::at(self.clock.now()),
        };

        let degradation = if history_failed {
            DegradationState::Degraded
        } else {
            DegradationState::Normal
        };

        Ok(RecommendationResponse {
            cold_start: true,
            perfect_matches: enrichment::perfect_matches(fresh, true, &ctx),
            trending: enrichment::trending(floral, &ctx),
            adventurous: enrichment::adventurous(oriental, &ctx),
            seasonal: enrichment::seasonal(woody, &ctx),
            metadata: self.metadata(RecommendationType::ColdStart, options, degradation),
            service_degraded: degraded_flag(degradation),
            message: None,
        })
    }

    async fn personalized(
        &self,
        subject_id: &str,
        options: RecommendationOptions,
    ) -> AppResult<RecommendationResponse> {
        let max = options.max_per_section;
        let filters = CatalogFilters::in_price_range(options.price_range);
        let season = Season::at(self.clock.now());

        let (perfect, trending, adventurous, seasonal, profile) = tokio::join!(
            self.perfect_match_candidates(subject_id, max, &filters),
            self.bounded(
                "catalog",
                self.catalog
                    .query_by_popularity(&filters, max, PopularityOrder::MostPopular),
            ),
            self.bounded(
                "catalog",
                self.catalog.query_by_popularity(
                    &filters,
                    options.adventurous_limit(),
                    PopularityOrder::LeastPopular,
                ),
            ),
            self.bounded(
                "catalog",
                self.catalog.query_by_seasonal_tag(season, &filters, max),
            ),
            self.profile_for_scoring(subject_id),
        );

        let (perfect, perfect_fell_back) = perfect?;
        let trending = to_raw(trending?);
        let adventurous = to_raw(adventurous?);
        let seasonal = to_raw(seasonal?);

        let ctx = EnrichContext {
            profile: profile.as_ref(),
            include_explanations: options.include_explanations,
            season,
        };

        let degradation = if perfect_fell_back {
            DegradationState::Degraded
        } else {
            DegradationState::Normal
        };

        Ok(RecommendationResponse {
            cold_start: false,
            perfect_matches: enrichment::perfect_matches(perfect, perfect_fell_back, &ctx),
            trending: enrichment::trending(trending, &ctx),
            adventurous: enrichment::adventurous(adventurous, &ctx),
            seasonal: enrichment::seasonal(seasonal, &ctx),
            metadata: self.metadata(RecommendationType::Personalized, options, degradation),
            service_degraded: degraded_flag(degradation),
            message: None,
        })
    }

    /// ML candidates, or top-popularity items when the ML service fails.
    /// The boolean reports whether the fallback was used.
    async fn perfect_match_candidates(
        &self,
        subject_id: &str,
        max: usize,
        filters: &CatalogFilters,
    ) -> AppResult<(Vec<RawCandidate>, bool)> {
        match self
            .bounded("ml", self.ml.personalized_candidates(subject_id, max, true))
            .await
        {
            Ok(scored) => {
                let candidates = scored
                    .into_iter()
                    .filter(|c| filters.matches(&c.item))
                    .take(max)
                    .map(|c| RawCandidate {
                        item: c.item,
                        ml_score: Some(c.score),
                        ml_reason: c.reason,
                    })
                    .collect();
                Ok((candidates, false))
            }
            Err(e) => {
                tracing::warn!(
                    subject_id = %subject_id,
                    section = SectionKind::PerfectMatches.as_str(),
                    error = %e,
                    "ML candidates unavailable, falling back to popular picks"
                );
                let popular = self
                    .bounded(
                        "catalog",
                        self.catalog
                            .query_by_popularity(filters, max, PopularityOrder::MostPopular),
                    )
                    .await?;
                Ok((to_raw(popular), true))
            }
        }
    }

    /// The cached preference profile, if one can be produced in time.
    /// The lookup runs as its own task: when this request stops waiting the
    /// generation still finishes under the cache's budget and warms the entry.
    async fn profile_for_scoring(&self, subject_id: &str) -> Option<PreferenceProfile> {
        let insights = self.insights.clone();
        let subject = subject_id.to_string();
        let lookup = tokio::spawn(async move { insights.preference_profile(&subject).await });

        let outcome = match tokio::time::timeout(self.settings.dependency_timeout, lookup).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(AppError::Internal(format!(
                "profile lookup task failed: {}",
                join_error
            ))),
            Err(_) => Err(AppError::DependencyTimeout(format!(
                "insights did not answer within {:?}, generation continues in the background",
                self.settings.dependency_timeout
            ))),
        };

        match outcome {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(
                    subject_id = %subject_id,
                    error = %e,
                    "Preference profile unavailable, entries will not be scored"
                );
                None
            }
        }
    }

    fn global_fallback(&self, options: RecommendationOptions) -> RecommendationResponse {
        RecommendationResponse {
            cold_start: false,
            perfect_matches: Vec::new(),
            trending: Vec::new(),
            adventurous: Vec::new(),
            seasonal: Vec::new(),
            metadata: self.metadata(
                RecommendationType::Fallback,
                options,
                DegradationState::Unavailable,
            ),
            service_degraded: Some(true),
            message: Some(format!(
                "Recommendations are temporarily unavailable. Please retry in {} seconds.",
                RETRY_AFTER_SECS
            )),
        }
    }

    fn metadata(
        &self,
        recommendation_type: RecommendationType,
        options: RecommendationOptions,
        degradation: DegradationState,
    ) -> RecommendationMetadata {
        RecommendationMetadata {
            generated_at: self.clock.now(),
            recommendation_type,
            options_echo: options,
            degradation,
        }
    }

    /// Runs one dependency call under the dependency budget
    async fn bounded<T>(
        &self,
        dependency: &'static str,
        call: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.settings.dependency_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    dependency,
                    timeout_ms = self.settings.dependency_timeout.as_millis() as u64,
                    "Dependency call timed out"
                );
                Err(AppError::DependencyTimeout(format!(
                    "{} did not answer within {:?}",
                    dependency, self.settings.dependency_timeout
                )))
            }
        }
    }
}

fn to_raw(items: Vec<crate::models::CandidateItem>) -> Vec<RawCandidate> {
    items.into_iter().map(RawCandidate::from).collect()
}

fn degraded_flag(degradation: DegradationState) -> Option<bool> {
    match degradation {
        DegradationState::Normal => None,
        DegradationState::Degraded | DegradationState::Unavailable => Some(true),
    }
}
