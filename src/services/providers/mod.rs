/// Collaborators the engine reads from
///
/// The history store, catalog store and ML scoring service are owned by other
/// systems. Each sits behind a trait so the composer and insights generator can
/// run against Postgres / HTTP in production and in-memory fakes in tests.
use crate::{
    error::AppResult,
    models::{CandidateItem, CatalogFilters, InteractionRecord, PopularityOrder, ScoredCandidate, Season},
};

pub mod ml_http;
pub mod postgres;

pub use ml_http::HttpMlScorer;
pub use postgres::{PgCatalogStore, PgHistoryStore};

/// Read access to a subject's interaction history
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Number of recorded interactions; drives the cold-start decision
    async fn interaction_count(&self, subject_id: &str) -> AppResult<usize>;

    /// Full history snapshot, oldest first
    async fn interaction_history(&self, subject_id: &str) -> AppResult<Vec<InteractionRecord>>;
}

/// Read access to the fragrance catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Catalog items ordered by popularity, ties broken by id
    async fn query_by_popularity(
        &self,
        filters: &CatalogFilters,
        limit: usize,
        order: PopularityOrder,
    ) -> AppResult<Vec<CandidateItem>>;

    /// Items tagged with `season`, most popular first
    async fn query_by_seasonal_tag(
        &self,
        season: Season,
        filters: &CatalogFilters,
        limit: usize,
    ) -> AppResult<Vec<CandidateItem>>;
}

/// Embedding / ML personalized candidate service
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MlScorer: Send + Sync {
    /// Personalized candidates for a subject, best first. May fail or time out.
    async fn personalized_candidates(
        &self,
        subject_id: &str,
        limit: usize,
        exclude_owned: bool,
    ) -> AppResult<Vec<ScoredCandidate>>;
}
