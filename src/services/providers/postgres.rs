use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use super::{CatalogStore, HistoryStore};
use crate::{
    error::AppResult,
    models::{
        CandidateItem, CatalogFilters, InteractionKind, InteractionRecord, PopularityOrder, Season,
    },
};

const FRAGRANCE_COLUMNS: &str = r#"
    SELECT id, name, brand_name, fragrance_family, main_accords, seasons,
           rating_value::float8 AS rating_value, rating_count,
           popularity_score::float8 AS popularity_score,
           sample_price_usd::float8 AS sample_price_usd, sample_available
    FROM fragrances
    WHERE (sample_price_usd IS NULL OR sample_price_usd BETWEEN $1 AND $2)
      AND (NOT $3 OR COALESCE(sample_available, true))
      AND NOT (id = ANY($4))
"#;

#[derive(Debug, sqlx::FromRow)]
struct FragranceRow {
    id: String,
    name: String,
    brand_name: Option<String>,
    fragrance_family: Option<String>,
    main_accords: Option<Vec<String>>,
    seasons: Option<Vec<String>>,
    rating_value: Option<f64>,
    rating_count: Option<i32>,
    popularity_score: Option<f64>,
    sample_price_usd: Option<f64>,
    sample_available: Option<bool>,
}

impl From<FragranceRow> for CandidateItem {
    fn from(row: FragranceRow) -> Self {
        CandidateItem {
            fragrance_id: row.id,
            name: row.name,
            brand: row.brand_name.unwrap_or_default(),
            family: row.fragrance_family.unwrap_or_else(|| "unknown".to_string()),
            accords: row.main_accords.unwrap_or_default(),
            seasons: parse_seasons(row.seasons.unwrap_or_default()),
            rating: row.rating_value.unwrap_or(0.0),
            rating_count: row.rating_count.unwrap_or(0).max(0) as u32,
            popularity: row.popularity_score.unwrap_or(0.0),
            price: row.sample_price_usd,
            available: row.sample_available.unwrap_or(true),
        }
    }
}

fn parse_seasons(tags: Vec<String>) -> Vec<Season> {
    let mut seasons: Vec<Season> = tags.iter().filter_map(|t| Season::parse(t)).collect();
    seasons.sort();
    seasons.dedup();
    seasons
}

/// Spellings a season tag may have in catalog rows
fn season_aliases(season: Season) -> Vec<String> {
    match season {
        Season::Fall => vec!["fall".to_string(), "autumn".to_string()],
        other => vec![other.to_string()],
    }
}

/// Catalog reads against the `fragrances` table
#[derive(Clone)]
pub struct PgCatalogStore {
    db_pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    #[instrument(skip(self, filters))]
    async fn query_by_popularity(
        &self,
        filters: &CatalogFilters,
        limit: usize,
        order: PopularityOrder,
    ) -> AppResult<Vec<CandidateItem>> {
        let direction = match order {
            PopularityOrder::MostPopular => "DESC",
            PopularityOrder::LeastPopular => "ASC",
        };
        let sql = format!(
            "{} ORDER BY popularity_score {} NULLS LAST, id ASC LIMIT $5",
            FRAGRANCE_COLUMNS, direction
        );

        let rows: Vec<FragranceRow> = sqlx::query_as(&sql)
            .bind(filters.price.min)
            .bind(filters.price.max)
            .bind(filters.available_only)
            .bind(&filters.exclude_ids)
            .bind(limit as i64)
            .fetch_all(&self.db_pool)
            .await?;

        tracing::debug!(rows = rows.len(), "Fetched catalog by popularity");
        Ok(rows.into_iter().map(CandidateItem::from).collect())
    }

    #[instrument(skip(self, filters))]
    async fn query_by_seasonal_tag(
        &self,
        season: Season,
        filters: &CatalogFilters,
        limit: usize,
    ) -> AppResult<Vec<CandidateItem>> {
        let sql = format!(
            "{} AND EXISTS (SELECT 1 FROM unnest(seasons) AS s WHERE lower(s) = ANY($6)) \
             ORDER BY popularity_score DESC NULLS LAST, id ASC LIMIT $5",
            FRAGRANCE_COLUMNS
        );

        let rows: Vec<FragranceRow> = sqlx::query_as(&sql)
            .bind(filters.price.min)
            .bind(filters.price.max)
            .bind(filters.available_only)
            .bind(&filters.exclude_ids)
            .bind(limit as i64)
            .bind(season_aliases(season))
            .fetch_all(&self.db_pool)
            .await?;

        tracing::debug!(rows = rows.len(), season = %season, "Fetched seasonal catalog");
        Ok(rows.into_iter().map(CandidateItem::from).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InteractionRow {
    fragrance_id: String,
    collection_type: String,
    rating: Option<f64>,
    notes: Option<String>,
    occasions: Option<Vec<String>>,
    seasons: Option<Vec<String>>,
    fragrance_family: Option<String>,
    main_accords: Option<Vec<String>>,
    created_at: DateTime<Utc>,
}

impl From<InteractionRow> for InteractionRecord {
    fn from(row: InteractionRow) -> Self {
        InteractionRecord {
            fragrance_id: row.fragrance_id,
            kind: InteractionKind::parse(&row.collection_type),
            rating: row.rating,
            notes: row.notes,
            occasions: row.occasions.unwrap_or_default(),
            seasons: parse_seasons(row.seasons.unwrap_or_default()),
            family: row.fragrance_family.unwrap_or_else(|| "unknown".to_string()),
            accords: row.main_accords.unwrap_or_default(),
            added_at: row.created_at,
        }
    }
}

/// History reads against `user_collections` joined with `fragrances`
#[derive(Clone)]
pub struct PgHistoryStore {
    db_pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait::async_trait]
impl HistoryStore for PgHistoryStore {
    #[instrument(skip(self))]
    async fn interaction_count(&self, subject_id: &str) -> AppResult<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_collections WHERE user_id = $1")
                .bind(subject_id)
                .fetch_one(&self.db_pool)
                .await?;

        Ok(count.max(0) as usize)
    }

    #[instrument(skip(self))]
    async fn interaction_history(&self, subject_id: &str) -> AppResult<Vec<InteractionRecord>> {
        let rows: Vec<InteractionRow> = sqlx::query_as(
            r#"
            SELECT uc.fragrance_id, uc.collection_type, uc.rating::float8 AS rating,
                   uc.notes, uc.occasions, uc.seasons,
                   f.fragrance_family, f.main_accords, uc.created_at
            FROM user_collections uc
            JOIN fragrances f ON f.id = uc.fragrance_id
            WHERE uc.user_id = $1
            ORDER BY uc.created_at ASC, uc.fragrance_id ASC
            "#,
        )
        .bind(subject_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(InteractionRecord::from).collect())
    }
}
