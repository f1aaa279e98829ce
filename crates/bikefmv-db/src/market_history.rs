//! Database operations for `market_history`, and the Postgres [`MarketStore`].

use async_trait::async_trait;
use bikefmv_core::store::QUERY_ROW_CAP;
use bikefmv_core::{MarketRecord, MarketStats, MarketStore, NewMarketRecord, StoreError};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{connect_pool, run_migrations, DbError, PoolConfig};

const SELECT_COLUMNS: &str = "id, source_platform, source_url, source_ad_id, brand, model, year, \
     price_eur, currency, frame_size, frame_material, condition_status, title, image_url, \
     created_at";

/// A row from the `market_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MarketHistoryRow {
    pub id: i64,
    pub source_platform: String,
    pub source_url: String,
    pub source_ad_id: String,
    pub brand: String,
    pub model: String,
    pub year: Option<i32>,
    pub price_eur: f64,
    pub currency: String,
    pub frame_size: Option<String>,
    pub frame_material: Option<String>,
    pub condition_status: Option<String>,
    pub title: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MarketHistoryRow> for MarketRecord {
    fn from(row: MarketHistoryRow) -> Self {
        MarketRecord {
            id: row.id,
            source_platform: row.source_platform,
            source_url: row.source_url,
            source_ad_id: row.source_ad_id,
            brand: row.brand,
            model: row.model,
            year: row.year,
            price_eur: row.price_eur,
            currency: row.currency,
            frame_size: row.frame_size,
            frame_material: row.frame_material,
            condition_status: row.condition_status,
            title: row.title,
            image_url: row.image_url,
            created_at: row.created_at,
        }
    }
}

/// Returns `true` if a row with this `(source_platform, source_ad_id)` exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn market_record_exists(
    pool: &PgPool,
    source_platform: &str,
    source_ad_id: &str,
) -> Result<bool, DbError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS ( \
             SELECT 1 FROM market_history \
             WHERE source_platform = $1 AND source_ad_id = $2 \
         )",
    )
    .bind(source_platform)
    .bind(source_ad_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Inserts a listing. Returns `Some(id)` for a new row, or `None` when the
/// uniqueness constraint already holds a row with the same key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails for any other reason.
pub async fn insert_market_record(
    pool: &PgPool,
    record: &NewMarketRecord,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO market_history ( \
             source_platform, source_url, source_ad_id, brand, model, year, price_eur, \
             currency, frame_size, frame_material, condition_status, title, image_url \
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         ON CONFLICT (source_platform, source_ad_id) DO NOTHING \
         RETURNING id",
    )
    .bind(&record.source_platform)
    .bind(&record.source_url)
    .bind(&record.source_ad_id)
    .bind(&record.brand)
    .bind(&record.model)
    .bind(record.year)
    .bind(record.price_eur)
    .bind(&record.currency)
    .bind(record.frame_size.as_deref())
    .bind(record.frame_material.as_deref())
    .bind(record.condition_status.as_deref())
    .bind(&record.title)
    .bind(record.image_url.as_deref())
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Rows for `brand` whose model or title matches any `ILIKE` pattern, newer
/// than `recency_days`, newest first, capped at [`QUERY_ROW_CAP`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn query_market_matching(
    pool: &PgPool,
    brand: &str,
    patterns: &[String],
    recency_days: u32,
) -> Result<Vec<MarketHistoryRow>, DbError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM market_history \
         WHERE LOWER(brand) = LOWER($1) \
           AND (model ILIKE ANY($2) OR title ILIKE ANY($2)) \
           AND price_eur > 0 \
           AND created_at > NOW() - make_interval(days => $3) \
         ORDER BY created_at DESC \
         LIMIT $4"
    );
    let rows = sqlx::query_as::<_, MarketHistoryRow>(&sql)
        .bind(brand)
        .bind(patterns)
        .bind(days_param(recency_days))
        .bind(QUERY_ROW_CAP)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Same as [`query_market_matching`] without the model filter.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn query_market_brand(
    pool: &PgPool,
    brand: &str,
    recency_days: u32,
) -> Result<Vec<MarketHistoryRow>, DbError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM market_history \
         WHERE LOWER(brand) = LOWER($1) \
           AND price_eur > 0 \
           AND created_at > NOW() - make_interval(days => $2) \
         ORDER BY created_at DESC \
         LIMIT $3"
    );
    let rows = sqlx::query_as::<_, MarketHistoryRow>(&sql)
        .bind(brand)
        .bind(days_param(recency_days))
        .bind(QUERY_ROW_CAP)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Aggregate counts for the `stats` command.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any of the aggregate queries fail.
pub async fn market_stats(pool: &PgPool) -> Result<MarketStats, DbError> {
    let (total_records, recent_records, avg_price) =
        sqlx::query_as::<_, (i64, i64, Option<f64>)>(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '7 days'), \
                    AVG(price_eur) FILTER (WHERE price_eur > 0) \
             FROM market_history",
        )
        .fetch_one(pool)
        .await?;

    let by_source = sqlx::query_as::<_, (String, i64)>(
        "SELECT source_platform, COUNT(*) AS n FROM market_history \
         GROUP BY source_platform \
         ORDER BY n DESC, source_platform",
    )
    .fetch_all(pool)
    .await?;

    let by_year = sqlx::query_as::<_, (i32, i64)>(
        "SELECT year, COUNT(*) FROM market_history \
         WHERE year IS NOT NULL \
         GROUP BY year \
         ORDER BY year",
    )
    .fetch_all(pool)
    .await?;

    Ok(MarketStats {
        total_records,
        recent_records,
        avg_price: avg_price.unwrap_or(0.0).round(),
        by_source,
        by_year,
    })
}

fn days_param(recency_days: u32) -> i32 {
    i32::try_from(recency_days).unwrap_or(i32::MAX)
}

/// Postgres-backed [`MarketStore`].
///
/// Created once in the composition root with [`PgMarketStore::connect`] and
/// shared as `Arc<dyn MarketStore>`.
#[derive(Debug, Clone)]
pub struct PgMarketStore {
    pool: PgPool,
}

impl PgMarketStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or a migration fails.
    pub async fn connect(database_url: &str, config: PoolConfig) -> Result<Self, DbError> {
        let pool = connect_pool(database_url, config).await?;
        let applied = run_migrations(&pool).await?;
        tracing::debug!(applied, "market store ready");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn store_error(err: DbError) -> StoreError {
    match err {
        DbError::Sqlx(sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

#[async_trait]
impl MarketStore for PgMarketStore {
    async fn exists(&self, source_platform: &str, source_ad_id: &str) -> Result<bool, StoreError> {
        market_record_exists(&self.pool, source_platform, source_ad_id)
            .await
            .map_err(store_error)
    }

    async fn insert(&self, record: &NewMarketRecord) -> Result<bool, StoreError> {
        insert_market_record(&self.pool, record)
            .await
            .map(|id| id.is_some())
            .map_err(store_error)
    }

    async fn query_matching(
        &self,
        brand: &str,
        patterns: &[String],
        recency_days: u32,
    ) -> Result<Vec<MarketRecord>, StoreError> {
        let rows = query_market_matching(&self.pool, brand, patterns, recency_days)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(MarketRecord::from).collect())
    }

    async fn query_brand(
        &self,
        brand: &str,
        recency_days: u32,
    ) -> Result<Vec<MarketRecord>, StoreError> {
        let rows = query_market_brand(&self.pool, brand, recency_days)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(MarketRecord::from).collect())
    }

    async fn market_stats(&self) -> Result<MarketStats, StoreError> {
        market_stats(&self.pool).await.map_err(store_error)
    }
}
