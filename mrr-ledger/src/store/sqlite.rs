//! SQLite implementation of the storage ports
//!
//! Dedup and upserts are single statements (`ON CONFLICT`), so concurrent
//! imports and settings updates are serialized by SQLite itself.

use super::{with_all_sentinel, InsertOutcome, OverrideStore, RecordQuery, ReportStore};
use async_trait::async_trait;
use mrr_common::db::{NewUsageRecord, RoyaltyOverride, TrackShareOverride, UsageRecord};
use mrr_common::time::now;
use mrr_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteExecutor, SqlitePool};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap a pool whose schema is already created
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn record_from_row(row: &SqliteRow) -> Result<UsageRecord> {
    Ok(UsageRecord {
        id: row.try_get("id")?,
        period: row.try_get("period")?,
        usage_period: row.try_get("usage_period")?,
        platform: row.try_get("platform")?,
        territory: row.try_get("territory")?,
        content_type: row.try_get("content_type")?,
        usage_type: row.try_get("usage_type")?,
        artist: row.try_get("artist")?,
        track_name: row.try_get("track_name")?,
        plays: row.try_get("plays")?,
        revenue: row.try_get("revenue")?,
        created_at: row.try_get("created_at")?,
    })
}

fn share_from_row(row: &SqliteRow) -> Result<TrackShareOverride> {
    Ok(TrackShareOverride {
        artist: row.try_get("artist")?,
        track_name: row.try_get("track_name")?,
        share: row.try_get("share")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn royalty_from_row(row: &SqliteRow) -> Result<RoyaltyOverride> {
    Ok(RoyaltyOverride {
        artist: row.try_get("artist")?,
        track_name: row.try_get("track_name")?,
        royalty_percent: row.try_get("royalty_percent")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// `%needle%` with LIKE wildcards in the needle escaped by `\`
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

const RECORD_COLUMNS: &str = "id, period, usage_period, platform, territory, content_type, \
     usage_type, artist, track_name, plays, revenue, created_at";

async fn upsert_share_with<'e>(
    executor: impl SqliteExecutor<'e>,
    artist: &str,
    track_name: &str,
    share: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO track_shares (artist, track_name, share, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(artist, track_name) DO UPDATE SET
            share = excluded.share,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(artist)
    .bind(track_name)
    .bind(share)
    .bind(now())
    .execute(executor)
    .await?;

    Ok(())
}

async fn upsert_royalty_with<'e>(
    executor: impl SqliteExecutor<'e>,
    artist: &str,
    track_name: &str,
    royalty_percent: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO royalty_settings (artist, track_name, royalty_percent, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(artist, track_name) DO UPDATE SET
            royalty_percent = excluded.royalty_percent,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(artist)
    .bind(track_name)
    .bind(royalty_percent)
    .bind(now())
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl ReportStore for SqliteStore {
    async fn insert_if_absent(&self, record: &NewUsageRecord) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO usage_records
                (period, usage_period, platform, territory, content_type, usage_type,
                 artist, track_name, plays, revenue, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(period, artist, track_name, platform) DO NOTHING
            "#,
        )
        .bind(&record.period)
        .bind(&record.usage_period)
        .bind(&record.platform)
        .bind(&record.territory)
        .bind(&record.content_type)
        .bind(&record.usage_type)
        .bind(&record.artist)
        .bind(&record.track_name)
        .bind(record.plays)
        .bind(record.revenue)
        .bind(now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(
                "Skipping duplicate record {} / {} / {} / {}",
                record.period, record.artist, record.track_name, record.platform
            );
            Ok(InsertOutcome::Skipped)
        } else {
            Ok(InsertOutcome::Inserted(result.last_insert_rowid()))
        }
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<UsageRecord>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM usage_records WHERE 1 = 1", RECORD_COLUMNS));

        if let Some(period) = query.period.period() {
            builder.push(" AND period = ").push_bind(period.to_string());
        }
        // LIKE folds ASCII case only, same as RecordQuery::matches
        if let Some(artist) = &query.artist_contains {
            builder
                .push(" AND artist LIKE ")
                .push_bind(like_pattern(artist))
                .push(" ESCAPE '\\'");
        }
        if let Some(artist) = &query.artist_exact {
            builder.push(" AND artist = ").push_bind(artist.clone());
        }
        builder.push(" ORDER BY artist, track_name, id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn distinct_periods(&self) -> Result<Vec<String>> {
        let periods: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT period FROM usage_records ORDER BY period")
                .fetch_all(&self.pool)
                .await?;
        Ok(with_all_sentinel(periods))
    }

    async fn get_record(&self, id: i64) -> Result<Option<UsageRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM usage_records WHERE id = ?",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn pair_exists(&self, artist: &str, track_name: &str) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM usage_records WHERE artist = ? AND track_name = ?)",
        )
        .bind(artist)
        .bind(track_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists != 0)
    }

    async fn count_records(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usage_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl OverrideStore for SqliteStore {
    async fn get_share(&self, artist: &str, track_name: &str) -> Result<Option<TrackShareOverride>> {
        let row = sqlx::query(
            "SELECT artist, track_name, share, updated_at FROM track_shares \
             WHERE artist = ? AND track_name = ?",
        )
        .bind(artist)
        .bind(track_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(share_from_row).transpose()
    }

    async fn upsert_share(&self, artist: &str, track_name: &str, share: f64) -> Result<()> {
        upsert_share_with(&self.pool, artist, track_name, share).await
    }

    async fn get_royalty(&self, artist: &str, track_name: &str) -> Result<Option<RoyaltyOverride>> {
        let row = sqlx::query(
            "SELECT artist, track_name, royalty_percent, updated_at FROM royalty_settings \
             WHERE artist = ? AND track_name = ?",
        )
        .bind(artist)
        .bind(track_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(royalty_from_row).transpose()
    }

    async fn upsert_royalty(
        &self,
        artist: &str,
        track_name: &str,
        royalty_percent: f64,
    ) -> Result<()> {
        upsert_royalty_with(&self.pool, artist, track_name, royalty_percent).await
    }

    async fn upsert_track_settings(
        &self,
        artist: &str,
        track_name: &str,
        share: f64,
        royalty_percent: f64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_share_with(&mut *tx, artist, track_name, share).await?;
        upsert_royalty_with(&mut *tx, artist, track_name, royalty_percent).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_shares(&self) -> Result<Vec<TrackShareOverride>> {
        let rows = sqlx::query(
            "SELECT artist, track_name, share, updated_at FROM track_shares ORDER BY artist, track_name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(share_from_row).collect()
    }

    async fn list_royalties(&self) -> Result<Vec<RoyaltyOverride>> {
        let rows = sqlx::query(
            "SELECT artist, track_name, royalty_percent, updated_at FROM royalty_settings \
             ORDER BY artist, track_name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(royalty_from_row).collect()
    }
}
