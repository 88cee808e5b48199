//! Database initialization
//!
//! Creates the database file on first run and the four tables the ledger uses.
//! Every statement is idempotent, so opening an existing database is safe.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the database at `db_path` and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets a report view read while an import writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes on an already-open pool
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_usage_records_table(pool).await?;
    create_track_shares_table(pool).await?;
    create_royalty_settings_table(pool).await?;
    create_tax_settings_table(pool).await?;
    Ok(())
}

/// Create the usage_records table
///
/// One row per (period, artist, track_name, platform); re-imports hit the
/// unique constraint and are skipped.
pub async fn create_usage_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS usage_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            period TEXT NOT NULL,
            usage_period TEXT NOT NULL DEFAULT '',
            platform TEXT NOT NULL DEFAULT '',
            territory TEXT NOT NULL DEFAULT '',
            content_type TEXT NOT NULL DEFAULT '',
            usage_type TEXT NOT NULL DEFAULT '',
            artist TEXT NOT NULL,
            track_name TEXT NOT NULL,
            plays INTEGER NOT NULL DEFAULT 0 CHECK (plays >= 0),
            revenue REAL NOT NULL DEFAULT 0 CHECK (revenue >= 0),
            created_at TIMESTAMP NOT NULL,
            UNIQUE (period, artist, track_name, platform)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_usage_records_period ON usage_records(period)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_usage_records_artist_track ON usage_records(artist, track_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the track_shares table (artist share overrides)
pub async fn create_track_shares_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS track_shares (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            artist TEXT NOT NULL,
            track_name TEXT NOT NULL,
            share REAL NOT NULL DEFAULT 100.0 CHECK (share >= 0 AND share <= 100),
            updated_at TIMESTAMP NOT NULL,
            UNIQUE (artist, track_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the royalty_settings table (licensor percent overrides)
pub async fn create_royalty_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS royalty_settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            artist TEXT NOT NULL,
            track_name TEXT NOT NULL,
            royalty_percent REAL NOT NULL DEFAULT 50.0
                CHECK (royalty_percent >= 0 AND royalty_percent <= 100),
            updated_at TIMESTAMP NOT NULL,
            UNIQUE (artist, track_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the tax_settings table
///
/// Holds a single default row. Calculations take the tax rate from configuration.
pub async fn create_tax_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tax_settings (
            id INTEGER PRIMARY KEY,
            tax_percent REAL NOT NULL DEFAULT 6.0,
            is_active INTEGER NOT NULL DEFAULT 1,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO tax_settings (id, tax_percent, is_active) VALUES (1, 6.0, 1)")
        .execute(pool)
        .await?;

    Ok(())
}
