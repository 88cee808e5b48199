//! Tests for database initialization

use chrono::Utc;
use mrr_common::db::{create_schema, init_database};
use sqlx::sqlite::SqlitePoolOptions;

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_init_database_creates_file_and_tables() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("royalties.db");

    let pool = init_database(&db_path).await.unwrap();

    assert!(db_path.exists());
    assert_eq!(
        table_names(&pool).await,
        vec!["royalty_settings", "tax_settings", "track_shares", "usage_records"]
    );
}

#[tokio::test]
async fn test_init_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("royalties.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query(
        "INSERT INTO usage_records (period, artist, track_name, created_at) VALUES ('Q1', 'A', 'T', ?)",
    )
    .bind(Utc::now())
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usage_records")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_usage_records_unique_key() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_schema(&pool).await.unwrap();

    let insert = "INSERT INTO usage_records (period, artist, track_name, platform, created_at) \
                  VALUES ('Q1', 'Alice', 'Song', 'Spotify', ?) ON CONFLICT DO NOTHING";
    let first = sqlx::query(insert).bind(Utc::now()).execute(&pool).await.unwrap();
    let second = sqlx::query(insert).bind(Utc::now()).execute(&pool).await.unwrap();

    assert_eq!(first.rows_affected(), 1);
    assert_eq!(second.rows_affected(), 0);
}

#[tokio::test]
async fn test_tax_settings_default_row() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_schema(&pool).await.unwrap();
    create_schema(&pool).await.unwrap();

    let rows: Vec<(f64, i64)> = sqlx::query_as("SELECT tax_percent, is_active FROM tax_settings")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(rows, vec![(6.0, 1)]);
}
