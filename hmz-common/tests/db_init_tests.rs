//! Tests for on-disk database initialization

use hmz_common::db::init::{init_database, SCHEMA_VERSION};
use hmz_common::db::models::{NewUsageRecord, Outcome};
use hmz_common::db::usage::{insert_usage_record, usage_records_for_user};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("hmz.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_reopen_preserves_records() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("hmz.db");

    let pool = init_database(&db_path).await.unwrap();
    insert_usage_record(
        &pool,
        &NewUsageRecord {
            user_id: "u1".into(),
            input_text: "in".into(),
            output_text: "out".into(),
            word_count: 1,
            outcome: Outcome::Success,
            initial_score: None,
            final_score: None,
            request_id: None,
        },
    )
    .await
    .unwrap();
    pool.close().await;

    // Second open runs the idempotent schema again
    let pool = init_database(&db_path).await.unwrap();
    let records = usage_records_for_user(&pool, "u1").await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_schema_version_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("hmz.db")).await.unwrap();

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_all_tables_exist() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("hmz.db")).await.unwrap();

    for table in ["users", "sessions", "subscriptions", "humanizations"] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table);
    }
}
