use agent_desk::mirror::{
    clear_failed_snapshot, db_kind_from_url, init_mirror, load_failed_snapshot,
    save_failed_snapshot, DbKind,
};
use agent_desk::types::{OptimisticMessage, OptimisticStatus};
use chrono::Utc;
use sqlx::AnyPool;
use tempfile::TempDir;

static DRIVERS: std::sync::Once = std::sync::Once::new();

async fn open_pool() -> (AnyPool, TempDir) {
    DRIVERS.call_once(sqlx::any::install_default_drivers);
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("state.sqlite").display()
    );
    let pool = AnyPool::connect(&url).await.unwrap();
    init_mirror(&pool, DbKind::Sqlite).await.unwrap();
    (pool, dir)
}

fn failed_entry(id: &str, chat_id: &str) -> OptimisticMessage {
    OptimisticMessage {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        content: Some("never made it".to_string()),
        attachments: vec![],
        reply_to_message_id: None,
        status: OptimisticStatus::Failed,
        error_message: Some("connection reset".to_string()),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let (pool, _dir) = open_pool().await;
    let entries = vec![failed_entry("t1", "c1"), failed_entry("t2", "c1")];
    save_failed_snapshot(&pool, DbKind::Sqlite, "c1", &entries)
        .await
        .unwrap();

    let loaded = load_failed_snapshot(&pool, DbKind::Sqlite, "c1").await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].id, "t1");
    assert!(loaded[0].is_failed());
    assert_eq!(loaded[0].error_message.as_deref(), Some("connection reset"));
}

#[tokio::test]
async fn test_missing_slot_loads_empty() {
    let (pool, _dir) = open_pool().await;
    let loaded = load_failed_snapshot(&pool, DbKind::Sqlite, "never-seen")
        .await
        .unwrap();
    assert!(loaded.is_empty());
}

#[tokio::test]
async fn test_slots_are_namespaced_per_chat() {
    let (pool, _dir) = open_pool().await;
    save_failed_snapshot(&pool, DbKind::Sqlite, "c1", &[failed_entry("t1", "c1")])
        .await
        .unwrap();
    save_failed_snapshot(&pool, DbKind::Sqlite, "c2", &[failed_entry("t9", "c2")])
        .await
        .unwrap();

    let c1 = load_failed_snapshot(&pool, DbKind::Sqlite, "c1").await.unwrap();
    let c2 = load_failed_snapshot(&pool, DbKind::Sqlite, "c2").await.unwrap();
    assert_eq!(c1[0].id, "t1");
    assert_eq!(c2[0].id, "t9");
}

#[tokio::test]
async fn test_overwrite_replaces_previous_snapshot() {
    let (pool, _dir) = open_pool().await;
    save_failed_snapshot(&pool, DbKind::Sqlite, "c1", &[failed_entry("t1", "c1")])
        .await
        .unwrap();
    save_failed_snapshot(&pool, DbKind::Sqlite, "c1", &[failed_entry("t2", "c1")])
        .await
        .unwrap();

    let loaded = load_failed_snapshot(&pool, DbKind::Sqlite, "c1").await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, "t2");
}

#[tokio::test]
async fn test_empty_snapshot_clears_the_slot() {
    let (pool, _dir) = open_pool().await;
    save_failed_snapshot(&pool, DbKind::Sqlite, "c1", &[failed_entry("t1", "c1")])
        .await
        .unwrap();
    save_failed_snapshot(&pool, DbKind::Sqlite, "c1", &[]).await.unwrap();

    let loaded = load_failed_snapshot(&pool, DbKind::Sqlite, "c1").await.unwrap();
    assert!(loaded.is_empty());
}

#[tokio::test]
async fn test_clear_removes_only_that_chat() {
    let (pool, _dir) = open_pool().await;
    save_failed_snapshot(&pool, DbKind::Sqlite, "c1", &[failed_entry("t1", "c1")])
        .await
        .unwrap();
    save_failed_snapshot(&pool, DbKind::Sqlite, "c2", &[failed_entry("t2", "c2")])
        .await
        .unwrap();
    clear_failed_snapshot(&pool, DbKind::Sqlite, "c1").await.unwrap();

    assert!(load_failed_snapshot(&pool, DbKind::Sqlite, "c1")
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        load_failed_snapshot(&pool, DbKind::Sqlite, "c2")
            .await
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn test_db_kind_detection() {
    assert_eq!(db_kind_from_url("postgres://h/db"), DbKind::Postgres);
    assert_eq!(db_kind_from_url("sqlite:///tmp/a.db"), DbKind::Sqlite);
}
