use super::*;
use wm_core::MigrationVersion;
use wm_db::DuckDbBackend;

fn unit(version: &str, body: &str) -> MigrationUnit {
    MigrationUnit::new(MigrationVersion::parse(version).unwrap(), "test", body)
}

#[tokio::test]
async fn test_ensure_is_idempotent() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = TrackingStore::new("schema_migrations");

    assert!(!store.exists(&db).await.unwrap());
    store.ensure(&db).await.unwrap();
    store.ensure(&db).await.unwrap();
    assert!(store.exists(&db).await.unwrap());
    assert!(store.load(&db).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ensure_creates_schema_for_qualified_table() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = TrackingStore::new("ops.schema_migrations");
    store.ensure(&db).await.unwrap();
    assert!(db.relation_exists("ops.schema_migrations").await.unwrap());
    assert_eq!(store.lock_table_name(), "ops.schema_migrations_lock");
}

#[tokio::test]
async fn test_ensure_rejects_unsafe_name() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = TrackingStore::new("migrations; DROP TABLE bookings");
    let err = store.ensure(&db).await.unwrap_err();
    assert!(matches!(err, MigrateError::Tracking(_)));
}

#[tokio::test]
async fn test_record_and_load() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = TrackingStore::new("schema_migrations");
    store.ensure(&db).await.unwrap();

    let u = unit("001", "CREATE TABLE bookings (id VARCHAR)");
    let written = store.record(&db, &u, Utc::now(), 12).await.unwrap();
    assert_eq!(written, 1);

    let applied = store.load(&db).await.unwrap();
    assert_eq!(applied.len(), 1);
    let record = applied.get("001").unwrap();
    assert_eq!(record.checksum.as_deref(), Some(u.checksum.as_str()));
    assert_eq!(record.execution_ms, Some(12));
}

#[tokio::test]
async fn test_record_conflict_is_noop() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = TrackingStore::new("schema_migrations");
    store.ensure(&db).await.unwrap();

    let u = unit("001", "CREATE TABLE bookings (id VARCHAR)");
    assert_eq!(store.record(&db, &u, Utc::now(), 1).await.unwrap(), 1);
    assert_eq!(store.record(&db, &u, Utc::now(), 1).await.unwrap(), 0);
    assert_eq!(store.load(&db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_load_tolerates_bare_rows() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = TrackingStore::new("schema_migrations");
    store.ensure(&db).await.unwrap();
    db.execute_batch(
        "INSERT INTO schema_migrations (version, applied_at) VALUES ('007', TIMESTAMPTZ '2024-03-01 10:00:00+00:00')",
    )
    .await
    .unwrap();

    let applied = store.load(&db).await.unwrap();
    let record = applied.get("007").unwrap();
    assert_eq!(record.checksum, None);
    assert_eq!(record.execution_ms, None);
}

#[test]
fn test_parse_timestamp_formats() {
    let with_offset = parse_timestamp("2024-03-01 10:00:00.5+00").unwrap();
    let naive = parse_timestamp("2024-03-01 10:00:00.5").unwrap();
    assert_eq!(with_offset, naive);
    assert!(parse_timestamp("yesterday").is_none());
}
