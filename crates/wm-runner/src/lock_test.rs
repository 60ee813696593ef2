use super::*;
use wm_db::DuckDbBackend;

fn quick_config(max_attempts: u32) -> LockConfig {
    LockConfig {
        max_attempts,
        backoff_ms: 1,
        max_backoff_ms: 5,
        lease_secs: 600,
    }
}

#[tokio::test]
async fn test_acquire_and_release() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = TrackingStore::new("schema_migrations");

    let lock = RunLock::acquire(&db, &store, &quick_config(1)).await.unwrap();
    assert!(db.relation_exists("schema_migrations_lock").await.unwrap());
    lock.release(&db).await.unwrap();

    let again = RunLock::acquire(&db, &store, &quick_config(1)).await.unwrap();
    again.release(&db).await.unwrap();
}

#[tokio::test]
async fn test_second_acquire_fails_while_held() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = TrackingStore::new("schema_migrations");

    let held = RunLock::acquire(&db, &store, &quick_config(1)).await.unwrap();
    let err = RunLock::acquire(&db, &store, &quick_config(3))
        .await
        .unwrap_err();
    match err {
        MigrateError::Lock {
            attempts, message, ..
        } => {
            assert_eq!(attempts, 3);
            assert!(message.contains(held.owner()), "got {message}");
        }
        other => panic!("expected lock error, got {other}"),
    }
    held.release(&db).await.unwrap();
}

#[tokio::test]
async fn test_expired_lease_is_taken_over() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = TrackingStore::new("schema_migrations");
    let expired = LockConfig {
        lease_secs: 0,
        ..quick_config(1)
    };

    let stale = RunLock::acquire(&db, &store, &expired).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let fresh = RunLock::acquire(&db, &store, &quick_config(1)).await.unwrap();
    assert_ne!(stale.owner(), fresh.owner());

    let err = stale.renew(&db).await.unwrap_err();
    assert!(matches!(err, MigrateError::Lock { .. }));
    fresh.renew(&db).await.unwrap();
}

#[tokio::test]
async fn test_lock_in_qualified_schema() {
    let db = DuckDbBackend::in_memory().unwrap();
    let store = TrackingStore::new("ops.schema_migrations");

    let lock = RunLock::acquire(&db, &store, &quick_config(1)).await.unwrap();
    assert!(db.relation_exists("ops.schema_migrations_lock").await.unwrap());
    lock.release(&db).await.unwrap();
}
