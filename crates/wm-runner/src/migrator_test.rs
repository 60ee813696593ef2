use super::*;
use std::sync::Mutex;
use wm_core::MigrationVersion;
use wm_db::DuckDbBackend;
use crate::{AppliedMigrationRecord, MigrationState};

fn unit(version: &str, body: &str) -> MigrationUnit {
    MigrationUnit::new(MigrationVersion::parse(version).unwrap(), "step", body)
}

fn ezrec_set() -> MigrationSet {
    MigrationSet::from_units(vec![
        unit("001", "CREATE TABLE IF NOT EXISTS bookings (id VARCHAR)"),
        unit("002", "CREATE TABLE IF NOT EXISTS recordings (id VARCHAR PRIMARY KEY)"),
        unit(
            "003",
            "ALTER TABLE bookings ADD COLUMN IF NOT EXISTS camera_id VARCHAR",
        ),
    ])
    .unwrap()
}

fn migrator() -> Migrator {
    let db: Arc<dyn Database> = Arc::new(DuckDbBackend::in_memory().unwrap());
    Migrator::new(db, MigratorOptions::default())
}

#[test]
fn test_plan_skips_applied() {
    let set = ezrec_set();
    let applied = AppliedSet::from_versions(["002"]);
    let pending: Vec<&str> = plan(&set, &applied)
        .into_iter()
        .map(|u| u.version.as_str())
        .collect();
    assert_eq!(pending, vec!["001", "003"]);
}

#[test]
fn test_preflight_rejects_out_of_order() {
    let m = migrator();
    let applied = AppliedSet::from_versions(["003"]);
    let err = m.preflight(&ezrec_set(), &applied).unwrap_err();
    match err {
        MigrateError::OutOfOrder {
            version,
            latest_applied,
        } => {
            assert_eq!(version, "001");
            assert_eq!(latest_applied, "003");
        }
        other => panic!("expected out-of-order error, got {other}"),
    }
}

#[test]
fn test_preflight_allows_out_of_order_when_enabled() {
    let db: Arc<dyn Database> = Arc::new(DuckDbBackend::in_memory().unwrap());
    let m = Migrator::new(
        db,
        MigratorOptions {
            out_of_order: true,
            ..Default::default()
        },
    );
    let applied = AppliedSet::from_versions(["003"]);
    m.preflight(&ezrec_set(), &applied).unwrap();
}

#[test]
fn test_preflight_detects_modified_body() {
    let m = migrator();
    let set = ezrec_set();
    let applied: AppliedSet = [AppliedMigrationRecord {
        version: "001".to_string(),
        applied_at: None,
        checksum: Some("not-the-real-checksum".to_string()),
        execution_ms: None,
    }]
    .into_iter()
    .collect();

    let err = m.preflight(&set, &applied).unwrap_err();
    assert!(matches!(err, MigrateError::ChecksumMismatch { ref version, .. } if version == "001"));
}

#[test]
fn test_preflight_ignores_records_without_checksum() {
    let m = migrator();
    let applied = AppliedSet::from_versions(["001"]);
    m.preflight(&ezrec_set(), &applied).unwrap();
}

#[tokio::test]
async fn test_load_applied_creates_tracking_table() {
    let m = migrator();
    let applied = m.load_applied_versions().await.unwrap();
    assert!(applied.is_empty());
    assert!(m.db.relation_exists("schema_migrations").await.unwrap());
}

#[tokio::test]
async fn test_status_is_read_only() {
    let m = migrator();
    let report = m.status(&ezrec_set()).await.unwrap();

    assert_eq!(report.pending().count(), 3);
    assert!(!report.is_up_to_date());
    assert!(!m.db.relation_exists("schema_migrations").await.unwrap());
}

#[tokio::test]
async fn test_status_reports_modified_and_missing() {
    let m = migrator();
    let set = ezrec_set();
    let applied = m.load_applied_versions().await.unwrap();
    m.apply(&set, &applied).await.unwrap();

    let edited = MigrationSet::from_units(vec![
        unit("001", "CREATE TABLE IF NOT EXISTS bookings (id VARCHAR, note VARCHAR)"),
        unit("002", "CREATE TABLE IF NOT EXISTS recordings (id VARCHAR PRIMARY KEY)"),
    ])
    .unwrap();
    let report = m.status(&edited).await.unwrap();

    let states: Vec<MigrationState> = report.entries.iter().map(|e| e.state).collect();
    assert_eq!(states, vec![MigrationState::Modified, MigrationState::Applied]);
    assert_eq!(report.applied_count(), 2);
    assert_eq!(report.missing.len(), 1);
    assert_eq!(report.missing[0].version, "003");
}

#[tokio::test]
async fn test_cancel_before_first_unit() {
    let cancel = CancelFlag::new();
    cancel.cancel();
    let m = migrator().with_cancel(cancel);

    let failure = m.apply(&ezrec_set(), &AppliedSet::default()).await.unwrap_err();
    assert!(failure.summary.applied.is_empty());
    match failure.error {
        MigrateError::Cancelled { next, last_applied } => {
            assert_eq!(next, "001");
            assert_eq!(last_applied, None);
        }
        other => panic!("expected cancellation, got {other}"),
    }
}

#[tokio::test]
async fn test_progress_events() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let m = migrator().with_progress(move |event| {
        let line = match event {
            ProgressEvent::Started { unit, index, total } => {
                format!("start {} {}/{}", unit.version, index, total)
            }
            ProgressEvent::Applied { unit, .. } => format!("done {}", unit.version),
            ProgressEvent::Failed { unit, .. } => format!("fail {}", unit.version),
        };
        sink.lock().unwrap().push(line);
    });

    let applied = AppliedSet::from_versions(["001"]);
    m.load_applied_versions().await.unwrap();
    m.db
        .execute_batch("CREATE TABLE bookings (id VARCHAR)")
        .await
        .unwrap();
    m.apply(&ezrec_set(), &applied).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["start 002 1/2", "done 002", "start 003 2/2", "done 003"]
    );
}
