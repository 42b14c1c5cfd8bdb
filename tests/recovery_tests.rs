// Integration tests for recovery persistence
//
// Covers snapshot save/load round-trips, corrupt-data tolerance, staleness
// validation, and the persisted-vs-live reconcile rules.

mod common;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use common::MemoryStorage;
use std::time::Duration;
use tempfile::TempDir;

use callcapture::persist::{
    reconcile, FileStorage, LocalStorage, RecoveryAction, RecoverySnapshot, RecoveryStore,
    SnapshotValidity, RECOVERY_KEY,
};

fn snapshot(session_id: &str, age_hours: i64) -> RecoverySnapshot {
    let now = Utc::now();
    RecoverySnapshot {
        session_id: session_id.to_string(),
        is_recording: true,
        started_at: now - ChronoDuration::hours(age_hours) - ChronoDuration::minutes(10),
        last_save_at: now - ChronoDuration::hours(age_hours),
        current_chunk_number: 4,
        total_chunks: 4,
        total_duration_secs: 1230.5,
        patient_name: "Jordan Diaz".to_string(),
    }
}

fn store_with_staleness(hours: u64) -> RecoveryStore {
    RecoveryStore::new(
        Box::new(MemoryStorage::new()),
        Duration::from_secs(hours * 3600),
    )
}

#[test]
fn snapshot_round_trips() {
    let store = store_with_staleness(24);
    let snap = snapshot("session-9", 0);

    store.save(&snap);
    let loaded = store.load().expect("snapshot should load");
    assert_eq!(loaded.session_id, "session-9");
    assert_eq!(loaded.current_chunk_number, 4);
    assert_eq!(loaded.patient_name, "Jordan Diaz");
    assert!((loaded.total_duration_secs - 1230.5).abs() < f64::EPSILON);
}

#[test]
fn corrupt_data_loads_as_absent() {
    let storage = MemoryStorage::new();
    storage.set(RECOVERY_KEY, "{not json").unwrap();

    let store = RecoveryStore::new(Box::new(storage), Duration::from_secs(3600));
    assert!(store.load().is_none());
}

#[test]
fn missing_data_loads_as_absent() {
    let store = store_with_staleness(24);
    assert!(store.load().is_none());
}

#[test]
fn fresh_snapshot_validates() {
    let store = store_with_staleness(24);
    assert!(store.validate(&snapshot("s", 2)).is_valid());
}

#[test]
fn stale_snapshot_rejected_regardless_of_other_fields() {
    let store = store_with_staleness(24);

    let verdict = store.validate(&snapshot("s", 48));
    assert!(matches!(verdict, SnapshotValidity::Stale { .. }));
    assert!(verdict.rejection_reason().is_some());
}

#[test]
fn non_recording_snapshot_rejected() {
    let store = store_with_staleness(24);

    let mut snap = snapshot("s", 1);
    snap.is_recording = false;
    assert_eq!(store.validate(&snap), SnapshotValidity::Incomplete);

    let mut snap = snapshot("", 1);
    snap.session_id.clear();
    assert_eq!(store.validate(&snap), SnapshotValidity::Incomplete);
}

#[test]
fn clear_is_idempotent() {
    let store = store_with_staleness(24);
    store.save(&snapshot("s", 0));

    store.clear();
    assert!(store.load().is_none());
    store.clear(); // second clear is a no-op
    assert!(store.load().is_none());
}

#[test]
fn file_storage_survives_reopen() -> Result<()> {
    let dir = TempDir::new()?;

    {
        let store = RecoveryStore::new(
            Box::new(FileStorage::new(dir.path())?),
            Duration::from_secs(24 * 3600),
        );
        store.save(&snapshot("session-3", 0));
    }

    // A fresh store over the same directory simulates a process restart
    let store = RecoveryStore::new(
        Box::new(FileStorage::new(dir.path())?),
        Duration::from_secs(24 * 3600),
    );
    let loaded = store.load().expect("snapshot survives restart");
    assert_eq!(loaded.session_id, "session-3");
    Ok(())
}

#[test]
fn reconcile_distinguishes_reload_from_hidden_tab() {
    let snap = snapshot("session-1", 0);

    // No persisted state: nothing to do
    assert_eq!(reconcile(None, None), RecoveryAction::NoOp);
    assert_eq!(reconcile(None, Some("session-1")), RecoveryAction::NoOp);

    // Live session matches the snapshot: the tab was only hidden
    assert_eq!(
        reconcile(Some(&snap), Some("session-1")),
        RecoveryAction::ResumeSilently
    );

    // A different session is live: never interrupt it
    assert_eq!(reconcile(Some(&snap), Some("session-2")), RecoveryAction::NoOp);

    // Snapshot but no live session: full reload, offer recovery
    assert_eq!(reconcile(Some(&snap), None), RecoveryAction::OfferRecovery);
}
