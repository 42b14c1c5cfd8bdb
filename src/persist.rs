use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Storage key for the single recovery slot on a device.
pub const RECOVERY_KEY: &str = "callcapture.recovery";

/// String-keyed durable local storage with persistence-across-restart
/// semantics (the browser-local-storage shape). No network I/O.
pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str);
}

/// File-backed `LocalStorage`: one file per key under a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).context("Failed to create local storage directory")?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.key_path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::write(self.key_path(key), value)
            .with_context(|| format!("Failed to write local storage key {}", key))
    }

    fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.key_path(key));
    }
}

/// Subset of session state needed to offer resumption after a crash/reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySnapshot {
    pub session_id: String,
    pub is_recording: bool,
    pub started_at: DateTime<Utc>,
    pub last_save_at: DateTime<Utc>,
    pub current_chunk_number: u32,
    pub total_chunks: u32,
    pub total_duration_secs: f64,
    pub patient_name: String,
}

/// Outcome of validating a loaded snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotValidity {
    Valid,
    /// Older than the staleness threshold; must never be silently resumed.
    Stale { age: Duration },
    /// Snapshot does not describe a resumable recording (not recording,
    /// or no session ID).
    Incomplete,
}

impl SnapshotValidity {
    pub fn is_valid(&self) -> bool {
        matches!(self, SnapshotValidity::Valid)
    }

    pub fn rejection_reason(&self) -> Option<String> {
        match self {
            SnapshotValidity::Valid => None,
            SnapshotValidity::Stale { age } => {
                Some(format!("snapshot is {}h old", age.num_hours()))
            }
            SnapshotValidity::Incomplete => Some("no matching resumable session".to_string()),
        }
    }
}

/// Serializes recovery snapshots to the device's single recovery slot.
///
/// The store never mutates session state: it writes the read-only snapshot it
/// is given and hands back whatever it last saved. Corrupt or missing data is
/// treated as absence, never as an error that blocks startup.
pub struct RecoveryStore {
    storage: Box<dyn LocalStorage>,
    staleness: Duration,
}

impl RecoveryStore {
    pub fn new(storage: Box<dyn LocalStorage>, staleness: std::time::Duration) -> Self {
        Self {
            storage,
            staleness: Duration::from_std(staleness).unwrap_or_else(|_| Duration::hours(24)),
        }
    }

    /// Overwrite the recovery slot. Called on chunk boundaries, periodic ticks
    /// and visibility changes; storage failures are logged, not propagated.
    pub fn save(&self, snapshot: &RecoverySnapshot) {
        match serde_json::to_string(snapshot) {
            Ok(json) => {
                if let Err(e) = self.storage.set(RECOVERY_KEY, &json) {
                    warn!("Failed to persist recovery snapshot: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize recovery snapshot: {}", e),
        }
    }

    /// Last-saved snapshot, or `None` if absent or unparseable.
    pub fn load(&self) -> Option<RecoverySnapshot> {
        let json = self.storage.get(RECOVERY_KEY)?;
        match serde_json::from_str(&json) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Discarding corrupt recovery snapshot: {}", e);
                None
            }
        }
    }

    pub fn validate(&self, snapshot: &RecoverySnapshot) -> SnapshotValidity {
        self.validate_at(snapshot, Utc::now())
    }

    /// Validation with an explicit clock, for tests.
    pub fn validate_at(&self, snapshot: &RecoverySnapshot, now: DateTime<Utc>) -> SnapshotValidity {
        if snapshot.session_id.is_empty() || !snapshot.is_recording {
            return SnapshotValidity::Incomplete;
        }

        let age = now.signed_duration_since(snapshot.last_save_at);
        if age > self.staleness {
            return SnapshotValidity::Stale { age };
        }

        SnapshotValidity::Valid
    }

    /// Remove the recovery slot. Idempotent.
    pub fn clear(&self) {
        self.storage.remove(RECOVERY_KEY);
        info!("Recovery slot cleared");
    }
}

/// What the host should do with a persisted snapshot found at startup or on a
/// visibility change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Nothing to do (no snapshot, or it belongs to a different session).
    NoOp,
    /// The live manager still owns this session (tab was only hidden);
    /// carry on without user interaction.
    ResumeSilently,
    /// A previous run left a resumable recording; ask the user to resume or
    /// discard.
    OfferRecovery,
}

/// Reconcile a *validated* persisted snapshot against the live session, if
/// any. Distinguishes a tab-visibility change (live session still present)
/// from a full reload (no live session). Pure; callers run `validate` first.
pub fn reconcile(
    persisted: Option<&RecoverySnapshot>,
    live_session_id: Option<&str>,
) -> RecoveryAction {
    match (persisted, live_session_id) {
        (None, _) => RecoveryAction::NoOp,
        (Some(snapshot), Some(live)) if snapshot.session_id == live => {
            RecoveryAction::ResumeSilently
        }
        // Snapshot from some other run while a different session is live:
        // never interrupt the live one.
        (Some(_), Some(_)) => RecoveryAction::NoOp,
        (Some(_), None) => RecoveryAction::OfferRecovery,
    }
}
