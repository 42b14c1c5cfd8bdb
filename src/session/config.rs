use crate::upload::UploadConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Descriptive attributes of a call, passed through to the call-record store.
/// Opaque to the engine except that `patient_name` must be non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub patient_name: String,
    pub patient_id: Option<String>,
    pub center_id: Option<String>,
}

impl SessionMetadata {
    pub fn new(patient_name: impl Into<String>) -> Self {
        Self {
            patient_name: patient_name.into(),
            patient_id: None,
            center_id: None,
        }
    }
}

/// Tunable policy for the recording engine. All bounds here are product
/// choices surfaced as configuration.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Duration of each audio chunk (default: 300s = 5 minutes)
    pub chunk_duration: Duration,

    /// Upload retry policy
    pub upload: UploadConfig,

    /// How long `stop()` waits for outstanding uploads before proceeding with
    /// a degraded-completion warning
    pub finalize_timeout: Duration,

    /// Poll interval for the finalize wait loop
    pub finalize_poll_interval: Duration,

    /// Age beyond which a persisted recovery snapshot is rejected
    pub recovery_staleness: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_secs(300),
            upload: UploadConfig::default(),
            finalize_timeout: Duration::from_secs(30),
            finalize_poll_interval: Duration::from_millis(500),
            recovery_staleness: Duration::from_secs(24 * 60 * 60),
        }
    }
}
