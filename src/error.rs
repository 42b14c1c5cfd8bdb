use crate::session::SessionState;
use thiserror::Error;

/// Errors surfaced by the recording engine.
///
/// Capture and state-machine errors propagate to the caller of the triggering
/// operation. Upload failures are absorbed by the queue and only appear in the
/// aggregate progress snapshot until they become permanent.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The platform denied access to the audio input device.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// No usable audio input device exists.
    #[error("no audio input device available")]
    DeviceUnavailable,

    /// Required session metadata was missing or empty.
    #[error("invalid session metadata: {0}")]
    InvalidInput(String),

    /// A recording session is already active.
    #[error("a recording session is already active")]
    AlreadyActive,

    /// The requested operation is not permitted in the current state.
    #[error("operation not permitted while session is {state:?}")]
    InvalidState { state: SessionState },

    /// A chunk exhausted its automatic retry budget.
    #[error("chunk {chunk} failed to upload after {attempts} attempts")]
    PermanentUploadFailure { chunk: u32, attempts: u32 },

    /// A collaborator (call-record store, object store, local storage) failed.
    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
