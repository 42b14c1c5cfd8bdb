use serde::Serialize;

use super::manager::SessionState;

/// Read-only aggregate snapshot of the session, projected from current chunk
/// states. Cheap to compute; never blocks.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingProgress {
    pub session_id: Option<String>,
    pub state: SessionState,
    /// Number of the chunk currently being captured (or the last one sealed)
    pub current_chunk: u32,
    /// Chunks sealed or in progress so far
    pub total_chunks: u32,
    pub chunks_uploaded: u32,
    pub chunks_failed: u32,
    pub is_recording: bool,
    pub is_complete: bool,
    pub total_duration_secs: f64,
    /// Normalized input amplitude, 0-100
    pub input_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RecordingProgress {
    pub(crate) fn idle(state: SessionState) -> Self {
        Self {
            session_id: None,
            state,
            current_chunk: 0,
            total_chunks: 0,
            chunks_uploaded: 0,
            chunks_failed: 0,
            is_recording: false,
            is_complete: false,
            total_duration_secs: 0.0,
            input_level: 0,
            error_message: None,
        }
    }
}

/// Result of `stop()`: how the session finalized.
#[derive(Debug, Clone, Serialize)]
pub struct StopSummary {
    pub session_id: String,
    pub total_chunks: u32,
    pub chunks_uploaded: u32,
    pub chunks_failed: u32,
    pub total_duration_secs: f64,
    /// True when the finalize wait timed out with uploads still in flight.
    /// The recording is still usable; some chunks may land later.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
