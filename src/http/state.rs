use crate::session::RecordingManager;
use crate::transcribe::TranscriptionClient;
use std::sync::Arc;

/// Shared application state for HTTP handlers
///
/// The manager is a device-level singleton: the microphone and the recovery
/// slot only support one session at a time.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RecordingManager>,
    /// Transcription trigger, invoked after a stop reports full coverage.
    /// `None` when NATS is not configured.
    pub transcription: Option<Arc<TranscriptionClient>>,
}

impl AppState {
    pub fn new(manager: Arc<RecordingManager>) -> Self {
        Self {
            manager,
            transcription: None,
        }
    }

    pub fn with_transcription(mut self, client: Arc<TranscriptionClient>) -> Self {
        self.transcription = Some(client);
        self
    }
}
