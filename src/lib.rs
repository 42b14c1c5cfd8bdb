pub mod backends;
pub mod capture;
pub mod config;
pub mod error;
pub mod http;
pub mod persist;
pub mod segment;
pub mod session;
pub mod store;
pub mod transcribe;
pub mod upload;

pub use capture::{AudioFrame, CaptureSource, FileCaptureSource, LevelMeter};
pub use config::Config;
pub use error::RecorderError;
pub use http::{create_router, AppState};
pub use persist::{
    reconcile, FileStorage, LocalStorage, RecoveryAction, RecoverySnapshot, RecoveryStore,
    SnapshotValidity,
};
pub use segment::{SealedChunk, Segmenter};
pub use session::{
    RecorderConfig, RecordingManager, RecordingProgress, SessionMetadata, SessionState,
    StopSummary,
};
pub use store::{CallRecordStore, CallRecordUpdate, ObjectStore};
pub use transcribe::{TranscribeRequest, TranscriptionClient};
pub use upload::{UploadConfig, UploadCounts, UploadQueue, UploadStatus};
