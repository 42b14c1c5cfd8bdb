//! Background chunk upload: per-chunk state machine, retry with backoff,
//! and the full-coverage completeness gate.

mod queue;

pub use queue::{UploadConfig, UploadCounts, UploadQueue, UploadStatus};
