//! Recording session orchestration
//!
//! This module provides the `RecordingManager` abstraction that composes:
//! - Exclusive audio capture acquisition and release
//! - Fixed-duration chunk segmentation
//! - Background chunk upload with retry
//! - Crash/reload recovery persistence
//! - The session state machine and aggregate progress

mod config;
mod manager;
mod progress;

pub use config::{RecorderConfig, SessionMetadata};
pub use manager::{RecordingManager, SessionState};
pub use progress::{RecordingProgress, StopSummary};
