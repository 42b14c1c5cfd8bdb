use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::session::RecorderConfig;
use crate::upload::UploadConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub recording: RecordingConfig,
    pub upload: UploadSettings,
    pub recovery: RecoveryConfig,
    pub storage: StorageConfig,
    pub nats: NatsConfig,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Root directory for the filesystem call-record and object backends
    pub data_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct RecordingConfig {
    pub chunk_duration_secs: u64,
    pub finalize_timeout_secs: u64,
    pub finalize_poll_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct UploadSettings {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryConfig {
    pub storage_path: String,
    pub staleness_hours: u64,
}

#[derive(Debug, Deserialize)]
pub struct NatsConfig {
    pub url: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Engine policy derived from the file settings.
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            chunk_duration: Duration::from_secs(self.recording.chunk_duration_secs),
            upload: UploadConfig {
                max_retries: self.upload.max_retries,
                backoff_base: Duration::from_millis(self.upload.backoff_base_ms),
            },
            finalize_timeout: Duration::from_secs(self.recording.finalize_timeout_secs),
            finalize_poll_interval: Duration::from_millis(self.recording.finalize_poll_interval_ms),
            recovery_staleness: Duration::from_secs(self.recovery.staleness_hours * 3600),
        }
    }
}
