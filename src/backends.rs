//! Filesystem-backed collaborator implementations.
//!
//! Production deployments wire the engine to their own database and object
//! storage; these local backends serve development, demos and the test
//! fixtures.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::session::SessionMetadata;
use crate::store::{CallRecordStore, CallRecordUpdate, ObjectStore};

#[derive(Debug, Serialize, Deserialize)]
struct CallRecord {
    session_id: String,
    metadata: SessionMetadata,
    created_at: DateTime<Utc>,
    total_chunks: u32,
    chunks_uploaded: u32,
    complete: bool,
    duration_secs: f64,
}

/// Call records as JSON files, one per session.
pub struct FsCallRecordStore {
    dir: PathBuf,
}

impl FsCallRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).context("Failed to create call record directory")?;
        Ok(Self { dir })
    }

    fn record_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", session_id))
    }

    async fn read_record(&self, session_id: &str) -> Result<CallRecord> {
        let json = tokio::fs::read_to_string(self.record_path(session_id))
            .await
            .with_context(|| format!("Call record {} not found", session_id))?;
        serde_json::from_str(&json).context("Failed to parse call record")
    }

    async fn write_record(&self, record: &CallRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(self.record_path(&record.session_id), json)
            .await
            .context("Failed to write call record")
    }
}

#[async_trait]
impl CallRecordStore for FsCallRecordStore {
    async fn create_call_record(&self, metadata: &SessionMetadata) -> Result<String> {
        let session_id = format!("call-{}", uuid::Uuid::new_v4());
        let record = CallRecord {
            session_id: session_id.clone(),
            metadata: metadata.clone(),
            created_at: Utc::now(),
            total_chunks: 0,
            chunks_uploaded: 0,
            complete: false,
            duration_secs: 0.0,
        };
        self.write_record(&record).await?;
        info!("Call record created at {:?}", self.record_path(&session_id));
        Ok(session_id)
    }

    async fn update_call_record(&self, session_id: &str, update: CallRecordUpdate) -> Result<()> {
        let mut record = self.read_record(session_id).await?;
        if let Some(total) = update.total_chunks {
            record.total_chunks = total;
        }
        if let Some(uploaded) = update.chunks_uploaded {
            record.chunks_uploaded = uploaded;
        }
        if let Some(complete) = update.complete {
            record.complete = complete;
        }
        if let Some(duration) = update.duration_secs {
            record.duration_secs = duration;
        }
        self.write_record(&record).await
    }

    async fn delete_call_record(&self, session_id: &str) -> Result<()> {
        tokio::fs::remove_file(self.record_path(session_id))
            .await
            .with_context(|| format!("Failed to delete call record {}", session_id))
    }
}

/// Chunk payloads as files under `<dir>/<session_id>/`.
pub struct FsObjectStore {
    dir: PathBuf,
}

impl FsObjectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).context("Failed to create object store directory")?;
        Ok(Self { dir })
    }

    fn full_path(&self, file_path: &str) -> PathBuf {
        self.dir.join(file_path)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn upload_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        bytes: &[u8],
    ) -> Result<String> {
        let file_path = format!("{}/chunk-{:03}.wav", session_id, chunk_number);
        let full = self.full_path(&file_path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .with_context(|| format!("Failed to store chunk at {:?}", full))?;
        Ok(file_path)
    }

    async fn chunk_exists(&self, session_id: &str, chunk_number: u32) -> Result<bool> {
        let file_path = format!("{}/chunk-{:03}.wav", session_id, chunk_number);
        Ok(tokio::fs::try_exists(self.full_path(&file_path)).await?)
    }

    async fn download_chunk(&self, file_path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.full_path(file_path))
            .await
            .with_context(|| format!("Chunk not found: {}", file_path))
    }

    async fn create_signed_url(&self, file_path: &str, ttl_secs: u64) -> Result<String> {
        // Local files need no signing; encode the TTL for interface parity
        let full = self.full_path(file_path);
        Ok(format!("file://{}?ttl={}", full.display(), ttl_secs))
    }

    async fn delete_chunk(&self, file_path: &str) -> Result<()> {
        tokio::fs::remove_file(self.full_path(file_path))
            .await
            .with_context(|| format!("Failed to delete chunk {}", file_path))
    }
}
