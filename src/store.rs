use crate::session::SessionMetadata;
use anyhow::Result;
use async_trait::async_trait;

/// Partial update applied to a call record. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct CallRecordUpdate {
    pub total_chunks: Option<u32>,
    pub chunks_uploaded: Option<u32>,
    pub complete: Option<bool>,
    pub duration_secs: Option<f64>,
}

/// Remote store of call metadata rows.
///
/// Implementations live in the embedding application (database, BaaS, ...).
#[async_trait]
pub trait CallRecordStore: Send + Sync {
    /// Create a call record for a new session; returns the session ID.
    async fn create_call_record(&self, metadata: &SessionMetadata) -> Result<String>;

    /// Apply a partial update to an existing call record.
    async fn update_call_record(&self, session_id: &str, update: CallRecordUpdate) -> Result<()>;

    /// Delete the call record and its chunk rows.
    async fn delete_call_record(&self, session_id: &str) -> Result<()>;
}

/// Remote binary store for chunk payloads.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a chunk's bytes; returns the remote object key.
    async fn upload_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        bytes: &[u8],
    ) -> Result<String>;

    /// Whether a chunk object exists for this session. Used to verify chunks
    /// uploaded by a previous process before a restored session completes.
    async fn chunk_exists(&self, session_id: &str, chunk_number: u32) -> Result<bool>;

    /// Download a previously uploaded chunk.
    async fn download_chunk(&self, file_path: &str) -> Result<Vec<u8>>;

    /// Produce a time-limited access URL for a chunk.
    async fn create_signed_url(&self, file_path: &str, ttl_secs: u64) -> Result<String>;

    /// Remove an uploaded chunk object.
    async fn delete_chunk(&self, file_path: &str) -> Result<()>;
}
