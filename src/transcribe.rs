use anyhow::{Context, Result};
use async_nats::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Request for the downstream transcription/diarization worker.
///
/// Published by the application layer once a stopped session reports full
/// chunk coverage; the recording engine itself never triggers transcription.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeRequest {
    pub session_id: String,
    pub total_chunks: u32,
    pub requested_at: String, // RFC3339 timestamp
}

/// NATS publisher for transcription requests.
pub struct TranscriptionClient {
    client: Client,
}

impl TranscriptionClient {
    /// Connect to the NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }

    /// Request transcription of a fully uploaded session.
    pub async fn request_transcription(&self, session_id: &str, total_chunks: u32) -> Result<()> {
        let subject = format!("transcribe.request.{}", session_id);

        let message = TranscribeRequest {
            session_id: session_id.to_string(),
            total_chunks,
            requested_at: chrono::Utc::now().to_rfc3339(),
        };

        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish transcription request")?;

        info!(
            "Published transcription request to {} ({} chunks)",
            subject, total_chunks
        );

        Ok(())
    }
}
