use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::segment::SealedChunk;
use crate::store::{CallRecordStore, CallRecordUpdate, ObjectStore};

/// Upload lifecycle of a single chunk.
///
/// `Pending -> Uploading -> Uploaded | Failed`; `Failed` is terminal for
/// automatic retry and only returns to `Pending` via `retry_failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Uploading,
    Uploaded,
    Failed,
}

/// Upload retry policy. Both knobs are product configuration, not constants.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Automatic attempts per chunk before it is permanently failed
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts
    pub backoff_base: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Aggregate view of the queue, cheap to compute and never blocking.
#[derive(Debug, Clone, Default)]
pub struct UploadCounts {
    pub total: u32,
    pub uploaded: u32,
    pub failed: u32,
    /// Pending or currently uploading
    pub in_flight: u32,
    pub error_message: Option<String>,
}

struct Slot {
    status: UploadStatus,
    retry_count: u32,
    file_path: Option<String>,
    /// Payload, held until the chunk is uploaded. Kept for failed chunks so
    /// an explicit retry can re-attempt them.
    bytes: Option<Arc<Vec<u8>>>,
}

/// Background upload queue: durably gets every sealed chunk into the object
/// store, independent of whether capture is still running.
///
/// Chunks upload concurrently and may complete out of order; completeness is
/// only ever judged by full coverage of chunk numbers (`is_complete`). Upload
/// errors never escape `enqueue`: they are retried with backoff up to the cap
/// and then surfaced through `counts().error_message`.
pub struct UploadQueue {
    session_id: String,
    object_store: Arc<dyn ObjectStore>,
    records: Arc<dyn CallRecordStore>,
    config: UploadConfig,
    slots: Mutex<BTreeMap<u32, Slot>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl UploadQueue {
    pub fn new(
        session_id: String,
        object_store: Arc<dyn ObjectStore>,
        records: Arc<dyn CallRecordStore>,
        config: UploadConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            session_id,
            object_store,
            records,
            config,
            slots: Mutex::new(BTreeMap::new()),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Accept a sealed chunk and begin uploading in the background.
    /// Non-blocking with respect to ongoing capture.
    pub fn enqueue(self: &Arc<Self>, chunk: SealedChunk) {
        let chunk_number = chunk.chunk_number;
        let bytes = Arc::new(chunk.wav_bytes);

        {
            let mut slots = self.slots.lock().unwrap();
            if slots.contains_key(&chunk_number) {
                warn!("Chunk {} already enqueued, ignoring duplicate", chunk_number);
                return;
            }
            slots.insert(
                chunk_number,
                Slot {
                    status: UploadStatus::Pending,
                    retry_count: 0,
                    file_path: None,
                    bytes: Some(Arc::clone(&bytes)),
                },
            );
        }

        info!(
            "Chunk {} enqueued for upload ({} bytes)",
            chunk_number,
            bytes.len()
        );

        self.spawn_upload(chunk_number, bytes);
    }

    /// Reset every permanently failed chunk to `Pending` and re-attempt, with
    /// a fresh retry budget. Explicit, user-initiated; returns how many chunks
    /// were re-queued.
    pub fn retry_failed(self: &Arc<Self>) -> u32 {
        let retryable: Vec<(u32, Arc<Vec<u8>>)> = {
            let mut slots = self.slots.lock().unwrap();
            slots
                .iter_mut()
                .filter(|(_, slot)| slot.status == UploadStatus::Failed)
                .filter_map(|(&number, slot)| {
                    let bytes = slot.bytes.clone()?;
                    slot.status = UploadStatus::Pending;
                    slot.retry_count = 0;
                    Some((number, bytes))
                })
                .collect()
        };

        let count = retryable.len() as u32;
        if count > 0 {
            info!("Retrying {} failed chunk(s)", count);
        }

        for (chunk_number, bytes) in retryable {
            self.spawn_upload(chunk_number, bytes);
        }

        count
    }

    /// True only when every chunk number in `0..total_chunks` is `Uploaded`.
    /// Out-of-order completion is fine; gaps are never complete.
    pub fn is_complete(&self, total_chunks: u32) -> bool {
        self.covers(0..total_chunks)
    }

    /// Coverage check over an explicit range of chunk numbers. Restored
    /// sessions gate on the chunks owned by this process.
    pub fn covers(&self, range: std::ops::Range<u32>) -> bool {
        let slots = self.slots.lock().unwrap();
        range.into_iter().all(|n| {
            slots
                .get(&n)
                .map_or(false, |slot| slot.status == UploadStatus::Uploaded)
        })
    }

    pub fn counts(&self) -> UploadCounts {
        let slots = self.slots.lock().unwrap();

        let mut counts = UploadCounts {
            total: slots.len() as u32,
            ..Default::default()
        };
        let mut failed_numbers = Vec::new();

        for (&number, slot) in slots.iter() {
            match slot.status {
                UploadStatus::Uploaded => counts.uploaded += 1,
                UploadStatus::Failed => {
                    counts.failed += 1;
                    failed_numbers.push(number.to_string());
                }
                UploadStatus::Pending | UploadStatus::Uploading => counts.in_flight += 1,
            }
        }

        if !failed_numbers.is_empty() {
            counts.error_message = Some(format!(
                "chunk(s) {} failed to upload after {} attempts; retry available",
                failed_numbers.join(", "),
                self.config.max_retries
            ));
        }

        counts
    }

    /// Status of one chunk, if known.
    pub fn status_of(&self, chunk_number: u32) -> Option<UploadStatus> {
        self.slots.lock().unwrap().get(&chunk_number).map(|s| s.status)
    }

    /// Remote object keys of every uploaded chunk (used when a recording is
    /// deleted).
    pub fn uploaded_paths(&self) -> Vec<String> {
        self.slots
            .lock()
            .unwrap()
            .values()
            .filter_map(|slot| slot.file_path.clone())
            .collect()
    }

    /// Abort all in-flight upload tasks. Results of abandoned uploads are
    /// ignored; used only when the recording is deleted.
    pub fn abandon(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    fn spawn_upload(self: &Arc<Self>, chunk_number: u32, bytes: Arc<Vec<u8>>) {
        let queue = Arc::clone(self);
        let handle = tokio::spawn(async move {
            queue.run_upload(chunk_number, bytes).await;
        });

        let mut tasks = self.tasks.lock().unwrap();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    async fn run_upload(self: Arc<Self>, chunk_number: u32, bytes: Arc<Vec<u8>>) {
        loop {
            self.set_status(chunk_number, UploadStatus::Uploading);

            match self
                .object_store
                .upload_chunk(&self.session_id, chunk_number, &bytes)
                .await
            {
                Ok(file_path) => {
                    let uploaded = {
                        let mut slots = self.slots.lock().unwrap();
                        if let Some(slot) = slots.get_mut(&chunk_number) {
                            slot.status = UploadStatus::Uploaded;
                            slot.file_path = Some(file_path.clone());
                            slot.bytes = None; // payload no longer needed
                        }
                        slots
                            .values()
                            .filter(|s| s.status == UploadStatus::Uploaded)
                            .count() as u32
                    };

                    info!("Chunk {} uploaded to {}", chunk_number, file_path);
                    self.report_progress(uploaded).await;
                    return;
                }
                Err(e) => {
                    let attempts = {
                        let mut slots = self.slots.lock().unwrap();
                        match slots.get_mut(&chunk_number) {
                            Some(slot) => {
                                slot.retry_count += 1;
                                if slot.retry_count >= self.config.max_retries {
                                    slot.status = UploadStatus::Failed;
                                } else {
                                    slot.status = UploadStatus::Pending;
                                }
                                slot.retry_count
                            }
                            None => return, // slot removed, session deleted
                        }
                    };

                    if attempts >= self.config.max_retries {
                        error!(
                            "Chunk {} permanently failed after {} attempts: {}",
                            chunk_number, attempts, e
                        );
                        return;
                    }

                    let delay = backoff_delay(self.config.backoff_base, attempts);
                    warn!(
                        "Chunk {} upload attempt {} failed: {} (retrying in {:?})",
                        chunk_number, attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn set_status(&self, chunk_number: u32, status: UploadStatus) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(&chunk_number) {
            slot.status = status;
        }
    }

    async fn report_progress(&self, uploaded: u32) {
        let update = CallRecordUpdate {
            chunks_uploaded: Some(uploaded),
            ..Default::default()
        };
        if let Err(e) = self
            .records
            .update_call_record(&self.session_id, update)
            .await
        {
            // Progress reporting is best-effort; the coverage check is local
            warn!("Failed to report upload progress: {}", e);
        }
    }
}

/// Exponential backoff, doubled per attempt, capped at 64x the base.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(6);
    base.saturating_mul(factor)
}
