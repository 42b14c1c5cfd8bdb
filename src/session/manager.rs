use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::config::{RecorderConfig, SessionMetadata};
use super::progress::{RecordingProgress, StopSummary};
use crate::capture::CaptureSource;
use crate::error::{RecorderError, Result};
use crate::persist::{reconcile, RecoveryAction, RecoverySnapshot, RecoveryStore};
use crate::segment::Segmenter;
use crate::store::{CallRecordStore, CallRecordUpdate, ObjectStore};
use crate::upload::UploadQueue;

/// Session lifecycle state.
///
/// `Idle -> Capturing <-> Paused -> Finalizing -> Complete`; any state may
/// reach `Failed` on unrecoverable error; `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Capturing,
    Paused,
    Finalizing,
    Complete,
    Failed,
    Deleted,
}

impl SessionState {
    fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Capturing | SessionState::Paused | SessionState::Finalizing
        )
    }
}

/// Per-session state shared between the manager and its capture task.
struct SessionShared {
    session_id: String,
    patient_name: String,
    started_at: DateTime<Utc>,
    /// Signals the capture loop to stop consuming frames
    capturing: AtomicBool,
    /// Milliseconds of audio captured, monotonic while capturing
    duration_ms: AtomicU64,
    /// Number the next sealed chunk will carry
    next_chunk: AtomicU32,
    /// First chunk number owned by this process (non-zero after a restore)
    first_chunk: u32,
    /// Total chunk count, fixed at stop time
    final_chunks: AtomicU32,
    /// Full coverage reached at stop
    completed: AtomicBool,
    queue: Arc<UploadQueue>,
    segmenter: Mutex<Segmenter>,
    capture_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionShared {
    fn snapshot(&self, resumable: bool) -> RecoverySnapshot {
        RecoverySnapshot {
            session_id: self.session_id.clone(),
            is_recording: resumable,
            started_at: self.started_at,
            last_save_at: Utc::now(),
            // Clamped to the restore seed: before the first frame flows the
            // mirror still reads the segmenter's pre-frame value, one short
            // of "open chunk + 1"
            current_chunk_number: self
                .next_chunk
                .load(Ordering::SeqCst)
                .saturating_sub(1)
                .max(self.first_chunk),
            total_chunks: self.first_chunk + self.queue.counts().total,
            total_duration_secs: self.duration_ms.load(Ordering::SeqCst) as f64 / 1000.0,
            patient_name: self.patient_name.clone(),
        }
    }
}

/// Orchestrates capture, segmentation, upload, and recovery persistence for a
/// single recording session. The only component the host touches.
///
/// One manager per device: the capture source and the recovery slot are both
/// singleton resources. Lifecycle operations are serialized against each
/// other; a second operation issued while one is in flight waits rather than
/// interleaving state transitions.
pub struct RecordingManager {
    config: RecorderConfig,
    records: Arc<dyn CallRecordStore>,
    object_store: Arc<dyn ObjectStore>,
    recovery: Arc<RecoveryStore>,
    capture: Mutex<Box<dyn CaptureSource>>,
    /// Serializes start/pause/resume/stop/restore/delete
    op_lock: Mutex<()>,
    state: Arc<StdMutex<SessionState>>,
    active: StdMutex<Option<Arc<SessionShared>>>,
}

impl RecordingManager {
    pub fn new(
        config: RecorderConfig,
        records: Arc<dyn CallRecordStore>,
        object_store: Arc<dyn ObjectStore>,
        recovery: RecoveryStore,
        capture: Box<dyn CaptureSource>,
    ) -> Self {
        Self {
            config,
            records,
            object_store,
            recovery: Arc::new(recovery),
            capture: Mutex::new(capture),
            op_lock: Mutex::new(()),
            state: Arc::new(StdMutex::new(SessionState::Idle)),
            active: StdMutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap() = state;
    }

    fn shared(&self) -> Option<Arc<SessionShared>> {
        self.active.lock().unwrap().clone()
    }

    /// Start a new recording session. Fails with `InvalidInput` on missing
    /// metadata, `AlreadyActive` if a session is running; capture acquisition
    /// failures roll back the created call record so nothing partially-started
    /// survives.
    pub async fn start(&self, metadata: SessionMetadata) -> Result<String> {
        let _op = self.op_lock.lock().await;

        if metadata.patient_name.trim().is_empty() {
            return Err(RecorderError::InvalidInput(
                "patient name is required".to_string(),
            ));
        }
        if self.state().is_active() {
            return Err(RecorderError::AlreadyActive);
        }

        let session_id = self.records.create_call_record(&metadata).await?;
        info!("Call record created: {}", session_id);

        let rx = {
            let mut capture = self.capture.lock().await;
            match capture.acquire().await {
                Ok(rx) => rx,
                Err(e) => {
                    // Roll back so the failed start leaves no trace
                    if let Err(del) = self.records.delete_call_record(&session_id).await {
                        warn!("Failed to roll back call record {}: {}", session_id, del);
                    }
                    return Err(e);
                }
            }
        };

        let queue = UploadQueue::new(
            session_id.clone(),
            Arc::clone(&self.object_store),
            Arc::clone(&self.records),
            self.config.upload.clone(),
        );

        let shared = Arc::new(SessionShared {
            session_id: session_id.clone(),
            patient_name: metadata.patient_name.clone(),
            started_at: Utc::now(),
            capturing: AtomicBool::new(true),
            duration_ms: AtomicU64::new(0),
            next_chunk: AtomicU32::new(0),
            first_chunk: 0,
            final_chunks: AtomicU32::new(0),
            completed: AtomicBool::new(false),
            queue,
            segmenter: Mutex::new(Segmenter::new(
                session_id.clone(),
                self.config.chunk_duration,
            )),
            capture_task: Mutex::new(None),
        });

        self.spawn_capture_loop(&shared, rx).await;

        *self.active.lock().unwrap() = Some(Arc::clone(&shared));
        self.set_state(SessionState::Capturing);
        self.recovery.save(&shared.snapshot(true));

        info!("Recording session started: {}", session_id);
        Ok(session_id)
    }

    /// Pause capture. Queued and in-flight uploads continue untouched.
    pub async fn pause(&self) -> Result<()> {
        let _op = self.op_lock.lock().await;

        if self.state() != SessionState::Capturing {
            return Err(RecorderError::InvalidState { state: self.state() });
        }
        let shared = self
            .shared()
            .ok_or(RecorderError::InvalidState { state: self.state() })?;

        self.halt_capture(&shared).await;
        self.set_state(SessionState::Paused);
        self.recovery.save(&shared.snapshot(true));

        info!("Recording paused: {}", shared.session_id);
        Ok(())
    }

    /// Resume from pause. Chunk numbering continues where it left off.
    pub async fn resume(&self) -> Result<()> {
        let _op = self.op_lock.lock().await;

        if self.state() != SessionState::Paused {
            return Err(RecorderError::InvalidState { state: self.state() });
        }
        let shared = self
            .shared()
            .ok_or(RecorderError::InvalidState { state: self.state() })?;

        let rx = self.capture.lock().await.acquire().await?;
        shared.capturing.store(true, Ordering::SeqCst);
        self.spawn_capture_loop(&shared, rx).await;
        self.set_state(SessionState::Capturing);

        info!("Recording resumed: {}", shared.session_id);
        Ok(())
    }

    /// Stop the session: seal the partial chunk, release capture, then wait
    /// (bounded) for outstanding uploads. A timeout yields degraded completion
    /// with a warning, never a hard failure.
    pub async fn stop(&self) -> Result<StopSummary> {
        let _op = self.op_lock.lock().await;

        let state = self.state();
        if !matches!(state, SessionState::Capturing | SessionState::Paused) {
            return Err(RecorderError::InvalidState { state });
        }
        let shared = self
            .shared()
            .ok_or(RecorderError::InvalidState { state })?;

        if state == SessionState::Capturing {
            self.halt_capture(&shared).await;
        }
        self.set_state(SessionState::Finalizing);

        let total_chunks = {
            let mut segmenter = shared.segmenter.lock().await;
            let sealed = match segmenter.finalize() {
                Ok(sealed) => sealed,
                Err(e) => {
                    // Unrecoverable; land in Failed so delete still works
                    error!("Failed to seal final chunk: {}", e);
                    self.set_state(SessionState::Failed);
                    return Err(e.into());
                }
            };
            if let Some(chunk) = sealed {
                shared.queue.enqueue(chunk);
            }
            segmenter.next_chunk_number()
        };
        shared.final_chunks.store(total_chunks, Ordering::SeqCst);

        let duration_secs = shared.duration_ms.load(Ordering::SeqCst) as f64 / 1000.0;
        let update = CallRecordUpdate {
            total_chunks: Some(total_chunks),
            duration_secs: Some(duration_secs),
            ..Default::default()
        };
        if let Err(e) = self
            .records
            .update_call_record(&shared.session_id, update)
            .await
        {
            warn!("Failed to record final chunk count: {}", e);
        }

        // Chunks sealed before a crash were enqueued by the previous process;
        // their upload state is unknowable locally, so check the store.
        let missing_prior = self.missing_prior_chunks(&shared).await;

        // Bounded wait: all chunks uploaded, or the timeout elapses and the
        // session completes anyway with a warning.
        let deadline = Instant::now() + self.config.finalize_timeout;
        let local_covered = loop {
            if shared.queue.covers(shared.first_chunk..total_chunks) {
                break true;
            }
            if Instant::now() >= deadline {
                break false;
            }
            tokio::time::sleep(self.config.finalize_poll_interval).await;
        };
        let covered = local_covered && missing_prior.is_empty();

        let counts = shared.queue.counts();
        let uploaded = shared.first_chunk - missing_prior.len() as u32 + counts.uploaded;

        let warning = if covered {
            shared.completed.store(true, Ordering::SeqCst);
            let update = CallRecordUpdate {
                complete: Some(true),
                chunks_uploaded: Some(uploaded),
                ..Default::default()
            };
            if let Err(e) = self
                .records
                .update_call_record(&shared.session_id, update)
                .await
            {
                warn!("Failed to mark call record complete: {}", e);
            }
            None
        } else {
            let mut problems = Vec::new();
            if !missing_prior.is_empty() {
                let numbers: Vec<String> =
                    missing_prior.iter().map(|n| n.to_string()).collect();
                problems.push(format!(
                    "chunk(s) {} recorded before recovery are missing from storage",
                    numbers.join(", ")
                ));
            }
            if !local_covered {
                problems.push(format!(
                    "finalization timed out; {} chunk(s) may still be uploading",
                    counts.total - counts.uploaded
                ));
            }
            let warning = problems.join("; ");
            warn!(
                "Recording {} finished incomplete: {}",
                shared.session_id, warning
            );
            Some(warning)
        };

        // The session is over either way; never offer to resume it.
        self.recovery.clear();
        self.set_state(SessionState::Complete);

        info!(
            "Recording session stopped: {} ({} chunks, {:.1}s, degraded={})",
            shared.session_id,
            total_chunks,
            duration_secs,
            !covered
        );

        Ok(StopSummary {
            session_id: shared.session_id.clone(),
            total_chunks,
            chunks_uploaded: uploaded,
            chunks_failed: counts.failed,
            total_duration_secs: duration_secs,
            degraded: !covered,
            warning,
        })
    }

    /// Re-enter `Capturing` from a validated recovery snapshot without a new
    /// call record. Capture acquisition failures propagate (snapshot left in
    /// place) so the host can offer resume-vs-discard.
    pub async fn restore_from_persisted(&self, snapshot: &RecoverySnapshot) -> Result<()> {
        let _op = self.op_lock.lock().await;

        if self.state().is_active() {
            return Err(RecorderError::AlreadyActive);
        }
        let validity = self.recovery.validate(snapshot);
        if let Some(reason) = validity.rejection_reason() {
            return Err(RecorderError::InvalidInput(format!(
                "snapshot not resumable: {}",
                reason
            )));
        }

        let rx = self.capture.lock().await.acquire().await?;

        // The chunk that was open at the crash was lost with the process, so
        // capture re-records its number.
        let first_chunk = snapshot.current_chunk_number;
        let elapsed = std::time::Duration::from_secs_f64(snapshot.total_duration_secs.max(0.0));

        let queue = UploadQueue::new(
            snapshot.session_id.clone(),
            Arc::clone(&self.object_store),
            Arc::clone(&self.records),
            self.config.upload.clone(),
        );

        let shared = Arc::new(SessionShared {
            session_id: snapshot.session_id.clone(),
            patient_name: snapshot.patient_name.clone(),
            started_at: snapshot.started_at,
            capturing: AtomicBool::new(true),
            duration_ms: AtomicU64::new((snapshot.total_duration_secs * 1000.0) as u64),
            next_chunk: AtomicU32::new(first_chunk),
            first_chunk,
            final_chunks: AtomicU32::new(0),
            completed: AtomicBool::new(false),
            queue,
            segmenter: Mutex::new(
                Segmenter::new(snapshot.session_id.clone(), self.config.chunk_duration)
                    .resume_from(first_chunk, elapsed),
            ),
            capture_task: Mutex::new(None),
        });

        self.spawn_capture_loop(&shared, rx).await;

        *self.active.lock().unwrap() = Some(Arc::clone(&shared));
        self.set_state(SessionState::Capturing);
        self.recovery.save(&shared.snapshot(true));

        info!(
            "Recording session restored: {} (continuing from chunk {})",
            shared.session_id, first_chunk
        );
        Ok(())
    }

    /// Re-queue permanently failed chunks, once per call.
    pub fn retry_failed_chunks(&self) -> Result<u32> {
        match self.shared() {
            Some(shared) => Ok(shared.queue.retry_failed()),
            None => Err(RecorderError::InvalidState { state: self.state() }),
        }
    }

    /// Purge all chunk objects and the call record. Invalid while capturing;
    /// in-flight uploads are abandoned and their results ignored.
    pub async fn delete_recording(&self) -> Result<()> {
        let _op = self.op_lock.lock().await;

        let state = self.state();
        if state == SessionState::Capturing {
            return Err(RecorderError::InvalidState { state });
        }

        if let Some(shared) = self.shared() {
            shared.queue.abandon();
            self.halt_capture(&shared).await;

            for path in shared.queue.uploaded_paths() {
                if let Err(e) = self.object_store.delete_chunk(&path).await {
                    warn!("Failed to delete chunk object {}: {}", path, e);
                }
            }

            self.records
                .delete_call_record(&shared.session_id)
                .await?;
            info!("Recording deleted: {}", shared.session_id);
        }

        self.recovery.clear();
        *self.active.lock().unwrap() = None;
        self.set_state(SessionState::Deleted);
        Ok(())
    }

    /// Aggregate progress snapshot. Sync; never blocks on async work.
    pub fn progress(&self) -> RecordingProgress {
        let state = self.state();
        let shared = match self.shared() {
            Some(shared) => shared,
            None => return RecordingProgress::idle(state),
        };

        let counts = shared.queue.counts();
        let next_chunk = shared.next_chunk.load(Ordering::SeqCst);

        RecordingProgress {
            session_id: Some(shared.session_id.clone()),
            state,
            current_chunk: next_chunk.saturating_sub(1).max(shared.first_chunk),
            total_chunks: next_chunk.max(shared.first_chunk + counts.total),
            chunks_uploaded: counts.uploaded,
            chunks_failed: counts.failed,
            is_recording: state == SessionState::Capturing,
            is_complete: shared.completed.load(Ordering::SeqCst),
            total_duration_secs: shared.duration_ms.load(Ordering::SeqCst) as f64 / 1000.0,
            input_level: self.input_level(),
            error_message: counts.error_message,
        }
    }

    /// Current input level for meters, 0-100.
    pub fn input_level(&self) -> u8 {
        match self.capture.try_lock() {
            Ok(capture) => capture.level(),
            Err(_) => 0,
        }
    }

    /// Load the persisted recovery snapshot, if any survives validation.
    /// Corrupt or stale snapshots count as absence; stale ones are cleared.
    pub fn load_recoverable(&self) -> Option<RecoverySnapshot> {
        let snapshot = self.recovery.load()?;
        let validity = self.recovery.validate(&snapshot);
        if validity.is_valid() {
            Some(snapshot)
        } else {
            info!(
                "Ignoring persisted snapshot: {}",
                validity.rejection_reason().unwrap_or_default()
            );
            None
        }
    }

    /// What to do with the persisted snapshot given the live session, per the
    /// reconcile rules: hidden-tab wakeups resume silently, full reloads get a
    /// recovery prompt.
    pub fn reconcile_persisted(&self) -> RecoveryAction {
        let snapshot = self.load_recoverable();
        let live = self
            .shared()
            .filter(|_| self.state().is_active())
            .map(|s| s.session_id.clone());
        reconcile(snapshot.as_ref(), live.as_deref())
    }

    /// Discard the persisted snapshot (user chose not to resume).
    pub fn discard_persisted(&self) {
        self.recovery.clear();
    }

    // Host lifecycle hooks. The embedding layer wires these to whatever event
    // system it has (timers, visibility changes, teardown).

    /// Periodic tick while the host is foregrounded.
    pub fn on_tick(&self) {
        if let Some(shared) = self.shared() {
            if self.state().is_active() {
                self.recovery.save(&shared.snapshot(true));
            }
        }
    }

    /// Host became hidden/backgrounded: persist immediately.
    pub fn on_hidden(&self) {
        self.on_tick();
    }

    /// Best-effort cleanup before the host tears down: release the microphone
    /// and leave a fresh snapshot for the next launch to offer.
    pub async fn on_before_teardown(&self) {
        if let Some(shared) = self.shared() {
            if self.state().is_active() {
                self.recovery.save(&shared.snapshot(true));
            }
            shared.capturing.store(false, Ordering::SeqCst);
        }
        self.capture.lock().await.release();
    }

    /// Chunk numbers below the restore seed that are absent from the object
    /// store. Empty for sessions started in this process.
    async fn missing_prior_chunks(&self, shared: &Arc<SessionShared>) -> Vec<u32> {
        let mut missing = Vec::new();
        for number in 0..shared.first_chunk {
            match self
                .object_store
                .chunk_exists(&shared.session_id, number)
                .await
            {
                Ok(true) => {}
                Ok(false) => missing.push(number),
                Err(e) => {
                    warn!("Could not verify chunk {} in storage: {}", number, e);
                    missing.push(number);
                }
            }
        }
        missing
    }

    /// Stop the capture loop and release the input device.
    async fn halt_capture(&self, shared: &Arc<SessionShared>) {
        shared.capturing.store(false, Ordering::SeqCst);
        self.capture.lock().await.release();

        let task = shared.capture_task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!("Capture task panicked: {}", e);
                }
            }
        }
    }

    async fn spawn_capture_loop(
        &self,
        shared: &Arc<SessionShared>,
        mut rx: tokio::sync::mpsc::Receiver<crate::capture::AudioFrame>,
    ) {
        let shared_task = Arc::clone(shared);
        let recovery = Arc::clone(&self.recovery);
        let state = Arc::clone(&self.state);

        let task = tokio::spawn(async move {
            info!("Capture loop started: {}", shared_task.session_id);

            while let Some(frame) = rx.recv().await {
                if !shared_task.capturing.load(Ordering::SeqCst) {
                    break;
                }

                let sealed = {
                    let mut segmenter = shared_task.segmenter.lock().await;
                    let result = segmenter.push_frame(&frame);
                    shared_task
                        .duration_ms
                        .store(segmenter.elapsed_ms(), Ordering::SeqCst);
                    shared_task
                        .next_chunk
                        .store(segmenter.next_chunk_number(), Ordering::SeqCst);
                    result
                };

                match sealed {
                    Ok(Some(chunk)) => {
                        shared_task.queue.enqueue(chunk);
                        // Chunk boundary: refresh the recovery slot
                        recovery.save(&shared_task.snapshot(true));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Chunk sealing failed, session unrecoverable: {}", e);
                        shared_task.capturing.store(false, Ordering::SeqCst);
                        *state.lock().unwrap() = SessionState::Failed;
                        break;
                    }
                }
            }

            info!("Capture loop stopped: {}", shared_task.session_id);
        });

        *shared.capture_task.lock().await = Some(task);
    }
}
