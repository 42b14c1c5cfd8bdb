// Shared in-memory collaborator fakes for integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use callcapture::capture::{AudioFrame, CaptureSource};
use callcapture::error::{RecorderError, Result as EngineResult};
use callcapture::persist::LocalStorage;
use callcapture::segment::SealedChunk;
use callcapture::session::SessionMetadata;
use callcapture::store::{CallRecordStore, CallRecordUpdate, ObjectStore};

/// Object store fake. Uploads succeed instantly unless failures are scripted
/// per chunk number.
#[derive(Default)]
pub struct MemoryObjectStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_remaining: Mutex<HashMap<u32, u32>>,
    pub deleted: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `n` upload attempts for `chunk_number` fail.
    pub fn fail_next(&self, chunk_number: u32, n: u32) {
        self.fail_remaining.lock().unwrap().insert(chunk_number, n);
    }

    pub fn stored_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Pre-populate a chunk object, as if an earlier process uploaded it.
    pub fn seed_chunk(&self, session_id: &str, chunk_number: u32) {
        let path = format!("{}/chunk-{:03}.wav", session_id, chunk_number);
        self.objects.lock().unwrap().insert(path, vec![0u8; 64]);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        bytes: &[u8],
    ) -> Result<String> {
        {
            let mut failures = self.fail_remaining.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&chunk_number) {
                if *remaining > 0 {
                    *remaining -= 1;
                    bail!("injected upload failure for chunk {}", chunk_number);
                }
            }
        }

        let path = format!("{}/chunk-{:03}.wav", session_id, chunk_number);
        self.objects
            .lock()
            .unwrap()
            .insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    async fn chunk_exists(&self, session_id: &str, chunk_number: u32) -> Result<bool> {
        let path = format!("{}/chunk-{:03}.wav", session_id, chunk_number);
        Ok(self.objects.lock().unwrap().contains_key(&path))
    }

    async fn download_chunk(&self, file_path: &str) -> Result<Vec<u8>> {
        match self.objects.lock().unwrap().get(file_path) {
            Some(bytes) => Ok(bytes.clone()),
            None => bail!("chunk not found: {}", file_path),
        }
    }

    async fn create_signed_url(&self, file_path: &str, ttl_secs: u64) -> Result<String> {
        Ok(format!("memory://{}?ttl={}", file_path, ttl_secs))
    }

    async fn delete_chunk(&self, file_path: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(file_path);
        self.deleted.lock().unwrap().push(file_path.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordRow {
    pub total_chunks: u32,
    pub chunks_uploaded: u32,
    pub complete: bool,
    pub duration_secs: f64,
}

/// Call-record store fake with inspectable rows.
#[derive(Default)]
pub struct MemoryCallRecordStore {
    pub records: Mutex<HashMap<String, RecordRow>>,
    next_id: AtomicU32,
}

impl MemoryCallRecordStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn row(&self, session_id: &str) -> Option<RecordRow> {
        self.records.lock().unwrap().get(session_id).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl CallRecordStore for MemoryCallRecordStore {
    async fn create_call_record(&self, _metadata: &SessionMetadata) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session_id = format!("session-{}", id);
        self.records
            .lock()
            .unwrap()
            .insert(session_id.clone(), RecordRow::default());
        Ok(session_id)
    }

    async fn update_call_record(&self, session_id: &str, update: CallRecordUpdate) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let row = match records.get_mut(session_id) {
            Some(row) => row,
            None => bail!("no call record {}", session_id),
        };
        if let Some(total) = update.total_chunks {
            row.total_chunks = total;
        }
        if let Some(uploaded) = update.chunks_uploaded {
            row.chunks_uploaded = uploaded;
        }
        if let Some(complete) = update.complete {
            row.complete = complete;
        }
        if let Some(duration) = update.duration_secs {
            row.duration_secs = duration;
        }
        Ok(())
    }

    async fn delete_call_record(&self, session_id: &str) -> Result<()> {
        self.records.lock().unwrap().remove(session_id);
        Ok(())
    }
}

/// In-memory local storage with browser-local-storage semantics.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cloneable handle over a shared `MemoryStorage`, so a test can inspect and
/// seed the same slot the manager's recovery store writes.
#[derive(Clone)]
pub struct SharedStorage(pub Arc<MemoryStorage>);

impl LocalStorage for SharedStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.0.set(key, value)
    }

    fn remove(&self, key: &str) {
        self.0.remove(key)
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.values.lock().unwrap().remove(key);
    }
}

/// Counters observed by tests while the manager drives a `ScriptedCapture`.
#[derive(Default)]
pub struct CaptureProbe {
    pub acquires: AtomicU32,
    pub releases: AtomicU32,
    pub active: AtomicBool,
}

/// Capture source fake: each acquire yields a fixed run of 100ms frames, then
/// the stream ends. Tracks hardware acquire/release transitions for the
/// idempotent-release property.
pub struct ScriptedCapture {
    frames_per_acquire: usize,
    frame_ms: u64,
    sample_rate: u32,
    deny: Option<fn() -> RecorderError>,
    malformed: bool,
    pub probe: Arc<CaptureProbe>,
}

impl ScriptedCapture {
    pub fn new(frames_per_acquire: usize) -> Self {
        Self {
            frames_per_acquire,
            frame_ms: 100,
            sample_rate: 16_000,
            deny: None,
            malformed: false,
            probe: Arc::new(CaptureProbe::default()),
        }
    }

    /// Make every acquire fail, e.g. with `RecorderError::PermissionDenied`.
    pub fn denying(mut self, err: fn() -> RecorderError) -> Self {
        self.deny = Some(err);
        self
    }

    /// Emit frames with a zero audio format, which cannot be WAV-encoded.
    pub fn malformed(mut self) -> Self {
        self.malformed = true;
        self
    }

    pub fn probe(&self) -> Arc<CaptureProbe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl CaptureSource for ScriptedCapture {
    async fn acquire(&mut self) -> EngineResult<mpsc::Receiver<AudioFrame>> {
        if let Some(deny) = self.deny {
            return Err(deny());
        }

        self.probe.acquires.fetch_add(1, Ordering::SeqCst);
        self.probe.active.store(true, Ordering::SeqCst);

        let (rate, channels) = if self.malformed {
            (0, 0)
        } else {
            (self.sample_rate, 1)
        };
        let samples_per_frame = (self.sample_rate as u64 * self.frame_ms / 1000) as usize;
        let (tx, rx) = mpsc::channel(self.frames_per_acquire + 1);
        for i in 0..self.frames_per_acquire {
            let frame = AudioFrame {
                samples: vec![(i % 32) as i16 * 100; samples_per_frame],
                sample_rate: rate,
                channels,
                timestamp_ms: i as u64 * self.frame_ms,
            };
            tx.try_send(frame).expect("scripted channel sized to fit");
        }
        // Dropping the sender ends the stream after the scripted frames
        Ok(rx)
    }

    fn release(&mut self) {
        // Count only the transition that actually releases hardware
        if self.probe.active.swap(false, Ordering::SeqCst) {
            self.probe.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn level(&self) -> u8 {
        if self.probe.active.load(Ordering::SeqCst) {
            42
        } else {
            0
        }
    }

    fn is_active(&self) -> bool {
        self.probe.active.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Build a sealed chunk without running a segmenter.
pub fn make_chunk(chunk_number: u32) -> SealedChunk {
    SealedChunk {
        chunk_number,
        wav_bytes: vec![1, 2, 3, 4],
        start_ms: chunk_number as u64 * 1000,
        end_ms: (chunk_number as u64 + 1) * 1000,
        sample_rate: 16_000,
        channels: 1,
        sample_count: 16_000,
    }
}

/// Poll until `predicate` holds or `timeout` elapses; panics on timeout.
pub async fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !predicate() {
        if Instant::now() >= deadline {
            panic!("condition not reached within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
