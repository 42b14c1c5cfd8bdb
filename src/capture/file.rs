use super::source::{AudioFrame, CaptureSource, LevelMeter};
use crate::error::{RecorderError, Result};
use anyhow::Context;
use hound::WavReader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// WAV-file-backed capture source.
///
/// Stands in for a live microphone during batch processing, demos, and tests.
/// Emits the file's samples as fixed-duration frames, optionally paced in real
/// time.
pub struct FileCaptureSource {
    path: PathBuf,
    /// Frame size in milliseconds (default 100, matching live capture buffers)
    frame_duration_ms: u64,
    /// When true, frames are emitted at playback speed; when false, as fast as
    /// the receiver drains them
    realtime: bool,
    running: Arc<AtomicBool>,
    meter: LevelMeter,
    emit_task: Option<JoinHandle<()>>,
}

impl FileCaptureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame_duration_ms: 100,
            realtime: false,
            running: Arc::new(AtomicBool::new(false)),
            meter: LevelMeter::new(),
            emit_task: None,
        }
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn frame_duration_ms(mut self, ms: u64) -> Self {
        self.frame_duration_ms = ms.max(1);
        self
    }
}

#[async_trait::async_trait]
impl CaptureSource for FileCaptureSource {
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        // Re-acquire after release is allowed; holding while active is not.
        self.release();

        let reader = WavReader::open(&self.path).map_err(|e| {
            warn!("Failed to open capture file {}: {}", self.path.display(), e);
            RecorderError::DeviceUnavailable
        })?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read samples from {}", self.path.display()))?;

        info!(
            "File capture source acquired: {} ({}Hz, {}ch, {} samples)",
            self.path.display(),
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        let samples_per_frame =
            (spec.sample_rate as u64 * spec.channels as u64 * self.frame_duration_ms / 1000) as usize;
        let samples_per_frame = samples_per_frame.max(1);

        let (tx, rx) = mpsc::channel(100);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);
        let meter = self.meter.clone();
        let frame_duration_ms = self.frame_duration_ms;
        let realtime = self.realtime;

        let task = tokio::spawn(async move {
            let mut timestamp_ms = 0u64;

            for window in samples.chunks(samples_per_frame) {
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let frame = AudioFrame {
                    samples: window.to_vec(),
                    sample_rate: spec.sample_rate,
                    channels: spec.channels,
                    timestamp_ms,
                };
                meter.update(&frame);
                timestamp_ms += frame_duration_ms;

                if tx.send(frame).await.is_err() {
                    break; // receiver dropped
                }

                if realtime {
                    tokio::time::sleep(Duration::from_millis(frame_duration_ms)).await;
                }
            }

            running.store(false, Ordering::SeqCst);
            meter.reset();
        });

        self.emit_task = Some(task);
        Ok(rx)
    }

    fn release(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.emit_task.take() {
            task.abort();
        }
        self.meter.reset();
    }

    fn level(&self) -> u8 {
        self.meter.get()
    }

    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileCaptureSource {
    fn drop(&mut self) {
        self.release();
    }
}
