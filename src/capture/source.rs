use crate::error::Result;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Playback duration of this frame in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1000 / self.sample_rate as u64
    }
}

/// Exclusive audio input source.
///
/// Implementations wrap a single hardware (or file) input. The microphone is a
/// singleton resource: only one holder at a time, and the session manager
/// guarantees `release()` before any new `acquire()`.
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Acquire the input and start producing frames.
    ///
    /// Returns a channel receiver that yields audio frames until the source is
    /// released or runs out of input. Fails with `PermissionDenied` or
    /// `DeviceUnavailable`; on failure no partially-opened track remains held.
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop all underlying tracks. Idempotent: releasing twice, or releasing a
    /// source that was never acquired, is a no-op.
    fn release(&mut self);

    /// Normalized input amplitude, 0-100. Observational only.
    fn level(&self) -> u8;

    /// Whether the source currently holds the input.
    fn is_active(&self) -> bool;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Shared input-level cell, written by capture tasks and polled by the host
/// at animation-frame cadence.
#[derive(Debug, Clone, Default)]
pub struct LevelMeter {
    level: Arc<AtomicU8>,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the meter from a frame's RMS amplitude.
    pub fn update(&self, frame: &AudioFrame) {
        self.level.store(rms_level(&frame.samples), Ordering::Relaxed);
    }

    pub fn get(&self) -> u8 {
        self.level.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.level.store(0, Ordering::Relaxed);
    }
}

/// Root-mean-square amplitude of a sample buffer, normalized to 0-100.
pub fn rms_level(samples: &[i16]) -> u8 {
    if samples.is_empty() {
        return 0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64;
            v * v
        })
        .sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();

    // Full-scale sine has RMS ~0.707 * i16::MAX; scale so it reads ~100
    let normalized = rms / (i16::MAX as f64 * std::f64::consts::FRAC_1_SQRT_2);
    (normalized * 100.0).clamp(0.0, 100.0) as u8
}
