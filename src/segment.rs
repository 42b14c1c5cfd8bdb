use anyhow::{Context, Result};
use std::io::Cursor;
use std::time::Duration;
use tracing::info;

use crate::capture::AudioFrame;

/// A finalized, independently-uploadable slice of a recording.
///
/// Sealed chunks are WAV-encoded in memory and handed to the upload queue
/// exactly once; the segmenter keeps no reference after handoff.
#[derive(Debug, Clone)]
pub struct SealedChunk {
    /// Chunk number (0-indexed, strictly increasing within a session)
    pub chunk_number: u32,
    /// WAV-encoded audio payload
    pub wav_bytes: Vec<u8>,
    /// Start time in milliseconds of captured audio since the session started
    pub start_ms: u64,
    /// End time in milliseconds of captured audio since the session started
    pub end_ms: u64,
    /// Sample rate
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Number of samples in this chunk
    pub sample_count: usize,
}

/// Splits a continuous frame stream into fixed-duration chunks.
///
/// Time is tracked from accumulated frame durations rather than frame
/// timestamps, so numbering and boundaries survive pause/resume (capture
/// sources restart their timestamps on re-acquire).
pub struct Segmenter {
    session_id: String,
    chunk_duration_ms: u64,
    current: Option<ChunkBuilder>,
    next_chunk_number: u32,
    chunks_sealed: u32,
    /// Milliseconds of audio captured so far across the whole session
    clock_ms: u64,
}

impl Segmenter {
    pub fn new(session_id: String, chunk_duration: Duration) -> Self {
        Self {
            session_id,
            chunk_duration_ms: chunk_duration.as_millis().max(1) as u64,
            current: None,
            next_chunk_number: 0,
            chunks_sealed: 0,
            clock_ms: 0,
        }
    }

    /// Seed numbering and elapsed time from a recovery snapshot so a restored
    /// session continues where the persisted one left off.
    pub fn resume_from(mut self, next_chunk_number: u32, elapsed: Duration) -> Self {
        self.next_chunk_number = next_chunk_number;
        self.clock_ms = elapsed.as_millis() as u64;
        self
    }

    /// Feed one captured frame; returns a sealed chunk when the frame crossed
    /// a chunk boundary.
    ///
    /// The boundary is atomic with respect to the frame stream: the frame that
    /// triggers rotation seals chunk `k` with everything before it and becomes
    /// the first frame of chunk `k+1`. No frame is lost or duplicated.
    pub fn push_frame(&mut self, frame: &AudioFrame) -> Result<Option<SealedChunk>> {
        let mut sealed = None;

        if self.should_rotate() {
            if let Some(builder) = self.current.take() {
                let chunk = builder.seal()?;
                info!(
                    "Chunk {} sealed: {:.1}s - {:.1}s ({} samples)",
                    chunk.chunk_number,
                    chunk.start_ms as f64 / 1000.0,
                    chunk.end_ms as f64 / 1000.0,
                    chunk.sample_count
                );
                self.chunks_sealed += 1;
                sealed = Some(chunk);
            }
            self.current = Some(self.open_chunk(frame));
        }

        self.clock_ms += frame.duration_ms();

        if let Some(builder) = &mut self.current {
            builder.append(frame, self.clock_ms);
        }

        Ok(sealed)
    }

    /// Seal whatever partial chunk is in progress. A session that captured at
    /// least one frame always yields at least one chunk, however short.
    pub fn finalize(&mut self) -> Result<Option<SealedChunk>> {
        match self.current.take() {
            Some(builder) => {
                let chunk = builder.seal()?;
                info!(
                    "Final chunk {} sealed for {}: {:.1}s - {:.1}s ({} samples)",
                    chunk.chunk_number,
                    self.session_id,
                    chunk.start_ms as f64 / 1000.0,
                    chunk.end_ms as f64 / 1000.0,
                    chunk.sample_count
                );
                self.chunks_sealed += 1;
                Ok(Some(chunk))
            }
            None => Ok(None),
        }
    }

    /// Number the next sealed chunk will carry (also the count of chunks the
    /// session will have once the open one is finalized).
    pub fn next_chunk_number(&self) -> u32 {
        self.next_chunk_number
    }

    /// Chunks sealed and handed off so far.
    pub fn chunks_sealed(&self) -> u32 {
        self.chunks_sealed
    }

    /// Milliseconds of audio captured across the whole session.
    pub fn elapsed_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn has_open_chunk(&self) -> bool {
        self.current.is_some()
    }

    fn should_rotate(&self) -> bool {
        match &self.current {
            None => true, // no open chunk yet, open one
            Some(builder) => self.clock_ms - builder.start_ms >= self.chunk_duration_ms,
        }
    }

    fn open_chunk(&mut self, frame: &AudioFrame) -> ChunkBuilder {
        let number = self.next_chunk_number;
        self.next_chunk_number += 1;
        ChunkBuilder::new(number, self.clock_ms, frame.sample_rate, frame.channels)
    }
}

/// Accumulates samples for one chunk; encoding happens once at seal time.
struct ChunkBuilder {
    chunk_number: u32,
    start_ms: u64,
    end_ms: u64,
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
}

impl ChunkBuilder {
    fn new(chunk_number: u32, start_ms: u64, sample_rate: u32, channels: u16) -> Self {
        Self {
            chunk_number,
            start_ms,
            end_ms: start_ms,
            sample_rate,
            channels,
            samples: Vec::new(),
        }
    }

    fn append(&mut self, frame: &AudioFrame, clock_ms: u64) {
        self.samples.extend_from_slice(&frame.samples);
        self.end_ms = clock_ms;
    }

    fn seal(self) -> Result<SealedChunk> {
        if self.sample_rate == 0 || self.channels == 0 {
            anyhow::bail!(
                "chunk {} has unencodable audio format: {}Hz, {} channel(s)",
                self.chunk_number,
                self.sample_rate,
                self.channels
            );
        }

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .context("Failed to create WAV encoder for chunk")?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to encode sample")?;
            }
            writer.finalize().context("Failed to finalize chunk WAV")?;
        }

        Ok(SealedChunk {
            chunk_number: self.chunk_number,
            wav_bytes: cursor.into_inner(),
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            sample_rate: self.sample_rate,
            channels: self.channels,
            sample_count: self.samples.len(),
        })
    }
}
