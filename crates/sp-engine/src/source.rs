//! Decoded mono source data and a cursor-owning reader over it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Error building a source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("sample rate must be positive")]
    ZeroSampleRate,
}

/// Immutable decoded mono samples.
///
/// Shared between the control and render threads behind an `Arc`; a new
/// load builds a new `SourceData` instead of mutating this one.
#[derive(Debug)]
pub struct SourceData {
    id: u64,
    samples: Box<[f32]>,
    sample_rate: u32,
}

/// Outcome of one chunk read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRead {
    /// Real samples copied before the zero padding.
    pub frames: usize,
    /// Cursor after the read, saturated at the source length.
    pub cursor: usize,
    /// The read reached the end of the source.
    pub end_of_stream: bool,
}

impl SourceData {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, SourceError> {
        if sample_rate == 0 {
            return Err(SourceError::ZeroSampleRate);
        }
        Ok(Self {
            id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
            samples: samples.into_boxed_slice(),
            sample_rate,
        })
    }

    /// Process-unique identity, used by the renderer to notice a swap.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        frames_to_duration(self.samples.len(), self.sample_rate)
    }

    /// Fill `out` from `cursor`, zero-padding past the end.
    ///
    /// Never allocates or blocks. The cursor does not wrap.
    pub fn read_chunk(&self, cursor: usize, out: &mut [f32]) -> ChunkRead {
        let start = cursor.min(self.samples.len());
        let available = &self.samples[start..];
        let frames = available.len().min(out.len());

        out[..frames].copy_from_slice(&available[..frames]);
        out[frames..].fill(0.0);

        let cursor = start + frames;
        ChunkRead {
            frames,
            cursor,
            end_of_stream: cursor >= self.samples.len(),
        }
    }
}

/// Convert a frame count to wall-clock time at `sample_rate`.
pub fn frames_to_duration(frames: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let rate = u64::from(sample_rate);
    let frames = frames as u64;
    Duration::from_secs(frames / rate)
        + Duration::from_nanos((frames % rate) * 1_000_000_000 / rate)
}

/// A source plus its read cursor.
///
/// The renderer owns one over the currently published `SourceData` and is
/// the only writer of its cursor.
#[derive(Debug, Clone)]
pub struct AudioSource {
    data: Arc<SourceData>,
    cursor: usize,
}

impl AudioSource {
    /// Decode-free load: wrap already-decoded mono samples.
    pub fn load(samples: Vec<f32>, sample_rate: u32) -> Result<Self, SourceError> {
        Ok(Self::from_data(Arc::new(SourceData::new(samples, sample_rate)?)))
    }

    pub fn from_data(data: Arc<SourceData>) -> Self {
        Self { data, cursor: 0 }
    }

    pub fn data(&self) -> &Arc<SourceData> {
        &self.data
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.data.sample_rate()
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.data.len()
    }

    /// Fill `chunk` with the next `chunk.len()` samples. Returns true at
    /// end of stream.
    pub fn next_chunk(&mut self, chunk: &mut [f32]) -> bool {
        let read = self.data.read_chunk(self.cursor, chunk);
        self.cursor = read.cursor;
        read.end_of_stream
    }

    /// Move the cursor, clamped to `[0, len]`.
    pub fn seek(&mut self, frame: usize) {
        self.cursor = frame.min(self.data.len());
    }
}
