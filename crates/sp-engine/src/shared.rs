//! State published from the control thread to the render thread.
//!
//! Every field is either an atomic or an `ArcSwap` snapshot, so the render
//! thread never waits on the control thread:
//!
//! - playback state: `AtomicU8`, acquire/release
//! - volume: `AtomicF32`
//! - gains: `ArcSwap<GainSnapshot>`, loaded once per buffer
//! - source: `ArcSwapOption<SourceData>`, loaded once per buffer
//! - seek: a request slot the renderer drains at the start of a buffer
//! - rewind: set by `play()`, the renderer rewinds a cursor parked at the end
//! - position: the renderer's cursor, mirrored for display
//! - render epoch: completed buffers, used to retire replaced snapshots

use arc_swap::{ArcSwap, ArcSwapOption};
use atomic_float::AtomicF32;
use sp_ir::GainVector;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::source::SourceData;

const NO_SEEK: u64 = u64::MAX;

/// Buffers that must complete after a value is retired before it may drop:
/// the one in flight when it was replaced and the next one, which swaps the
/// renderer's own reference out.
const GRACE_BUFFERS: u64 = 2;

/// Whether the renderer is producing audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    Idle = 0,
    Playing = 1,
}

impl PlaybackState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PlaybackState::Playing,
            _ => PlaybackState::Idle,
        }
    }
}

/// Output-channel gains for one direction.
#[derive(Clone, Debug, PartialEq)]
pub struct GainSnapshot {
    /// Direction the gains were solved for, in `[-180, 180)`.
    pub azimuth_deg: f32,
    /// One gain per output channel.
    pub gains: GainVector,
}

impl GainSnapshot {
    pub fn silent(channels: usize) -> Self {
        Self {
            azimuth_deg: 0.0,
            gains: GainVector::silent(channels),
        }
    }
}

/// Cross-thread playback state.
pub struct SharedState {
    state: AtomicU8,
    volume: AtomicF32,
    gains: ArcSwap<GainSnapshot>,
    source: ArcSwapOption<SourceData>,
    seek_request: AtomicU64,
    rewind: AtomicBool,
    position: AtomicU64,
    render_epoch: AtomicU64,
}

impl SharedState {
    pub fn new(channels: usize) -> Self {
        Self {
            state: AtomicU8::new(PlaybackState::Idle as u8),
            volume: AtomicF32::new(1.0),
            gains: ArcSwap::from_pointee(GainSnapshot::silent(channels)),
            source: ArcSwapOption::empty(),
            seek_request: AtomicU64::new(NO_SEEK),
            rewind: AtomicBool::new(false),
            position: AtomicU64::new(0),
            render_epoch: AtomicU64::new(0),
        }
    }

    // --- Playback state ---

    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// `Playing → Idle` at end of stream. False if something else already
    /// moved the state.
    pub fn finish(&self) -> bool {
        self.state
            .compare_exchange(
                PlaybackState::Playing as u8,
                PlaybackState::Idle as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    // --- Volume ---

    pub fn volume(&self) -> f32 {
        self.volume.load(Ordering::Acquire)
    }

    /// Store a volume clamped to `[0, 1]`; NaN becomes silence.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.volume.store(volume, Ordering::Release);
        volume
    }

    // --- Gains ---

    pub fn gains(&self) -> arc_swap::Guard<Arc<GainSnapshot>> {
        self.gains.load()
    }

    /// Publish a new snapshot and hand back the one it replaced.
    pub fn publish_gains(&self, snapshot: GainSnapshot) -> Arc<GainSnapshot> {
        self.gains.swap(Arc::new(snapshot))
    }

    // --- Source ---

    pub fn source(&self) -> arc_swap::Guard<Option<Arc<SourceData>>> {
        self.source.load()
    }

    /// Swap in a new source and hand back the previous one.
    pub fn publish_source(&self, source: Option<Arc<SourceData>>) -> Option<Arc<SourceData>> {
        self.seek_request.store(NO_SEEK, Ordering::Release);
        let previous = self.source.swap(source);
        self.position.store(0, Ordering::Release);
        previous
    }

    // --- Seek / position ---

    /// Ask the renderer to move its cursor at the next buffer boundary.
    ///
    /// Supersedes an earlier rewind request.
    pub fn request_seek(&self, frame: usize) {
        self.rewind.store(false, Ordering::Release);
        self.seek_request
            .store((frame as u64).min(NO_SEEK - 1), Ordering::Release);
    }

    /// Take the pending seek, if any. Render thread only.
    pub fn take_seek_request(&self) -> Option<usize> {
        match self.seek_request.swap(NO_SEEK, Ordering::AcqRel) {
            NO_SEEK => None,
            frame => Some(usize::try_from(frame).unwrap_or(usize::MAX)),
        }
    }

    pub fn has_pending_seek(&self) -> bool {
        self.seek_request.load(Ordering::Acquire) != NO_SEEK
    }

    /// Ask the renderer to rewind to frame 0 if, after any pending seek,
    /// its cursor sits at the end of the source. Store before `Playing`.
    pub fn request_rewind(&self) {
        self.rewind.store(true, Ordering::Release);
    }

    /// Take the pending rewind request. Render thread only.
    pub fn take_rewind_request(&self) -> bool {
        self.rewind.swap(false, Ordering::AcqRel)
    }

    /// Renderer cursor as of the last rendered buffer.
    pub fn position(&self) -> usize {
        usize::try_from(self.position.load(Ordering::Acquire)).unwrap_or(usize::MAX)
    }

    pub(crate) fn store_position(&self, frame: usize) {
        self.position.store(frame as u64, Ordering::Release);
    }

    // --- Render epoch ---

    /// Buffers the renderer has completed.
    pub fn render_epoch(&self) -> u64 {
        self.render_epoch.load(Ordering::Acquire)
    }

    /// Called after every snapshot guard of a buffer has been dropped.
    pub(crate) fn complete_buffer(&self) {
        self.render_epoch.fetch_add(1, Ordering::Release);
    }
}

/// Keeps replaced snapshots alive on the control thread.
///
/// A renderer that loaded a snapshot just before it was replaced still holds
/// a reference. Each retired `Arc` is stamped with the render epoch read
/// after the swap and released once the renderer has completed two more
/// buffers, so the control thread, not the render thread, performs the
/// final drop.
///
/// `depth` caps the queue for a renderer that is not running. A renderer
/// stalled inside one buffer while more than `depth` values are retired can
/// still end up as the last owner of the oldest one.
#[derive(Debug)]
pub struct Retired<T> {
    slots: VecDeque<(u64, Arc<T>)>,
    depth: usize,
}

impl<T> Retired<T> {
    pub fn new(depth: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(depth.max(1)),
            depth: depth.max(1),
        }
    }

    /// Park `value`, replaced while the render epoch was `epoch`.
    pub fn push(&mut self, value: Arc<T>, epoch: u64) {
        self.release(epoch);
        if self.slots.len() == self.depth {
            self.slots.pop_front();
        }
        self.slots.push_back((epoch, value));
    }

    /// Drop every value the renderer can no longer reach at `epoch`.
    pub fn release(&mut self, epoch: u64) {
        while self
            .slots
            .front()
            .is_some_and(|(stamp, _)| epoch >= stamp + GRACE_BUFFERS)
        {
            self.slots.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
