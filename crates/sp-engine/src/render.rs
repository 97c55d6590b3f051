//! The real-time render callback.
//!
//! [`Renderer`] is the render-thread half of a playback session. The audio
//! backend calls [`Renderer::render`] once per device buffer; everything it
//! needs is either owned (cursor, scratch chunk) or read from
//! [`SharedState`] without blocking. The render path never allocates, locks
//! or logs, and degrades to silence instead of failing.

use ringbuf::traits::Producer;
use ringbuf::HeapProd;
use std::sync::Arc;

use crate::shared::{PlaybackState, SharedState};
use crate::source::AudioSource;

/// Default scratch chunk size in frames.
pub const DEFAULT_BLOCK_FRAMES: usize = 1024;

/// Notifications from the render thread to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The source ran out and playback went idle.
    EndOfStream { source_id: u64 },
}

/// Render-thread half of a playback session.
pub struct Renderer {
    shared: Arc<SharedState>,
    events: HeapProd<PlaybackEvent>,
    source: Option<AudioSource>,
    chunk: Vec<f32>,
    mixed: Vec<f32>,
    channels: usize,
}

impl Renderer {
    /// `block_frames` sizes the scratch chunk; device buffers larger than
    /// that are rendered in several chunks against the same snapshots.
    pub fn new(
        shared: Arc<SharedState>,
        events: HeapProd<PlaybackEvent>,
        channels: usize,
        block_frames: usize,
    ) -> Self {
        let channels = channels.max(1);
        let block_frames = block_frames.max(1);
        Self {
            shared,
            events,
            source: None,
            chunk: vec![0.0; block_frames],
            mixed: vec![0.0; block_frames * channels],
            channels,
        }
    }

    /// Output channels per frame.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Render one interleaved buffer of `out.len() / channels` frames.
    pub fn render(&mut self, out: &mut [f32]) {
        self.render_as(out, |sample| sample);
    }

    /// Render one interleaved buffer in the device's sample type.
    ///
    /// The whole buffer is rendered from one source, gain and volume
    /// snapshot whatever its size.
    pub fn render_as<T: Copy>(&mut self, out: &mut [T], convert: impl Fn(f32) -> T) {
        #[cfg(feature = "alloc_check")]
        {
            assert_no_alloc::assert_no_alloc(|| self.render_inner(out, &convert))
        }
        #[cfg(not(feature = "alloc_check"))]
        {
            self.render_inner(out, &convert)
        }
        self.shared.complete_buffer();
    }

    fn render_inner<T: Copy>(&mut self, out: &mut [T], convert: &impl Fn(f32) -> T) {
        let shared: &SharedState = &self.shared;
        let silence = convert(0.0);

        // State first: `play()` stores its rewind request before `Playing`.
        let playing = shared.state() == PlaybackState::Playing;

        let guard = shared.source();
        let Some(data) = guard.as_ref() else {
            out.fill(silence);
            self.source = None;
            shared.store_position(0);
            return;
        };
        let stale = self
            .source
            .as_ref()
            .map_or(true, |current| current.data().id() != data.id());
        if stale {
            self.source = Some(AudioSource::from_data(Arc::clone(data)));
        }
        drop(guard);

        let Some(audio) = self.source.as_mut() else {
            out.fill(silence);
            return;
        };
        if let Some(frame) = shared.take_seek_request() {
            audio.seek(frame);
        }
        if shared.take_rewind_request() && audio.is_at_end() {
            audio.seek(0);
        }

        if !playing {
            out.fill(silence);
            shared.store_position(audio.cursor());
            return;
        }

        let gains = shared.gains();
        let volume = shared.volume();
        let channels = self.channels;
        let mut end_of_stream = false;

        for block in out.chunks_mut(self.chunk.len() * channels) {
            if end_of_stream {
                block.fill(silence);
                continue;
            }
            let chunk = &mut self.chunk[..block.len() / channels];
            end_of_stream = audio.next_chunk(chunk);
            let mixed = &mut self.mixed[..block.len()];
            apply_gains(chunk, gains.gains.as_slice(), volume, mixed, channels);
            for (slot, &sample) in block.iter_mut().zip(mixed.iter()) {
                *slot = convert(sample);
            }
        }

        shared.store_position(audio.cursor());

        if end_of_stream && shared.finish() {
            let source_id = audio.data().id();
            // A full ring only loses the notification; the state already changed.
            let _ = self.events.try_push(PlaybackEvent::EndOfStream { source_id });
        }
    }
}

/// Spread a mono chunk over interleaved output: `out[f][c] = chunk[f] * gains[c] * volume`.
///
/// Channels without a gain and frames past the chunk are written as zero.
pub fn apply_gains(chunk: &[f32], gains: &[f32], volume: f32, out: &mut [f32], channels: usize) {
    if channels == 0 {
        out.fill(0.0);
        return;
    }
    let frames = chunk.len().min(out.len() / channels);
    let (body, rest) = out.split_at_mut(frames * channels);

    for (frame, &sample) in body.chunks_exact_mut(channels).zip(chunk) {
        for (c, slot) in frame.iter_mut().enumerate() {
            let gain = gains.get(c).copied().unwrap_or(0.0);
            *slot = sample * gain * volume;
        }
    }
    rest.fill(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::GainSnapshot;
    use crate::source::SourceData;
    use ringbuf::traits::{Consumer, Split};
    use ringbuf::{HeapCons, HeapRb};
    use sp_ir::GainVector;

    fn setup(channels: usize, block: usize) -> (Arc<SharedState>, Renderer, HeapCons<PlaybackEvent>) {
        let shared = Arc::new(SharedState::new(channels));
        let (prod, cons) = HeapRb::<PlaybackEvent>::new(4).split();
        let renderer = Renderer::new(shared.clone(), prod, channels, block);
        (shared, renderer, cons)
    }

    fn load(shared: &SharedState, samples: Vec<f32>) -> u64 {
        let data = Arc::new(SourceData::new(samples, 48_000).unwrap());
        let id = data.id();
        shared.publish_source(Some(data));
        id
    }

    fn unit_gain(shared: &SharedState, channel: usize, channels: usize) {
        let mut gains = vec![0.0; channels];
        gains[channel] = 1.0;
        shared.publish_gains(GainSnapshot {
            azimuth_deg: 0.0,
            gains: GainVector::from_slice(&gains),
        });
    }

    #[test]
    fn apply_gains_scales_each_channel() {
        let chunk = [1.0, -0.5];
        let mut out = [9.0; 6];
        apply_gains(&chunk, &[0.6, 0.8, 0.0], 0.5, &mut out, 3);
        assert_eq!(out, [0.3, 0.4, 0.0, -0.15, -0.2, 0.0]);
    }

    #[test]
    fn apply_gains_zeroes_missing_channels_and_tail() {
        let chunk = [1.0];
        let mut out = [9.0; 6];
        apply_gains(&chunk, &[1.0], 1.0, &mut out, 2);
        assert_eq!(out, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn idle_renders_silence_without_advancing() {
        let (shared, mut renderer, _events) = setup(2, 64);
        load(&shared, vec![1.0; 256]);
        unit_gain(&shared, 0, 2);

        let mut out = vec![7.0; 128];
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(shared.position(), 0);
    }

    #[test]
    fn no_source_renders_silence() {
        let (shared, mut renderer, _events) = setup(5, 64);
        shared.set_state(PlaybackState::Playing);
        let mut out = vec![7.0; 5 * 32];
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn volume_scales_the_active_channel_only() {
        let (shared, mut renderer, _events) = setup(5, 64);
        load(&shared, vec![0.8; 1_000]);
        unit_gain(&shared, 1, 5);
        shared.set_volume(0.5);
        shared.set_state(PlaybackState::Playing);

        let mut out = vec![0.0; 5 * 64];
        renderer.render(&mut out);
        for frame in out.chunks_exact(5) {
            assert_eq!(frame[1], 0.4);
            for (c, &s) in frame.iter().enumerate() {
                if c != 1 {
                    assert_eq!(s, 0.0);
                }
            }
        }
        assert_eq!(shared.position(), 64);
    }

    #[test]
    fn large_buffers_are_rendered_in_chunks() {
        let (shared, mut renderer, _events) = setup(2, 16);
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        load(&shared, samples.clone());
        unit_gain(&shared, 0, 2);
        shared.set_state(PlaybackState::Playing);

        let mut out = vec![0.0; 2 * 50];
        renderer.render(&mut out);
        let left: Vec<f32> = out.chunks_exact(2).map(|f| f[0]).collect();
        assert_eq!(left, samples[..50]);
        assert_eq!(shared.position(), 50);
    }

    #[test]
    fn end_of_stream_pads_goes_idle_and_notifies() {
        let (shared, mut renderer, mut events) = setup(2, 8);
        let id = load(&shared, vec![0.5; 20]);
        unit_gain(&shared, 1, 2);
        shared.set_state(PlaybackState::Playing);

        let mut out = vec![0.0; 2 * 32];
        renderer.render(&mut out);

        let right: Vec<f32> = out.chunks_exact(2).map(|f| f[1]).collect();
        assert!(right[..20].iter().all(|&s| s == 0.5));
        assert!(right[20..].iter().all(|&s| s == 0.0));
        assert_eq!(shared.state(), PlaybackState::Idle);
        assert_eq!(events.try_pop(), Some(PlaybackEvent::EndOfStream { source_id: id }));
        assert_eq!(events.try_pop(), None);

        // Further buffers stay silent and do not notify again.
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(events.try_pop(), None);
    }

    #[test]
    fn seek_applies_at_next_buffer() {
        let (shared, mut renderer, _events) = setup(1, 8);
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        load(&shared, samples);
        unit_gain(&shared, 0, 1);
        shared.set_state(PlaybackState::Playing);

        shared.request_seek(90);
        let mut out = vec![0.0; 4];
        renderer.render(&mut out);
        assert_eq!(out, [90.0, 91.0, 92.0, 93.0]);

        shared.request_seek(5_000);
        renderer.render(&mut out);
        assert_eq!(out, [0.0; 4]);
        assert_eq!(shared.position(), 100);
    }

    #[test]
    fn seek_while_idle_moves_position() {
        let (shared, mut renderer, _events) = setup(1, 8);
        load(&shared, vec![0.0; 100]);
        shared.request_seek(42);
        let mut out = vec![0.0; 4];
        renderer.render(&mut out);
        assert_eq!(shared.position(), 42);
    }

    #[test]
    fn new_source_restarts_cursor() {
        let (shared, mut renderer, _events) = setup(1, 8);
        load(&shared, vec![1.0; 100]);
        unit_gain(&shared, 0, 1);
        shared.set_state(PlaybackState::Playing);
        let mut out = vec![0.0; 8];
        renderer.render(&mut out);
        assert_eq!(shared.position(), 8);

        load(&shared, vec![2.0; 100]);
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 2.0));
        assert_eq!(shared.position(), 8);
    }

    #[test]
    fn rewind_request_restarts_a_finished_source() {
        let (shared, mut renderer, _events) = setup(1, 8);
        let samples: Vec<f32> = (1..=20).map(|i| i as f32).collect();
        load(&shared, samples);
        unit_gain(&shared, 0, 1);
        let mut out = vec![0.0; 4];

        // Seek to the end still pending when playback starts.
        shared.request_seek(20);
        shared.request_rewind();
        shared.set_state(PlaybackState::Playing);
        renderer.render(&mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(shared.state(), PlaybackState::Playing);
    }

    #[test]
    fn rewind_request_leaves_a_running_cursor_alone() {
        let (shared, mut renderer, _events) = setup(1, 8);
        let samples: Vec<f32> = (0..20).map(|i| i as f32).collect();
        load(&shared, samples);
        unit_gain(&shared, 0, 1);
        shared.request_seek(10);
        shared.request_rewind();
        shared.set_state(PlaybackState::Playing);

        let mut out = vec![0.0; 2];
        renderer.render(&mut out);
        assert_eq!(out, [10.0, 11.0]);
    }

    #[test]
    fn converted_buffer_uses_one_snapshot() {
        let (shared, mut renderer, _events) = setup(2, 4);
        load(&shared, vec![0.5; 100]);
        unit_gain(&shared, 1, 2);
        shared.set_state(PlaybackState::Playing);

        // Ten chunks of four frames, one call.
        let mut out = vec![0i16; 2 * 40];
        renderer.render_as(&mut out, |s| (s * 32_767.0) as i16);
        for frame in out.chunks_exact(2) {
            assert_eq!(frame, &[0, 16_383][..]);
        }
        assert_eq!(shared.position(), 40);
    }

    #[test]
    fn converted_silence_uses_the_device_zero() {
        let (shared, mut renderer, _events) = setup(2, 4);
        load(&shared, vec![0.5; 100]);
        let mut out = vec![0u16; 8];
        renderer.render_as(&mut out, |s| ((s + 1.0) * 32_768.0) as u16);
        assert!(out.iter().all(|&s| s == 32_768));
    }

    #[test]
    fn every_buffer_advances_the_epoch() {
        let (shared, mut renderer, _events) = setup(1, 8);
        let mut out = vec![0.0; 4];
        assert_eq!(shared.render_epoch(), 0);
        renderer.render(&mut out);
        load(&shared, vec![1.0; 10]);
        renderer.render(&mut out);
        assert_eq!(shared.render_epoch(), 2);
    }

    #[test]
    fn stop_takes_effect_at_buffer_boundary() {
        let (shared, mut renderer, _events) = setup(1, 8);
        load(&shared, vec![1.0; 100]);
        unit_gain(&shared, 0, 1);
        shared.set_state(PlaybackState::Playing);
        let mut out = vec![0.0; 8];
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 1.0));

        shared.set_state(PlaybackState::Idle);
        renderer.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(shared.position(), 8);
    }
}
