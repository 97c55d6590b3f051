//! Playback controller for surroundpan.
//!
//! [`Controller`] owns the speaker layout, the loaded source and the active
//! direction, and publishes gains, volume and transport state to the
//! [`Renderer`] through [`SharedState`]. Both the dial and the speaker
//! buttons of a front end drive it through the same `select_direction` and
//! `play` calls.

mod config;

use log::{debug, info, warn};
use ringbuf::traits::{Consumer, Split};
use ringbuf::{HeapCons, HeapRb};
use sp_engine::{GainSnapshot, Retired, SharedState, SourceData};
use sp_ir::{clockwise_gap, fold_to_stereo, normalize_azimuth, solve};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "device")]
use sp_audio::{AudioOutput, CpalOutput, OutputConfig};

pub use config::{Backend, ControllerConfig, Direction, SelectionMode};

// Re-export common types so callers don't need sp-ir/sp-engine directly.
pub use sp_engine::{frames_to_duration, PlaybackEvent, PlaybackState, Renderer, SourceError};
pub use sp_formats::FormatError;
pub use sp_ir::{GainVector, LayoutError, LayoutPreset, SpeakerLayout};

#[cfg(feature = "device")]
pub use sp_audio::AudioError;

/// Cap on replaced gain snapshots awaiting release.
const RETIRED_GAINS: usize = 256;
/// Cap on replaced sources awaiting release.
const RETIRED_SOURCES: usize = 16;
/// Directions closer than this count as the same direction.
const SAME_DIRECTION_DEG: f32 = 1e-3;

/// Errors reported by [`Controller`].
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("no source loaded")]
    NoSourceLoaded,
    #[error("no speaker named {0:?} in the layout")]
    UnknownSpeaker(String),
    #[error("azimuth must be finite")]
    NonFiniteAzimuth,
    #[error("cannot render {speakers} speakers on {channels} output channels")]
    UnsupportedOutput { channels: u16, speakers: usize },
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[cfg(feature = "device")]
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Mono-source VBAP player.
pub struct Controller {
    layout: SpeakerLayout,
    config: ControllerConfig,
    output_channels: usize,
    fold_down: bool,
    shared: Arc<SharedState>,
    events: Option<HeapCons<PlaybackEvent>>,
    source: Option<Arc<SourceData>>,
    azimuth_deg: f32,
    gains: GainVector,
    retired_gains: Retired<GainSnapshot>,
    retired_sources: Retired<SourceData>,
    #[cfg(feature = "device")]
    output: Option<CpalOutput>,
}

impl Controller {
    /// Build an idle controller facing 0°.
    pub fn new(layout: SpeakerLayout, config: ControllerConfig) -> Result<Self, ControlError> {
        let speakers = layout.len();
        let (output_channels, fold_down) = match config.output_channels {
            None => (speakers, false),
            Some(n) if n as usize == speakers => (speakers, false),
            Some(2) => (2, true),
            Some(channels) => {
                return Err(ControlError::UnsupportedOutput { channels, speakers });
            }
        };

        let mut controller = Self {
            shared: Arc::new(SharedState::new(output_channels)),
            gains: GainVector::silent(speakers),
            layout,
            config,
            output_channels,
            fold_down,
            events: None,
            source: None,
            azimuth_deg: 0.0,
            retired_gains: Retired::new(RETIRED_GAINS),
            retired_sources: Retired::new(RETIRED_SOURCES),
            #[cfg(feature = "device")]
            output: None,
        };
        controller.publish_direction(0.0);
        Ok(controller)
    }

    // --- Layout / render path ---

    pub fn layout(&self) -> &SpeakerLayout {
        &self.layout
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Interleaved channels the renderer writes.
    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// True when a surround layout is folded down to two channels.
    pub fn is_folded(&self) -> bool {
        self.fold_down
    }

    /// Create the render-thread half of this controller.
    ///
    /// Each call opens a fresh event channel and detaches the previous one,
    /// so only the newest renderer should be driven.
    pub fn renderer(&mut self) -> Renderer {
        let (producer, consumer) = HeapRb::<PlaybackEvent>::new(self.config.event_capacity.max(1)).split();
        self.events = Some(consumer);
        Renderer::new(
            self.shared.clone(),
            producer,
            self.output_channels,
            self.config.block_frames,
        )
    }

    // --- Source management ---

    /// Load mono samples, replacing the current source.
    ///
    /// The transport state is kept: a playing controller continues with the
    /// new source from its first frame.
    pub fn load(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<(), ControlError> {
        let data = Arc::new(SourceData::new(samples, sample_rate)?);
        info!(
            "loaded source: {} frames @ {} Hz ({})",
            data.len(),
            data.sample_rate(),
            format_clock(data.duration())
        );

        self.source = Some(data.clone());
        let previous = self.shared.publish_source(Some(data));
        if let Some(previous) = previous {
            self.retired_sources.push(previous, self.shared.render_epoch());
        }

        #[cfg(feature = "device")]
        if self.output.as_ref().is_some_and(|o| o.sample_rate() != sample_rate) {
            self.output = None;
            if self.is_playing() {
                self.ensure_output()?;
            }
        }
        Ok(())
    }

    /// Decode a WAV file, average its channels to mono and load it.
    pub fn load_wav(&mut self, data: &[u8]) -> Result<(), ControlError> {
        let decoded = sp_formats::load_wav(data)?;
        let sample_rate = decoded.sample_rate;
        debug!("decoded WAV: {} ch, {} frames", decoded.channels, decoded.frames());
        self.load(decoded.into_mono(), sample_rate)
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Sample rate of the loaded source.
    pub fn sample_rate(&self) -> Option<u32> {
        self.source.as_ref().map(|s| s.sample_rate())
    }

    // --- Direction ---

    /// Point the source at an azimuth or a named speaker.
    ///
    /// While idle this only latches the direction. In exclusive mode a
    /// different direction while playing stops the old one and starts the
    /// new one.
    pub fn select_direction(&mut self, direction: impl Into<Direction>) -> Result<(), ControlError> {
        let azimuth_deg = self.resolve(direction.into())?;

        let restart = self.config.mode == SelectionMode::Exclusive
            && self.is_playing()
            && !self.faces(azimuth_deg);
        if restart {
            self.stop();
            self.publish_direction(azimuth_deg);
            self.play()
        } else {
            self.publish_direction(azimuth_deg);
            Ok(())
        }
    }

    /// Speaker-button behaviour: stop if already playing from `direction`,
    /// otherwise point there and play.
    pub fn toggle_direction(&mut self, direction: impl Into<Direction>) -> Result<(), ControlError> {
        let azimuth_deg = self.resolve(direction.into())?;
        if self.is_playing() && self.faces(azimuth_deg) {
            self.stop();
            return Ok(());
        }
        self.select_direction(azimuth_deg)?;
        self.play()
    }

    /// Active direction in `[-180, 180)`.
    pub fn active_azimuth(&self) -> f32 {
        self.azimuth_deg
    }

    /// Per-speaker gains for the active direction, in layout order.
    pub fn gains(&self) -> &GainVector {
        &self.gains
    }

    /// Per-output-channel gains the renderer applies (folded if enabled).
    pub fn output_gains(&self) -> GainVector {
        self.shared.gains().gains.clone()
    }

    fn resolve(&self, direction: Direction) -> Result<f32, ControlError> {
        match direction {
            Direction::Azimuth(deg) if deg.is_finite() => Ok(normalize_azimuth(deg)),
            Direction::Azimuth(_) => {
                warn!("rejected non-finite azimuth");
                Err(ControlError::NonFiniteAzimuth)
            }
            Direction::Speaker(name) => self.layout.azimuth_of(&name).ok_or_else(|| {
                warn!("rejected unknown speaker {name:?}");
                ControlError::UnknownSpeaker(name)
            }),
        }
    }

    fn faces(&self, azimuth_deg: f32) -> bool {
        let apart = clockwise_gap(self.azimuth_deg, azimuth_deg);
        apart < SAME_DIRECTION_DEG || 360.0 - apart < SAME_DIRECTION_DEG
    }

    fn publish_direction(&mut self, azimuth_deg: f32) {
        let gains = solve(azimuth_deg, &self.layout);
        let output = if self.fold_down {
            fold_to_stereo(&gains, &self.layout)
        } else {
            gains.clone()
        };
        debug!("direction {azimuth_deg:.1}°: gains {:?}", gains.as_slice());

        let previous = self.shared.publish_gains(GainSnapshot {
            azimuth_deg,
            gains: output,
        });
        self.retired_gains.push(previous, self.shared.render_epoch());
        self.azimuth_deg = azimuth_deg;
        self.gains = gains;
    }

    // --- Transport ---

    /// Start rendering the loaded source, rewinding if it already ended.
    pub fn play(&mut self) -> Result<(), ControlError> {
        if !self.has_source() {
            warn!("play requested with no source loaded");
            return Err(ControlError::NoSourceLoaded);
        }
        if self.is_playing() {
            return Ok(());
        }

        #[cfg(feature = "device")]
        self.ensure_output()?;

        // The renderer owns the cursor; it rewinds if, after any pending
        // seek, the cursor is at the end.
        self.shared.request_rewind();
        self.shared.set_state(PlaybackState::Playing);
        info!("playing at {:.1}°", self.azimuth_deg);
        Ok(())
    }

    /// Go idle. The render path keeps running and emits silence.
    pub fn stop(&mut self) {
        if self.is_playing() {
            self.shared.set_state(PlaybackState::Idle);
            info!("stopped at {}", format_clock(self.elapsed()));
        }
    }

    pub fn toggle(&mut self) -> Result<(), ControlError> {
        if self.is_playing() {
            self.stop();
            Ok(())
        } else {
            self.play()
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Set the volume, clamped to `[0, 1]`. Returns the stored value.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let stored = self.shared.set_volume(volume);
        debug!("volume {stored:.2}");
        stored
    }

    pub fn volume(&self) -> f32 {
        self.shared.volume()
    }

    // --- Position ---

    /// Move the cursor at the next buffer boundary, clamped to the source.
    pub fn seek(&mut self, frame: usize) -> Result<(), ControlError> {
        let source = self.source.as_ref().ok_or(ControlError::NoSourceLoaded)?;
        let frame = frame.min(source.len());
        debug!("seek to frame {frame}");
        self.shared.request_seek(frame);
        Ok(())
    }

    pub fn seek_seconds(&mut self, seconds: f64) -> Result<(), ControlError> {
        let rate = self.sample_rate().ok_or(ControlError::NoSourceLoaded)?;
        let frame = (seconds.max(0.0) * rate as f64).round();
        self.seek(frame as usize)
    }

    /// Cursor as of the last rendered buffer.
    pub fn position_frames(&self) -> usize {
        self.shared.position()
    }

    pub fn elapsed(&self) -> Duration {
        self.sample_rate()
            .map(|rate| frames_to_duration(self.position_frames(), rate))
            .unwrap_or_default()
    }

    pub fn duration(&self) -> Duration {
        self.source.as_ref().map(|s| s.duration()).unwrap_or_default()
    }

    // --- Render-thread notifications ---

    /// Drain events posted by the renderer.
    pub fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        let Some(events) = self.events.as_mut() else {
            return Vec::new();
        };
        let drained: Vec<PlaybackEvent> = events.pop_iter().collect();
        let epoch = self.shared.render_epoch();
        self.retired_gains.release(epoch);
        self.retired_sources.release(epoch);
        for event in &drained {
            match event {
                PlaybackEvent::EndOfStream { source_id } => {
                    info!("end of stream (source {source_id})");
                }
            }
        }
        drained
    }

    // --- Offline rendering ---

    /// Render the loaded source from its start at the current direction and
    /// volume, up to `max_frames` interleaved frames.
    pub fn render_frames(&self, max_frames: usize) -> Result<Vec<f32>, ControlError> {
        let source = self.source.clone().ok_or(ControlError::NoSourceLoaded)?;
        let frames = max_frames.min(source.len());

        let shared = Arc::new(SharedState::new(self.output_channels));
        shared.publish_gains(GainSnapshot::clone(&self.shared.gains()));
        shared.set_volume(self.volume());
        shared.publish_source(Some(source));
        shared.set_state(PlaybackState::Playing);

        let (producer, _consumer) = HeapRb::<PlaybackEvent>::new(1).split();
        let mut renderer = Renderer::new(shared, producer, self.output_channels, self.config.block_frames);
        let mut out = vec![0.0; frames * self.output_channels];
        renderer.render(&mut out);
        Ok(out)
    }

    /// Render to a 16-bit PCM WAV of at most `max_seconds`.
    pub fn render_to_wav(&self, max_seconds: f64) -> Result<Vec<u8>, ControlError> {
        let rate = self.sample_rate().ok_or(ControlError::NoSourceLoaded)?;
        let max_frames = (max_seconds.max(0.0) * rate as f64) as usize;
        let frames = self.render_frames(max_frames)?;
        Ok(sp_formats::frames_to_wav(&frames, self.output_channels as u16, rate)?)
    }

    // --- Device output ---

    #[cfg(feature = "device")]
    /// Open the device stream at the loaded source's rate, unless one is
    /// already running at that rate.
    fn ensure_output(&mut self) -> Result<(), ControlError> {
        let device_name = match &self.config.backend {
            Backend::Device { device_name } => device_name.clone(),
            Backend::Headless => return Ok(()),
        };
        let sample_rate = self.sample_rate().ok_or(ControlError::NoSourceLoaded)?;
        if self.output.as_ref().is_some_and(|o| o.sample_rate() == sample_rate) {
            return Ok(());
        }
        self.output = None;

        let request = OutputConfig {
            channels: self.output_channels as u16,
            sample_rate,
            device_name,
        };
        let mut output = CpalOutput::open(&request)?;
        let renderer = self.renderer();
        output.build_stream(renderer)?;
        output.start()?;
        self.output = Some(output);
        Ok(())
    }
}

/// Format a duration as `MM:SS`.
pub fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
