//! Controller configuration and direction selection.

use sp_engine::DEFAULT_BLOCK_FRAMES;

/// How direction changes interact with running playback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionMode {
    /// The source follows the direction while it plays (dial).
    #[default]
    Continuous,
    /// Directions are mutually exclusive emitters (speaker buttons):
    /// picking a different one while playing stops the old one first.
    Exclusive,
}

/// Who drives the renderer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    /// The caller pulls buffers through [`crate::Controller::renderer`].
    #[default]
    Headless,
    /// A CPAL stream opened on `play()`.
    #[cfg(feature = "device")]
    Device { device_name: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// `None` renders one channel per speaker. `Some(2)` with a larger
    /// layout folds the speakers down to stereo.
    pub output_channels: Option<u16>,
    /// Renderer scratch size in frames.
    pub block_frames: usize,
    /// Capacity of the render-to-control event ring.
    pub event_capacity: usize,
    pub mode: SelectionMode,
    pub backend: Backend,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            output_channels: None,
            block_frames: DEFAULT_BLOCK_FRAMES,
            event_capacity: 16,
            mode: SelectionMode::Continuous,
            backend: Backend::Headless,
        }
    }
}

/// A direction given either as an angle or as a speaker of the layout.
#[derive(Clone, Debug, PartialEq)]
pub enum Direction {
    Azimuth(f32),
    Speaker(String),
}

impl From<f32> for Direction {
    fn from(azimuth_deg: f32) -> Self {
        Direction::Azimuth(azimuth_deg)
    }
}

impl From<&str> for Direction {
    fn from(name: &str) -> Self {
        Direction::Speaker(name.to_string())
    }
}

impl From<String> for Direction {
    fn from(name: String) -> Self {
        Direction::Speaker(name)
    }
}
