//! Real-time playback engine for surroundpan.
//!
//! Holds decoded source data, the state shared between the control and
//! render threads, and the render callback that turns a mono source and a
//! gain snapshot into interleaved multichannel output.

mod render;
mod shared;
mod source;

pub use render::{apply_gains, PlaybackEvent, Renderer, DEFAULT_BLOCK_FRAMES};
pub use shared::{GainSnapshot, PlaybackState, Retired, SharedState};
pub use source::{frames_to_duration, AudioSource, ChunkRead, SourceData, SourceError};
