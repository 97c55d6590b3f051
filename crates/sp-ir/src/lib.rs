//! Core types for surroundpan.
//!
//! Speaker layouts, gain vectors and the pairwise VBAP solver that maps a
//! source azimuth to per-speaker gains. Everything here is pure and
//! allocation-free, so the engine can call into it from any thread.
//!
//! Designed to be `no_std` compatible.

#![cfg_attr(not(feature = "std"), no_std)]

mod angle;
mod downmix;
mod gains;
mod speaker;
pub mod vbap;

pub use angle::{clockwise_gap, direction, normalize_azimuth};
pub use downmix::{fold_to_stereo, CENTER_FOLD_GAIN};
pub use gains::GainVector;
pub use speaker::{
    LayoutError, LayoutPreset, Speaker, SpeakerLayout, SpeakerPair, UnknownPreset, MAX_NAME_LEN,
    MAX_SPEAKERS,
};
pub use vbap::solve;
