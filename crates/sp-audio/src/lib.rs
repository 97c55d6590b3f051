//! Audio output backends for surroundpan.

mod cpal_backend;
mod traits;

pub use cpal_backend::{CpalOutput, OutputConfig};
pub use traits::{AudioError, AudioOutput};
