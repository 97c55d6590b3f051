//! Format parsers for surroundpan.
//!
//! Decodes PCM and float WAV files into normalized `f32` samples and
//! encodes rendered multichannel output back to 16-bit PCM WAV.

mod wav_format;

pub use wav_format::{downmix_to_mono, frames_to_wav, load_wav, write_wav, DecodedAudio};

/// Error type for format parsing and encoding.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Malformed or truncated WAV data
    #[error("malformed WAV data: {0}")]
    Decode(#[source] hound::Error),
    /// Sample encoding this decoder does not handle
    #[error("unsupported WAV encoding: {bits}-bit {format}")]
    UnsupportedEncoding { bits: u16, format: &'static str },
    /// Header declares zero channels
    #[error("WAV header declares no channels")]
    NoChannels,
    /// Writing the output file failed
    #[error("failed to encode WAV: {0}")]
    Encode(#[source] hound::Error),
}
