//! Audio output trait and error types.

/// Error type for audio operations.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// No default output device
    #[error("no audio output device available")]
    NoDevice,
    /// Requested device name not present
    #[error("output device not found: {0}")]
    DeviceNotFound(String),
    /// Device cannot open the requested channel count / rate
    #[error("device does not support {channels} channels at {sample_rate} Hz")]
    UnsupportedConfig { channels: u16, sample_rate: u32 },
    /// Failed to query or initialize the device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// Failed to create the output stream
    #[error("stream create error: {0}")]
    StreamCreate(String),
    /// Failed to start or pause the stream
    #[error("playback error: {0}")]
    Playback(String),
}

/// Trait for audio output backends.
pub trait AudioOutput {
    /// Stream sample rate.
    fn sample_rate(&self) -> u32;

    /// Interleaved channels per frame, fixed for the stream's lifetime.
    fn channels(&self) -> u16;

    /// Start pulling buffers from the renderer.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Pause the device.
    fn stop(&mut self) -> Result<(), AudioError>;
}
