//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use log::{error, info};
use sp_engine::Renderer;

use crate::traits::{AudioError, AudioOutput};

/// What to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    /// Interleaved channels; fixed until the output is dropped.
    pub channels: u16,
    pub sample_rate: u32,
    /// Device name, or `None` for the host default.
    pub device_name: Option<String>,
}

/// CPAL-based audio output driving a [`Renderer`].
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
}

impl CpalOutput {
    /// Open a device that supports the requested channel count and rate.
    pub fn open(request: &OutputConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = match &request.device_name {
            Some(name) => find_device(&host, name)?,
            None => host.default_output_device().ok_or(AudioError::NoDevice)?,
        };

        let unsupported = || AudioError::UnsupportedConfig {
            channels: request.channels,
            sample_rate: request.sample_rate,
        };
        let rate = cpal::SampleRate(request.sample_rate);
        let range = device
            .supported_output_configs()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?
            .filter(|r| r.channels() == request.channels)
            .filter(|r| r.min_sample_rate() <= rate && rate <= r.max_sample_rate())
            .max_by_key(|r| r.sample_format() == SampleFormat::F32)
            .ok_or_else(unsupported)?;

        let supported = range.with_sample_rate(rate);
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        info!(
            "opened output {:?}: {} ch @ {} Hz ({:?})",
            device.name().unwrap_or_default(),
            config.channels,
            config.sample_rate.0,
            sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
        })
    }

    /// Build the stream and hand the renderer to the device callback.
    pub fn build_stream(&mut self, renderer: Renderer) -> Result<(), AudioError> {
        let stream = match self.sample_format {
            SampleFormat::F32 => self.build::<f32>(renderer)?,
            SampleFormat::I16 => self.build::<i16>(renderer)?,
            SampleFormat::U16 => self.build::<u16>(renderer)?,
            other => {
                return Err(AudioError::StreamCreate(format!(
                    "unsupported device sample format: {other:?}"
                )))
            }
        };
        self.stream = Some(stream);
        Ok(())
    }

    fn build<T>(&self, mut renderer: Renderer) -> Result<Stream, AudioError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    renderer.render_as(data, |s: f32| T::from_sample(s));
                },
                |err| error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))
    }
}

fn find_device(host: &cpal::Host, name: &str) -> Result<Device, AudioError> {
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
    for device in devices {
        if device.name().is_ok_and(|n| n == name) {
            return Ok(device);
        }
    }
    Err(AudioError::DeviceNotFound(name.to_string()))
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn channels(&self) -> u16 {
        self.config.channels
    }

    fn start(&mut self) -> Result<(), AudioError> {
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}
