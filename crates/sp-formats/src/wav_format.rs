//! WAV decoding and encoding.

use crate::FormatError;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::{Cursor, Seek, Write};

/// Decoded interleaved audio, normalized to `[-1, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Collapse to mono by averaging channels.
    pub fn into_mono(self) -> Vec<f32> {
        if self.channels == 1 {
            return self.samples;
        }
        downmix_to_mono(&self.samples, self.channels as usize)
    }
}

// --- Reading ---

/// Decode a WAV file from raw bytes.
///
/// Accepts 8/16/24/32-bit integer PCM and 32-bit float.
pub fn load_wav(data: &[u8]) -> Result<DecodedAudio, FormatError> {
    let reader = WavReader::new(Cursor::new(data)).map_err(FormatError::Decode)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(FormatError::NoChannels);
    }

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => read_float(reader)?,
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => read_int(reader, bits)?,
        (SampleFormat::Float, bits) => {
            return Err(FormatError::UnsupportedEncoding { bits, format: "float" })
        }
        (SampleFormat::Int, bits) => {
            return Err(FormatError::UnsupportedEncoding { bits, format: "integer" })
        }
    };

    Ok(DecodedAudio {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

fn read_float(mut reader: WavReader<Cursor<&[u8]>>) -> Result<Vec<f32>, FormatError> {
    reader
        .samples::<f32>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(FormatError::Decode)
}

fn read_int(mut reader: WavReader<Cursor<&[u8]>>, bits: u16) -> Result<Vec<f32>, FormatError> {
    let scale = 1.0 / (1u64 << (bits - 1)) as f32;
    reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f32 * scale))
        .collect::<Result<Vec<_>, _>>()
        .map_err(FormatError::Decode)
}

/// Average interleaved channels into one.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let scale = 1.0 / channels as f32;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

// --- Writing ---

/// Encode interleaved `f32` frames as 16-bit PCM.
pub fn write_wav<W: Write + Seek>(
    w: W,
    interleaved: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<(), FormatError> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::new(w, spec).map_err(FormatError::Encode)?;
    for &sample in interleaved {
        let value = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        writer.write_sample(value).map_err(FormatError::Encode)?;
    }
    writer.finalize().map_err(FormatError::Encode)
}

/// Encode interleaved frames into an in-memory WAV file.
pub fn frames_to_wav(
    interleaved: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<Vec<u8>, FormatError> {
    let mut buf = Cursor::new(Vec::new());
    write_wav(&mut buf, interleaved, channels, sample_rate)?;
    Ok(buf.into_inner())
}
