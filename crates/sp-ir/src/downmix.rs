//! Folding a multi-speaker gain vector onto a two-channel output.

use crate::gains::GainVector;
use crate::speaker::SpeakerLayout;

/// Share of a centre speaker sent to each stereo channel (about −3 dB).
pub const CENTER_FOLD_GAIN: f32 = 0.7;

/// Lateral components smaller than this put a speaker on the centre line.
const CENTER_EPSILON: f32 = 1e-3;

/// Fold per-speaker gains into `[left, right]`.
///
/// Speakers left of the centre line feed the left channel, speakers right of
/// it feed the right channel, and speakers on it (front or rear centre) feed
/// both at [`CENTER_FOLD_GAIN`]. The result is not renormalized.
pub fn fold_to_stereo(gains: &GainVector, layout: &SpeakerLayout) -> GainVector {
    let mut left = 0.0;
    let mut right = 0.0;
    for (speaker, gain) in layout.speakers().iter().zip(gains.iter()) {
        let lateral = libm::sinf(speaker.azimuth_deg.to_radians());
        if lateral > CENTER_EPSILON {
            right += gain;
        } else if lateral < -CENTER_EPSILON {
            left += gain;
        } else {
            left += CENTER_FOLD_GAIN * gain;
            right += CENTER_FOLD_GAIN * gain;
        }
    }
    GainVector::from_slice(&[left, right])
}
