//! Two-dimensional pairwise vector-based amplitude panning.
//!
//! For every adjacent speaker pair the solver inverts the 2×2 matrix of the
//! pair's direction vectors and applies it to the source direction. A pair
//! whose two gains are both non-negative contains the source; its gains are
//! normalized to unit power and scattered into a full-length vector.
//!
//! When several pairs qualify (only possible on a shared boundary speaker)
//! the pair whose reconstructed direction best matches the source wins, and
//! the lowest pair index breaks remaining ties.
//!
//! Two-speaker layouts have a single pair covering the front arc. Sources
//! behind that arc are mirrored onto it and sources outside it pin to the
//! nearer speaker, so every direction still gets a unit-norm gain vector.

use crate::angle::{direction, normalize_azimuth};
use crate::gains::GainVector;
use crate::speaker::{SpeakerLayout, SpeakerPair};

/// Determinant below which a pair's directions count as colinear.
const SINGULAR_EPSILON: f64 = 1e-9;

/// Slightly negative gains from rounding at a sector boundary are accepted.
const GAIN_EPSILON: f64 = 1e-9;

/// Alignment scores closer than this are a tie.
const ALIGNMENT_EPSILON: f64 = 1e-9;

/// Norms below this are treated as silence.
const NORM_EPSILON: f64 = 1e-12;

struct Candidate {
    pair: SpeakerPair,
    gains: (f64, f64),
    alignment: f64,
}

/// Compute the gain vector placing a source at `azimuth_deg`.
///
/// Pure: identical inputs give bit-identical outputs. Returns a silent
/// vector when no pair can render the direction or the azimuth is not
/// finite.
pub fn solve(azimuth_deg: f32, layout: &SpeakerLayout) -> GainVector {
    let mut out = GainVector::silent(layout.len());
    if !azimuth_deg.is_finite() {
        return out;
    }

    let source = direction(normalize_azimuth(azimuth_deg));
    let best = if layout.is_stereo() {
        solve_stereo(source, layout)
    } else {
        solve_pairs(source, layout)
    };

    if let Some(best) = best {
        out.set(best.pair.first, best.gains.0 as f32);
        out.set(best.pair.second, best.gains.1 as f32);
    }
    out
}

fn solve_pairs(source: (f64, f64), layout: &SpeakerLayout) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;

    for &pair in layout.pairs() {
        let Some(raw) = pair_gains(source, layout, pair) else {
            continue;
        };
        if raw.0 < -GAIN_EPSILON || raw.1 < -GAIN_EPSILON {
            continue;
        }
        let Some(candidate) = score(source, layout, pair, (raw.0.max(0.0), raw.1.max(0.0))) else {
            continue;
        };
        let better = match &best {
            None => true,
            Some(current) => candidate.alignment > current.alignment + ALIGNMENT_EPSILON,
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

fn solve_stereo(source: (f64, f64), layout: &SpeakerLayout) -> Option<Candidate> {
    let pair = *layout.pairs().first()?;
    let a = layout.direction(pair.first);
    let b = layout.direction(pair.second);

    // Mirror rear sources across the axis perpendicular to the pair's bisector.
    let bisector = unit((a.0 + b.0, a.1 + b.1))?;
    let along = dot(source, bisector);
    let folded = if along < 0.0 {
        (source.0 - 2.0 * along * bisector.0, source.1 - 2.0 * along * bisector.1)
    } else {
        source
    };

    let raw = pair_gains(folded, layout, pair)?;
    score(folded, layout, pair, (raw.0.max(0.0), raw.1.max(0.0)))
}

/// `L⁻¹ · s` for the pair's direction matrix `L = [v1 v2]`.
fn pair_gains(source: (f64, f64), layout: &SpeakerLayout, pair: SpeakerPair) -> Option<(f64, f64)> {
    let v1 = layout.direction(pair.first);
    let v2 = layout.direction(pair.second);
    let det = v1.0 * v2.1 - v2.0 * v1.1;
    if libm::fabs(det) < SINGULAR_EPSILON {
        return None;
    }
    let g1 = (source.0 * v2.1 - v2.0 * source.1) / det;
    let g2 = (v1.0 * source.1 - source.0 * v1.1) / det;
    Some((g1, g2))
}

/// Normalize non-negative pair gains and score how well they point at `source`.
fn score(
    source: (f64, f64),
    layout: &SpeakerLayout,
    pair: SpeakerPair,
    gains: (f64, f64),
) -> Option<Candidate> {
    let norm = libm::sqrt(gains.0 * gains.0 + gains.1 * gains.1);
    if norm < NORM_EPSILON {
        return None;
    }
    let gains = (gains.0 / norm, gains.1 / norm);

    let v1 = layout.direction(pair.first);
    let v2 = layout.direction(pair.second);
    let reconstructed = unit((gains.0 * v1.0 + gains.1 * v2.0, gains.0 * v1.1 + gains.1 * v2.1))?;

    Some(Candidate {
        pair,
        gains,
        alignment: dot(reconstructed, source),
    })
}

fn dot(a: (f64, f64), b: (f64, f64)) -> f64 {
    a.0 * b.0 + a.1 * b.1
}

fn unit(v: (f64, f64)) -> Option<(f64, f64)> {
    let len = libm::sqrt(dot(v, v));
    (len >= NORM_EPSILON).then(|| (v.0 / len, v.1 / len))
}
