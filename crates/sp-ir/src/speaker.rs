//! Loudspeaker layouts and the pair topology walked by the gain solver.

use arrayvec::{ArrayString, ArrayVec};
use core::fmt;
use core::str::FromStr;

use crate::angle::{clockwise_gap, direction, normalize_azimuth};

/// Maximum number of speakers in a layout.
pub const MAX_SPEAKERS: usize = 8;

/// Maximum length of a speaker name in bytes.
pub const MAX_NAME_LEN: usize = 24;

/// Two azimuths closer than this are the same direction.
const AZIMUTH_EPSILON: f32 = 1e-3;

/// Error raised when a speaker layout cannot render every direction.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("a layout needs at least 2 speakers, got {0}")]
    TooFewSpeakers(usize),
    #[error("a layout holds at most {max} speakers, got {0}", max = MAX_SPEAKERS)]
    TooManySpeakers(usize),
    #[error("speaker {0} has a non-finite azimuth")]
    NonFiniteAzimuth(usize),
    #[error("speaker {0} has an empty name or one longer than {max} bytes", max = MAX_NAME_LEN)]
    InvalidName(usize),
    #[error("speakers {first} and {second} share the name {name:?}")]
    DuplicateName {
        first: usize,
        second: usize,
        name: ArrayString<MAX_NAME_LEN>,
    },
    #[error("speakers {first} and {second} share azimuth {azimuth_deg}°")]
    DuplicateAzimuth {
        first: usize,
        second: usize,
        azimuth_deg: f32,
    },
    #[error("{gap_deg}° gap between speakers {from} and {to} leaves directions uncovered")]
    CoverageGap { from: usize, to: usize, gap_deg: f32 },
}

/// A named loudspeaker.
#[derive(Clone, Debug, PartialEq)]
pub struct Speaker {
    pub name: ArrayString<MAX_NAME_LEN>,
    /// Azimuth in `[-180, 180)`, positive to the right.
    pub azimuth_deg: f32,
}

/// Two speakers whose sector can jointly render a source between them.
///
/// `first` sits counter-clockwise of `second`; the sector runs clockwise
/// from `first` to `second`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpeakerPair {
    pub first: usize,
    pub second: usize,
}

/// Built-in layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutPreset {
    /// Left −30°, Right +30°.
    Stereo,
    /// ITU-style 5.0 without LFE.
    Surround50,
}

impl LayoutPreset {
    /// Speaker names and azimuths, in channel order.
    pub fn speakers(self) -> &'static [(&'static str, f32)] {
        match self {
            LayoutPreset::Stereo => &[("Left", -30.0), ("Right", 30.0)],
            LayoutPreset::Surround50 => &[
                ("Center", 0.0),
                ("Right", 30.0),
                ("Rear Right", 110.0),
                ("Rear Left", -110.0),
                ("Left", -30.0),
            ],
        }
    }
}

impl fmt::Display for LayoutPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutPreset::Stereo => f.write_str("2.0"),
            LayoutPreset::Surround50 => f.write_str("5.0"),
        }
    }
}

/// Error for an unrecognised preset name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown layout preset (expected \"stereo\", \"2.0\", \"5.0\" or \"surround\")")]
pub struct UnknownPreset;

impl FromStr for LayoutPreset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2.0" | "stereo" => Ok(LayoutPreset::Stereo),
            "5.0" | "surround" => Ok(LayoutPreset::Surround50),
            _ => Err(UnknownPreset),
        }
    }
}

/// An immutable set of speakers plus the adjacent pairs covering 360°.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeakerLayout {
    speakers: ArrayVec<Speaker, MAX_SPEAKERS>,
    pairs: ArrayVec<SpeakerPair, MAX_SPEAKERS>,
}

impl SpeakerLayout {
    /// Build a layout from `(name, azimuth)` pairs given in channel order.
    ///
    /// Adjacent pairs are found by sorting the speakers by azimuth and
    /// linking angular neighbours, wrap-around included. With three or more
    /// speakers every neighbour gap must be below 180°. A two-speaker layout
    /// gets a single pair spanning the smaller arc; the solver folds the
    /// remaining directions onto it.
    pub fn new(speakers: &[(&str, f32)]) -> Result<Self, LayoutError> {
        if speakers.len() < 2 {
            return Err(LayoutError::TooFewSpeakers(speakers.len()));
        }
        if speakers.len() > MAX_SPEAKERS {
            return Err(LayoutError::TooManySpeakers(speakers.len()));
        }

        let mut list: ArrayVec<Speaker, MAX_SPEAKERS> = ArrayVec::new();
        for (i, &(name, azimuth_deg)) in speakers.iter().enumerate() {
            if !azimuth_deg.is_finite() {
                return Err(LayoutError::NonFiniteAzimuth(i));
            }
            let name = ArrayString::from(name)
                .ok()
                .filter(|n| !n.trim().is_empty())
                .ok_or(LayoutError::InvalidName(i))?;
            let azimuth_deg = normalize_azimuth(azimuth_deg);

            for (j, other) in list.iter().enumerate() {
                if other.name.eq_ignore_ascii_case(&name) {
                    return Err(LayoutError::DuplicateName { first: j, second: i, name });
                }
                let apart = clockwise_gap(other.azimuth_deg, azimuth_deg);
                if apart < AZIMUTH_EPSILON || 360.0 - apart < AZIMUTH_EPSILON {
                    return Err(LayoutError::DuplicateAzimuth { first: j, second: i, azimuth_deg });
                }
            }
            list.push(Speaker { name, azimuth_deg });
        }

        let pairs = adjacent_pairs(&list)?;
        Ok(Self { speakers: list, pairs })
    }

    pub fn preset(preset: LayoutPreset) -> Result<Self, LayoutError> {
        Self::new(preset.speakers())
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    /// True for the two-speaker topology.
    pub fn is_stereo(&self) -> bool {
        self.speakers.len() == 2
    }

    pub fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    pub fn speaker(&self, index: usize) -> Option<&Speaker> {
        self.speakers.get(index)
    }

    /// Adjacent pairs in ascending azimuth order of their first speaker.
    pub fn pairs(&self) -> &[SpeakerPair] {
        &self.pairs
    }

    /// Channel index of the speaker called `name` (ASCII case-insensitive).
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.speakers
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn azimuth_of(&self, name: &str) -> Option<f32> {
        self.index_of(name).map(|i| self.speakers[i].azimuth_deg)
    }

    /// Unit direction vector of speaker `index`.
    pub(crate) fn direction(&self, index: usize) -> (f64, f64) {
        direction(self.speakers[index].azimuth_deg)
    }
}

fn adjacent_pairs(
    speakers: &[Speaker],
) -> Result<ArrayVec<SpeakerPair, MAX_SPEAKERS>, LayoutError> {
    let mut order: ArrayVec<usize, MAX_SPEAKERS> = (0..speakers.len()).collect();
    order.sort_unstable_by(|&a, &b| {
        speakers[a]
            .azimuth_deg
            .total_cmp(&speakers[b].azimuth_deg)
    });

    let mut pairs = ArrayVec::new();

    if order.len() == 2 {
        let (a, b) = (order[0], order[1]);
        let gap = clockwise_gap(speakers[a].azimuth_deg, speakers[b].azimuth_deg);
        // Opposite speakers have no front arc to fold onto.
        if libm::fabsf(gap - 180.0) < AZIMUTH_EPSILON {
            return Err(LayoutError::CoverageGap { from: a, to: b, gap_deg: gap });
        }
        let pair = if gap < 180.0 {
            SpeakerPair { first: a, second: b }
        } else {
            SpeakerPair { first: b, second: a }
        };
        pairs.push(pair);
        return Ok(pairs);
    }

    for k in 0..order.len() {
        let first = order[k];
        let second = order[(k + 1) % order.len()];
        let gap = clockwise_gap(speakers[first].azimuth_deg, speakers[second].azimuth_deg);
        if gap >= 180.0 - AZIMUTH_EPSILON {
            return Err(LayoutError::CoverageGap { from: first, to: second, gap_deg: gap });
        }
        pairs.push(SpeakerPair { first, second });
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surround_pairs_link_angular_neighbours() {
        let layout = SpeakerLayout::preset(LayoutPreset::Surround50).unwrap();
        assert_eq!(layout.len(), 5);
        // Channel order: C, R, RR, RL, L. Sorted: RL(-110) L(-30) C(0) R(30) RR(110).
        let expected = [(3, 4), (4, 0), (0, 1), (1, 2), (2, 3)];
        let got: Vec<_> = layout.pairs().iter().map(|p| (p.first, p.second)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn stereo_pair_spans_front_arc() {
        let layout = SpeakerLayout::preset(LayoutPreset::Stereo).unwrap();
        assert!(layout.is_stereo());
        assert_eq!(layout.pairs(), &[SpeakerPair { first: 0, second: 1 }]);
    }

    #[test]
    fn stereo_pair_order_follows_smaller_arc() {
        let layout = SpeakerLayout::new(&[("Back", 170.0), ("Other", -170.0)]).unwrap();
        // 170 -> -170 clockwise is 20°.
        assert_eq!(layout.pairs(), &[SpeakerPair { first: 0, second: 1 }]);
    }

    #[test]
    fn name_and_azimuth_lookup() {
        let layout = SpeakerLayout::preset(LayoutPreset::Surround50).unwrap();
        assert_eq!(layout.index_of("Rear Left"), Some(3));
        assert_eq!(layout.index_of("rear left"), Some(3));
        assert_eq!(layout.azimuth_of("Right"), Some(30.0));
        assert_eq!(layout.azimuth_of("Sub"), None);
    }

    #[test]
    fn azimuths_are_normalized() {
        let layout = SpeakerLayout::new(&[
            ("FL", 315.0),
            ("FR", 45.0),
            ("RL", 225.0),
            ("RR", 135.0),
        ])
        .unwrap();
        assert_eq!(layout.speaker(0).unwrap().azimuth_deg, -45.0);
        assert_eq!(layout.speaker(2).unwrap().azimuth_deg, -135.0);
    }

    #[test]
    fn rejects_single_speaker() {
        assert_eq!(
            SpeakerLayout::new(&[("Mono", 0.0)]),
            Err(LayoutError::TooFewSpeakers(1))
        );
    }

    #[test]
    fn rejects_too_many_speakers() {
        let many: Vec<(&str, f32)> = ["a", "b", "c", "d", "e", "f", "g", "h", "i"]
            .iter()
            .enumerate()
            .map(|(i, n)| (*n, i as f32 * 40.0))
            .collect();
        assert_eq!(SpeakerLayout::new(&many), Err(LayoutError::TooManySpeakers(9)));
    }

    #[test]
    fn rejects_duplicate_azimuth() {
        let err = SpeakerLayout::new(&[("A", 0.0), ("B", 90.0), ("C", 360.0)]).unwrap_err();
        assert!(matches!(err, LayoutError::DuplicateAzimuth { first: 0, second: 2, .. }));
    }

    #[test]
    fn rejects_duplicate_name() {
        let err = SpeakerLayout::new(&[("A", 0.0), ("a", 120.0), ("C", -120.0)]).unwrap_err();
        assert!(matches!(err, LayoutError::DuplicateName { first: 0, second: 1, .. }));
    }

    #[test]
    fn rejects_blank_and_long_names() {
        assert_eq!(
            SpeakerLayout::new(&[(" ", 0.0), ("B", 30.0)]),
            Err(LayoutError::InvalidName(0))
        );
        let long = "a speaker name that is far too long";
        assert_eq!(
            SpeakerLayout::new(&[("A", 0.0), (long, 30.0)]),
            Err(LayoutError::InvalidName(1))
        );
    }

    #[test]
    fn rejects_non_finite_azimuth() {
        assert_eq!(
            SpeakerLayout::new(&[("A", 0.0), ("B", f32::NAN)]),
            Err(LayoutError::NonFiniteAzimuth(1))
        );
    }

    #[test]
    fn rejects_front_only_surround() {
        // Everything in front: the rear gap is 300°.
        let err = SpeakerLayout::new(&[("L", -30.0), ("C", 0.0), ("R", 30.0)]).unwrap_err();
        assert!(matches!(err, LayoutError::CoverageGap { from: 2, to: 0, .. }));
    }

    #[test]
    fn rejects_opposite_stereo_pair() {
        let err = SpeakerLayout::new(&[("L", -90.0), ("R", 90.0)]).unwrap_err();
        assert!(matches!(err, LayoutError::CoverageGap { .. }));
    }

    #[test]
    fn preset_names_parse() {
        assert_eq!("stereo".parse(), Ok(LayoutPreset::Stereo));
        assert_eq!("2.0".parse(), Ok(LayoutPreset::Stereo));
        assert_eq!("5.0".parse(), Ok(LayoutPreset::Surround50));
        assert_eq!("7.1".parse::<LayoutPreset>(), Err(UnknownPreset));
    }
}
