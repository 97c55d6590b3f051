//! Per-speaker gain vectors.

use arrayvec::ArrayVec;

use crate::speaker::MAX_SPEAKERS;

/// One non-negative amplitude multiplier per speaker, in layout order.
///
/// Holds its values inline so copies never touch the heap.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GainVector {
    gains: ArrayVec<f32, MAX_SPEAKERS>,
}

impl GainVector {
    /// An all-zero vector of `len` gains (capped at [`MAX_SPEAKERS`]).
    pub fn silent(len: usize) -> Self {
        let mut gains = ArrayVec::new();
        for _ in 0..len.min(MAX_SPEAKERS) {
            gains.push(0.0);
        }
        Self { gains }
    }

    /// Copy up to [`MAX_SPEAKERS`] gains from a slice.
    pub fn from_slice(values: &[f32]) -> Self {
        Self {
            gains: values.iter().copied().take(MAX_SPEAKERS).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.gains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gains.is_empty()
    }

    /// Gain for channel `index`, zero when out of range.
    pub fn get(&self, index: usize) -> f32 {
        self.gains.get(index).copied().unwrap_or(0.0)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.gains
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.gains.iter().copied()
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f32 {
        libm::sqrtf(self.gains.iter().map(|g| g * g).sum())
    }

    /// True when every gain is zero.
    pub fn is_silent(&self) -> bool {
        self.gains.iter().all(|&g| g == 0.0)
    }

    pub(crate) fn set(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.gains.get_mut(index) {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn silent_vector_has_requested_length() {
        let g = GainVector::silent(5);
        assert_eq!(g.len(), 5);
        assert!(g.is_silent());
        assert_eq!(g.norm(), 0.0);
    }

    #[test]
    fn length_is_capped() {
        assert_eq!(GainVector::silent(20).len(), MAX_SPEAKERS);
        assert_eq!(GainVector::from_slice(&[0.1; 12]).len(), MAX_SPEAKERS);
    }

    #[test]
    fn out_of_range_reads_are_zero() {
        let g = GainVector::from_slice(&[0.6, 0.8]);
        assert_eq!(g.get(1), 0.8);
        assert_eq!(g.get(7), 0.0);
        assert_abs_diff_eq!(g.norm(), 1.0, epsilon = 1e-6);
    }
}
