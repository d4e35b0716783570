//! Window functions
//!
//! Each function evaluates point `n` of a window `size` points long. The
//! tapering windows are symmetric, so both end points share the same value.
//! A window of one point (or none) is flat.

use crate::block::AudioBlock;
use libm::Libm;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// `a0` of the Hann window
pub const HANN_A0: f64 = 0.5;

/// `a0` of the Hamming window
pub const HAMMING_A0: f64 = 0.54;

/// `alpha` of the classic Blackman window
pub const BLACKMAN_ALPHA: f64 = 0.16;

/// Position of `n` as a fraction of a full turn across the window
#[inline]
fn turn(n: usize, size: usize) -> Option<f64> {
    (size > 1).then(|| TAU * n as f64 / (size - 1) as f64)
}

/// Always one
#[inline]
pub fn rectangle(_n: usize, _size: usize) -> f64 {
    1.0
}

/// Generalized raised cosine: `a0 - (1 - a0) * cos(2 pi n / (size - 1))`
pub fn raised_cosine(n: usize, size: usize, a0: f64) -> f64 {
    match turn(n, size) {
        Some(angle) => a0 - (1.0 - a0) * Libm::<f64>::cos(angle),
        None => 1.0,
    }
}

/// Hann window, touching zero at both ends
pub fn hann(n: usize, size: usize) -> f64 {
    raised_cosine(n, size, HANN_A0)
}

/// Hamming window, with non-zero end points
pub fn hamming(n: usize, size: usize) -> f64 {
    raised_cosine(n, size, HAMMING_A0)
}

/// Blackman window with a configurable `alpha`.
///
/// `w(n) = (1 - alpha) / 2 - cos(2 pi n / (size - 1)) / 2 + alpha / 2 * cos(4 pi n / (size - 1))`
pub fn blackman_with(n: usize, size: usize, alpha: f64) -> f64 {
    match turn(n, size) {
        Some(angle) => {
            (1.0 - alpha) / 2.0 - 0.5 * Libm::<f64>::cos(angle)
                + alpha / 2.0 * Libm::<f64>::cos(2.0 * angle)
        }
        None => 1.0,
    }
}

pub fn blackman(n: usize, size: usize) -> f64 {
    blackman_with(n, size, BLACKMAN_ALPHA)
}

/// Named window shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Window {
    #[default]
    Rectangle,
    Hann,
    Hamming,
    Blackman,
}

impl Window {
    /// Value at point `n` of a `size`-point window
    pub fn value(self, n: usize, size: usize) -> f64 {
        match self {
            Window::Rectangle => rectangle(n, size),
            Window::Hann => hann(n, size),
            Window::Hamming => hamming(n, size),
            Window::Blackman => blackman(n, size),
        }
    }

    /// Every coefficient of a `size`-point window
    pub fn coefficients(self, size: usize) -> Vec<f64> {
        (0..size).map(|n| self.value(n, size)).collect()
    }

    /// Taper every channel of `block` in place, one coefficient per frame
    pub fn apply(self, block: &mut AudioBlock) {
        let coeffs = self.coefficients(block.frames());
        for ch in 0..block.channels() {
            for (sample, w) in block.channel_mut(ch).iter_mut().zip(&coeffs) {
                *sample *= w;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rectangle_is_flat() {
        assert!(Window::Rectangle.coefficients(7).iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_hann_shape() {
        let w = Window::Hann.coefficients(9);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[4], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[8], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[2], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_hamming_end_points() {
        let w = Window::Hamming.coefficients(11);
        assert_abs_diff_eq!(w[0], 0.08, epsilon = 1e-12);
        assert_abs_diff_eq!(w[10], 0.08, epsilon = 1e-12);
        assert_abs_diff_eq!(w[5], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_blackman_shape() {
        let w = Window::Blackman.coefficients(9);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[4], 1.0, epsilon = 1e-12);
        // Quarter point: 0.42 - 0.5 * cos(pi/2) + 0.08 * cos(pi)
        assert_abs_diff_eq!(w[2], 0.34, epsilon = 1e-12);
        assert_abs_diff_eq!(blackman_with(4, 9, 0.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_windows_are_symmetric() {
        for window in [Window::Hann, Window::Hamming, Window::Blackman] {
            let w = window.coefficients(16);
            for n in 0..8 {
                assert_abs_diff_eq!(w[n], w[15 - n], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_degenerate_sizes() {
        assert_eq!(hann(0, 1), 1.0);
        assert_eq!(blackman(0, 0), 1.0);
        assert!(Window::Hann.coefficients(0).is_empty());
    }

    #[test]
    fn test_apply_tapers_each_channel() {
        let mut block = AudioBlock::constant(5, 2, 2.0);
        Window::Hann.apply(&mut block);
        for ch in 0..2 {
            assert_abs_diff_eq!(block.get(ch, 0), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(block.get(ch, 2), 2.0, epsilon = 1e-12);
            assert_abs_diff_eq!(block.get(ch, 1), 1.0, epsilon = 1e-12);
        }
    }
}
