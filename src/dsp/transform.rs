//! Real Fourier transforms
//!
//! Spectra use a two-channel block layout: channel 0 holds the real parts and
//! channel 1 the imaginary parts of bins `0..=N/2`, so a signal of `N` frames
//! has `N/2 + 1` spectrum frames. The imaginary part follows the usual
//! `e^{-i}` sign convention.
//!
//! [`forward_transform`] and [`inverse_transform`] evaluate the DFT sums
//! directly. [`fft`] and [`ifft`] produce the same layout through `rustfft`
//! and are the ones to use for anything longer than a few hundred frames.
//!
//! Only channel 0 of a signal block is transformed.

use crate::block::AudioBlock;
use libm::Libm;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::TAU;

/// Spectrum frames for a signal of `frames` frames
pub fn spectrum_len(frames: usize) -> usize {
    frames / 2 + 1
}

/// Signal frames recovered from a spectrum of `frames` frames
pub fn signal_len(frames: usize) -> usize {
    frames.saturating_sub(1) * 2
}

/// Direct DFT of channel 0
pub fn forward_transform(input: &AudioBlock) -> AudioBlock {
    let size = input.frames();
    let bins = spectrum_len(size);
    let mut out = AudioBlock::new(bins, 2);
    if input.channels() == 0 || size == 0 {
        return out;
    }
    let signal = input.channel(0);

    for k in 0..bins {
        let mut re = 0.0;
        let mut im = 0.0;
        for (i, &x) in signal.iter().enumerate() {
            let angle = TAU * (k * i) as f64 / size as f64;
            re += x * Libm::<f64>::cos(angle);
            im -= x * Libm::<f64>::sin(angle);
        }
        out.set(0, k, re);
        out.set(1, k, im);
    }
    out
}

/// Direct inverse DFT back to a single-channel signal
pub fn inverse_transform(spectrum: &AudioBlock) -> AudioBlock {
    let bins = spectrum.frames();
    let size = signal_len(bins);
    let mut out = AudioBlock::new(size, 1);
    if spectrum.channels() < 2 || size == 0 {
        return out;
    }
    let half = size as f64 / 2.0;

    for k in 0..bins {
        let mut re = spectrum.get(0, k) / half;
        let im = -spectrum.get(1, k) / half;
        // DC and Nyquist appear once in the full spectrum
        if k == 0 || k == bins - 1 {
            re /= 2.0;
        }
        for i in 0..size {
            let angle = TAU * (k * i) as f64 / size as f64;
            let value = out.get(0, i) + re * Libm::<f64>::cos(angle) + im * Libm::<f64>::sin(angle);
            out.set(0, i, value);
        }
    }
    out
}

/// Fast forward transform of channel 0
pub fn fft(input: &AudioBlock) -> AudioBlock {
    let size = input.frames();
    let bins = spectrum_len(size);
    let mut out = AudioBlock::new(bins, 2);
    if input.channels() == 0 || size == 0 {
        return out;
    }

    let mut buffer: Vec<Complex<f64>> = input
        .channel(0)
        .iter()
        .map(|&x| Complex::new(x, 0.0))
        .collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(size).process(&mut buffer);

    for (k, bin) in buffer.iter().take(bins).enumerate() {
        out.set(0, k, bin.re);
        out.set(1, k, bin.im);
    }
    out
}

/// Fast inverse transform back to a single-channel signal
pub fn ifft(spectrum: &AudioBlock) -> AudioBlock {
    let bins = spectrum.frames();
    let size = signal_len(bins);
    let mut out = AudioBlock::new(size, 1);
    if spectrum.channels() < 2 || size == 0 {
        return out;
    }

    // Rebuild the full Hermitian spectrum
    let mut buffer = vec![Complex::new(0.0, 0.0); size];
    for k in 0..bins {
        let im = if k == 0 || k == bins - 1 {
            0.0
        } else {
            spectrum.get(1, k)
        };
        let bin = Complex::new(spectrum.get(0, k), im);
        buffer[k] = bin;
        if k > 0 && k < size - k {
            buffer[size - k] = bin.conj();
        }
    }

    let mut planner = FftPlanner::new();
    planner.plan_fft_inverse(size).process(&mut buffer);

    let scale = 1.0 / size as f64;
    for (sample, bin) in out.channel_mut(0).iter_mut().zip(&buffer) {
        *sample = bin.re * scale;
    }
    out
}
