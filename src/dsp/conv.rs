//! Convolution
//!
//! Input-side convolution: every input sample scales a copy of the kernel
//! and adds it into the output at its own offset. The result of convolving
//! `a` frames with `b` frames is `a + b - 1` frames long.

use crate::block::AudioBlock;

/// Output frames of convolving signals of `a` and `b` frames
pub fn conv_len(a: usize, b: usize) -> usize {
    if a == 0 || b == 0 {
        0
    } else {
        a + b - 1
    }
}

/// Convolve `input` with `kernel` into a new buffer
pub fn convolve(input: &[f64], kernel: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; conv_len(input.len(), kernel.len())];
    convolve_into(input, kernel, &mut out);
    out
}

/// Accumulate the convolution of `input` and `kernel` into `out`.
///
/// Terms past the end of `out` are dropped, so a short output keeps only the
/// leading part of the result.
pub fn convolve_into(input: &[f64], kernel: &[f64], out: &mut [f64]) {
    for (i, &x) in input.iter().enumerate() {
        let Some(tail) = out.get_mut(i..) else {
            break;
        };
        for (o, &k) in tail.iter_mut().zip(kernel) {
            *o += x * k;
        }
    }
}

/// Convolve every channel of `input` with the same kernel
pub fn convolve_block(input: &AudioBlock, kernel: &[f64]) -> AudioBlock {
    let frames = conv_len(input.frames(), kernel.len());
    let mut out = AudioBlock::new(frames, input.channels());
    for ch in 0..input.channels() {
        convolve_into(input.channel(ch), kernel, out.channel_mut(ch));
    }
    out
}
