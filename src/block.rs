//! Multi-channel audio blocks
//!
//! An [`AudioBlock`] is the unit of data moved between modules: `channels`
//! channels of `frames` samples each, stored in one contiguous buffer.
//!
//! Two orders are available over the same storage:
//!
//! - **sequential**: all of channel 0, then all of channel 1, ... This is the
//!   storage order and suits per-channel algorithms (envelopes, transforms).
//! - **interleaved**: frame-major, `ch0@t0, ch1@t0, ch0@t1, ...`. This suits
//!   device I/O and time-domain mixing.
//!
//! Both orders address exactly `channels * frames` cells. Cursors report their
//! linear index so callers can do boundary checks mid-iteration.

use crate::info::ChainInfo;
use libm::Libm;

/// Multi-channel, fixed-size sample container
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    /// Sample data, channel-major
    samples: Vec<f64>,
    frames: usize,
    channels: usize,
}

impl AudioBlock {
    /// Create a zeroed block of `frames` samples per channel
    pub fn new(frames: usize, channels: usize) -> Self {
        Self {
            samples: vec![0.0; frames * channels],
            frames,
            channels,
        }
    }

    /// Create a zeroed block sized from a chain descriptor
    pub fn from_info(info: &ChainInfo) -> Self {
        Self::new(info.block_size, info.channels)
    }

    /// Create a block filled with a constant value
    pub fn constant(frames: usize, channels: usize, value: f64) -> Self {
        Self {
            samples: vec![value; frames * channels],
            frames,
            channels,
        }
    }

    /// Create a single-channel block from existing samples
    pub fn from_samples(samples: Vec<f64>) -> Self {
        let frames = samples.len();
        Self {
            samples,
            frames,
            channels: 1,
        }
    }

    /// Create a block from per-channel vectors.
    ///
    /// Returns `None` if the channels differ in length or none are given.
    pub fn from_channels(channels: Vec<Vec<f64>>) -> Option<Self> {
        let frames = channels.first()?.len();
        if channels.iter().any(|c| c.len() != frames) {
            return None;
        }
        let count = channels.len();
        Some(Self {
            samples: channels.into_iter().flatten().collect(),
            frames,
            channels: count,
        })
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Total number of cells (`channels * frames`)
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True if `other` has the same channel and frame count
    #[inline]
    pub fn same_shape(&self, other: &AudioBlock) -> bool {
        self.frames == other.frames && self.channels == other.channels
    }

    /// Linear sequential index of `(channel, frame)`
    #[inline]
    pub fn sequential_index(&self, channel: usize, frame: usize) -> usize {
        channel * self.frames + frame
    }

    /// Linear interleaved index of `(channel, frame)`
    #[inline]
    pub fn interleaved_index(&self, channel: usize, frame: usize) -> usize {
        frame * self.channels + channel
    }

    /// Sample at `(channel, frame)`, or 0.0 out of bounds
    #[inline]
    pub fn get(&self, channel: usize, frame: usize) -> f64 {
        if channel < self.channels && frame < self.frames {
            self.samples[self.sequential_index(channel, frame)]
        } else {
            0.0
        }
    }

    /// Set the sample at `(channel, frame)`; ignored out of bounds
    #[inline]
    pub fn set(&mut self, channel: usize, frame: usize, value: f64) {
        if channel < self.channels && frame < self.frames {
            let index = self.sequential_index(channel, frame);
            self.samples[index] = value;
        }
    }

    /// Sample at interleaved position `index`, or 0.0 out of bounds
    #[inline]
    pub fn get_interleaved(&self, index: usize) -> f64 {
        if index < self.samples.len() {
            let (channel, frame) = (index % self.channels, index / self.channels);
            self.samples[self.sequential_index(channel, frame)]
        } else {
            0.0
        }
    }

    /// One channel's samples
    pub fn channel(&self, channel: usize) -> &[f64] {
        let start = channel * self.frames;
        &self.samples[start..start + self.frames]
    }

    /// One channel's samples, mutably
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f64] {
        let start = channel * self.frames;
        &mut self.samples[start..start + self.frames]
    }

    /// All samples in sequential order
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    /// All samples in sequential order, mutably
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    /// Cursor over the sequential view
    pub fn sequential(&self) -> Sequential<'_> {
        Sequential {
            block: self,
            index: 0,
        }
    }

    /// Mutable cursor over the sequential view
    pub fn sequential_mut(&mut self) -> SequentialMut<'_> {
        SequentialMut {
            inner: self.samples.iter_mut(),
            frames: self.frames,
            index: 0,
        }
    }

    /// Cursor over the interleaved view
    pub fn interleaved(&self) -> Interleaved<'_> {
        Interleaved {
            block: self,
            index: 0,
        }
    }

    /// Mutable cursor over the interleaved view
    pub fn interleaved_mut(&mut self) -> InterleavedMut<'_> {
        let channels = self.channels;
        let lanes = if self.frames == 0 {
            Vec::new()
        } else {
            self.samples
                .chunks_mut(self.frames)
                .map(|c| c.iter_mut())
                .collect()
        };
        InterleavedMut {
            lanes,
            channels,
            index: 0,
        }
    }

    /// Copy the interleaved view into a new vector
    pub fn to_interleaved(&self) -> Vec<f64> {
        self.interleaved().collect()
    }

    /// Overwrite the block from interleaved samples.
    ///
    /// Copies as many cells as both sides hold; the rest is left untouched.
    pub fn copy_from_interleaved(&mut self, data: &[f64]) {
        for (dst, &src) in self.interleaved_mut().zip(data) {
            *dst = src;
        }
    }

    /// Fill every cell with a constant value
    pub fn fill(&mut self, value: f64) {
        self.samples.fill(value);
    }

    /// Clear the block (fill with zeros)
    pub fn clear(&mut self) {
        self.fill(0.0);
    }

    /// Add a constant to all samples
    pub fn add_scalar(&mut self, value: f64) {
        for sample in &mut self.samples {
            *sample += value;
        }
    }

    /// Multiply all samples by a constant
    pub fn mul_scalar(&mut self, value: f64) {
        for sample in &mut self.samples {
            *sample *= value;
        }
    }

    /// Accumulate another block sample-for-sample.
    ///
    /// Both blocks must have the same shape; only the common extent is touched.
    pub fn add_block(&mut self, other: &AudioBlock) {
        debug_assert!(self.same_shape(other), "block shape mismatch");
        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            *dst += *src;
        }
    }

    /// Multiply by another block sample-for-sample
    pub fn mul_block(&mut self, other: &AudioBlock) {
        debug_assert!(self.same_shape(other), "block shape mismatch");
        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            *dst *= *src;
        }
    }

    /// Apply a function to every sample
    pub fn map<F: Fn(f64) -> f64>(&mut self, f: F) {
        for sample in &mut self.samples {
            *sample = f(*sample);
        }
    }

    /// Peak absolute value
    pub fn peak(&self) -> f64 {
        self.samples.iter().map(|s| s.abs()).fold(0.0, f64::max)
    }

    /// Root mean square over every cell
    pub fn rms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| s * s).sum();
        Libm::<f64>::sqrt(sum / self.samples.len() as f64)
    }

    /// Copy samples from another block of the same shape
    pub fn copy_from(&mut self, other: &AudioBlock) {
        debug_assert!(self.same_shape(other), "block shape mismatch");
        let len = self.samples.len().min(other.samples.len());
        self.samples[..len].copy_from_slice(&other.samples[..len]);
    }
}

impl Default for AudioBlock {
    fn default() -> Self {
        Self::from_info(&ChainInfo::default())
    }
}

/// Position-reporting cursor over the sequential view
pub struct Sequential<'a> {
    block: &'a AudioBlock,
    index: usize,
}

impl Sequential<'_> {
    /// Linear index of the next sample
    pub fn index(&self) -> usize {
        self.index
    }

    /// Channel of the next sample
    pub fn channel(&self) -> usize {
        self.index / self.block.frames.max(1)
    }

    /// Frame of the next sample
    pub fn frame(&self) -> usize {
        self.index % self.block.frames.max(1)
    }

    /// Move the cursor to an absolute linear index
    pub fn seek(&mut self, index: usize) {
        self.index = index.min(self.block.len());
    }
}

impl Iterator for Sequential<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let value = *self.block.samples.get(self.index)?;
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.block.len() - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Sequential<'_> {}

/// Mutable cursor over the sequential view
pub struct SequentialMut<'a> {
    inner: core::slice::IterMut<'a, f64>,
    frames: usize,
    index: usize,
}

impl SequentialMut<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn channel(&self) -> usize {
        self.index / self.frames.max(1)
    }

    pub fn frame(&self) -> usize {
        self.index % self.frames.max(1)
    }
}

impl<'a> Iterator for SequentialMut<'a> {
    type Item = &'a mut f64;

    fn next(&mut self) -> Option<&'a mut f64> {
        let cell = self.inner.next()?;
        self.index += 1;
        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for SequentialMut<'_> {}

/// Position-reporting cursor over the interleaved view
pub struct Interleaved<'a> {
    block: &'a AudioBlock,
    index: usize,
}

impl Interleaved<'_> {
    /// Linear interleaved index of the next sample
    pub fn index(&self) -> usize {
        self.index
    }

    /// Channel of the next sample
    pub fn channel(&self) -> usize {
        self.index % self.block.channels.max(1)
    }

    /// Frame of the next sample
    pub fn frame(&self) -> usize {
        self.index / self.block.channels.max(1)
    }

    /// Move the cursor to an absolute linear index
    pub fn seek(&mut self, index: usize) {
        self.index = index.min(self.block.len());
    }
}

impl Iterator for Interleaved<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.index >= self.block.len() {
            return None;
        }
        let value = self.block.get_interleaved(self.index);
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.block.len() - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Interleaved<'_> {}

/// Mutable cursor over the interleaved view.
///
/// Holds one iterator per channel and takes one cell from each in turn.
pub struct InterleavedMut<'a> {
    lanes: Vec<core::slice::IterMut<'a, f64>>,
    channels: usize,
    index: usize,
}

impl InterleavedMut<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn channel(&self) -> usize {
        self.index % self.channels.max(1)
    }

    pub fn frame(&self) -> usize {
        self.index / self.channels.max(1)
    }
}

impl<'a> Iterator for InterleavedMut<'a> {
    type Item = &'a mut f64;

    fn next(&mut self) -> Option<&'a mut f64> {
        let lane = self.index % self.channels.max(1);
        let cell = self.lanes.get_mut(lane)?.next()?;
        self.index += 1;
        Some(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_block(frames: usize, channels: usize) -> AudioBlock {
        let mut block = AudioBlock::new(frames, channels);
        for (i, cell) in block.as_mut_slice().iter_mut().enumerate() {
            *cell = i as f64;
        }
        block
    }

    #[test]
    fn test_new_block_is_zeroed() {
        let block = AudioBlock::new(16, 2);
        assert_eq!(block.frames(), 16);
        assert_eq!(block.channels(), 2);
        assert_eq!(block.len(), 32);
        assert!(block.as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_from_info_uses_descriptor() {
        let info = ChainInfo {
            sample_rate: 48_000,
            channels: 3,
            block_size: 128,
        };
        let block = AudioBlock::from_info(&info);
        assert_eq!(block.frames(), 128);
        assert_eq!(block.channels(), 3);
    }

    #[test]
    fn test_sequential_order() {
        let block = ramp_block(3, 2);
        let seq: Vec<f64> = block.sequential().collect();
        assert_eq!(seq, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(block.channel(1), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_interleaved_order() {
        let block = ramp_block(3, 2);
        // channel 0 = [0,1,2], channel 1 = [3,4,5]
        let inter: Vec<f64> = block.interleaved().collect();
        assert_eq!(inter, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_cursor_positions() {
        let block = ramp_block(4, 2);
        let mut inter = block.interleaved();
        inter.next();
        inter.next();
        inter.next();
        assert_eq!(inter.index(), 3);
        assert_eq!(inter.channel(), 1);
        assert_eq!(inter.frame(), 1);

        let mut seq = block.sequential();
        seq.seek(5);
        assert_eq!(seq.channel(), 1);
        assert_eq!(seq.frame(), 1);
        assert_eq!(seq.next(), Some(5.0));
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn test_interleaved_mut_writes_frame_major() {
        let mut block = AudioBlock::new(3, 2);
        for (i, cell) in block.interleaved_mut().enumerate() {
            *cell = i as f64;
        }
        assert_eq!(block.channel(0), &[0.0, 2.0, 4.0]);
        assert_eq!(block.channel(1), &[1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_views_cover_every_cell_once() {
        let mut block = AudioBlock::new(5, 3);
        assert_eq!(block.interleaved_mut().count(), 15);
        assert_eq!(block.sequential_mut().count(), 15);
        assert_eq!(block.interleaved().count(), 15);
        assert_eq!(block.sequential().count(), 15);
    }

    #[test]
    fn test_interleaved_round_trip() {
        let block = ramp_block(4, 3);
        let inter = block.to_interleaved();
        let mut other = AudioBlock::new(4, 3);
        other.copy_from_interleaved(&inter);
        assert_eq!(block, other);
    }

    #[test]
    fn test_add_block_accumulates() {
        let mut a = AudioBlock::constant(8, 2, 1.5);
        let b = AudioBlock::constant(8, 2, 2.0);
        a.add_block(&b);
        a.add_block(&b);
        assert!(a.as_slice().iter().all(|&s| s == 5.5));
    }

    #[test]
    fn test_get_set_bounds() {
        let mut block = AudioBlock::new(4, 1);
        block.set(0, 2, 0.75);
        block.set(3, 0, 9.0);
        assert_eq!(block.get(0, 2), 0.75);
        assert_eq!(block.get(3, 0), 0.0);
        assert_eq!(block.get(0, 10), 0.0);
    }

    #[test]
    fn test_from_channels_rejects_ragged() {
        assert!(AudioBlock::from_channels(vec![vec![0.0; 3], vec![0.0; 2]]).is_none());
        let block = AudioBlock::from_channels(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(block.to_interleaved(), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_stats() {
        let block = AudioBlock::from_samples(vec![1.0, -1.0, 1.0, -1.0]);
        assert_eq!(block.peak(), 1.0);
        assert!((block.rms() - 1.0).abs() < 1e-12);
    }
}
