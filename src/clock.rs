//! Sample clock
//!
//! Chain time is measured in processed samples, not wall time: a block that
//! is rendered late still carries the timing it was meant to have. The
//! [`SampleClock`] counts samples and converts the count to nanoseconds using
//! the configured sample rate.
//!
//! A clock is shared through an `Arc` between the envelope sequence advancing
//! it and anything that compares real elapsed time against it (see
//! [`Latency`](crate::modules::Latency)). Fields are relaxed atomics; there is
//! no locking, and only one chain may advance a clock at a time.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Nanoseconds per second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Monotonic sample counter convertible to nanoseconds
#[derive(Debug)]
pub struct SampleClock {
    sample: AtomicU64,
    sample_rate: AtomicU32,
    channels: AtomicU32,
}

impl SampleClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample: AtomicU64::new(0),
            sample_rate: AtomicU32::new(sample_rate),
            channels: AtomicU32::new(1),
        }
    }

    /// Create a clock ready to be shared
    pub fn shared(sample_rate: u32) -> Arc<Self> {
        Arc::new(Self::new(sample_rate))
    }

    /// Current sample count
    #[inline]
    pub fn sample(&self) -> u64 {
        self.sample.load(Ordering::Relaxed)
    }

    pub fn set_sample(&self, sample: u64) {
        self.sample.store(sample, Ordering::Relaxed);
    }

    /// Advance by one sample
    #[inline]
    pub fn tick(&self) {
        self.sample.fetch_add(1, Ordering::Relaxed);
    }

    /// Advance by `count` samples
    pub fn add_samples(&self, count: u64) {
        self.sample.fetch_add(count, Ordering::Relaxed);
    }

    /// Rewind to sample zero
    pub fn reset(&self) {
        self.set_sample(0);
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn set_sample_rate(&self, sample_rate: u32) {
        self.sample_rate.store(sample_rate, Ordering::Relaxed);
    }

    /// Channels counted per frame
    pub fn channels(&self) -> u32 {
        self.channels.load(Ordering::Relaxed)
    }

    /// Count `channels` samples as one frame of time.
    ///
    /// Lets a module tick once per sample of interleaved data and still keep
    /// frame time. A value of zero is treated as one.
    pub fn set_channels(&self, channels: u32) {
        self.channels.store(channels.max(1), Ordering::Relaxed);
    }

    /// Current frame (sample count divided by channels)
    #[inline]
    pub fn frame(&self) -> u64 {
        self.sample() / self.channels().max(1) as u64
    }

    /// Current chain time in nanoseconds
    #[inline]
    pub fn time_ns(&self) -> i64 {
        self.frames_to_ns(self.frame())
    }

    /// Read the current time, then advance by one sample
    #[inline]
    pub fn time_and_tick(&self) -> i64 {
        let time = self.time_ns();
        self.tick();
        time
    }

    /// Nanoseconds covered by `frames` frames at the current rate
    pub fn frames_to_ns(&self, frames: u64) -> i64 {
        let rate = self.sample_rate();
        if rate == 0 {
            return 0;
        }
        (frames as i128 * NANOS_PER_SECOND as i128 / rate as i128) as i64
    }

    /// First frame whose time is at or after `ns`
    pub fn ns_to_frames(&self, ns: i64) -> u64 {
        if ns <= 0 {
            return 0;
        }
        let rate = self.sample_rate() as i128;
        let nanos = NANOS_PER_SECOND as i128;
        ((ns as i128 * rate + nanos - 1) / nanos) as u64
    }

    /// Frames left before chain time reaches `stop_ns`
    pub fn remaining_samples(&self, stop_ns: i64) -> u64 {
        self.ns_to_frames(stop_ns).saturating_sub(self.frame())
    }

    /// Length of one frame in nanoseconds
    pub fn nanos_per_frame(&self) -> f64 {
        match self.sample_rate() {
            0 => 0.0,
            rate => NANOS_PER_SECOND as f64 / rate as f64,
        }
    }
}

impl Default for SampleClock {
    fn default() -> Self {
        Self::new(crate::info::DEFAULT_SAMPLE_RATE)
    }
}

/// Wall-clock interval timer
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Nanoseconds since this clock was started
    pub fn elapsed_ns(&self) -> i64 {
        self.origin.elapsed().as_nanos() as i64
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_follows_samples() {
        let clock = SampleClock::new(1000);
        assert_eq!(clock.time_ns(), 0);
        clock.add_samples(500);
        assert_eq!(clock.time_ns(), 500_000_000);
        clock.tick();
        assert_eq!(clock.sample(), 501);
        assert_eq!(clock.time_ns(), 501_000_000);
    }

    #[test]
    fn test_time_and_tick_returns_previous() {
        let clock = SampleClock::new(100);
        assert_eq!(clock.time_and_tick(), 0);
        assert_eq!(clock.time_and_tick(), 10_000_000);
        assert_eq!(clock.sample(), 2);
    }

    #[test]
    fn test_channels_divide_samples() {
        let clock = SampleClock::new(1000);
        clock.set_channels(2);
        clock.add_samples(4);
        assert_eq!(clock.frame(), 2);
        assert_eq!(clock.time_ns(), 2_000_000);
        clock.set_channels(0);
        assert_eq!(clock.channels(), 1);
    }

    #[test]
    fn test_ns_frame_conversion() {
        let clock = SampleClock::new(44_100);
        let ns = clock.frames_to_ns(44_100);
        assert_eq!(ns, NANOS_PER_SECOND);
        assert_eq!(clock.ns_to_frames(ns), 44_100);
        // Every frame index maps back to itself
        for frame in [1u64, 7, 441, 12_345] {
            assert_eq!(clock.ns_to_frames(clock.frames_to_ns(frame)), frame);
        }
    }

    #[test]
    fn test_remaining_samples() {
        let clock = SampleClock::new(1000);
        assert_eq!(clock.remaining_samples(NANOS_PER_SECOND * 5), 5000);
        clock.add_samples(1000);
        assert_eq!(clock.remaining_samples(NANOS_PER_SECOND * 5), 4000);
        clock.add_samples(10_000);
        assert_eq!(clock.remaining_samples(NANOS_PER_SECOND * 5), 0);
    }

    #[test]
    fn test_shared_clock_is_visible_to_all_holders() {
        let clock = SampleClock::shared(48_000);
        let other = Arc::clone(&clock);
        clock.add_samples(48);
        assert_eq!(other.time_ns(), 1_000_000);
        other.reset();
        assert_eq!(clock.sample(), 0);
    }

    #[test]
    fn test_nanos_per_frame() {
        let clock = SampleClock::new(1000);
        assert_eq!(clock.nanos_per_frame(), 1_000_000.0);
    }
}
