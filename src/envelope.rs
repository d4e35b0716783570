//! Envelope segments and sequences
//!
//! A [`Segment`] maps chain time (nanoseconds, see [`SampleClock`]) to an
//! amplitude over the window `[start_time, stop_time]`. Four curve shapes are
//! available through [`SegmentKind`]. A segment whose `stop_time` is
//! [`NEVER`] holds forever.
//!
//! An [`EnvelopeSequence`] plays segments back to back as one continuous
//! control signal. After every sample it checks whether the current segment
//! has ended and, if another segment is queued, moves to it. The move can
//! happen mid-block, so a single block may carry several segments.
//!
//! ```text
//!  30 |                 ________
//!  20 |        ________|
//!   5 |_______|
//!     +-------+--------+-------> t
//!     0      T1       T2     (never)
//! ```

use crate::block::AudioBlock;
use crate::clock::SampleClock;
use crate::info::{ChainInfo, DEFAULT_SAMPLE_RATE};
use crate::module::{AudioModule, ProcessContext};
use libm::Libm;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stop time of a segment that never ends
pub const NEVER: i64 = -1;

/// Shape of a segment's curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    /// `start_value` for the whole window
    Constant,
    /// Straight line from `start_value` to `stop_value`
    Linear,
    /// Geometric curve from `start_value` to `stop_value`; a zero
    /// `start_value` yields silence
    Exponential,
    /// `start_value` before `stop_time`, `stop_value` from then on
    Step,
}

/// One time-bounded piece of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Nanoseconds
    pub start_time: i64,
    /// Nanoseconds, or [`NEVER`]
    pub stop_time: i64,
    pub start_value: f64,
    pub stop_value: f64,
}

impl Segment {
    pub fn new(
        kind: SegmentKind,
        start_value: f64,
        stop_value: f64,
        start_time: i64,
        stop_time: i64,
    ) -> Self {
        Self {
            kind,
            start_time,
            stop_time,
            start_value,
            stop_value,
        }
    }

    pub fn constant(value: f64, start_time: i64, stop_time: i64) -> Self {
        Self::new(SegmentKind::Constant, value, value, start_time, stop_time)
    }

    pub fn linear(start_value: f64, stop_value: f64, start_time: i64, stop_time: i64) -> Self {
        Self::new(SegmentKind::Linear, start_value, stop_value, start_time, stop_time)
    }

    pub fn exponential(start_value: f64, stop_value: f64, start_time: i64, stop_time: i64) -> Self {
        Self::new(SegmentKind::Exponential, start_value, stop_value, start_time, stop_time)
    }

    /// Jump from `start_value` to `stop_value` at `stop_time`
    pub fn step(start_value: f64, stop_value: f64, start_time: i64, stop_time: i64) -> Self {
        Self::new(SegmentKind::Step, start_value, stop_value, start_time, stop_time)
    }

    /// True if the segment has no end
    #[inline]
    pub fn is_endless(&self) -> bool {
        self.stop_time == NEVER
    }

    /// True once `time` reaches the stop time
    #[inline]
    pub fn has_ended(&self, time: i64) -> bool {
        !self.is_endless() && time >= self.stop_time
    }

    /// Window length in nanoseconds, `None` if endless
    pub fn duration(&self) -> Option<i64> {
        (!self.is_endless()).then(|| self.stop_time - self.start_time)
    }

    /// Amplitude at chain time `time`.
    ///
    /// Times outside the window are clamped to it.
    pub fn value_at(&self, time: i64) -> f64 {
        match self.kind {
            SegmentKind::Constant => self.start_value,
            SegmentKind::Step => {
                if self.has_ended(time) {
                    self.stop_value
                } else {
                    self.start_value
                }
            }
            SegmentKind::Linear => {
                let x = self.progress(time);
                self.start_value + (self.stop_value - self.start_value) * x
            }
            SegmentKind::Exponential => {
                if self.start_value == 0.0 {
                    return 0.0;
                }
                let x = self.progress(time);
                self.start_value * Libm::<f64>::pow(self.stop_value / self.start_value, x)
            }
        }
    }

    /// Position of `time` in the window, in `[0, 1]`
    fn progress(&self, time: i64) -> f64 {
        if self.is_endless() {
            return 0.0;
        }
        if self.stop_time <= self.start_time {
            return if time >= self.start_time { 1.0 } else { 0.0 };
        }
        let t = time.clamp(self.start_time, self.stop_time);
        (t - self.start_time) as f64 / (self.stop_time - self.start_time) as f64
    }
}

/// Source module playing a single segment against its own clock
#[derive(Debug)]
pub struct EnvelopeSegment {
    segment: Segment,
    clock: Arc<SampleClock>,
}

impl EnvelopeSegment {
    pub fn new(segment: Segment) -> Self {
        Self::with_clock(segment, SampleClock::shared(DEFAULT_SAMPLE_RATE))
    }

    pub fn with_clock(segment: Segment, clock: Arc<SampleClock>) -> Self {
        Self { segment, clock }
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn segment_mut(&mut self) -> &mut Segment {
        &mut self.segment
    }

    pub fn clock(&self) -> &Arc<SampleClock> {
        &self.clock
    }
}

impl AudioModule for EnvelopeSegment {
    fn configure(&mut self, info: &ChainInfo) {
        self.clock.set_sample_rate(info.sample_rate);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
        let mut block = ctx.create_block();
        for frame in 0..block.frames() {
            let value = self.segment.value_at(self.clock.time_and_tick());
            for ch in 0..block.channels() {
                block.set(ch, frame, value);
            }
        }
        block
    }

    fn kind(&self) -> &'static str {
        "envelope_segment"
    }
}

/// Ordered segments played back to back.
///
/// The cursor only moves forward. It moves when the current segment has
/// ended and another is queued, or when [`advance`](Self::advance) forces
/// it. Once the last finite segment has ended the sequence is exhausted and
/// holds that segment's final value until a segment is appended.
#[derive(Debug)]
pub struct EnvelopeSequence {
    segments: Vec<Segment>,
    cursor: usize,
    clock: Arc<SampleClock>,
    exhausted: bool,
    warned: bool,
}

impl EnvelopeSequence {
    pub fn new() -> Self {
        Self::with_clock(SampleClock::shared(DEFAULT_SAMPLE_RATE))
    }

    pub fn with_clock(clock: Arc<SampleClock>) -> Self {
        Self {
            segments: Vec::new(),
            cursor: 0,
            clock,
            exhausted: false,
            warned: false,
        }
    }

    /// Builder form of [`append`](Self::append)
    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.append(segment);
        self
    }

    /// Queue a segment after the last one. Allowed during playback.
    pub fn append(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Move the cursor to the next queued segment regardless of time.
    ///
    /// Returns false if there is none.
    pub fn advance(&mut self) -> bool {
        if self.cursor + 1 < self.segments.len() {
            self.cursor += 1;
            self.exhausted = false;
            self.warned = false;
            true
        } else {
            false
        }
    }

    /// Segment under the cursor
    pub fn current(&self) -> Option<&Segment> {
        self.segments.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Edit a queued segment in place
    pub fn segment_mut(&mut self, index: usize) -> Option<&mut Segment> {
        self.segments.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clock(&self) -> &Arc<SampleClock> {
        &self.clock
    }

    /// True once the last finite segment has ended with nothing queued
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Rewind the cursor and the clock
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.exhausted = false;
        self.warned = false;
        self.clock.reset();
    }

    /// Move past every segment that has ended by `time`
    fn settle(&mut self, time: i64) {
        while let Some(segment) = self.segments.get(self.cursor) {
            if !segment.has_ended(time) {
                self.exhausted = false;
                return;
            }
            if self.cursor + 1 < self.segments.len() {
                self.cursor += 1;
            } else {
                break;
            }
        }
        self.exhausted = true;
        if !self.warned {
            warn!(
                "envelope sequence exhausted after {} segment(s), holding last value",
                self.segments.len()
            );
            self.warned = true;
        }
    }

    /// Value at the current clock position
    fn sample(&self, time: i64) -> f64 {
        self.current().map_or(0.0, |s| s.value_at(time))
    }
}

impl Default for EnvelopeSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioModule for EnvelopeSequence {
    fn configure(&mut self, info: &ChainInfo) {
        self.clock.set_sample_rate(info.sample_rate);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
        let mut block = ctx.create_block();
        let mut time = self.clock.time_ns();
        self.settle(time);

        for frame in 0..block.frames() {
            let value = self.sample(time);
            for ch in 0..block.channels() {
                block.set(ch, frame, value);
            }
            self.clock.tick();
            time = self.clock.time_ns();
            self.settle(time);
        }
        block
    }

    fn kind(&self) -> &'static str {
        "envelope_sequence"
    }
}
