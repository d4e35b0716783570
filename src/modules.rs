//! Utility modules
//!
//! Small building blocks that most chains need: constant and buffered
//! sources, a modulatable gain stage, and two pass-through instruments
//! ([`Counter`] and [`Latency`]) that observe a chain without altering it.

use crate::block::AudioBlock;
use crate::clock::{SampleClock, WallClock};
use crate::info::ChainInfo;
use crate::module::{AudioModule, ParamDef, ProcessContext};
use std::sync::Arc;

/// Source emitting a constant value on every channel
#[derive(Debug, Clone)]
pub struct Constant {
    value: f64,
}

impl Constant {
    pub fn new(value: f64) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }
}

impl Default for Constant {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl AudioModule for Constant {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
        let info = ctx.info();
        AudioBlock::constant(info.block_size, info.channels, self.value)
    }

    fn kind(&self) -> &'static str {
        "constant"
    }
}

/// Source replaying one fixed block every cycle.
///
/// The stored block is fitted to the chain's descriptor: extra channels or
/// frames are dropped, missing ones are silent.
#[derive(Debug, Clone)]
pub struct BufferSource {
    block: AudioBlock,
}

impl BufferSource {
    pub fn new(block: AudioBlock) -> Self {
        Self { block }
    }

    pub fn block(&self) -> &AudioBlock {
        &self.block
    }

    pub fn set_block(&mut self, block: AudioBlock) {
        self.block = block;
    }
}

impl AudioModule for BufferSource {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
        let mut out = ctx.create_block();
        if out.same_shape(&self.block) {
            out.copy_from(&self.block);
            return out;
        }
        let channels = out.channels().min(self.block.channels());
        let frames = out.frames().min(self.block.frames());
        for ch in 0..channels {
            out.channel_mut(ch)[..frames].copy_from_slice(&self.block.channel(ch)[..frames]);
        }
        out
    }

    fn kind(&self) -> &'static str {
        "buffer_source"
    }
}

/// Amplitude scaler with a modulatable `gain` parameter
#[derive(Debug, Clone)]
pub struct Gain {
    defs: Vec<ParamDef>,
}

impl Gain {
    /// Index of the `gain` parameter
    pub const GAIN: usize = 0;

    pub fn new(gain: f64) -> Self {
        Self {
            defs: vec![ParamDef::new("gain", gain)],
        }
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AudioModule for Gain {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
        let mut block = ctx.input_or_silence();
        let default = self.defs[Self::GAIN].default;
        for ch in 0..block.channels() {
            for (frame, sample) in block.channel_mut(ch).iter_mut().enumerate() {
                *sample *= ctx.param_at(Self::GAIN, ch, frame, default);
            }
        }
        block
    }

    fn params(&self) -> &[ParamDef] {
        &self.defs
    }

    fn kind(&self) -> &'static str {
        "gain"
    }
}

/// Pass-through that counts processed blocks and samples
#[derive(Debug, Clone, Default)]
pub struct Counter {
    blocks: u64,
    samples: u64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks seen
    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// Number of samples seen, over all channels
    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn reset(&mut self) {
        self.blocks = 0;
        self.samples = 0;
    }

    fn count(&mut self, block: &AudioBlock) {
        self.blocks += 1;
        self.samples += block.len() as u64;
    }
}

impl AudioModule for Counter {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
        let block = ctx.input_or_silence();
        self.count(&block);
        block
    }

    fn kind(&self) -> &'static str {
        "counter"
    }
}

/// Pass-through measuring how far real time runs ahead of chain time.
///
/// Operation time is the wall time of one processing pass through this
/// module, everything upstream of it included: the mark is taken in
/// [`AudioModule::begin`], before the predecessor is pulled. Latency is the
/// wall time since `start` minus the ideal time rendered since `start`; a
/// positive value means the chain is rendering slower than real time.
///
/// Ideal time is read from a [`SampleClock`]. A module built with
/// [`Latency::new`] owns its clock and advances it by one block per pass. A
/// clock handed to [`Latency::with_clock`] is only read: whatever shares it
/// (an envelope sequence upstream, say) keeps advancing it, and the module
/// measures from the position the clock had at `start`.
#[derive(Debug)]
pub struct Latency {
    counter: Counter,
    clock: Arc<SampleClock>,
    owns_clock: bool,
    origin: u64,
    wall: WallClock,
    mark: i64,
    operation_time: i64,
    operation_latency: i64,
    total_time: i64,
    total_latency: i64,
}

impl Latency {
    pub fn new() -> Self {
        let mut latency = Self::with_clock(SampleClock::shared(crate::info::DEFAULT_SAMPLE_RATE));
        latency.owns_clock = true;
        latency
    }

    /// Measure against a clock advanced by other modules
    pub fn with_clock(clock: Arc<SampleClock>) -> Self {
        Self {
            counter: Counter::new(),
            clock,
            owns_clock: false,
            origin: 0,
            wall: WallClock::start(),
            mark: 0,
            operation_time: 0,
            operation_latency: 0,
            total_time: 0,
            total_latency: 0,
        }
    }

    pub fn clock(&self) -> &Arc<SampleClock> {
        &self.clock
    }

    /// True if this module advances its clock itself
    pub fn owns_clock(&self) -> bool {
        self.owns_clock
    }

    pub fn processed(&self) -> u64 {
        self.counter.blocks()
    }

    /// Wall time since `start`
    pub fn elapsed(&self) -> i64 {
        self.wall.elapsed_ns()
    }

    /// Ideal time rendered since `start`, according to the sample clock
    pub fn expected(&self) -> i64 {
        let frames = self.clock.frame().saturating_sub(self.origin);
        self.clock.frames_to_ns(frames)
    }

    /// Duration of the last pass, upstream processing included
    pub fn time(&self) -> i64 {
        self.operation_time
    }

    pub fn total_time(&self) -> i64 {
        self.total_time
    }

    /// Latency after the last operation
    pub fn latency(&self) -> i64 {
        self.operation_latency
    }

    pub fn total_latency(&self) -> i64 {
        self.total_latency
    }

    pub fn average_time(&self) -> i64 {
        match self.processed() {
            0 => 0,
            n => self.total_time / n as i64,
        }
    }

    pub fn average_latency(&self) -> i64 {
        match self.processed() {
            0 => 0,
            n => self.total_latency / n as i64,
        }
    }

    /// Clear every measurement and restart wall time.
    ///
    /// An owned clock is rewound; a shared one is left alone and its current
    /// position becomes the new origin.
    pub fn reset(&mut self) {
        if self.owns_clock {
            self.clock.reset();
        }
        self.origin = self.clock.frame();
        self.counter.reset();
        self.wall = WallClock::start();
        self.mark = 0;
        self.operation_time = 0;
        self.operation_latency = 0;
        self.total_time = 0;
        self.total_latency = 0;
    }
}

impl Default for Latency {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioModule for Latency {
    fn configure(&mut self, info: &ChainInfo) {
        self.clock.set_sample_rate(info.sample_rate);
    }

    fn start(&mut self) {
        self.reset();
    }

    fn begin(&mut self) {
        self.mark = self.wall.elapsed_ns();
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
        let block = ctx.input_or_silence();
        if self.owns_clock {
            self.clock.add_samples(block.frames() as u64);
        }
        let now = self.wall.elapsed_ns();

        self.operation_time = now - self.mark;
        self.operation_latency = now - self.expected();

        self.total_time += self.operation_time;
        self.total_latency += self.operation_latency;
        self.counter.count(&block);
        block
    }

    fn kind(&self) -> &'static str {
        "latency"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::envelope::{EnvelopeSequence, Segment, NEVER};
    use crate::topology::MixUp;
    use approx::assert_relative_eq;
    use std::thread;
    use std::time::Duration;

    fn chain() -> Chain {
        Chain::with_info(ChainInfo::new(1000, 2, 10))
    }

    #[test]
    fn test_constant_fills_descriptor() {
        let mut chain = chain();
        let c = chain.add("c", Constant::new(0.75));
        let block = chain.process(c).unwrap();
        assert_eq!(block.len(), 20);
        assert!(block.as_slice().iter().all(|&s| s == 0.75));

        chain.module_mut::<Constant>(c).unwrap().set_value(-1.0);
        assert_eq!(chain.process(c).unwrap().get(1, 9), -1.0);
    }

    #[test]
    fn test_buffer_source_fits_descriptor() {
        let mut chain = chain();
        let data = AudioBlock::from_samples((0..15).map(f64::from).collect());
        let src = chain.add("src", BufferSource::new(data));
        let block = chain.process(src).unwrap();
        assert_eq!(block.frames(), 10);
        assert_eq!(block.channels(), 2);
        assert_eq!(block.get(0, 9), 9.0);
        assert_eq!(block.get(1, 0), 0.0);
    }

    #[test]
    fn test_buffer_source_repeats() {
        let mut chain = chain();
        let data = AudioBlock::constant(10, 2, 0.5);
        let src = chain.add("src", BufferSource::new(data.clone()));
        assert_eq!(chain.process(src).unwrap(), data);
        assert_eq!(chain.process(src).unwrap(), data);
    }

    #[test]
    fn test_gain_constant_and_modulated() {
        let mut chain = chain();
        let src = chain.add("src", Constant::new(2.0));
        let gain = chain.add("gain", Gain::new(0.5));
        chain.bind(gain, src).unwrap();
        assert_eq!(chain.param_index(gain, "gain"), Some(Gain::GAIN));

        let block = chain.process(gain).unwrap();
        assert_relative_eq!(block.get(0, 0), 1.0);

        let ramp = AudioBlock::from_samples((0..10).map(f64::from).collect());
        let lfo = chain.add("lfo", BufferSource::new(ramp));
        chain.modulate(gain, Gain::GAIN, lfo).unwrap();
        chain.configure(gain).unwrap();

        let block = chain.process(gain).unwrap();
        for frame in 0..10 {
            // Channel 1 of the modulator is silent after fitting
            assert_relative_eq!(block.get(0, frame), 2.0 * frame as f64);
            assert_relative_eq!(block.get(1, frame), 0.0);
        }
    }

    #[test]
    fn test_counter_counts() {
        let mut chain = chain();
        let src = chain.add("src", Constant::new(1.0));
        let count = chain.add("count", Counter::new());
        chain.bind(count, src).unwrap();
        chain.run(count, 3, |_| {}).unwrap();

        let counter = chain.module::<Counter>(count).unwrap();
        assert_eq!(counter.blocks(), 3);
        assert_eq!(counter.samples(), 60);
    }

    #[test]
    fn test_counter_through_mixup_counts_once() {
        let mut chain = chain();
        let src = chain.add("src", Constant::new(1.0));
        let count = chain.add("count", Counter::new());
        let split = chain.add("split", MixUp::new());
        chain.bind(count, src).unwrap();
        chain.bind(split, count).unwrap();
        chain.process(split).unwrap();
        chain.take_block(split).unwrap();
        assert_eq!(chain.module::<Counter>(count).unwrap().blocks(), 1);
    }

    #[test]
    fn test_latency_tracks_ideal_time() {
        let mut chain = chain();
        let src = chain.add("src", Constant::new(0.0));
        let lat = chain.add("lat", Latency::new());
        chain.bind(lat, src).unwrap();
        chain.configure(lat).unwrap();
        chain.start(lat).unwrap();

        chain.run(lat, 4, |_| {}).unwrap();
        let latency = chain.module::<Latency>(lat).unwrap();
        assert!(latency.owns_clock());
        assert_eq!(latency.clock().sample_rate(), 1000);
        assert_eq!(latency.processed(), 4);
        // Four blocks of 10 frames at 1 kHz
        assert_eq!(latency.expected(), 40_000_000);
        assert_eq!(latency.clock().sample(), 40);
        assert!(latency.total_time() >= latency.time());
        assert!(latency.average_time() >= 0);
        // Rendering is far faster than real time
        assert!(latency.latency() < 0);
    }

    #[test]
    fn test_latency_only_reads_shared_clock() {
        let clock = SampleClock::shared(100);
        let t1 = clock.frames_to_ns(10);
        let t2 = clock.frames_to_ns(20);
        let seq = EnvelopeSequence::with_clock(Arc::clone(&clock))
            .with_segment(Segment::constant(5.0, 0, t1))
            .with_segment(Segment::constant(20.0, t1, t2))
            .with_segment(Segment::constant(30.0, t2, NEVER));

        let mut chain = Chain::with_info(ChainInfo::new(100, 1, 10));
        let env = chain.add("env", seq);
        let lat = chain.add("lat", Latency::with_clock(Arc::clone(&clock)));
        chain.bind(lat, env).unwrap();
        chain.configure(lat).unwrap();
        chain.start(lat).unwrap();

        let mut values = Vec::new();
        chain.run(lat, 3, |b| values.push(b.get(0, 0))).unwrap();
        assert_eq!(values, vec![5.0, 20.0, 30.0]);
        assert_eq!(clock.sample(), 30);

        let latency = chain.module::<Latency>(lat).unwrap();
        assert!(!latency.owns_clock());
        assert_eq!(latency.expected(), 300_000_000);
    }

    #[test]
    fn test_latency_restart_keeps_shared_clock() {
        let clock = SampleClock::shared(1000);
        clock.set_sample(25);
        let mut chain = chain();
        let lat = chain.add("lat", Latency::with_clock(Arc::clone(&clock)));
        chain.start(lat).unwrap();
        assert_eq!(clock.sample(), 25);

        clock.add_samples(10);
        chain.process(lat).unwrap();
        let latency = chain.module::<Latency>(lat).unwrap();
        assert_eq!(latency.expected(), 10_000_000);
    }

    /// Pass-through that takes a fixed amount of wall time
    struct Sleep(Duration);

    impl AudioModule for Sleep {
        fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
            thread::sleep(self.0);
            ctx.input_or_silence()
        }
    }

    #[test]
    fn test_latency_time_covers_upstream() {
        let mut chain = chain();
        let slow = chain.add("slow", Sleep(Duration::from_millis(5)));
        let lat = chain.add("lat", Latency::new());
        chain.bind(lat, slow).unwrap();
        chain.start(lat).unwrap();

        chain.process(lat).unwrap();
        let time = chain.module::<Latency>(lat).unwrap().time();
        assert!(time >= 5_000_000);

        // Idle time between passes is not counted
        thread::sleep(Duration::from_millis(100));
        chain.process(lat).unwrap();
        let time = chain.module::<Latency>(lat).unwrap().time();
        assert!(time >= 5_000_000);
        assert!(time < 100_000_000);
    }
}
