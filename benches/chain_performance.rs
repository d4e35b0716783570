//! Chain Performance Benchmarks
//!
//! Measures how long one processing cycle takes for typical chains at the
//! common sample rates and block sizes. A cycle must finish within the time
//! one block lasts:
//!
//! ```text
//! time_budget = block_size / sample_rate
//! ```
//!
//! | Sample Rate | Block 64   | Block 256  | Block 440  | Block 1024 |
//! |-------------|------------|------------|------------|------------|
//! | 44.1 kHz    | 1.45 ms    | 5.80 ms    | 9.98 ms    | 23.22 ms   |
//! | 48 kHz      | 1.33 ms    | 5.33 ms    | 9.17 ms    | 21.33 ms   |
//! | 96 kHz      | 0.67 ms    | 2.67 ms    | 4.58 ms    | 10.67 ms   |

use chainsynth::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

// ============================================================================
// Constants
// ============================================================================

const SAMPLE_RATES: [u32; 3] = [44_100, 48_000, 96_000];
const BLOCK_SIZES: [usize; 4] = [64, 256, 440, 1024];
const FAN_IN: [usize; 4] = [1, 4, 16, 64];

// ============================================================================
// Helper Functions
// ============================================================================

/// Oscillator -> Gain, stereo
fn create_simple_chain(info: ChainInfo) -> (Chain, ModuleId) {
    let mut chain = Chain::with_info(info);
    let osc = chain.add("osc", Oscillator::sawtooth(220.0));
    let gain = chain.add("gain", Gain::new(0.5));
    chain.bind(gain, osc).unwrap();
    chain.configure(gain).unwrap();
    chain.start(gain).unwrap();
    (chain, gain)
}

/// Oscillator with vibrato, shaped by an envelope sequence
fn create_modulated_chain(info: ChainInfo) -> (Chain, ModuleId) {
    let mut chain = Chain::with_info(info);
    let osc = chain.add("osc", Oscillator::sine(440.0));
    let gain = chain.add("gain", Gain::new(1.0));
    chain.bind(gain, osc).unwrap();

    let vibrato = chain.add("vibrato", Oscillator::sine(5.0));
    let depth = chain.add("depth", Gain::new(10.0));
    chain.bind(depth, vibrato).unwrap();
    chain.modulate(osc, Oscillator::FREQUENCY, depth).unwrap();

    let env = EnvelopeSequence::with_clock(SampleClock::shared(info.sample_rate))
        .with_segment(Segment::linear(0.0, 1.0, 0, NANOS_PER_SECOND / 100))
        .with_segment(Segment::exponential(1.0, 0.5, NANOS_PER_SECOND / 100, NANOS_PER_SECOND))
        .with_segment(Segment::constant(0.5, NANOS_PER_SECOND, NEVER));
    let env = chain.add("env", env);
    chain.modulate(gain, Gain::GAIN, env).unwrap();

    chain.configure(gain).unwrap();
    chain.start(gain).unwrap();
    (chain, gain)
}

/// `inputs` constant sources summed by a mixdown
fn create_mixdown_chain(info: ChainInfo, inputs: usize) -> (Chain, ModuleId) {
    let mut chain = Chain::with_info(info);
    let mix = chain.add("mix", Mixdown::new());
    for i in 0..inputs {
        let src = chain.add(format!("src{i}"), Constant::new(0.01));
        chain.add_input(mix, src).unwrap();
    }
    chain.configure(mix).unwrap();
    chain.start(mix).unwrap();
    (chain, mix)
}

// ============================================================================
// Chain Benchmarks
// ============================================================================

fn bench_simple_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("simple_chain");

    for sample_rate in SAMPLE_RATES {
        for block_size in BLOCK_SIZES {
            let name = format!("{}kHz/{}frames", sample_rate / 1000, block_size);
            group.throughput(Throughput::Elements(block_size as u64));
            group.bench_with_input(
                BenchmarkId::new("process", &name),
                &ChainInfo::new(sample_rate, 2, block_size),
                |b, &info| {
                    let (mut chain, root) = create_simple_chain(info);
                    b.iter(|| black_box(chain.process(root).unwrap()));
                },
            );
        }
    }

    group.finish();
}

fn bench_modulated_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("modulated_chain");

    for block_size in BLOCK_SIZES {
        group.throughput(Throughput::Elements(block_size as u64));
        group.bench_with_input(
            BenchmarkId::new("process", block_size),
            &ChainInfo::new(48_000, 2, block_size),
            |b, &info| {
                let (mut chain, root) = create_modulated_chain(info);
                b.iter(|| black_box(chain.process(root).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_mixdown(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixdown");

    for inputs in FAN_IN {
        group.throughput(Throughput::Elements(inputs as u64));
        group.bench_with_input(BenchmarkId::new("inputs", inputs), &inputs, |b, &n| {
            let (mut chain, root) = create_mixdown_chain(ChainInfo::new(44_100, 2, 440), n);
            b.iter(|| black_box(chain.process(root).unwrap()));
        });
    }

    group.finish();
}

// ============================================================================
// Block and Transform Benchmarks
// ============================================================================

fn bench_block_views(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_views");
    let block = AudioBlock::constant(1024, 2, 0.5);

    group.bench_function("sequential_sum", |b| {
        b.iter(|| black_box(block.sequential().sum::<f64>()))
    });
    group.bench_function("interleaved_sum", |b| {
        b.iter(|| black_box(block.interleaved().sum::<f64>()))
    });
    group.bench_function("to_interleaved", |b| b.iter(|| black_box(block.to_interleaved())));

    group.finish();
}

fn bench_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("transforms");

    for frames in [64usize, 256, 1024] {
        let signal = AudioBlock::from_samples((0..frames).map(|i| (i % 7) as f64 / 7.0).collect());
        group.throughput(Throughput::Elements(frames as u64));
        if frames <= 256 {
            group.bench_with_input(BenchmarkId::new("direct", frames), &signal, |b, s| {
                b.iter(|| black_box(forward_transform(s)))
            });
        }
        group.bench_with_input(BenchmarkId::new("fft", frames), &signal, |b, s| {
            b.iter(|| black_box(fft(s)))
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(
    chain_benches,
    bench_simple_chain,
    bench_modulated_chain,
    bench_mixdown,
);

criterion_group!(block_benches, bench_block_views, bench_transforms);

criterion_main!(chain_benches, block_benches);
