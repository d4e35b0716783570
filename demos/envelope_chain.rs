//! Demo: Envelope-Shaped Oscillator
//!
//! Builds `Oscillator -> Gain` and drives the gain from an envelope sequence:
//! attack, decay, then an endless sustain. Releasing the note appends a
//! release segment and forces the sequence onto it.
//!
//! Run with: cargo run --example envelope_chain

use chainsynth::prelude::*;
use std::sync::Arc;

fn main() {
    let info = ChainInfo::new(44_100, 1, 441);
    let mut chain = Chain::with_info(info);

    // Sound source and amplifier
    let osc = chain.add("osc", Oscillator::sawtooth(110.0));
    let vca = chain.add("vca", Gain::new(0.0));
    chain.bind(vca, osc).unwrap();

    // Attack 20 ms, decay to 0.4 over 80 ms, then hold
    let ms = NANOS_PER_SECOND / 1000;
    let clock = SampleClock::shared(info.sample_rate);
    let env = EnvelopeSequence::with_clock(Arc::clone(&clock))
        .with_segment(Segment::linear(0.0, 1.0, 0, 20 * ms))
        .with_segment(Segment::exponential(1.0, 0.4, 20 * ms, 100 * ms))
        .with_segment(Segment::constant(0.4, 100 * ms, NEVER));
    let env = chain.add("env", env);
    chain.modulate(vca, Gain::GAIN, env).unwrap();

    chain.configure(vca).unwrap();
    chain.start(vca).unwrap();

    println!("=== Envelope Chain Demo ===\n");
    println!("Note on:");
    chain
        .run(vca, 20, |block| {
            println!("  {:>4} ms  peak {:.3}", clock.time_ns() / ms, block.peak());
        })
        .unwrap();

    // Release: 200 ms fade starting now
    let now = clock.time_ns();
    let sequence = chain.module_mut::<EnvelopeSequence>(env).unwrap();
    sequence.append(Segment::linear(0.4, 0.0, now, now + 200 * ms));
    sequence.advance();

    println!("\nNote off:");
    chain
        .run(vca, 25, |block| {
            println!("  {:>4} ms  peak {:.3}", clock.time_ns() / ms, block.peak());
        })
        .unwrap();

    chain.stop(vca).unwrap();

    let exhausted = chain
        .module::<EnvelopeSequence>(env)
        .map(|s| s.is_exhausted())
        .unwrap_or(false);
    println!("\nEnvelope exhausted: {exhausted}");
}
