//! # Chainsynth: Pull-Based Modular Synthesis Kernel
//!
//! `chainsynth` builds audio out of modules chained together, each producing
//! one fixed-size multi-channel block per processing cycle. The driver pulls
//! the terminal module; every module first pulls its predecessor, takes
//! ownership of the finished block, transforms it and hands it forward.
//!
//! ## Architecture
//!
//! - **Blocks** - [`AudioBlock`] with sequential and interleaved views
//! - **Descriptor** - [`ChainInfo`] (sample rate, channels, block size) shared by
//!   every module of one chain
//! - **Chain** - [`Chain`] arena owning modules and descriptors, driving the
//!   `configure -> start -> process* -> stop` lifecycle
//! - **Topology** - [`Mixdown`] fan-in, [`MixUp`] fan-out and parameter
//!   modulation through [`Chain::modulate`]
//! - **Time** - [`SampleClock`] and the [`EnvelopeSequence`] control source
//!
//! ## Quick Start
//!
//! ```rust
//! use chainsynth::prelude::*;
//!
//! let mut chain = Chain::with_info(ChainInfo::new(48_000, 2, 256));
//!
//! // A 220 Hz sine scaled by a slow envelope
//! let osc = chain.add("osc", Oscillator::sine(220.0));
//! let gain = chain.add("gain", Gain::new(1.0));
//! chain.bind(gain, osc).unwrap();
//!
//! let clock = SampleClock::shared(48_000);
//! let env = EnvelopeSequence::with_clock(clock)
//!     .with_segment(Segment::linear(0.0, 1.0, 0, 10_000_000))
//!     .with_segment(Segment::constant(1.0, 10_000_000, NEVER));
//! let env = chain.add("env", env);
//! chain.modulate(gain, Gain::GAIN, env).unwrap();
//!
//! chain.configure(gain).unwrap();
//! chain.start(gain).unwrap();
//! let block = chain.process(gain).unwrap();
//! assert_eq!(block.channels(), 2);
//! assert_eq!(block.frames(), 256);
//! chain.stop(gain).unwrap();
//! ```

pub mod block;
pub mod chain;
pub mod clock;
pub mod dsp;
pub mod envelope;
pub mod error;
pub mod info;
pub mod io;
pub mod module;
pub mod modules;
pub mod oscillator;
pub mod param;
pub mod topology;

/// Prelude module for convenient imports
pub mod prelude {
    // Data
    pub use crate::block::AudioBlock;
    pub use crate::info::{ChainInfo, DEFAULT_BLOCK_SIZE, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};

    // Lifecycle and graph
    pub use crate::chain::{Chain, InfoId, ModuleId};
    pub use crate::error::{ChainError, WavError};
    pub use crate::module::{AudioModule, ParamDef, ProcessContext, Transfer};
    pub use crate::param::{ModuleParam, ParamSet, ParamSource};

    // Topology
    pub use crate::topology::{MixUp, Mixdown};

    // Time and envelopes
    pub use crate::clock::{SampleClock, WallClock, NANOS_PER_SECOND};
    pub use crate::envelope::{EnvelopeSegment, EnvelopeSequence, Segment, SegmentKind, NEVER};

    // Modules
    pub use crate::modules::{BufferSource, Constant, Counter, Gain, Latency};
    pub use crate::oscillator::{Oscillator, Waveform};

    // Transforms and files
    pub use crate::dsp::{convolve, fft, forward_transform, ifft, inverse_transform, Window};
    pub use crate::io::{SampleFormat, WaveReader, WaveSink, WaveSource, WaveWriter, WavSpec};
}

// Re-export key types at crate root for convenience
pub use prelude::*;
