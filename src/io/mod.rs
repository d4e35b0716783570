//! External I/O
//!
//! Modules that move blocks across the boundary of a chain. Only RIFF/WAVE
//! files are handled.

pub mod wav;

pub use wav::{SampleFormat, WaveReader, WaveSink, WaveSource, WaveWriter, WavSpec};
