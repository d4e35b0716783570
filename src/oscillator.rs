//! Waveform oscillator
//!
//! A source module producing one of four classic waveforms. Frequency and
//! amplitude are parameters, so either can be driven by another chain: an
//! [`Oscillator`] feeding the `frequency` of another gives vibrato or FM,
//! an envelope feeding `amplitude` gives a note shape.

use crate::block::AudioBlock;
use crate::info::ChainInfo;
use crate::module::{AudioModule, ParamDef, ProcessContext};
use libm::Libm;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Unit-amplitude value at `phase` in `[0, 1)`
    #[inline]
    pub fn value(self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => Libm::<f64>::sin(phase * TAU),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

/// Phase-accumulating waveform source.
///
/// Every channel carries the same signal; parameters are read from channel 0.
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    phase: f64,
    initial_phase: f64,
    sample_rate: f64,
    defs: Vec<ParamDef>,
}

impl Oscillator {
    /// Index of the `frequency` parameter (Hz)
    pub const FREQUENCY: usize = 0;
    /// Index of the `amplitude` parameter
    pub const AMPLITUDE: usize = 1;

    pub fn new(waveform: Waveform, frequency: f64) -> Self {
        Self {
            waveform,
            phase: 0.0,
            initial_phase: 0.0,
            sample_rate: crate::info::DEFAULT_SAMPLE_RATE as f64,
            defs: vec![
                ParamDef::new("frequency", frequency),
                ParamDef::new("amplitude", 1.0),
            ],
        }
    }

    pub fn sine(frequency: f64) -> Self {
        Self::new(Waveform::Sine, frequency)
    }

    pub fn square(frequency: f64) -> Self {
        Self::new(Waveform::Square, frequency)
    }

    pub fn sawtooth(frequency: f64) -> Self {
        Self::new(Waveform::Sawtooth, frequency)
    }

    pub fn triangle(frequency: f64) -> Self {
        Self::new(Waveform::Triangle, frequency)
    }

    /// Start from `phase` (in cycles) instead of zero
    pub fn with_phase(mut self, phase: f64) -> Self {
        self.initial_phase = phase.rem_euclid(1.0);
        self.phase = self.initial_phase;
        self
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Current phase in cycles
    pub fn phase(&self) -> f64 {
        self.phase
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::sine(440.0)
    }
}

impl AudioModule for Oscillator {
    fn configure(&mut self, info: &ChainInfo) {
        self.sample_rate = info.sample_rate as f64;
    }

    fn start(&mut self) {
        self.phase = self.initial_phase;
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
        let mut block = ctx.create_block();
        let freq_default = self.defs[Self::FREQUENCY].default;
        let amp_default = self.defs[Self::AMPLITUDE].default;

        for frame in 0..block.frames() {
            let freq = ctx.param_at(Self::FREQUENCY, 0, frame, freq_default);
            let amp = ctx.param_at(Self::AMPLITUDE, 0, frame, amp_default);
            let value = self.waveform.value(self.phase) * amp;
            for ch in 0..block.channels() {
                block.set(ch, frame, value);
            }
            if self.sample_rate > 0.0 {
                self.phase = (self.phase + freq / self.sample_rate).rem_euclid(1.0);
            }
        }
        block
    }

    fn params(&self) -> &[ParamDef] {
        &self.defs
    }

    fn kind(&self) -> &'static str {
        "oscillator"
    }
}
