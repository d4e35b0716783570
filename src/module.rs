//! Module lifecycle protocol
//!
//! Every node in a [`Chain`](crate::chain::Chain) is an [`AudioModule`]. The
//! chain owns the modules and drives their hooks in a fixed order:
//!
//! ```text
//! configure -> start -> { process }* -> stop
//! ```
//!
//! Recursion over backward links is done by the chain, not by the modules. A
//! module only implements the *local* step of each operation: `configure`
//! receives the descriptor it was synced to, `process` receives the block
//! taken from its predecessor (if any) and returns the block it produces.

use crate::block::AudioBlock;
use crate::error::ChainError;
use crate::info::ChainInfo;
use core::any::Any;
use serde::{Deserialize, Serialize};

/// How a module hands its finished block to a successor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// The successor takes ownership; the module is left empty
    Move,
    /// Every request gets a fresh copy; the module keeps the original
    Copy,
}

/// Declaration of one modulatable parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    /// Value used until the parameter is set or modulated
    pub default: f64,
}

impl ParamDef {
    pub fn new(name: impl Into<String>, default: f64) -> Self {
        Self {
            name: name.into(),
            default,
        }
    }
}

/// Downcasting support for boxed modules
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A node in a processing chain
///
/// # Implementing AudioModule
///
/// ```rust
/// use chainsynth::prelude::*;
///
/// struct Invert;
///
/// impl AudioModule for Invert {
///     fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
///         let mut block = ctx.input_or_silence();
///         block.mul_scalar(-1.0);
///         block
///     }
/// }
/// ```
pub trait AudioModule: AsAny + Send {
    /// Produce this cycle's block.
    ///
    /// The context carries the block taken from the predecessor (none for a
    /// source), the blocks of any modulated parameters, and the descriptor.
    /// The returned block becomes the module's output until a successor takes it.
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock;

    /// Local configuration hook, run after the descriptor has been synced
    fn configure(&mut self, _info: &ChainInfo) {}

    /// Local start hook, run after every predecessor has started
    fn start(&mut self) {}

    /// Local stop hook, run after every predecessor has stopped
    fn stop(&mut self) {}

    /// Runs at the start of a processing pass, before anything upstream is
    /// pulled. Skipped when a copy-on-read module serves a cached block.
    fn begin(&mut self) {}

    /// Hand over a failure recorded while processing, if any.
    ///
    /// Modules that cannot fail from inside `process` keep the default.
    fn take_fault(&mut self) -> Option<ChainError> {
        None
    }

    /// Parameters this module reads from its [`ProcessContext`]
    fn params(&self) -> &[ParamDef] {
        &[]
    }

    /// How the finished block is handed to successors
    fn transfer(&self) -> Transfer {
        Transfer::Move
    }

    /// Whether the module accepts fan-in inputs besides its predecessor
    fn accepts_inputs(&self) -> bool {
        false
    }

    /// Short identifier for diagnostics
    fn kind(&self) -> &'static str {
        "unknown"
    }
}

impl dyn AudioModule {
    /// Borrow the concrete module
    pub fn downcast_ref<T: AudioModule>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the concrete module
    pub fn downcast_mut<T: AudioModule>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Everything a module's `process` hook gets to work with
pub struct ProcessContext<'a> {
    info: &'a ChainInfo,
    input: Option<AudioBlock>,
    gathered: Vec<AudioBlock>,
    params: Vec<AudioBlock>,
}

impl<'a> ProcessContext<'a> {
    pub fn new(info: &'a ChainInfo) -> Self {
        Self {
            info,
            input: None,
            gathered: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Install the working input block
    pub fn with_input(mut self, input: Option<AudioBlock>) -> Self {
        self.input = input;
        self
    }

    /// Install blocks collected from fan-in inputs
    pub fn with_gathered(mut self, gathered: Vec<AudioBlock>) -> Self {
        self.gathered = gathered;
        self
    }

    /// Install parameter blocks, one per declared parameter
    pub fn with_params(mut self, params: Vec<AudioBlock>) -> Self {
        self.params = params;
        self
    }

    /// Descriptor of the chain this module belongs to
    pub fn info(&self) -> &ChainInfo {
        self.info
    }

    /// Allocate a zeroed block sized from the descriptor
    pub fn create_block(&self) -> AudioBlock {
        AudioBlock::from_info(self.info)
    }

    /// Borrow the input block
    pub fn input(&self) -> Option<&AudioBlock> {
        self.input.as_ref()
    }

    /// Take ownership of the input block
    pub fn take_input(&mut self) -> Option<AudioBlock> {
        self.input.take()
    }

    /// Take the input block, or a silent block if there is none
    pub fn input_or_silence(&mut self) -> AudioBlock {
        match self.input.take() {
            Some(block) => block,
            None => self.create_block(),
        }
    }

    /// Blocks collected from fan-in inputs this cycle
    pub fn gathered(&self) -> &[AudioBlock] {
        &self.gathered
    }

    pub fn take_gathered(&mut self) -> Vec<AudioBlock> {
        core::mem::take(&mut self.gathered)
    }

    /// Block of parameter `index`
    pub fn param(&self, index: usize) -> Option<&AudioBlock> {
        self.params.get(index)
    }

    /// One sample of parameter `index`.
    ///
    /// Falls back to channel 0 when the parameter block has fewer channels,
    /// and to `default` when the parameter is missing.
    pub fn param_at(&self, index: usize, channel: usize, frame: usize, default: f64) -> f64 {
        match self.params.get(index) {
            Some(block) if channel < block.channels() => block.get(channel, frame),
            Some(block) => block.get(0, frame),
            None => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    impl AudioModule for Doubler {
        fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
            let mut block = ctx.input_or_silence();
            block.mul_scalar(2.0);
            block
        }

        fn kind(&self) -> &'static str {
            "doubler"
        }
    }

    #[test]
    fn test_context_input_transfer() {
        let info = ChainInfo::new(1000, 1, 4);
        let mut ctx = ProcessContext::new(&info).with_input(Some(AudioBlock::constant(4, 1, 1.5)));
        let out = Doubler.process(&mut ctx);
        assert!(out.as_slice().iter().all(|&s| s == 3.0));
        assert!(ctx.input().is_none());
    }

    #[test]
    fn test_context_silence_without_input() {
        let info = ChainInfo::new(1000, 2, 8);
        let mut ctx = ProcessContext::new(&info);
        let out = Doubler.process(&mut ctx);
        assert_eq!(out.frames(), 8);
        assert_eq!(out.channels(), 2);
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn test_param_at_fallbacks() {
        let info = ChainInfo::new(1000, 2, 4);
        let ctx = ProcessContext::new(&info).with_params(vec![AudioBlock::constant(4, 1, 7.0)]);
        assert_eq!(ctx.param_at(0, 0, 1, 0.0), 7.0);
        assert_eq!(ctx.param_at(0, 1, 1, 0.0), 7.0);
        assert_eq!(ctx.param_at(3, 0, 0, -1.0), -1.0);
    }

    #[test]
    fn test_downcast() {
        let mut module: Box<dyn AudioModule> = Box::new(Doubler);
        assert!(module.downcast_ref::<Doubler>().is_some());
        assert!(module.downcast_mut::<Doubler>().is_some());
        assert_eq!(module.kind(), "doubler");
        assert_eq!(module.transfer(), Transfer::Move);
    }
}
