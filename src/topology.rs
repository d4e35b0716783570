//! Fan-in and fan-out operators
//!
//! [`Mixdown`] sums several inputs into one block. Inputs are attached with
//! [`Chain::add_input`](crate::chain::Chain::add_input) and share the
//! mixdown's descriptor, so every collected block has the same shape.
//!
//! [`MixUp`] lets several successors read one upstream result. It is the one
//! module whose blocks are copied on read instead of moved.

use crate::block::AudioBlock;
use crate::module::{AudioModule, ProcessContext, Transfer};

/// Sums every fan-in input sample-for-sample.
///
/// Each input only runs its local processing step per cycle; an input with a
/// predecessor of its own must be advanced by its owner. A block arriving
/// through a regular predecessor link is summed as one more input.
#[derive(Debug, Default)]
pub struct Mixdown;

impl Mixdown {
    pub fn new() -> Self {
        Self
    }
}

impl AudioModule for Mixdown {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
        let mut sum = ctx.create_block();
        if let Some(input) = ctx.take_input() {
            sum.add_block(&input);
        }
        // Collected blocks are dropped here, at the end of the cycle
        for block in ctx.take_gathered() {
            sum.add_block(&block);
        }
        sum
    }

    fn accepts_inputs(&self) -> bool {
        true
    }

    fn kind(&self) -> &'static str {
        "mixdown"
    }
}

/// Passes its input through and hands every successor its own copy
#[derive(Debug, Default)]
pub struct MixUp;

impl MixUp {
    pub fn new() -> Self {
        Self
    }
}

impl AudioModule for MixUp {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
        ctx.input_or_silence()
    }

    fn transfer(&self) -> Transfer {
        Transfer::Copy
    }

    fn kind(&self) -> &'static str {
        "mixup"
    }
}
