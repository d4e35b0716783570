//! Error types
//!
//! Graph mutation and lookup failures are reported through [`ChainError`].
//! Malformed external data (WAVE files) is reported through [`WavError`],
//! which converts into `ChainError` when it crosses a chain operation.

use crate::chain::ModuleId;
use thiserror::Error;

/// Errors produced by [`Chain`](crate::chain::Chain) operations
#[derive(Debug, Error)]
pub enum ChainError {
    /// The id does not name a live module in this chain
    #[error("invalid module {0:?}")]
    InvalidModule(ModuleId),

    /// The predecessor already feeds another module
    #[error("module {0:?} is already bound to a successor")]
    AlreadyBound(ModuleId),

    /// Binding would make a module its own ancestor
    #[error("binding {from:?} behind {to:?} would create a cycle")]
    CycleDetected { from: ModuleId, to: ModuleId },

    /// No block is held by the module
    #[error("module {0:?} holds no block")]
    NoBlock(ModuleId),

    /// The module has no parameter with this index
    #[error("module {module:?} has no parameter {index}")]
    InvalidParam { module: ModuleId, index: usize },

    /// The module lacks the capability an operation needs
    #[error("module {module:?} does not support {operation}")]
    Unsupported {
        module: ModuleId,
        operation: &'static str,
    },

    /// A descriptor failed to load or validate
    #[error("invalid chain info: {0}")]
    Info(String),

    /// WAVE I/O failure
    #[error(transparent)]
    Wav(#[from] WavError),
}

/// Errors produced while reading or writing WAVE data
#[derive(Debug, Error)]
pub enum WavError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The RIFF/WAVE magic did not match
    #[error("not a RIFF/WAVE stream (found {0:?})")]
    BadMagic([u8; 4]),

    /// A required chunk was never found
    #[error("missing '{0}' chunk")]
    MissingChunk(&'static str),

    /// Only PCM and IEEE float are handled
    #[error("unsupported format tag {0}")]
    UnsupportedFormat(u16),

    #[error("unsupported bit depth {0}")]
    UnsupportedBitDepth(u16),

    /// Header fields are inconsistent or the stream ended mid-header
    #[error("truncated or inconsistent header: {0}")]
    Truncated(&'static str),
}
