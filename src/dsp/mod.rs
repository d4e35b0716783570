//! Signal processing utilities
//!
//! Pure functions over [`AudioBlock`](crate::block::AudioBlock)s. Nothing in
//! here touches chain state.

pub mod conv;
pub mod transform;
pub mod window;

pub use conv::{conv_len, convolve, convolve_block, convolve_into};
pub use transform::{fft, forward_transform, ifft, inverse_transform, spectrum_len, signal_len};
pub use window::Window;
