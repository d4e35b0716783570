//! Chain descriptor
//!
//! Every module in one chain reads the same [`ChainInfo`]: sample rate,
//! channel count and block size. The [`Chain`](crate::chain::Chain) keeps one
//! instance per chain and hands each module a reference to it.

use serde::{Deserialize, Serialize};

/// Default sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default number of frames per block
pub const DEFAULT_BLOCK_SIZE: usize = 440;

/// Default channel count
pub const DEFAULT_CHANNELS: usize = 1;

/// Shared configuration for one chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Samples per second
    pub sample_rate: u32,
    /// Channels per block
    pub channels: usize,
    /// Frames per block
    pub block_size: usize,
}

impl ChainInfo {
    pub fn new(sample_rate: u32, channels: usize, block_size: usize) -> Self {
        Self {
            sample_rate,
            channels,
            block_size,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Number of cells in a block sized from this descriptor
    pub fn block_len(&self) -> usize {
        self.channels * self.block_size
    }

    /// Duration of one block in nanoseconds
    pub fn block_duration_ns(&self) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.block_size as i128 * 1_000_000_000 / self.sample_rate as i128) as i64
    }

    /// Check that every field is positive
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample_rate must be positive".into());
        }
        if self.channels == 0 {
            return Err("channels must be positive".into());
        }
        if self.block_size == 0 {
            return Err("block_size must be positive".into());
        }
        Ok(())
    }

    /// Serialize to a JSON string
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from a JSON string and validate the result
    #[cfg(feature = "json")]
    pub fn from_json(json: &str) -> Result<Self, crate::error::ChainError> {
        let info: ChainInfo = serde_json::from_str(json)
            .map_err(|e| crate::error::ChainError::Info(e.to_string()))?;
        info.validate().map_err(crate::error::ChainError::Info)?;
        Ok(info)
    }
}

impl Default for ChainInfo {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let info = ChainInfo::default();
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.channels, 1);
        assert_eq!(info.block_size, 440);
        assert!(info.validate().is_ok());
    }

    #[test]
    fn test_builders_and_len() {
        let info = ChainInfo::default()
            .with_sample_rate(48_000)
            .with_channels(2)
            .with_block_size(256);
        assert_eq!(info.block_len(), 512);
        assert_eq!(info.block_duration_ns(), 5_333_333);
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(ChainInfo::new(0, 1, 1).validate().is_err());
        assert!(ChainInfo::new(1, 0, 1).validate().is_err());
        assert!(ChainInfo::new(1, 1, 0).validate().is_err());
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_round_trip() {
        let info = ChainInfo::new(96_000, 2, 64);
        let json = info.to_json().unwrap();
        assert_eq!(ChainInfo::from_json(&json).unwrap(), info);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_rejects_invalid() {
        let json = r#"{"sample_rate": 0, "channels": 1, "block_size": 8}"#;
        assert!(ChainInfo::from_json(json).is_err());
        assert!(ChainInfo::from_json("not json").is_err());
    }
}
