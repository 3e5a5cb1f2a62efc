use crate::error::{ModemError, Result};
use crate::fft::MAX_FFT_BITS;

/// Receiver configuration
///
/// One immutable value passed to every component constructor. The defaults
/// are the only combination exercised against real transmitters; other
/// values are accepted as long as `block_size` stays a power of two matching
/// `fft_bits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModemConfig {
    /// Capture sample rate in Hz
    pub sample_rate: u32,
    /// Samples per analyzed block; must equal `2^fft_bits`
    pub block_size: usize,
    /// Transform bit width; the transform size is `2^fft_bits`
    pub fft_bits: u32,
    /// Observations required before a framing token takes effect
    pub repeat: usize,
    /// Unusable bins at the lower end of the spectrum
    pub bin_offset: usize,
    /// Payload capacity in bytes; longer frames are silently truncated
    pub max_message_len: usize,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_size: 512,
            fft_bits: 9,
            repeat: 3,
            bin_offset: 60,
            max_message_len: 1024,
        }
    }
}

impl ModemConfig {
    /// Check the configuration for the fatal construction-time errors
    pub fn validate(&self) -> Result<()> {
        if self.fft_bits == 0 || self.fft_bits > MAX_FFT_BITS {
            return Err(ModemError::InvalidConfig(format!(
                "fft_bits must be between 1 and {}, got {}",
                MAX_FFT_BITS, self.fft_bits
            )));
        }
        if self.block_size != 1 << self.fft_bits {
            return Err(ModemError::InvalidConfig(format!(
                "block_size {} does not match transform size {}",
                self.block_size,
                1usize << self.fft_bits
            )));
        }
        if self.repeat == 0 {
            return Err(ModemError::InvalidConfig(
                "repeat must be at least 1".into(),
            ));
        }
        if self.max_message_len == 0 {
            return Err(ModemError::InvalidConfig(
                "max_message_len must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ModemConfig::default().validate().is_ok());
    }

    #[test]
    fn mismatched_block_size_rejected() {
        let config = ModemConfig {
            block_size: 500,
            ..ModemConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_bit_width_rejected() {
        let config = ModemConfig {
            fft_bits: MAX_FFT_BITS + 1,
            block_size: 1 << (MAX_FFT_BITS + 1),
            ..ModemConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
