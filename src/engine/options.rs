//! Caller-facing compression parameters.

use crate::util::{Error, Result};

/// Highest compression level (slowest, best ratio).
pub const MAX_COMPRESSION_LEVEL: u32 = 10;

/// Highest engine speed setting.
pub const MAX_SPEED: u32 = 10;

/// Smallest quantization budget per component.
pub const MIN_QUANTIZATION_BITS: u32 = 1;

/// Largest quantization budget per component.
pub const MAX_QUANTIZATION_BITS: u32 = 31;

/// Compression level used by the vehicle uplink.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 10;

/// Quantization budget used by the vehicle uplink.
pub const DEFAULT_QUANTIZATION_BITS: u32 = 12;

/// Per-call compression parameters.
///
/// Built from a `compression_level` (0-10) and `quantization_bits` (1-31);
/// both engine speeds are `10 - compression_level`. Values are range-checked
/// on construction, so engines can rely on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CompressionOptions {
    quantization_bits: u8,
    encoding_speed: u8,
    decoding_speed: u8,
}

impl CompressionOptions {
    /// Options from a compression level and quantization budget.
    pub fn new(compression_level: u32, quantization_bits: u32) -> Result<Self> {
        if compression_level > MAX_COMPRESSION_LEVEL {
            return Err(Error::invalid_options(format!(
                "compression level {} outside 0..={}",
                compression_level, MAX_COMPRESSION_LEVEL
            )));
        }
        let speed = MAX_SPEED - compression_level;
        Self::with_speeds(speed, speed, quantization_bits)
    }

    /// Options with explicit encoder/decoder speeds (0 = slowest, 10 = fastest).
    pub fn with_speeds(encoding_speed: u32, decoding_speed: u32, quantization_bits: u32) -> Result<Self> {
        if !(MIN_QUANTIZATION_BITS..=MAX_QUANTIZATION_BITS).contains(&quantization_bits) {
            return Err(Error::invalid_options(format!(
                "quantization bits {} outside {}..={}",
                quantization_bits, MIN_QUANTIZATION_BITS, MAX_QUANTIZATION_BITS
            )));
        }
        for (what, speed) in [("encoding", encoding_speed), ("decoding", decoding_speed)] {
            if speed > MAX_SPEED {
                return Err(Error::invalid_options(format!(
                    "{} speed {} outside 0..={}",
                    what, speed, MAX_SPEED
                )));
            }
        }
        Ok(Self {
            quantization_bits: quantization_bits as u8,
            encoding_speed: encoding_speed as u8,
            decoding_speed: decoding_speed as u8,
        })
    }

    /// Bits per quantized component.
    #[inline]
    pub fn quantization_bits(&self) -> u32 {
        self.quantization_bits as u32
    }

    /// Encoder speed, 0 (best ratio) to 10 (fastest).
    #[inline]
    pub fn encoding_speed(&self) -> u32 {
        self.encoding_speed as u32
    }

    /// Decoder speed, 0 to 10.
    #[inline]
    pub fn decoding_speed(&self) -> u32 {
        self.decoding_speed as u32
    }

    /// Compression level implied by the encoding speed.
    #[inline]
    pub fn compression_level(&self) -> u32 {
        MAX_SPEED - self.encoding_speed as u32
    }
}

impl Default for CompressionOptions {
    fn default() -> Self {
        let speed = (MAX_SPEED - DEFAULT_COMPRESSION_LEVEL) as u8;
        Self {
            quantization_bits: DEFAULT_QUANTIZATION_BITS as u8,
            encoding_speed: speed,
            decoding_speed: speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_to_speed() {
        let o = CompressionOptions::new(5, 16).unwrap();
        assert_eq!(o.encoding_speed(), 5);
        assert_eq!(o.decoding_speed(), 5);
        assert_eq!(o.quantization_bits(), 16);

        let o = CompressionOptions::new(0, 1).unwrap();
        assert_eq!(o.encoding_speed(), 10);
        assert_eq!(o.compression_level(), 0);

        let o = CompressionOptions::new(10, 31).unwrap();
        assert_eq!(o.encoding_speed(), 0);
        assert_eq!(o.compression_level(), 10);
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(CompressionOptions::new(11, 12), Err(Error::InvalidOptions(_))));
        assert!(matches!(CompressionOptions::new(5, 0), Err(Error::InvalidOptions(_))));
        assert!(matches!(CompressionOptions::new(5, 32), Err(Error::InvalidOptions(_))));
        assert!(CompressionOptions::with_speeds(11, 0, 12).is_err());
        assert!(CompressionOptions::with_speeds(0, 11, 12).is_err());
    }

    #[test]
    fn test_default_matches_uplink() {
        let o = CompressionOptions::default();
        assert_eq!(o, CompressionOptions::new(10, 12).unwrap());
    }
}
