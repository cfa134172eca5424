//! Compression engines - the bit-stream side of the codec.
//!
//! The codec never looks inside an encoded buffer; everything about the byte
//! format belongs to a [`CompressionEngine`]. Two engines ship with the crate:
//!
//! - [`QuantizedEngine`] - quantizes every attribute to a bit budget, predicts
//!   each point from its predecessor and deflates the residuals
//! - [`IdentityEngine`] - lossless raw float dump, useful as a reference and
//!   as a stand-in when testing layout handling

mod deflate;
mod identity;
mod options;
mod quantized;
mod stream;

pub use identity::IdentityEngine;
pub use options::{
    CompressionOptions, DEFAULT_COMPRESSION_LEVEL, DEFAULT_QUANTIZATION_BITS,
    MAX_COMPRESSION_LEVEL, MAX_QUANTIZATION_BITS, MAX_SPEED, MIN_QUANTIZATION_BITS,
};
pub use quantized::QuantizedEngine;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::cloud::PointCloud;
use crate::transport::EncodedBuffer;

/// Status reported by an engine on failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineStatus {
    /// Input could not be read (truncated stream, short payload)
    IoError,
    /// Caller-supplied data or options the engine cannot handle
    InvalidParameter,
    /// Stream written by a newer or unknown format version
    UnsupportedVersion,
    /// Stream uses a feature this engine does not implement
    UnsupportedFeature,
    /// Stream is internally inconsistent
    CorruptStream,
}

impl EngineStatus {
    /// Numeric status code, negative like the classic C status enums.
    pub const fn code(self) -> i32 {
        match self {
            Self::CorruptStream => -1,
            Self::IoError => -2,
            Self::InvalidParameter => -3,
            Self::UnsupportedVersion => -4,
            Self::UnsupportedFeature => -6,
        }
    }

    /// Short name of the status.
    pub const fn name(self) -> &'static str {
        match self {
            Self::IoError => "io_error",
            Self::InvalidParameter => "invalid_parameter",
            Self::UnsupportedVersion => "unsupported_version",
            Self::UnsupportedFeature => "unsupported_feature",
            Self::CorruptStream => "corrupt_stream",
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Failure reported by a compression engine, carried verbatim to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{status}: {message}")]
pub struct EngineError {
    pub status: EngineStatus,
    pub message: String,
}

impl EngineError {
    /// Create an engine error.
    pub fn new(status: EngineStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for [`EngineStatus::InvalidParameter`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(EngineStatus::InvalidParameter, message)
    }

    /// Shorthand for [`EngineStatus::CorruptStream`].
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::new(EngineStatus::CorruptStream, message)
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// A point cloud compressor.
///
/// Contract:
/// - `encode` is deterministic: the same cloud and options give the same bytes
///   on the same engine version.
/// - `decode` recovers the point count exactly, keeps point order and every
///   attribute's name and width, and reproduces values within the error the
///   encode-time quantization budget allows.
/// - Engines are re-entrant; a single instance may serve concurrent calls.
pub trait CompressionEngine: Send + Sync {
    /// Engine name, for logs.
    fn name(&self) -> &str;

    /// Compress a point cloud.
    fn encode(&self, cloud: &PointCloud, options: &CompressionOptions) -> EngineResult<EncodedBuffer>;

    /// Decompress a buffer produced by [`CompressionEngine::encode`].
    fn decode(&self, data: &[u8]) -> EngineResult<PointCloud>;
}

impl<E: CompressionEngine + ?Sized> CompressionEngine for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn encode(&self, cloud: &PointCloud, options: &CompressionOptions) -> EngineResult<EncodedBuffer> {
        (**self).encode(cloud, options)
    }

    fn decode(&self, data: &[u8]) -> EngineResult<PointCloud> {
        (**self).decode(data)
    }
}

impl<E: CompressionEngine + ?Sized> CompressionEngine for Arc<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn encode(&self, cloud: &PointCloud, options: &CompressionOptions) -> EngineResult<EncodedBuffer> {
        (**self).encode(cloud, options)
    }

    fn decode(&self, data: &[u8]) -> EngineResult<PointCloud> {
        (**self).decode(data)
    }
}
