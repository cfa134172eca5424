//! Error types for the point cloud codec.

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineError;

/// Main error type for codec operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Attribute layout is self-inconsistent (zero stride, overlapping or
    /// out-of-bounds component ranges, duplicate names)
    #[error("Invalid attribute layout: {0}")]
    InvalidLayout(String),

    /// Flat buffer length is not a multiple of the layout stride
    #[error("Malformed buffer: length {len} is not a multiple of stride {stride}")]
    MalformedBuffer { len: usize, stride: usize },

    /// Point cloud lacks an attribute the layout declares
    #[error("Attribute missing from point cloud: {0}")]
    AttributeMissing(String),

    /// An attribute holds a different number of tuples than the cloud has points
    #[error("Attribute '{attribute}' has {actual} entries, expected {expected}")]
    PointCountMismatch {
        attribute: String,
        expected: usize,
        actual: usize,
    },

    /// An attribute's tuple width disagrees with the layout
    #[error("Attribute '{attribute}' has {actual} components, layout declares {expected}")]
    ComponentCountMismatch {
        attribute: String,
        expected: usize,
        actual: usize,
    },

    /// A flat buffer of `points * stride` values cannot be addressed
    #[error("Buffer too large: {points} points of stride {stride}")]
    BufferTooLarge { points: usize, stride: usize },

    /// Compression level or quantization bits out of range
    #[error("Invalid compression options: {0}")]
    InvalidOptions(String),

    /// The compression engine reported a failure
    #[error("Compression engine failure: {0}")]
    EngineFailure(#[from] EngineError),

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// Configuration file could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid layout error.
    pub fn invalid_layout(msg: impl Into<String>) -> Self {
        Self::InvalidLayout(msg.into())
    }

    /// Create an invalid options error.
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
