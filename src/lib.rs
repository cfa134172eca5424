//! # pointcloud-codec
//!
//! Compresses LiDAR point clouds for transport between a vehicle and an edge
//! server. A sensor frame arrives as a flat, stride-interleaved `f32` buffer
//! (`x, y, z, intensity` per point), is turned into a structured cloud with
//! named attributes, and is handed to a compression engine that quantizes it
//! into an opaque byte stream. Decoding runs the same path backwards.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (element types, bounds, errors)
//! - [`cloud`] - Attribute layouts, structured point clouds, flat buffer conversion
//! - [`engine`] - Compression engine trait and the built-in engines
//! - [`codec`] - [`PointCloudCodec`], the flat buffer <-> bytes entry point
//! - [`transport`] - Flat and encoded buffers, raw file I/O
//! - [`config`] - JSON configuration
//!
//! ## Example
//!
//! ```
//! use pointcloud_codec::prelude::*;
//!
//! let codec = PointCloudCodec::default();
//! let layout = AttributeLayout::xyzi();
//! let options = CompressionOptions::new(10, 12)?;
//!
//! let frame = vec![1.0, 2.0, 3.0, 0.5, 4.0, 5.0, 6.0, 0.25];
//! let encoded = codec.encode(&frame, &layout, &options)?;
//! let restored = codec.decode(&encoded, &layout)?;
//! assert_eq!(restored.len(), frame.len());
//! # Ok::<(), pointcloud_codec::Error>(())
//! ```

pub mod util;
pub mod cloud;
pub mod engine;
pub mod codec;
pub mod transport;
pub mod config;

// Re-export commonly used types
pub use util::{Error, Result};
pub use cloud::{AttributeLayout, AttributeSpec, PointAttribute, PointCloud, PointCloudBuilder};
pub use engine::{CompressionEngine, CompressionOptions, EngineError, EngineStatus, IdentityEngine, QuantizedEngine};
pub use codec::{compression_ratio, PointCloudCodec};
pub use transport::{EncodedBuffer, TransportBuffer};
pub use config::CodecConfig;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result};
    pub use crate::cloud::{AttributeLayout, AttributeSpec, PointCloud, PointCloudBuilder, INTENSITY, POSITION};
    pub use crate::engine::{CompressionEngine, CompressionOptions, IdentityEngine, QuantizedEngine};
    pub use crate::codec::PointCloudCodec;
    pub use crate::transport::{EncodedBuffer, TransportBuffer};
    pub use crate::config::CodecConfig;
}
