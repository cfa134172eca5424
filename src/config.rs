//! JSON codec configuration.
//!
//! ```json
//! {
//!   "layout": {
//!     "stride": 4,
//!     "attributes": [
//!       { "name": "position", "offset": 0, "component_count": 3 },
//!       { "name": "intensity", "offset": 3, "component_count": 1 }
//!     ]
//!   },
//!   "compression_level": 10,
//!   "quantization_bits": 12
//! }
//! ```
//!
//! Every field is optional; missing ones take the defaults above.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cloud::AttributeLayout;
use crate::engine::{CompressionOptions, DEFAULT_COMPRESSION_LEVEL, DEFAULT_QUANTIZATION_BITS};
use crate::util::{Error, Result};

/// Layout plus compression parameters for one deployment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Flat buffer layout; validated while parsing.
    pub layout: AttributeLayout,
    /// 0 (fastest) to 10 (best ratio).
    pub compression_level: u32,
    /// Bits per quantized component, 1 to 31.
    pub quantization_bits: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            layout: AttributeLayout::xyzi(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            quantization_bits: DEFAULT_QUANTIZATION_BITS,
        }
    }
}

impl CodecConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let config = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), "loaded codec config");
        Ok(config)
    }

    /// Parse from a JSON string.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Save as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Range-checked compression options.
    pub fn options(&self) -> Result<CompressionOptions> {
        CompressionOptions::new(self.compression_level, self.quantization_bits)
    }
}
