//! Lossless pass-through engine.

use byteorder::{ByteOrder, LittleEndian};

use super::stream::{ByteReader, ByteWriter};
use super::{CompressionEngine, CompressionOptions, EngineError, EngineResult, EngineStatus};
use crate::cloud::{PointAttribute, PointCloud};
use crate::transport::EncodedBuffer;
use crate::util::ElementType;

const MAGIC: &[u8; 4] = b"PCID";
const VERSION: u8 = 1;
const VALUE_BYTES: usize = ElementType::Float32.num_bytes();

/// Stores every attribute as raw little-endian `f32`, ignoring the options.
///
/// Decoding reproduces the input bit for bit, which makes this engine the
/// reference for layout and ordering tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityEngine;

impl IdentityEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }
}

impl CompressionEngine for IdentityEngine {
    fn name(&self) -> &str {
        "identity"
    }

    #[tracing::instrument(level = "debug", name = "identity_encode", skip_all, fields(points = cloud.point_count()))]
    fn encode(&self, cloud: &PointCloud, _options: &CompressionOptions) -> EngineResult<EncodedBuffer> {
        let num_attributes = u8::try_from(cloud.attributes().len())
            .map_err(|_| EngineError::invalid("more than 255 attributes"))?;

        let payload: usize = cloud.attributes().iter().map(|a| a.values().len() * VALUE_BYTES).sum();
        let mut w = ByteWriter::with_capacity(16 + payload);
        w.write_bytes(MAGIC);
        w.write_u8(VERSION);
        w.write_u64(cloud.point_count() as u64);
        w.write_u8(num_attributes);

        for attr in cloud.attributes() {
            let width = u8::try_from(attr.component_count()).map_err(|_| {
                EngineError::invalid(format!("attribute '{}' is wider than 255 components", attr.name()))
            })?;
            if attr.values().len() != cloud.point_count() * attr.component_count() {
                return Err(EngineError::invalid(format!(
                    "attribute '{}' does not hold one tuple per point",
                    attr.name()
                )));
            }
            w.write_short_str(attr.name())?;
            w.write_u8(width);
            let mut raw = vec![0u8; attr.values().len() * VALUE_BYTES];
            LittleEndian::write_f32_into(attr.values(), &mut raw);
            w.write_bytes(&raw);
        }
        Ok(EncodedBuffer::new(w.into_inner()))
    }

    #[tracing::instrument(level = "debug", name = "identity_decode", skip_all, fields(bytes = data.len()))]
    fn decode(&self, data: &[u8]) -> EngineResult<PointCloud> {
        let mut r = ByteReader::new(data);
        if r.read_bytes(MAGIC.len(), "magic")? != MAGIC {
            return Err(EngineError::invalid("not an identity-engine stream"));
        }
        let version = r.read_u8("version")?;
        if version != VERSION {
            return Err(EngineError::new(
                EngineStatus::UnsupportedVersion,
                format!("identity stream version {}", version),
            ));
        }
        let point_count = usize::try_from(r.read_u64("point count")?)
            .map_err(|_| EngineError::corrupt("point count does not fit in memory"))?;
        let num_attributes = r.read_u8("attribute count")?;

        let mut cloud = PointCloud::new(point_count);
        for _ in 0..num_attributes {
            let name = r.read_short_str("attribute name")?;
            let width = r.read_u8("component count")? as usize;
            let num_bytes = point_count
                .checked_mul(width)
                .and_then(|n| n.checked_mul(VALUE_BYTES))
                .filter(|&n| n <= r.remaining())
                .ok_or_else(|| {
                    EngineError::new(EngineStatus::IoError, format!("stream truncated in attribute '{}'", name))
                })?;
            let mut raw = vec![0u8; num_bytes];
            r.read_exact_into(&mut raw, "attribute values")?;
            let mut values = vec![0.0f32; num_bytes / VALUE_BYTES];
            LittleEndian::read_f32_into(&raw, &mut values);
            cloud.push_attribute(PointAttribute::new(name, width, values));
        }
        if r.remaining() != 0 {
            return Err(EngineError::corrupt(format!("{} trailing bytes", r.remaining())));
        }
        Ok(cloud)
    }
}
