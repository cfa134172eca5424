//! Flat buffer <-> encoded bytes, composed from [`PointCloudBuilder`] and a
//! [`CompressionEngine`].

use crate::cloud::{AttributeLayout, PointCloudBuilder};
use crate::engine::{CompressionEngine, CompressionOptions, QuantizedEngine};
use crate::transport::EncodedBuffer;
use crate::util::Result;

/// Point cloud codec over an injected compression engine.
///
/// The codec is stateless: it holds only the engine, and both operations take
/// `&self`, so one instance can be shared across threads (`Arc<PointCloudCodec>`
/// or a plain reference inside a rayon scope).
///
/// # Example
///
/// ```
/// use pointcloud_codec::{AttributeLayout, CompressionOptions, PointCloudCodec};
///
/// let codec = PointCloudCodec::default();
/// let layout = AttributeLayout::xyzi();
/// let options = CompressionOptions::new(5, 16).unwrap();
///
/// let flat = [1.0, 2.0, 3.0, 0.5, 4.0, 5.0, 6.0, 0.25];
/// let encoded = codec.encode(&flat, &layout, &options).unwrap();
/// let decoded = codec.decode(&encoded, &layout).unwrap();
/// assert_eq!(decoded.len(), 8);
/// ```
#[derive(Clone, Debug)]
pub struct PointCloudCodec<E = QuantizedEngine> {
    engine: E,
}

impl<E: CompressionEngine> PointCloudCodec<E> {
    /// Create a codec around an engine.
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// The underlying engine.
    #[inline]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Compress a stride-interleaved flat buffer.
    ///
    /// Fails with [`Error::MalformedBuffer`](crate::Error::MalformedBuffer) if
    /// the buffer length is not a multiple of the layout stride, and with
    /// [`Error::EngineFailure`](crate::Error::EngineFailure) if the engine
    /// rejects the cloud.
    #[tracing::instrument(
        skip_all,
        fields(engine = self.engine.name(), values = flat.len(), level = options.compression_level(), bits = options.quantization_bits())
    )]
    pub fn encode(&self, flat: &[f32], layout: &AttributeLayout, options: &CompressionOptions) -> Result<EncodedBuffer> {
        let cloud = PointCloudBuilder::new(layout).from_flat_buffer(flat)?;
        let encoded = self.engine.encode(&cloud, options)?;
        tracing::debug!(
            points = cloud.point_count(),
            encoded = encoded.len(),
            ratio = compression_ratio(encoded.len(), cloud.point_count(), layout.stride()),
            bounds = ?cloud.position_bounds(),
            "encoded"
        );
        Ok(encoded)
    }

    /// Decompress bytes produced by [`PointCloudCodec::encode`] back into a
    /// flat buffer laid out by `layout`.
    ///
    /// A zero-length input decodes to an empty buffer without reaching the
    /// engine.
    #[tracing::instrument(skip_all, fields(engine = self.engine.name(), bytes = encoded.as_ref().len()))]
    pub fn decode(&self, encoded: impl AsRef<[u8]>, layout: &AttributeLayout) -> Result<Vec<f32>> {
        let bytes = encoded.as_ref();
        if bytes.is_empty() {
            tracing::debug!("empty input, nothing to decode");
            return Ok(Vec::new());
        }
        let cloud = self.engine.decode(bytes)?;
        let flat = PointCloudBuilder::new(layout).to_flat_buffer(&cloud)?;
        tracing::debug!(points = cloud.point_count(), values = flat.len(), "decoded");
        Ok(flat)
    }
}

impl Default for PointCloudCodec {
    fn default() -> Self {
        Self::new(QuantizedEngine::new())
    }
}

/// Encoded size over the size of the raw `f32` buffer it came from.
///
/// Returns 0 for an empty input.
pub fn compression_ratio(encoded_len: usize, point_count: usize, stride: usize) -> f64 {
    let raw = point_count as f64 * stride as f64 * std::mem::size_of::<f32>() as f64;
    if raw == 0.0 {
        0.0
    } else {
        encoded_len as f64 / raw
    }
}
