//! Quantizing engine: fixed-point grid per attribute, predictive residuals,
//! zlib entropy stage.
//!
//! # Stream layout (little-endian)
//!
//! ```text
//! magic "PCQZ" | version u8 | predictor u8 | enc speed u8 | dec speed u8
//! point count u64 | attribute count u8
//! per attribute:
//!     name (u8 len + utf8) | element type u8 | components u8 | bits u8
//!     origin f32 x components | range f64
//! raw payload len u64 | packed payload len u64 | packed payload
//! ```
//!
//! The payload lists attributes in header order, point-major within each
//! attribute. With the delta predictor every value is a zig-zag varint of
//! the difference to the same component of the previous point; the raw
//! predictor stores each value in `ceil(bits / 8)` bytes.

use smallvec::SmallVec;

use super::deflate::{deflate, inflate, level_for_speed};
use super::stream::{unzigzag, zigzag, ByteReader, ByteWriter};
use super::{CompressionEngine, CompressionOptions, EngineError, EngineResult, EngineStatus};
use crate::cloud::{PointAttribute, PointCloud};
use crate::transport::EncodedBuffer;
use crate::util::ElementType;

const MAGIC: &[u8; 4] = b"PCQZ";
const VERSION: u8 = 1;

/// Encoder speeds at or above this skip prediction.
const RAW_SPEED_THRESHOLD: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum Predictor {
    Raw = 0,
    Delta = 1,
}

impl Predictor {
    fn for_speed(speed: u32) -> Self {
        if speed >= RAW_SPEED_THRESHOLD {
            Self::Raw
        } else {
            Self::Delta
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Raw),
            1 => Some(Self::Delta),
            _ => None,
        }
    }
}

/// Uniform grid over an attribute's bounding cube.
///
/// The cube edge is split into `2^(bits - 1)` steps, so indices run over
/// `0..=2^(bits - 1)` and still fit in `bits` bits. Every grid point at `b`
/// bits is also a grid point at `b + 1` bits, which keeps the reconstruction
/// error from growing as bits are added. All components share one step size,
/// and the error of every component is at most half a step.
#[derive(Clone, Debug, PartialEq)]
struct Quantizer {
    bits: u32,
    max_q: u32,
    origin: SmallVec<[f32; 4]>,
    range: f64,
}

impl Quantizer {
    fn new(bits: u32, origin: SmallVec<[f32; 4]>, range: f64) -> Self {
        Self {
            bits,
            max_q: 1u32 << (bits - 1),
            origin,
            range,
        }
    }

    /// Fit the grid to an attribute's values.
    fn fit(attr: &PointAttribute, bits: u32) -> EngineResult<Self> {
        let width = attr.component_count();
        let mut min: SmallVec<[f32; 4]> = SmallVec::from_elem(f32::INFINITY, width);
        let mut max: SmallVec<[f32; 4]> = SmallVec::from_elem(f32::NEG_INFINITY, width);

        for tuple in attr.tuples() {
            for (c, &v) in tuple.iter().enumerate() {
                if !v.is_finite() {
                    return Err(EngineError::invalid(format!(
                        "attribute '{}' contains a non-finite value",
                        attr.name()
                    )));
                }
                min[c] = min[c].min(v);
                max[c] = max[c].max(v);
            }
        }

        if attr.is_empty() {
            return Ok(Self::new(bits, SmallVec::from_elem(0.0, width), 0.0));
        }

        let range = min
            .iter()
            .zip(&max)
            .map(|(&lo, &hi)| hi as f64 - lo as f64)
            .fold(0.0f64, f64::max);
        Ok(Self::new(bits, min, range))
    }

    #[inline]
    fn quantize(&self, component: usize, v: f32) -> u32 {
        if self.range <= 0.0 {
            return 0;
        }
        let t = (v as f64 - self.origin[component] as f64) / self.range;
        (t * self.max_q as f64).round().clamp(0.0, self.max_q as f64) as u32
    }

    #[inline]
    fn dequantize(&self, component: usize, q: u32) -> f32 {
        let offset = self.range * (q as f64 / self.max_q as f64);
        (self.origin[component] as f64 + offset) as f32
    }

    /// Bytes per value in the raw representation.
    #[inline]
    fn raw_width(&self) -> usize {
        (self.bits as usize).div_ceil(8)
    }
}

/// Quantizing point cloud engine.
///
/// Every attribute - position and generic alike - is mapped onto a grid of
/// `2^(quantization_bits - 1)` steps spanning its bounding cube. Points are coded
/// in input order, so decode returns them in the order they were encoded.
///
/// The encoding speed picks both the predictor (delta coding below speed 8,
/// raw fixed-width values from 8 up) and the zlib level (9 at speed 0 down
/// to 1 at speed 10). The decoding speed is recorded but decoding cost is
/// set by the encoder's choices.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuantizedEngine;

impl QuantizedEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }
}

impl CompressionEngine for QuantizedEngine {
    fn name(&self) -> &str {
        "quantized"
    }

    #[tracing::instrument(
        level = "debug",
        name = "quantized_encode",
        skip_all,
        fields(points = cloud.point_count(), bits = options.quantization_bits(), speed = options.encoding_speed())
    )]
    fn encode(&self, cloud: &PointCloud, options: &CompressionOptions) -> EngineResult<EncodedBuffer> {
        let bits = options.quantization_bits();
        let speed = options.encoding_speed();
        let predictor = Predictor::for_speed(speed);
        let num_attributes = u8::try_from(cloud.attributes().len())
            .map_err(|_| EngineError::invalid("more than 255 attributes"))?;

        let mut header = ByteWriter::with_capacity(64);
        header.write_bytes(MAGIC);
        header.write_u8(VERSION);
        header.write_u8(predictor as u8);
        header.write_u8(speed as u8);
        header.write_u8(options.decoding_speed() as u8);
        header.write_u64(cloud.point_count() as u64);
        header.write_u8(num_attributes);

        let total_values: usize = cloud.attributes().iter().map(|a| a.values().len()).sum();
        let mut payload = ByteWriter::with_capacity(total_values * 2);

        for attr in cloud.attributes() {
            let width = u8::try_from(attr.component_count())
                .ok()
                .filter(|&w| w > 0)
                .ok_or_else(|| {
                    EngineError::invalid(format!(
                        "attribute '{}' must have 1..=255 components",
                        attr.name()
                    ))
                })?;
            if attr.values().len() != cloud.point_count() * attr.component_count() {
                return Err(EngineError::invalid(format!(
                    "attribute '{}' does not hold one tuple per point",
                    attr.name()
                )));
            }

            let quantizer = Quantizer::fit(attr, bits)?;
            header.write_short_str(attr.name())?;
            header.write_u8(ElementType::Float32 as u8);
            header.write_u8(width);
            header.write_u8(bits as u8);
            for &o in &quantizer.origin {
                header.write_f32(o);
            }
            header.write_f64(quantizer.range);

            write_values(&mut payload, attr, &quantizer, predictor);
        }

        let raw_len = payload.len();
        let packed = deflate(&payload.into_inner(), level_for_speed(speed))?;
        header.write_u64(raw_len as u64);
        header.write_u64(packed.len() as u64);
        header.write_bytes(&packed);

        let out = header.into_inner();
        tracing::debug!(raw = raw_len, encoded = out.len(), ?predictor, "encoded point cloud");
        Ok(EncodedBuffer::new(out))
    }

    #[tracing::instrument(level = "debug", name = "quantized_decode", skip_all, fields(bytes = data.len()))]
    fn decode(&self, data: &[u8]) -> EngineResult<PointCloud> {
        let mut r = ByteReader::new(data);
        if r.read_bytes(MAGIC.len(), "magic")? != MAGIC {
            return Err(EngineError::invalid("not a quantized-engine stream"));
        }
        let version = r.read_u8("version")?;
        if version != VERSION {
            return Err(EngineError::new(
                EngineStatus::UnsupportedVersion,
                format!("quantized stream version {}, expected {}", version, VERSION),
            ));
        }
        let predictor_tag = r.read_u8("predictor")?;
        let predictor = Predictor::from_u8(predictor_tag).ok_or_else(|| {
            EngineError::new(EngineStatus::UnsupportedFeature, format!("predictor {}", predictor_tag))
        })?;
        let _encoding_speed = r.read_u8("encoding speed")?;
        let _decoding_speed = r.read_u8("decoding speed")?;
        let point_count = usize::try_from(r.read_u64("point count")?)
            .map_err(|_| EngineError::corrupt("point count does not fit in memory"))?;
        let num_attributes = r.read_u8("attribute count")?;

        let mut descriptors = Vec::with_capacity(num_attributes as usize);
        for _ in 0..num_attributes {
            descriptors.push(read_descriptor(&mut r)?);
        }

        let raw_len = usize::try_from(r.read_u64("payload length")?)
            .map_err(|_| EngineError::corrupt("payload length does not fit in memory"))?;
        let packed_len = usize::try_from(r.read_u64("packed length")?)
            .map_err(|_| EngineError::corrupt("packed length does not fit in memory"))?;
        let packed = r.read_bytes(packed_len, "payload")?;
        if r.remaining() != 0 {
            return Err(EngineError::corrupt(format!("{} trailing bytes", r.remaining())));
        }

        // Every value takes at least one payload byte; reject counts the
        // payload cannot possibly hold before allocating for them.
        let total_values = descriptors
            .iter()
            .try_fold(0usize, |acc, (_, q)| {
                point_count.checked_mul(q.origin.len()).and_then(|n| acc.checked_add(n))
            })
            .filter(|&n| n <= raw_len)
            .ok_or_else(|| EngineError::corrupt("point count exceeds payload size"))?;

        let raw = inflate(packed, raw_len)?;
        let mut payload = ByteReader::new(&raw);
        let mut cloud = PointCloud::new(point_count);
        for (name, quantizer) in descriptors {
            let values = read_values(&mut payload, &quantizer, point_count, predictor)?;
            cloud.push_attribute(PointAttribute::new(name, quantizer.origin.len(), values));
        }
        if payload.remaining() != 0 {
            return Err(EngineError::corrupt(format!(
                "{} unused payload bytes",
                payload.remaining()
            )));
        }

        tracing::debug!(points = point_count, values = total_values, "decoded point cloud");
        Ok(cloud)
    }
}

fn read_descriptor(r: &mut ByteReader<'_>) -> EngineResult<(String, Quantizer)> {
    let name = r.read_short_str("attribute name")?;
    let element = r.read_u8("element type")?;
    if ElementType::from_u8(element) != Some(ElementType::Float32) {
        return Err(EngineError::new(
            EngineStatus::UnsupportedFeature,
            format!("attribute '{}' has element type {}", name, element),
        ));
    }
    let width = r.read_u8("component count")? as usize;
    if width == 0 {
        return Err(EngineError::corrupt(format!("attribute '{}' has no components", name)));
    }
    let bits = r.read_u8("quantization bits")? as u32;
    if !(1..=31).contains(&bits) {
        return Err(EngineError::corrupt(format!(
            "attribute '{}' quantized to {} bits",
            name, bits
        )));
    }
    let mut origin: SmallVec<[f32; 4]> = SmallVec::with_capacity(width);
    for _ in 0..width {
        origin.push(r.read_f32("quantization origin")?);
    }
    let range = r.read_f64("quantization range")?;
    if !range.is_finite() || range < 0.0 || origin.iter().any(|o| !o.is_finite()) {
        return Err(EngineError::corrupt(format!(
            "attribute '{}' has an invalid quantization grid",
            name
        )));
    }
    Ok((name, Quantizer::new(bits, origin, range)))
}

fn write_values(out: &mut ByteWriter, attr: &PointAttribute, q: &Quantizer, predictor: Predictor) {
    match predictor {
        Predictor::Raw => {
            let width = q.raw_width();
            for tuple in attr.tuples() {
                for (c, &v) in tuple.iter().enumerate() {
                    out.write_bytes(&q.quantize(c, v).to_le_bytes()[..width]);
                }
            }
        }
        Predictor::Delta => {
            let mut prev: SmallVec<[u32; 4]> = SmallVec::from_elem(0, attr.component_count());
            for tuple in attr.tuples() {
                for (c, &v) in tuple.iter().enumerate() {
                    let cur = q.quantize(c, v);
                    out.write_varint(zigzag(cur as i64 - prev[c] as i64));
                    prev[c] = cur;
                }
            }
        }
    }
}

fn read_values(
    r: &mut ByteReader<'_>,
    q: &Quantizer,
    point_count: usize,
    predictor: Predictor,
) -> EngineResult<Vec<f32>> {
    let width = q.origin.len();
    let mut values = Vec::with_capacity(point_count * width);
    match predictor {
        Predictor::Raw => {
            let bytes = q.raw_width();
            let mut le = [0u8; 4];
            for _ in 0..point_count {
                for c in 0..width {
                    le[..bytes].copy_from_slice(r.read_bytes(bytes, "quantized value")?);
                    let v = u32::from_le_bytes(le);
                    if v > q.max_q {
                        return Err(EngineError::corrupt("quantized value outside the grid"));
                    }
                    values.push(q.dequantize(c, v));
                }
            }
        }
        Predictor::Delta => {
            let mut prev: SmallVec<[i64; 4]> = SmallVec::from_elem(0, width);
            for _ in 0..point_count {
                for c in 0..width {
                    let cur = prev[c]
                        .checked_add(unzigzag(r.read_varint("residual")?))
                        .filter(|v| (0..=q.max_q as i64).contains(v))
                        .ok_or_else(|| EngineError::corrupt("quantized value outside the grid"))?;
                    values.push(q.dequantize(c, cur as u32));
                    prev[c] = cur;
                }
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{INTENSITY, POSITION};

    fn cloud_of(points: &[[f32; 4]]) -> PointCloud {
        let pos = points.iter().flat_map(|p| [p[0], p[1], p[2]]).collect();
        let intensity = points.iter().map(|p| p[3]).collect();
        PointCloud::new(points.len())
            .with_attribute(PointAttribute::new(POSITION, 3, pos))
            .with_attribute(PointAttribute::new(INTENSITY, 1, intensity))
    }

    fn max_error(a: &PointCloud, b: &PointCloud) -> f32 {
        a.attributes()
            .iter()
            .zip(b.attributes())
            .flat_map(|(x, y)| x.values().iter().zip(y.values()))
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f32::max)
    }

    #[test]
    fn test_quantizer_grid() {
        let attr = PointAttribute::new(POSITION, 3, vec![0.0, 0.0, 0.0, 2.0, 1.0, 0.5]);
        let q = Quantizer::fit(&attr, 2).unwrap();
        assert_eq!(q.max_q, 2);
        assert_eq!(q.range, 2.0);
        assert_eq!(q.origin.as_slice(), &[0.0, 0.0, 0.0]);
        assert_eq!(q.quantize(0, 2.0), 2);
        assert_eq!(q.quantize(1, 1.0), 1);
        assert_eq!(q.quantize(2, 0.5), 1); // 0.5 rounds up
        assert_eq!(q.dequantize(0, 2), 2.0);
        assert_eq!(q.dequantize(1, 1), 1.0);
        assert_eq!(q.raw_width(), 1);
        assert_eq!(Quantizer::new(1, SmallVec::new(), 1.0).max_q, 1);
        assert_eq!(Quantizer::new(31, SmallVec::new(), 1.0).max_q, 1 << 30);
    }

    #[test]
    fn test_grids_nest() {
        let attr = PointAttribute::new(INTENSITY, 1, vec![0.0, 0.3, 1.0, 3.0]);
        for bits in 1..31 {
            let coarse = Quantizer::fit(&attr, bits).unwrap();
            let fine = Quantizer::fit(&attr, bits + 1).unwrap();
            for q in 0..=coarse.max_q.min(64) {
                assert_eq!(coarse.dequantize(0, q), fine.dequantize(0, 2 * q), "{} bits, index {}", bits, q);
            }
        }
    }

    #[test]
    fn test_roundtrip_exact_at_extremes() {
        let cloud = cloud_of(&[[1.0, 2.0, 3.0, 0.5], [4.0, 5.0, 6.0, 0.25]]);
        let engine = QuantizedEngine::new();
        let options = CompressionOptions::new(5, 16).unwrap();
        let decoded = engine.decode(engine.encode(&cloud, &options).unwrap().as_bytes()).unwrap();
        assert_eq!(decoded, cloud);
    }

    #[test]
    fn test_both_predictors_roundtrip() {
        let points: Vec<[f32; 4]> = (0..200)
            .map(|i| {
                let a = i as f32 * 0.05;
                [a.cos() * 10.0, a.sin() * 10.0, -1.5 + 0.01 * i as f32, (i % 7) as f32 / 7.0]
            })
            .collect();
        let cloud = cloud_of(&points);
        let engine = QuantizedEngine::new();

        for level in [0, 2, 3, 10] {
            let options = CompressionOptions::new(level, 14).unwrap();
            let encoded = engine.encode(&cloud, &options).unwrap();
            let decoded = engine.decode(encoded.as_bytes()).unwrap();
            assert_eq!(decoded.point_count(), 200);
            // half a step over a 20 m cube with 14 bits
            assert!(max_error(&cloud, &decoded) <= 20.0 / 8192.0 / 2.0 + 1e-5);
        }
    }

    #[test]
    fn test_encode_deterministic() {
        let cloud = cloud_of(&[[0.1, 0.2, 0.3, 1.0], [0.4, 0.5, 0.6, 0.0], [9.0, -9.0, 0.0, 0.5]]);
        let engine = QuantizedEngine::new();
        let options = CompressionOptions::new(7, 11).unwrap();
        assert_eq!(engine.encode(&cloud, &options).unwrap(), engine.encode(&cloud, &options).unwrap());
    }

    #[test]
    fn test_constant_attribute() {
        let cloud = cloud_of(&[[5.0, 5.0, 5.0, 1.0]; 10]);
        let engine = QuantizedEngine::new();
        let encoded = engine.encode(&cloud, &CompressionOptions::default()).unwrap();
        assert_eq!(engine.decode(encoded.as_bytes()).unwrap(), cloud);
    }

    #[test]
    fn test_empty_cloud() {
        let cloud = cloud_of(&[]);
        let engine = QuantizedEngine::new();
        let encoded = engine.encode(&cloud, &CompressionOptions::default()).unwrap();
        let decoded = engine.decode(encoded.as_bytes()).unwrap();
        assert_eq!(decoded.point_count(), 0);
        assert_eq!(decoded.attributes().len(), 2);
    }

    #[test]
    fn test_non_finite_rejected() {
        let cloud = cloud_of(&[[f32::NAN, 0.0, 0.0, 0.0]]);
        let err = QuantizedEngine::new()
            .encode(&cloud, &CompressionOptions::default())
            .unwrap_err();
        assert_eq!(err.status, EngineStatus::InvalidParameter);
    }

    #[test]
    fn test_corrupt_streams() {
        let engine = QuantizedEngine::new();
        let cloud = cloud_of(&[[1.0, 2.0, 3.0, 0.5], [4.0, 5.0, 6.0, 0.25]]);
        let good = engine.encode(&cloud, &CompressionOptions::default()).unwrap().into_bytes();

        assert_eq!(engine.decode(b"nope").unwrap_err().status, EngineStatus::InvalidParameter);
        assert_eq!(engine.decode(&good[..10]).unwrap_err().status, EngineStatus::IoError);

        let mut bad_version = good.clone();
        bad_version[4] = 99;
        assert_eq!(engine.decode(&bad_version).unwrap_err().status, EngineStatus::UnsupportedVersion);

        let mut bad_predictor = good.clone();
        bad_predictor[5] = 7;
        assert_eq!(engine.decode(&bad_predictor).unwrap_err().status, EngineStatus::UnsupportedFeature);

        let mut trailing = good.clone();
        trailing.push(0);
        assert_eq!(engine.decode(&trailing).unwrap_err().status, EngineStatus::CorruptStream);

        // point count far beyond what the payload holds
        let mut huge = good;
        huge[8..16].copy_from_slice(&(u32::MAX as u64).to_le_bytes());
        assert_eq!(engine.decode(&huge).unwrap_err().status, EngineStatus::CorruptStream);
    }
}
