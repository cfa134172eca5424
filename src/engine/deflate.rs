//! zlib entropy stage for engine payloads.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::{EngineError, EngineResult, EngineStatus};

/// zlib level for an encoder speed: speed 0 -> 9 (best), speed 10 -> 1 (fast).
pub(crate) fn level_for_speed(speed: u32) -> Compression {
    let speed = speed.min(10);
    Compression::new(9 - speed * 8 / 10)
}

/// Compress `data` with zlib at the given level.
pub(crate) fn deflate(data: &[u8], level: Compression) -> EngineResult<Vec<u8>> {
    let failed = |e: std::io::Error| EngineError::new(EngineStatus::IoError, format!("deflate failed: {}", e));
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), level);
    encoder.write_all(data).map_err(failed)?;
    encoder.finish().map_err(failed)
}

/// Decompress a zlib payload that must expand to exactly `expected_len` bytes.
///
/// Never reads past `expected_len` output bytes, so a lying header cannot
/// make the decoder allocate more than it announced.
pub(crate) fn inflate(data: &[u8], expected_len: usize) -> EngineResult<Vec<u8>> {
    // zlib cannot expand by more than ~1032:1
    let plausible = data.len().saturating_mul(1032).saturating_add(64);
    if expected_len > plausible {
        return Err(EngineError::corrupt(format!(
            "payload of {} bytes cannot expand to {} bytes",
            data.len(),
            expected_len
        )));
    }

    let mut decoder = ZlibDecoder::new(data).take(expected_len as u64 + 1);
    let mut out = Vec::with_capacity(expected_len);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| EngineError::corrupt(format!("inflate failed: {}", e)))?;

    if out.len() != expected_len {
        return Err(EngineError::corrupt(format!(
            "payload expanded to {} bytes, header says {}",
            out.len(),
            expected_len
        )));
    }
    Ok(out)
}
