//! Little-endian byte stream helpers shared by the engines.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{EngineError, EngineResult, EngineStatus};

/// Growable output buffer.
#[derive(Debug, Default)]
pub(crate) struct ByteWriter {
    buf: Vec<u8>,
}

// Writes into a Vec cannot fail, so the io::Result values are dropped.
impl ByteWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        let _ = self.buf.write_u64::<LittleEndian>(value);
    }

    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        let _ = self.buf.write_f32::<LittleEndian>(value);
    }

    #[inline]
    pub fn write_f64(&mut self, value: f64) {
        let _ = self.buf.write_f64::<LittleEndian>(value);
    }

    /// Length-prefixed (u8) UTF-8 string.
    pub fn write_short_str(&mut self, s: &str) -> EngineResult<()> {
        let len = u8::try_from(s.len())
            .map_err(|_| EngineError::invalid(format!("name '{}' longer than 255 bytes", s)))?;
        self.write_u8(len);
        self.write_bytes(s.as_bytes());
        Ok(())
    }

    /// LEB128 unsigned varint.
    pub fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked reader over an input slice.
pub(crate) struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

fn truncated(what: &str) -> EngineError {
    EngineError::new(EngineStatus::IoError, format!("stream truncated while reading {}", what))
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        let data = *self.cursor.get_ref();
        data.len().saturating_sub(self.cursor.position() as usize)
    }

    pub fn read_bytes(&mut self, len: usize, what: &str) -> EngineResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(truncated(what));
        }
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.cursor.position() as usize;
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }

    pub fn read_u8(&mut self, what: &str) -> EngineResult<u8> {
        self.cursor.read_u8().map_err(|_| truncated(what))
    }

    pub fn read_u64(&mut self, what: &str) -> EngineResult<u64> {
        self.cursor.read_u64::<LittleEndian>().map_err(|_| truncated(what))
    }

    pub fn read_f32(&mut self, what: &str) -> EngineResult<f32> {
        self.cursor.read_f32::<LittleEndian>().map_err(|_| truncated(what))
    }

    pub fn read_f64(&mut self, what: &str) -> EngineResult<f64> {
        self.cursor.read_f64::<LittleEndian>().map_err(|_| truncated(what))
    }

    pub fn read_short_str(&mut self, what: &str) -> EngineResult<String> {
        let len = self.read_u8(what)? as usize;
        let bytes = self.read_bytes(len, what)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| EngineError::corrupt(format!("{} is not valid UTF-8", what)))
    }

    /// Fill `out` from the stream.
    pub fn read_exact_into(&mut self, out: &mut [u8], what: &str) -> EngineResult<()> {
        self.cursor.read_exact(out).map_err(|_| truncated(what))
    }

    pub fn read_varint(&mut self, what: &str) -> EngineResult<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8(what)?;
            if shift >= 64 || (shift == 63 && byte > 1) {
                return Err(EngineError::corrupt(format!("varint overflow in {}", what)));
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }
}

/// Map a signed residual onto an unsigned varint-friendly value.
#[inline]
pub(crate) fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Inverse of [`zigzag`].
#[inline]
pub(crate) fn unzigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}
