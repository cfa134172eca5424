//! Boundary buffers exchanged with the host: flat float buffers going in and
//! out, opaque encoded bytes in between.
//!
//! On disk a flat buffer is raw little-endian `f32`, one stride per point
//! (the KITTI velodyne `.bin` convention for `x, y, z, intensity`). Encoded
//! buffers are written byte-for-byte.

use std::fs::File;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::util::{Error, Result};

/// Opaque compressed bytes produced by a compression engine.
///
/// The codec never adds or interprets a header; what is inside belongs to
/// the engine that wrote it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct EncodedBuffer(Vec<u8>);

impl EncodedBuffer {
    /// Wrap encoded bytes.
    #[inline]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the buffer holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the byte vector.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Read an encoded buffer from a file.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        read_file(path.as_ref()).map(Self)
    }

    /// Write the bytes to a file, replacing it.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.0)?;
        Ok(())
    }
}

impl From<Vec<u8>> for EncodedBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for EncodedBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A stride-interleaved flat float buffer whose length is a whole number of
/// strides.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportBuffer {
    stride: usize,
    data: Vec<f32>,
}

impl TransportBuffer {
    /// Wrap a flat buffer, checking its length against the stride.
    pub fn from_vec(data: Vec<f32>, stride: usize) -> Result<Self> {
        if stride == 0 {
            return Err(Error::invalid_layout("stride must be greater than zero"));
        }
        if data.len() % stride != 0 {
            return Err(Error::MalformedBuffer { len: data.len(), stride });
        }
        Ok(Self { stride, data })
    }

    /// Values per point.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of points (`len / stride`).
    #[inline]
    pub fn point_count(&self) -> usize {
        self.data.len() / self.stride
    }

    /// Total number of values.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer holds no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the flat values.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Consume into the flat value vector.
    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }

    /// Size of the raw buffer in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Read a raw little-endian `f32` file.
    ///
    /// Fails with [`Error::MalformedBuffer`] if the file does not hold a whole
    /// number of strides.
    pub fn read_from(path: impl AsRef<Path>, stride: usize) -> Result<Self> {
        let bytes = read_file(path.as_ref())?;
        let float_size = std::mem::size_of::<f32>();
        if bytes.len() % float_size != 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{} bytes is not a whole number of f32 values", bytes.len()),
            )));
        }
        let mut data = vec![0.0f32; bytes.len() / float_size];
        LittleEndian::read_f32_into(&bytes, &mut data);
        Self::from_vec(data, stride)
    }

    /// Write as a raw little-endian `f32` file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_le_bytes())?;
        Ok(())
    }

    /// Raw little-endian bytes of the buffer.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.byte_len()];
        LittleEndian::write_f32_into(&self.data, &mut bytes);
        bytes
    }
}

impl AsRef<[f32]> for TransportBuffer {
    fn as_ref(&self) -> &[f32] {
        &self.data
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })
}

#[cfg(feature = "mmap")]
fn read_file(path: &Path) -> Result<Vec<u8>> {
    let file = open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Vec::new());
    }
    // Safety: the map is read-only and copied out before it is dropped
    let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
    Ok(mmap.to_vec())
}

#[cfg(not(feature = "mmap"))]
fn read_file(path: &Path) -> Result<Vec<u8>> {
    use std::io::Read;

    let mut file = open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_buffer() {
        let buf = TransportBuffer::from_vec(vec![1.0, 2.0, 3.0, 0.5, 4.0, 5.0, 6.0, 0.25], 4).unwrap();
        assert_eq!(buf.point_count(), 2);
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.byte_len(), 32);
        assert_eq!(&buf.as_slice()[4..], &[4.0, 5.0, 6.0, 0.25]);

        assert!(matches!(
            TransportBuffer::from_vec(vec![1.0; 5], 4),
            Err(Error::MalformedBuffer { len: 5, stride: 4 })
        ));
        assert!(TransportBuffer::from_vec(vec![], 0).is_err());
        assert!(TransportBuffer::from_vec(vec![], 4).unwrap().is_empty());
    }

    #[test]
    fn test_le_bytes() {
        let buf = TransportBuffer::from_vec(vec![1.0], 1).unwrap();
        assert_eq!(buf.to_le_bytes(), 1.0f32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_encoded_buffer() {
        let enc = EncodedBuffer::from(vec![1u8, 2, 3]);
        assert_eq!(enc.len(), 3);
        assert_eq!(enc.as_bytes(), &[1, 2, 3]);
        assert!(EncodedBuffer::default().is_empty());
        assert_eq!(enc.into_bytes(), vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_file() {
        let err = TransportBuffer::read_from("/definitely/not/here.bin", 4).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
