//! Element types - the scalar storage type of one attribute component.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar type of a single attribute component.
///
/// Flat transport buffers are always `f32`, so this is currently the only
/// variant. The discriminant is what the built-in engine writes to its stream
/// header, so it must stay stable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ElementType {
    /// 32-bit floating point (IEEE 754 single precision)
    #[default]
    #[serde(rename = "float32")]
    Float32 = 1,
}

impl ElementType {
    /// Returns the size in bytes of a single element of this type.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Float32 => 4,
        }
    }

    /// Returns the name of this type as a string.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Float32 => "float32",
        }
    }

    /// Convert from the on-wire u8 value.
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Float32),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
