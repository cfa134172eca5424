//! Utility types shared across the codec.
//!
//! - [`ElementType`] - scalar storage type of attribute components
//! - [`Error`] / [`Result`] - Error handling
//! - [`BBox3f`] - bounding boxes over glam vectors

mod element;
mod error;
mod math;

pub use element::*;
pub use error::*;
pub use math::*;
