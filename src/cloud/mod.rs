//! Structured point clouds and their flat-buffer layouts.
//!
//! - [`AttributeLayout`] / [`AttributeSpec`] - stride and offsets of named attributes
//! - [`PointCloud`] / [`PointAttribute`] - per-attribute arrays, index aligned
//! - [`PointCloudBuilder`] - flat buffer <-> [`PointCloud`] conversion

mod builder;
mod layout;

pub use builder::PointCloudBuilder;
pub use layout::{AttributeLayout, AttributeSpec, INTENSITY, POSITION};

use crate::util::BBox3f;

/// Dense values of one attribute, `component_count` floats per point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointAttribute {
    name: String,
    component_count: usize,
    values: Vec<f32>,
}

impl PointAttribute {
    /// Wrap attribute values. `values` holds `component_count` floats per point.
    pub fn new(name: impl Into<String>, component_count: usize, values: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            component_count,
            values,
        }
    }

    /// Attribute name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Components per point.
    #[inline]
    pub fn component_count(&self) -> usize {
        self.component_count
    }

    /// Number of complete tuples stored.
    pub fn len(&self) -> usize {
        if self.component_count == 0 {
            0
        } else {
            self.values.len() / self.component_count
        }
    }

    /// True if no tuple is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tuple of point `index`.
    pub fn get(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.component_count)?;
        self.values.get(start..start + self.component_count)
    }

    /// Iterate over per-point tuples.
    pub fn tuples(&self) -> std::slice::ChunksExact<'_, f32> {
        self.values.chunks_exact(self.component_count.max(1))
    }

    /// All values, tuple after tuple.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Consume into the raw value vector.
    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

/// A structured point cloud: a point count plus named attribute arrays.
///
/// Index `i` in every attribute refers to the same logical point. The cloud
/// itself does not enforce that each attribute holds `point_count` tuples;
/// [`PointCloudBuilder::to_flat_buffer`] checks it against a layout, since
/// clouds also come back from compression engines.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    point_count: usize,
    attributes: Vec<PointAttribute>,
}

impl PointCloud {
    /// Create a cloud of `point_count` points with no attributes yet.
    pub fn new(point_count: usize) -> Self {
        Self {
            point_count,
            attributes: Vec::new(),
        }
    }

    /// Append an attribute (builder style).
    pub fn with_attribute(mut self, attribute: PointAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Append an attribute.
    pub fn push_attribute(&mut self, attribute: PointAttribute) {
        self.attributes.push(attribute);
    }

    /// Number of points.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Check if the cloud has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }

    /// Attributes in insertion order.
    #[inline]
    pub fn attributes(&self) -> &[PointAttribute] {
        &self.attributes
    }

    /// Find an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&PointAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Bounds of the `position` attribute, if it is a 3-component attribute.
    pub fn position_bounds(&self) -> Option<BBox3f> {
        let pos = self.attribute(POSITION).filter(|a| a.component_count == 3)?;
        let coords: &[[f32; 3]] = bytemuck::try_cast_slice(pos.values()).ok()?;
        Some(BBox3f::from_xyz(coords))
    }
}
