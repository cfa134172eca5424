//! Conversion between stride-interleaved flat buffers and [`PointCloud`]s.

use super::{AttributeLayout, AttributeSpec, PointAttribute, PointCloud};
use crate::util::{Error, Result};

/// Builds structured point clouds from flat buffers under a fixed layout,
/// and flattens them back.
///
/// Point order is preserved in both directions: point `i` of the flat buffer
/// is tuple `i` of every attribute.
#[derive(Clone, Copy, Debug)]
pub struct PointCloudBuilder<'a> {
    layout: &'a AttributeLayout,
}

impl<'a> PointCloudBuilder<'a> {
    /// Create a builder for the given layout.
    pub fn new(layout: &'a AttributeLayout) -> Self {
        Self { layout }
    }

    /// Split a flat buffer into per-attribute arrays.
    ///
    /// Fails with [`Error::MalformedBuffer`] before allocating anything if the
    /// buffer length is not a whole number of strides.
    pub fn from_flat_buffer(&self, buffer: &[f32]) -> Result<PointCloud> {
        let stride = self.layout.stride();
        let point_count = self
            .layout
            .point_count(buffer.len())
            .ok_or(Error::MalformedBuffer { len: buffer.len(), stride })?;

        let mut cloud = PointCloud::new(point_count);
        for spec in self.layout.attributes() {
            let range = spec.range();
            let mut values = Vec::with_capacity(point_count * spec.component_count);
            for slot in buffer.chunks_exact(stride) {
                values.extend_from_slice(&slot[range.clone()]);
            }
            cloud.push_attribute(PointAttribute::new(spec.name.clone(), spec.component_count, values));
        }
        Ok(cloud)
    }

    /// Interleave a cloud's attributes back into one flat buffer.
    ///
    /// Every layout attribute must be present in the cloud with the declared
    /// width and exactly `point_count` tuples; the cloud is checked in full
    /// before the output is allocated. Components no attribute covers are `0.0`.
    /// Cloud attributes the layout does not mention are ignored.
    pub fn to_flat_buffer(&self, cloud: &PointCloud) -> Result<Vec<f32>> {
        let stride = self.layout.stride();
        let point_count = cloud.point_count();

        let resolved = self
            .layout
            .attributes()
            .iter()
            .map(|spec| Self::resolve(spec, cloud))
            .collect::<Result<Vec<_>>>()?;

        let len = point_count
            .checked_mul(stride)
            .ok_or(Error::BufferTooLarge { points: point_count, stride })?;
        let mut flat = vec![0.0f32; len];

        for (spec, attr) in resolved {
            let range = spec.range();
            for (slot, tuple) in flat.chunks_exact_mut(stride).zip(attr.tuples()) {
                slot[range.clone()].copy_from_slice(tuple);
            }
        }
        Ok(flat)
    }

    fn resolve<'c>(
        spec: &'a AttributeSpec,
        cloud: &'c PointCloud,
    ) -> Result<(&'a AttributeSpec, &'c PointAttribute)> {
        let attr = cloud
            .attribute(&spec.name)
            .ok_or_else(|| Error::AttributeMissing(spec.name.clone()))?;

        if attr.component_count() != spec.component_count {
            return Err(Error::ComponentCountMismatch {
                attribute: spec.name.clone(),
                expected: spec.component_count,
                actual: attr.component_count(),
            });
        }
        if cloud.point_count().checked_mul(spec.component_count) != Some(attr.values().len()) {
            return Err(Error::PointCountMismatch {
                attribute: spec.name.clone(),
                expected: cloud.point_count(),
                actual: attr.len(),
            });
        }
        Ok((spec, attr))
    }
}
