//! Attribute layout - how a flat interleaved buffer maps to named attributes.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::ops::Range;

use crate::util::{ElementType, Error, Result};

/// Name of the xyz position attribute.
pub const POSITION: &str = "position";

/// Name of the per-point scalar reflectance attribute.
pub const INTENSITY: &str = "intensity";

/// One named attribute inside a stride slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Attribute name, unique within a layout.
    pub name: String,
    /// Offset of the first component within the stride slot.
    pub offset: usize,
    /// Number of consecutive components (3 for xyz, 1 for a scalar).
    pub component_count: usize,
    /// Storage type of each component.
    #[serde(default)]
    pub element_type: ElementType,
}

impl AttributeSpec {
    /// Create a Float32 attribute spec.
    pub fn new(name: impl Into<String>, offset: usize, component_count: usize) -> Self {
        Self {
            name: name.into(),
            offset,
            component_count,
            element_type: ElementType::Float32,
        }
    }

    /// Component range within a stride slot.
    ///
    /// Only meaningful once the owning layout has been validated.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.component_count
    }
}

/// Describes a stride-interleaved buffer as an ordered list of attributes.
///
/// A layout can only be obtained through [`AttributeLayout::new`] (or
/// deserialization, which goes through the same checks), so every value of
/// this type satisfies:
///
/// - `stride > 0` and at least one attribute is declared
/// - every attribute has a non-zero width and fits inside the stride
/// - component ranges are pairwise disjoint and names are unique
///
/// Components of a slot that no attribute covers are ignored on encode and
/// written as `0.0` on decode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LayoutDef", into = "LayoutDef")]
pub struct AttributeLayout {
    stride: usize,
    attributes: SmallVec<[AttributeSpec; 4]>,
}

impl AttributeLayout {
    /// Create and validate a layout.
    pub fn new(stride: usize, attributes: impl IntoIterator<Item = AttributeSpec>) -> Result<Self> {
        let layout = Self {
            stride,
            attributes: attributes.into_iter().collect(),
        };
        layout.validate()?;
        Ok(layout)
    }

    /// The LiDAR layout: `x, y, z, intensity` per point (stride 4).
    pub fn xyzi() -> Self {
        let mut attributes = SmallVec::new();
        attributes.push(AttributeSpec::new(POSITION, 0, 3));
        attributes.push(AttributeSpec::new(INTENSITY, 3, 1));
        Self { stride: 4, attributes }
    }

    /// Check the layout invariants.
    ///
    /// Pure function of the value: calling it repeatedly yields the same answer.
    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(Error::invalid_layout("stride must be greater than zero"));
        }
        if self.attributes.is_empty() {
            return Err(Error::invalid_layout("layout declares no attributes"));
        }

        let mut ranges: SmallVec<[(usize, usize, &str); 4]> = SmallVec::new();
        for spec in &self.attributes {
            if spec.name.is_empty() {
                return Err(Error::invalid_layout("attribute name must not be empty"));
            }
            if spec.component_count == 0 {
                return Err(Error::invalid_layout(format!(
                    "attribute '{}' has zero components",
                    spec.name
                )));
            }
            let end = spec
                .offset
                .checked_add(spec.component_count)
                .filter(|&end| end <= self.stride)
                .ok_or_else(|| {
                    Error::invalid_layout(format!(
                        "attribute '{}' (offset {}, {} components) exceeds stride {}",
                        spec.name, spec.offset, spec.component_count, self.stride
                    ))
                })?;
            if ranges.iter().any(|(_, _, name)| *name == spec.name) {
                return Err(Error::invalid_layout(format!(
                    "duplicate attribute name '{}'",
                    spec.name
                )));
            }
            ranges.push((spec.offset, end, spec.name.as_str()));
        }

        ranges.sort_unstable_by_key(|&(start, _, _)| start);
        for pair in ranges.windows(2) {
            let (_, prev_end, prev_name) = pair[0];
            let (start, _, name) = pair[1];
            if start < prev_end {
                return Err(Error::invalid_layout(format!(
                    "attributes '{}' and '{}' overlap",
                    prev_name, name
                )));
            }
        }

        Ok(())
    }

    /// Number of f32 components per point.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Attributes in declaration order.
    #[inline]
    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    /// Find an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Number of declared attributes.
    #[inline]
    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    /// Number of components covered by attributes (at most `stride`).
    pub fn covered_components(&self) -> usize {
        self.attributes.iter().map(|a| a.component_count).sum()
    }

    /// Number of points in a flat buffer of `len` values, if `len` is a
    /// whole number of strides.
    #[inline]
    pub fn point_count(&self, len: usize) -> Option<usize> {
        (len % self.stride == 0).then(|| len / self.stride)
    }
}

impl Default for AttributeLayout {
    fn default() -> Self {
        Self::xyzi()
    }
}

/// Unvalidated serialized form of [`AttributeLayout`].
#[derive(Clone, Debug, Serialize, Deserialize)]
struct LayoutDef {
    stride: usize,
    attributes: Vec<AttributeSpec>,
}

impl TryFrom<LayoutDef> for AttributeLayout {
    type Error = Error;

    fn try_from(def: LayoutDef) -> Result<Self> {
        Self::new(def.stride, def.attributes)
    }
}

impl From<AttributeLayout> for LayoutDef {
    fn from(layout: AttributeLayout) -> Self {
        Self {
            stride: layout.stride,
            attributes: layout.attributes.into_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xyzi_layout() {
        let layout = AttributeLayout::xyzi();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.stride(), 4);
        assert_eq!(layout.num_attributes(), 2);
        assert_eq!(layout.covered_components(), 4);
        assert_eq!(layout.attribute(POSITION).map(|a| a.range()), Some(0..3));
        assert_eq!(layout.attribute(INTENSITY).map(|a| a.range()), Some(3..4));
        assert!(layout.attribute("ring").is_none());
    }

    #[test]
    fn test_zero_stride_rejected() {
        let err = AttributeLayout::new(0, [AttributeSpec::new(POSITION, 0, 3)]).unwrap_err();
        assert!(matches!(err, Error::InvalidLayout(_)));
    }

    #[test]
    fn test_overlap_rejected() {
        let err = AttributeLayout::new(
            4,
            [AttributeSpec::new(POSITION, 0, 3), AttributeSpec::new(INTENSITY, 2, 1)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_out_of_stride_rejected() {
        let err = AttributeLayout::new(
            4,
            [AttributeSpec::new(POSITION, 0, 3), AttributeSpec::new(INTENSITY, 4, 1)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("exceeds stride"));

        // offset + count must not wrap around
        let err = AttributeLayout::new(4, [AttributeSpec::new(POSITION, usize::MAX, 2)]).unwrap_err();
        assert!(matches!(err, Error::InvalidLayout(_)));
    }

    #[test]
    fn test_degenerate_attributes_rejected() {
        assert!(AttributeLayout::new(4, []).is_err());
        assert!(AttributeLayout::new(4, [AttributeSpec::new(POSITION, 0, 0)]).is_err());
        assert!(AttributeLayout::new(4, [AttributeSpec::new("", 0, 1)]).is_err());
        assert!(AttributeLayout::new(
            4,
            [AttributeSpec::new(POSITION, 0, 1), AttributeSpec::new(POSITION, 1, 1)],
        )
        .is_err());
    }

    #[test]
    fn test_gaps_allowed() {
        // x y z, one padding float, intensity
        let layout = AttributeLayout::new(
            5,
            [AttributeSpec::new(INTENSITY, 4, 1), AttributeSpec::new(POSITION, 0, 3)],
        )
        .unwrap();
        assert_eq!(layout.covered_components(), 4);
        assert_eq!(layout.attributes()[0].name, INTENSITY);
        assert_eq!(layout.point_count(10), Some(2));
        assert_eq!(layout.point_count(9), None);
    }

    #[test]
    fn test_validation_idempotent() {
        let good = AttributeLayout::xyzi();
        assert!(good.validate().is_ok());
        assert!(good.validate().is_ok());

        let bad = AttributeLayout {
            stride: 2,
            attributes: SmallVec::from_vec(vec![AttributeSpec::new(POSITION, 0, 3)]),
        };
        let first = bad.validate().unwrap_err().to_string();
        let second = bad.validate().unwrap_err().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_layout_json() {
        let json = serde_json::to_string(&AttributeLayout::xyzi()).unwrap();
        let back: AttributeLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AttributeLayout::xyzi());

        let bad = r#"{"stride": 3, "attributes": [{"name": "position", "offset": 0, "component_count": 4}]}"#;
        assert!(serde_json::from_str::<AttributeLayout>(bad).is_err());
    }
}
