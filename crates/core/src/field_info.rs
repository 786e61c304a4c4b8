//! Field descriptions
//!
//! A [`DataFieldInfo`] describes one logical field: element type and width,
//! per-dimension extents, halo (boundary) widths, and field metainfo.
//!
//! Extents are the full allocated sizes, halo cells included. The halo
//! widths only record which part of each dimension is boundary.

use crate::error::{Error, Result};
use crate::metainfo::MetainfoSet;
use crate::types::ElementType;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Dimension list; fields rarely exceed four dimensions
pub type Dims = SmallVec<[usize; 4]>;

/// Boundary widths of one dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Halo {
    /// Cells before the interior
    pub minus: usize,
    /// Cells after the interior
    pub plus: usize,
}

impl Halo {
    /// Create a halo
    pub fn new(minus: usize, plus: usize) -> Self {
        Halo { minus, plus }
    }

    /// Symmetric halo of `width` on both sides
    pub fn symmetric(width: usize) -> Self {
        Halo::new(width, width)
    }
}

/// Description of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFieldInfo {
    name: String,
    element_type: ElementType,
    byte_width: usize,
    dims: Dims,
    halos: SmallVec<[Halo; 4]>,
    #[serde(default)]
    metainfo: MetainfoSet,
}

impl DataFieldInfo {
    /// Create a field description
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `halos` and `dims` differ in length, if the name
    /// is empty, or if `byte_width` is not the natural width of `element_type`.
    pub fn new(
        name: impl Into<String>,
        element_type: ElementType,
        byte_width: usize,
        dims: &[usize],
        halos: &[Halo],
    ) -> Result<Self> {
        let info = DataFieldInfo {
            name: name.into(),
            element_type,
            byte_width,
            dims: dims.iter().copied().collect(),
            halos: halos.iter().copied().collect(),
            metainfo: MetainfoSet::new(),
        };
        info.validate()?;
        Ok(info)
    }

    /// Check the invariants [`new`](Self::new) enforces
    ///
    /// Descriptions that bypass `new` (deserialized ones) must pass this
    /// before their sizes are trusted.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_argument("field name must not be empty"));
        }
        if self.halos.len() != self.dims.len() {
            return Err(Error::invalid_argument(format!(
                "field '{}': {} halo entries for rank {}",
                self.name,
                self.halos.len(),
                self.dims.len()
            )));
        }
        if self.byte_width != self.element_type.byte_width() {
            return Err(Error::invalid_argument(format!(
                "field '{}': byte width {} does not match {} ({} bytes)",
                self.name,
                self.byte_width,
                self.element_type,
                self.element_type.byte_width()
            )));
        }
        if self.checked_byte_size().is_none() {
            return Err(Error::invalid_argument(format!(
                "field '{}': extents {:?} overflow the addressable size",
                self.name,
                self.dims.as_slice()
            )));
        }
        Ok(())
    }

    /// Create a field with the natural width of `element_type` and no halos
    pub fn with_type(
        name: impl Into<String>,
        element_type: ElementType,
        dims: &[usize],
    ) -> Result<Self> {
        let halos = vec![Halo::default(); dims.len()];
        Self::new(name, element_type, element_type.byte_width(), dims, &halos)
    }

    /// Attach field metainfo (builder)
    pub fn with_metainfo(mut self, metainfo: MetainfoSet) -> Self {
        self.metainfo = metainfo;
        self
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element type
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Bytes per element
    pub fn byte_width(&self) -> usize {
        self.byte_width
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Per-dimension extents
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Per-dimension halo widths
    pub fn halos(&self) -> &[Halo] {
        &self.halos
    }

    /// Field metainfo
    pub fn metainfo(&self) -> &MetainfoSet {
        &self.metainfo
    }

    /// Mutable field metainfo
    pub fn metainfo_mut(&mut self) -> &mut MetainfoSet {
        &mut self.metainfo
    }

    fn checked_element_count(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    fn checked_byte_size(&self) -> Option<usize> {
        self.checked_element_count()?.checked_mul(self.byte_width)
    }

    /// Number of elements (product of extents; 1 for rank 0)
    ///
    /// Saturates at `usize::MAX` for descriptions that fail [`validate`](Self::validate).
    pub fn element_count(&self) -> usize {
        self.checked_element_count().unwrap_or(usize::MAX)
    }

    /// Encoded size in bytes, saturating like [`element_count`](Self::element_count)
    pub fn byte_size(&self) -> usize {
        self.checked_byte_size().unwrap_or(usize::MAX)
    }

    /// True when type, width, rank and extents agree
    pub fn matches(&self, other: &DataFieldInfo) -> bool {
        self.element_type == other.element_type
            && self.byte_width == other.byte_width
            && self.dims == other.dims
    }

    /// `TypeMismatch` unless [`matches`](Self::matches) holds
    pub fn check_compatible(&self, other: &DataFieldInfo) -> Result<()> {
        if self.matches(other) {
            return Ok(());
        }
        Err(Error::TypeMismatch {
            field: self.name.clone(),
            expected: self.shape_string(),
            actual: other.shape_string(),
        })
    }

    /// Compact shape description, e.g. `float64[3, 3]`
    pub fn shape_string(&self) -> String {
        let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        format!("{}[{}]", self.element_type, dims.join(", "))
    }
}

impl fmt::Display for DataFieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.shape_string())
    }
}
