//! Source tree accepted by the encoder.
//!
//! Mirrors the JSON shape of published division trees:
//!
//! ```json
//! [{"code": "110000", "name": "北京市", "level": "province",
//!   "center": {"longitude": 116.40, "latitude": 39.90},
//!   "children": [...]}]
//! ```
//!
//! `level` is informational; depth in the tree decides the level.

use crate::index::Coordinate;
use serde::{Deserialize, Serialize};

/// One node of a source tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRegion {
    /// Administrative code
    pub code: String,
    /// Display name
    pub name: String,
    /// Level label from the source data, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Geographic center, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Coordinate>,
    /// Child regions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SourceRegion>,
}

impl SourceRegion {
    /// Creates a region without center or children
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            level: None,
            center: None,
            children: Vec::new(),
        }
    }

    /// Sets the geographic center
    pub fn with_center(mut self, longitude: f64, latitude: f64) -> Self {
        self.center = Some(Coordinate::new(longitude, latitude));
        self
    }

    /// Sets the level label
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Sets the child regions
    pub fn with_children(mut self, children: Vec<SourceRegion>) -> Self {
        self.children = children;
        self
    }
}
