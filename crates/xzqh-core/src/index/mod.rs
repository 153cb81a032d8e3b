//! Immutable three-level region tree.
//!
//! A [`RegionIndex`] is produced once by the decoder and never mutated.
//! Each level stores its children as a plain `Vec`, so a node is reached
//! by position in O(1) per level: indices are dense and contiguous by
//! construction.
//!
//! ```text
//! RegionIndex
//! └── provinces[p]            Level::Province, index p
//!     └── children[c]         Level::City,     index c (within p)
//!         └── children[k]     Level::County,   index k (within c)
//! ```

use crate::error::{signed, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Depth of a node in the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Top level
    Province,
    /// Second level, child of a province
    City,
    /// Leaf level, child of a city
    County,
}

impl Level {
    /// Returns the lowercase name of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Province => "province",
            Level::City => "city",
            Level::County => "county",
        }
    }

    /// Returns the level below this one, if any
    pub fn child(&self) -> Option<Level> {
        match self {
            Level::Province => Some(Level::City),
            Level::City => Some(Level::County),
            Level::County => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Geographic center of a region, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Longitude in [-180, 180]
    pub longitude: f64,
    /// Latitude in [-90, 90]
    pub latitude: f64,
}

impl Coordinate {
    /// Creates a coordinate from longitude and latitude
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Returns true if both components are within their valid ranges
    pub fn is_valid(&self) -> bool {
        (-180.0..=180.0).contains(&self.longitude) && (-90.0..=90.0).contains(&self.latitude)
    }
}

/// A single province, city, or county
#[derive(Debug, Clone, PartialEq)]
pub struct RegionNode {
    name: String,
    code: String,
    index: usize,
    level: Level,
    center: Option<Coordinate>,
    children: Vec<RegionNode>,
}

impl RegionNode {
    pub(crate) fn new(
        name: String,
        code: String,
        index: usize,
        level: Level,
        center: Option<Coordinate>,
        children: Vec<RegionNode>,
    ) -> Self {
        Self {
            name,
            code,
            index,
            level,
            center,
            children,
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed-width administrative code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Position within the parent's children (or among provinces)
    pub fn index(&self) -> usize {
        self.index
    }

    /// Depth of this node
    pub fn level(&self) -> Level {
        self.level
    }

    /// Geographic center, if the payload carries one
    pub fn center(&self) -> Option<Coordinate> {
        self.center
    }

    /// Child nodes in index order (empty for counties)
    pub fn children(&self) -> &[RegionNode] {
        &self.children
    }
}

/// Position of a node in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RegionPath {
    /// Province index
    pub province: usize,
    /// City index within the province
    pub city: Option<usize>,
    /// County index within the city
    pub county: Option<usize>,
}

impl RegionPath {
    /// Path to a province
    pub fn province(province: usize) -> Self {
        Self {
            province,
            city: None,
            county: None,
        }
    }

    /// Path to a city
    pub fn city(province: usize, city: usize) -> Self {
        Self {
            province,
            city: Some(city),
            county: None,
        }
    }

    /// Path to a county
    pub fn county(province: usize, city: usize, county: usize) -> Self {
        Self {
            province,
            city: Some(city),
            county: Some(county),
        }
    }

    /// Level of the node this path points at
    pub fn level(&self) -> Level {
        match (self.city, self.county) {
            (_, Some(_)) => Level::County,
            (Some(_), None) => Level::City,
            (None, None) => Level::Province,
        }
    }
}

impl fmt::Display for RegionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.province)?;
        if let Some(city) = self.city {
            write!(f, "/{}", city)?;
        }
        if let Some(county) = self.county {
            write!(f, "/{}", county)?;
        }
        Ok(())
    }
}

/// Node counts and coordinate coverage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Number of provinces
    pub provinces: usize,
    /// Number of cities
    pub cities: usize,
    /// Number of counties
    pub counties: usize,
    /// Nodes at any level that carry a coordinate
    pub with_coordinates: usize,
}

impl IndexStats {
    /// Total number of nodes
    pub fn total(&self) -> usize {
        self.provinces + self.cities + self.counties
    }

    /// Share of nodes carrying coordinates, in percent
    pub fn coverage(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.with_coordinates as f64 * 100.0 / total as f64,
        }
    }
}

/// The decoded, immutable region tree
#[derive(Debug, Clone, PartialEq)]
pub struct RegionIndex {
    provinces: Vec<RegionNode>,
    code_width: u8,
}

impl RegionIndex {
    pub(crate) fn new(provinces: Vec<RegionNode>, code_width: u8) -> Self {
        Self {
            provinces,
            code_width,
        }
    }

    /// Width of every administrative code in this index
    pub fn code_width(&self) -> u8 {
        self.code_width
    }

    /// All provinces in index order
    pub fn provinces(&self) -> &[RegionNode] {
        &self.provinces
    }

    /// A single province
    pub fn province(&self, province: usize) -> Result<&RegionNode> {
        child_at(&self.provinces, Level::Province, province)
    }

    /// Cities of a province in index order
    pub fn cities(&self, province: usize) -> Result<&[RegionNode]> {
        Ok(self.province(province)?.children())
    }

    /// A single city
    pub fn city(&self, province: usize, city: usize) -> Result<&RegionNode> {
        child_at(self.cities(province)?, Level::City, city)
    }

    /// Counties of a city in index order
    ///
    /// `city` is positional within `province`, so an index that does not
    /// belong to the province is simply out of range.
    pub fn counties(&self, province: usize, city: usize) -> Result<&[RegionNode]> {
        Ok(self.city(province, city)?.children())
    }

    /// Resolves the deepest supplied level
    ///
    /// A county without a city is rejected rather than ignored.
    pub fn detail(
        &self,
        province: usize,
        city: Option<usize>,
        county: Option<usize>,
    ) -> Result<&RegionNode> {
        match (city, county) {
            (None, None) => self.province(province),
            (Some(city), None) => self.city(province, city),
            (Some(city), Some(county)) => {
                child_at(self.counties(province, city)?, Level::County, county)
            }
            (None, Some(county)) => Err(Error::MissingParent {
                level: Level::County,
                index: signed(county),
            }),
        }
    }

    /// Resolves a [`RegionPath`]
    pub fn get(&self, path: RegionPath) -> Result<&RegionNode> {
        self.detail(path.province, path.city, path.county)
    }

    /// Depth-first walk over every node, parents before children
    pub fn iter(&self) -> impl Iterator<Item = (RegionPath, &RegionNode)> + '_ {
        self.provinces.iter().flat_map(|province| {
            let p = province.index;
            std::iter::once((RegionPath::province(p), province)).chain(
                province.children.iter().flat_map(move |city| {
                    let c = city.index;
                    std::iter::once((RegionPath::city(p, c), city)).chain(
                        city.children
                            .iter()
                            .map(move |county| (RegionPath::county(p, c, county.index), county)),
                    )
                }),
            )
        })
    }

    /// Paths of every node whose name equals `name`
    pub fn find_by_name(&self, name: &str) -> Vec<RegionPath> {
        self.iter()
            .filter(|(_, node)| node.name == name)
            .map(|(path, _)| path)
            .collect()
    }

    /// Paths of every node without a coordinate
    pub fn missing_coordinates(&self) -> Vec<RegionPath> {
        self.iter()
            .filter(|(_, node)| node.center.is_none())
            .map(|(path, _)| path)
            .collect()
    }

    /// Nodes along a path, outermost first
    pub fn lineage(&self, path: RegionPath) -> Result<Vec<&RegionNode>> {
        let mut nodes = vec![self.province(path.province)?];
        if let Some(city) = path.city {
            nodes.push(self.city(path.province, city)?);
        }
        if path.county.is_some() {
            nodes.push(self.get(path)?);
        }
        Ok(nodes)
    }

    /// Node counts and coordinate coverage
    pub fn stats(&self) -> IndexStats {
        self.iter().fold(IndexStats::default(), |mut stats, (_, node)| {
            match node.level {
                Level::Province => stats.provinces += 1,
                Level::City => stats.cities += 1,
                Level::County => stats.counties += 1,
            }
            if node.center.is_some() {
                stats.with_coordinates += 1;
            }
            stats
        })
    }
}

fn child_at(nodes: &[RegionNode], level: Level, index: usize) -> Result<&RegionNode> {
    nodes
        .get(index)
        .ok_or_else(|| Error::index_out_of_range(level, signed(index), nodes.len()))
}
