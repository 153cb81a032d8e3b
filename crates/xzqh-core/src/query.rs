//! Stateless query façade over a [`RegionIndex`].
//!
//! [`QueryEngine`] validates caller-supplied indices, delegates to the
//! index, and flattens results into the exchange records
//! [`RegionEntry`] and [`RegionDetail`]. It holds only a shared reference,
//! so any number of engines may read the same index concurrently.
//!
//! Indices arrive as `i64`. [`ABSENT`] marks an unspecified city or
//! county slot in [`QueryEngine::detail`]; every other negative value is
//! an index error.

use crate::error::{Error, Result};
use crate::index::{IndexStats, Level, RegionIndex, RegionNode, RegionPath};
use serde::Serialize;

/// Sentinel for an unspecified level in a detail query
pub const ABSENT: i64 = -1;

/// Flat record returned by list queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionEntry {
    /// Display name
    pub name: String,
    /// Administrative code
    pub code: String,
    /// Position within the parent
    pub index: usize,
}

impl From<&RegionNode> for RegionEntry {
    fn from(node: &RegionNode) -> Self {
        Self {
            name: node.name().to_owned(),
            code: node.code().to_owned(),
            index: node.index(),
        }
    }
}

/// Record returned by detail queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionDetail {
    /// Display name
    pub name: String,
    /// Administrative code
    pub code: String,
    /// Longitude, or `None` when the record has no coordinate
    pub lng: Option<f64>,
    /// Latitude, or `None` when the record has no coordinate
    pub lat: Option<f64>,
}

impl From<&RegionNode> for RegionDetail {
    fn from(node: &RegionNode) -> Self {
        let center = node.center();
        Self {
            name: node.name().to_owned(),
            code: node.code().to_owned(),
            lng: center.map(|c| c.longitude),
            lat: center.map(|c| c.latitude),
        }
    }
}

/// A name match with the chain of regions leading to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Position of the match
    pub path: RegionPath,
    /// Level of the match
    pub level: Level,
    /// Entries from the province down to the match, inclusive
    pub lineage: Vec<RegionEntry>,
    /// Detail record of the match
    pub detail: RegionDetail,
}

/// A region without a coordinate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingCoordinate {
    /// Position of the region
    pub path: RegionPath,
    /// Level of the region
    pub level: Level,
    /// Names from the province down to the region, joined by `/`
    pub lineage: String,
    /// Administrative code
    pub code: String,
}

/// Read-only query operations over one index
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a> {
    index: &'a RegionIndex,
}

impl<'a> QueryEngine<'a> {
    /// Creates an engine over `index`
    pub fn new(index: &'a RegionIndex) -> Self {
        Self { index }
    }

    /// The underlying index
    pub fn index(&self) -> &'a RegionIndex {
        self.index
    }

    /// All provinces
    pub fn provinces(&self) -> Vec<RegionEntry> {
        entries(self.index.provinces())
    }

    /// Cities of a province
    pub fn cities(&self, province: i64) -> Result<Vec<RegionEntry>> {
        let p = self.province_position(province)?;
        Ok(entries(self.index.cities(p)?))
    }

    /// Counties of a city
    pub fn counties(&self, province: i64, city: i64) -> Result<Vec<RegionEntry>> {
        let p = self.province_position(province)?;
        let c = position(Level::City, city, self.index.cities(p)?.len())?;
        Ok(entries(self.index.counties(p, c)?))
    }

    /// Detail of the deepest specified level
    ///
    /// Pass [`ABSENT`] for `city` and/or `county` to stop at a shallower
    /// level.
    pub fn detail(&self, province: i64, city: i64, county: i64) -> Result<RegionDetail> {
        let p = self.province_position(province)?;

        let c = match city {
            ABSENT => None,
            raw => Some(position(Level::City, raw, self.index.cities(p)?.len())?),
        };

        let k = match (county, c) {
            (ABSENT, _) => None,
            (raw, Some(c)) => Some(position(
                Level::County,
                raw,
                self.index.counties(p, c)?.len(),
            )?),
            (raw, None) => {
                return Err(Error::MissingParent {
                    level: Level::County,
                    index: raw,
                })
            }
        };

        Ok(RegionDetail::from(self.index.detail(p, c, k)?))
    }

    /// Every region named exactly `name`, in tree order
    pub fn search(&self, name: &str) -> Vec<SearchHit> {
        self.index
            .iter()
            .filter(|(_, node)| node.name() == name)
            .filter_map(|(path, node)| {
                let lineage = self.index.lineage(path).ok()?;
                Some(SearchHit {
                    path,
                    level: node.level(),
                    lineage: lineage.into_iter().map(RegionEntry::from).collect(),
                    detail: RegionDetail::from(node),
                })
            })
            .collect()
    }

    /// Node counts and coordinate coverage
    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Every region lacking a coordinate, in tree order
    pub fn missing_coordinates(&self) -> Vec<MissingCoordinate> {
        self.index
            .missing_coordinates()
            .into_iter()
            .filter_map(|path| {
                let lineage = self.index.lineage(path).ok()?;
                let node = *lineage.last()?;
                Some(MissingCoordinate {
                    path,
                    level: node.level(),
                    lineage: lineage
                        .iter()
                        .map(|n| n.name())
                        .collect::<Vec<_>>()
                        .join("/"),
                    code: node.code().to_owned(),
                })
            })
            .collect()
    }

    fn province_position(&self, province: i64) -> Result<usize> {
        position(Level::Province, province, self.index.provinces().len())
    }
}

fn entries(nodes: &[RegionNode]) -> Vec<RegionEntry> {
    nodes.iter().map(RegionEntry::from).collect()
}

/// Validates a boundary index against the number of siblings
fn position(level: Level, raw: i64, len: usize) -> Result<usize> {
    usize::try_from(raw)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| Error::index_out_of_range(level, raw, len))
}
