//! Shared fixtures for unit tests.

use crate::codec::{decode, encode};
use crate::index::RegionIndex;
use crate::source::SourceRegion;

/// One province, one city, one county with a coordinate
pub(crate) fn beijing_regions() -> Vec<SourceRegion> {
    let county = SourceRegion::new("110101", "Dongcheng").with_center(116.41, 39.92);
    let city = SourceRegion::new("110100", "Beijing City").with_children(vec![county]);
    vec![SourceRegion::new("110000", "Beijing").with_children(vec![city])]
}

/// Two provinces with uneven fan-out and partial coordinates
///
/// ```text
/// 0 Beijing                 -
///   0 Beijing City          -
///     0 Dongcheng           116.41, 39.92
///     1 Xicheng             116.37, 39.91
/// 1 Guangdong               113.27, 23.13
///   0 Guangzhou             -            (no counties)
///   1 Shenzhen              -
///     0 Nanshan             113.93, 22.53
/// ```
pub(crate) fn sample_regions() -> Vec<SourceRegion> {
    vec![
        SourceRegion::new("110000", "Beijing").with_children(vec![SourceRegion::new(
            "110100",
            "Beijing City",
        )
        .with_children(vec![
            SourceRegion::new("110101", "Dongcheng").with_center(116.41, 39.92),
            SourceRegion::new("110102", "Xicheng").with_center(116.37, 39.91),
        ])]),
        SourceRegion::new("440000", "Guangdong")
            .with_center(113.27, 23.13)
            .with_children(vec![
                SourceRegion::new("440100", "Guangzhou"),
                SourceRegion::new("440300", "Shenzhen").with_children(vec![SourceRegion::new(
                    "440305", "Nanshan",
                )
                .with_center(113.93, 22.53)]),
            ]),
    ]
}

pub(crate) fn beijing_payload() -> Vec<u8> {
    encode(&beijing_regions()).expect("beijing fixture encodes")
}

pub(crate) fn sample_payload() -> Vec<u8> {
    encode(&sample_regions()).expect("sample fixture encodes")
}

pub(crate) fn sample_index() -> RegionIndex {
    decode(&sample_payload()).expect("sample fixture decodes")
}
