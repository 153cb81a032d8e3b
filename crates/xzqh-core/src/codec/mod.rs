//! Binary codec for region payloads.
//!
//! ## Layout (version 1)
//!
//! All integers are little-endian.
//!
//! ```text
//! header (20 bytes)
//!   magic       4   "XZQH"
//!   version     1   1
//!   code_width  1   digits per administrative code, 1..=12
//!   reserved    2   zero
//!   body_len    4   bytes following the header
//!   checksum    8   first 8 bytes of BLAKE3(body)
//! body
//!   varint province_count
//!   province_count x record
//! record
//!   varint name_len, name (UTF-8)
//!   code (code_width ASCII digits)
//!   i32 lng, i32 lat (degrees x 1e6, i32::MIN in both = absent)
//!   varint child_count, child records   (provinces and cities only)
//! ```
//!
//! Child tables follow their parent record immediately, so decoding is a
//! single forward pass. Any inconsistency aborts the whole decode; a
//! partially built index is never returned.

mod wire;
mod writer;

use crate::error::{Error, Result};
use crate::index::{Coordinate, Level, RegionIndex, RegionNode};
use tracing::{debug, trace};

pub use wire::{decode_varint, encode_varint, Reader, MAX_VARINT_LEN};
pub use writer::{encode, Encoder, EncoderConfig};

/// Marker at the start of every payload
pub const MAGIC: &[u8; 4] = b"XZQH";

/// Layout version written and accepted by this crate
pub const FORMAT_VERSION: u8 = 1;

/// Size of the fixed header
pub const HEADER_LEN: usize = 20;

/// Size of the truncated body checksum
pub const CHECKSUM_LEN: usize = 8;

/// Widest administrative code the layout allows
pub const MAX_CODE_WIDTH: u8 = 12;

/// Fixed-point scale for coordinates
pub const COORDINATE_SCALE: f64 = 1_000_000.0;

/// Value stored in both coordinate slots when a record has no coordinate
pub const ABSENT_COORDINATE: i32 = i32::MIN;

/// Default cap on a single name, in bytes
pub const DEFAULT_MAX_NAME_LEN: usize = 1024;

/// Default cap on the children of one parent
pub const DEFAULT_MAX_CHILDREN: usize = 100_000;

/// Parsed payload header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Layout version
    pub version: u8,
    /// Digits per administrative code
    pub code_width: u8,
    /// Length of the body in bytes
    pub body_len: u32,
    /// Truncated BLAKE3 digest of the body
    pub checksum: [u8; CHECKSUM_LEN],
}

impl Header {
    /// Parses and validates the fixed header at the start of `data`
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);

        let magic: [u8; 4] = reader.read_array("magic")?;
        if &magic != MAGIC {
            return Err(Error::InvalidMagic { found: magic });
        }

        let version = reader.read_u8("version")?;
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion { version });
        }

        let code_width = reader.read_u8("code width")?;
        if code_width == 0 || code_width > MAX_CODE_WIDTH {
            return Err(Error::invalid_header(format!(
                "code width {} outside 1..={}",
                code_width, MAX_CODE_WIDTH
            )));
        }

        let reserved = reader.read_u16("reserved")?;
        if reserved != 0 {
            return Err(Error::invalid_header(format!(
                "reserved field is {:#06x}, expected zero",
                reserved
            )));
        }

        let body_len = reader.read_u32("body length")?;
        let checksum = reader.read_array("checksum")?;

        Ok(Self {
            version,
            code_width,
            body_len,
            checksum,
        })
    }

    /// Appends the encoded header to `out`
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(MAGIC);
        out.push(self.version);
        out.push(self.code_width);
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&self.body_len.to_le_bytes());
        out.extend_from_slice(&self.checksum);
    }
}

/// Truncated BLAKE3 digest used in the header
pub fn checksum(body: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&blake3::hash(body).as_bytes()[..CHECKSUM_LEN]);
    out
}

/// Converts degrees to the stored fixed-point form
///
/// Returns `None` for non-finite input and for values that would not fit
/// or would collide with [`ABSENT_COORDINATE`].
pub fn to_fixed(degrees: f64) -> Option<i32> {
    let scaled = (degrees * COORDINATE_SCALE).round();
    if !scaled.is_finite() || scaled <= ABSENT_COORDINATE as f64 || scaled > i32::MAX as f64 {
        return None;
    }
    Some(scaled as i32)
}

/// Converts the stored fixed-point form to degrees
pub fn from_fixed(value: i32) -> f64 {
    value as f64 / COORDINATE_SCALE
}

/// Configuration for the decoder
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Longest accepted name, in bytes
    pub max_name_len: usize,
    /// Most children accepted under one parent (and most provinces)
    pub max_children: usize,
    /// Whether to check the body against the header checksum
    pub verify_checksum: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_name_len: DEFAULT_MAX_NAME_LEN,
            max_children: DEFAULT_MAX_CHILDREN,
            verify_checksum: true,
        }
    }
}

impl DecoderConfig {
    /// Creates a new decoder config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the longest accepted name
    pub fn max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    /// Sets the most children accepted under one parent
    pub fn max_children(mut self, count: usize) -> Self {
        self.max_children = count;
        self
    }

    /// Sets whether the checksum is verified
    pub fn verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }
}

/// Decodes payloads into a [`RegionIndex`]
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Creates a new decoder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new decoder with custom configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes a complete payload
    pub fn decode(&self, data: &[u8]) -> Result<RegionIndex> {
        let header = Header::parse(data)?;

        let body_len = header.body_len as usize;
        let available = data.len() - HEADER_LEN;
        if body_len > available {
            return Err(Error::LengthExceedsRemaining {
                offset: 8,
                field: "body length",
                len: body_len,
                remaining: available,
            });
        }
        if body_len < available {
            return Err(Error::TrailingBytes {
                count: available - body_len,
            });
        }

        let body = &data[HEADER_LEN..];
        if self.config.verify_checksum {
            let actual = checksum(body);
            if actual != header.checksum {
                return Err(Error::ChecksumMismatch {
                    expected: header.checksum,
                    actual,
                });
            }
        }

        let code_width = header.code_width as usize;
        let mut reader = Reader::with_base(body, HEADER_LEN);
        let count = reader.read_length(
            "province count",
            self.config.max_children,
            min_record_len(code_width, Level::Province),
        )?;

        let mut provinces = Vec::with_capacity(count);
        for i in 0..count {
            provinces.push(self.decode_record(&mut reader, Level::Province, i, code_width)?);
        }

        if !reader.is_empty() {
            return Err(Error::TrailingBytes {
                count: reader.remaining(),
            });
        }

        let index = RegionIndex::new(provinces, header.code_width);
        debug!(
            "Decoded {} bytes: {} provinces, code width {}",
            data.len(),
            index.provinces().len(),
            header.code_width
        );
        Ok(index)
    }

    fn decode_record(
        &self,
        reader: &mut Reader<'_>,
        level: Level,
        index: usize,
        code_width: usize,
    ) -> Result<RegionNode> {
        let start = reader.offset();

        let name_len = reader.read_length("name length", self.config.max_name_len, 1)?;
        let name_offset = reader.offset();
        let name = std::str::from_utf8(reader.read_bytes(name_len, "name")?)
            .map_err(|_| Error::invalid_record(name_offset, "name is not valid UTF-8"))?
            .to_owned();

        let code_offset = reader.offset();
        let code_bytes = reader.read_bytes(code_width, "code")?;
        if !code_bytes.iter().all(u8::is_ascii_digit) {
            return Err(Error::invalid_record(
                code_offset,
                format!(
                    "code {:?} is not numeric",
                    String::from_utf8_lossy(code_bytes)
                ),
            ));
        }
        let code: String = code_bytes.iter().map(|&b| b as char).collect();

        let center = read_center(reader)?;

        let children = match level.child() {
            Some(child_level) => {
                let count = reader.read_length(
                    "child count",
                    self.config.max_children,
                    min_record_len(code_width, child_level),
                )?;
                let mut children = Vec::with_capacity(count);
                for i in 0..count {
                    children.push(self.decode_record(reader, child_level, i, code_width)?);
                }
                children
            }
            None => Vec::new(),
        };

        trace!(
            "{} {} {} ({}) at offset {}, {} children",
            level,
            index,
            code,
            name,
            start,
            children.len()
        );

        Ok(RegionNode::new(name, code, index, level, center, children))
    }
}

/// Decodes a payload with the default configuration
pub fn decode(data: &[u8]) -> Result<RegionIndex> {
    Decoder::new().decode(data)
}

/// Smallest possible encoded record at `level`
fn min_record_len(code_width: usize, level: Level) -> usize {
    let child_count = if level.child().is_some() { 1 } else { 0 };
    1 + code_width + 8 + child_count
}

fn read_center(reader: &mut Reader<'_>) -> Result<Option<Coordinate>> {
    let offset = reader.offset();
    let lng = reader.read_i32("longitude")?;
    let lat = reader.read_i32("latitude")?;

    match (lng, lat) {
        (ABSENT_COORDINATE, ABSENT_COORDINATE) => Ok(None),
        (ABSENT_COORDINATE, _) | (_, ABSENT_COORDINATE) => Err(Error::invalid_record(
            offset,
            "coordinate pair has only one component",
        )),
        _ => {
            let center = Coordinate::new(from_fixed(lng), from_fixed(lat));
            if !center.is_valid() {
                return Err(Error::invalid_record(
                    offset,
                    format!(
                        "coordinate ({}, {}) out of range",
                        center.longitude, center.latitude
                    ),
                ));
            }
            Ok(Some(center))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceRegion;
    use crate::test_support::{beijing_payload, sample_payload};
    use pretty_assertions::assert_eq;

    /// Rewrites the checksum after a body edit
    fn reseal(payload: &mut [u8]) {
        let sum = checksum(&payload[HEADER_LEN..]);
        payload[12..HEADER_LEN].copy_from_slice(&sum);
    }

    #[test]
    fn test_decode_beijing() {
        let index = decode(&beijing_payload()).unwrap();
        assert_eq!(index.code_width(), 6);

        let province = &index.provinces()[0];
        assert_eq!(province.name(), "Beijing");
        assert_eq!(province.code(), "110000");
        assert_eq!(province.center(), None);

        let county = index.detail(0, Some(0), Some(0)).unwrap();
        assert_eq!(county.name(), "Dongcheng");
        assert_eq!(county.center(), Some(Coordinate::new(116.41, 39.92)));
    }

    #[test]
    fn test_header_layout() {
        let payload = beijing_payload();
        let header = Header::parse(&payload).unwrap();
        assert_eq!(header.version, FORMAT_VERSION);
        assert_eq!(header.body_len as usize, payload.len() - HEADER_LEN);

        let mut out = Vec::new();
        header.write(&mut out);
        assert_eq!(out, &payload[..HEADER_LEN]);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            decode(&[]),
            Err(Error::Truncated { offset: 0, context: "magic" })
        ));
    }

    #[test]
    fn test_invalid_magic() {
        let mut payload = beijing_payload();
        payload[0] = b'Z';
        assert!(matches!(decode(&payload), Err(Error::InvalidMagic { .. })));
    }

    #[test]
    fn test_unsupported_version() {
        let mut payload = beijing_payload();
        payload[4] = 2;
        assert!(matches!(
            decode(&payload),
            Err(Error::UnsupportedVersion { version: 2 })
        ));
    }

    #[test]
    fn test_invalid_header_fields() {
        let mut payload = beijing_payload();
        payload[5] = 0;
        assert!(matches!(decode(&payload), Err(Error::InvalidHeader { .. })));

        let mut payload = beijing_payload();
        payload[6] = 1;
        assert!(matches!(decode(&payload), Err(Error::InvalidHeader { .. })));
    }

    #[test]
    fn test_truncated_at_every_length() {
        let payload = sample_payload();
        for len in 0..payload.len() {
            let err = decode(&payload[..len]).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Format, "len {}", len);
        }
    }

    #[test]
    fn test_trailing_bytes() {
        let mut payload = beijing_payload();
        payload.push(0);
        assert!(matches!(
            decode(&payload),
            Err(Error::TrailingBytes { count: 1 })
        ));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut payload = beijing_payload();
        let last = payload.len() - 1;
        payload[last] ^= 0x01;
        assert!(matches!(
            decode(&payload),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_skip_checksum() {
        let mut payload = beijing_payload();
        payload[12] ^= 0xFF;
        let decoder = Decoder::with_config(DecoderConfig::new().verify_checksum(false));
        assert!(decoder.decode(&payload).is_ok());
    }

    #[test]
    fn test_count_exceeds_remaining() {
        let mut payload = beijing_payload();
        // Province count is the first body byte
        payload[HEADER_LEN] = 0x7F;
        reseal(&mut payload);
        assert!(matches!(
            decode(&payload),
            Err(Error::LengthExceedsRemaining {
                field: "province count",
                len: 127,
                ..
            })
        ));
    }

    #[test]
    fn test_name_exceeds_remaining() {
        let mut payload = beijing_payload();
        // Name length of the first province follows the count
        payload[HEADER_LEN + 1] = 0x7F;
        reseal(&mut payload);
        assert!(matches!(
            decode(&payload),
            Err(Error::LengthExceedsRemaining {
                field: "name length",
                ..
            })
        ));
    }

    #[test]
    fn test_name_limit() {
        let decoder = Decoder::with_config(DecoderConfig::new().max_name_len(4));
        assert!(matches!(
            decoder.decode(&beijing_payload()),
            Err(Error::LengthExceedsLimit { field: "name length", len: 7, max: 4, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_name() {
        let mut payload = beijing_payload();
        // First byte of "Beijing"
        payload[HEADER_LEN + 2] = 0xFF;
        reseal(&mut payload);
        assert!(matches!(decode(&payload), Err(Error::InvalidRecord { .. })));
    }

    #[test]
    fn test_non_numeric_code() {
        let mut payload = beijing_payload();
        // count(1) + name_len(1) + "Beijing"(7) puts the code here
        payload[HEADER_LEN + 9] = b'X';
        reseal(&mut payload);
        let err = decode(&payload).unwrap_err();
        assert!(err.to_string().contains("not numeric"), "{}", err);
    }

    #[test]
    fn test_half_absent_coordinate() {
        let mut payload = beijing_payload();
        // Longitude of the province follows its 6-digit code
        let lng = HEADER_LEN + 9 + 6;
        payload[lng..lng + 4].copy_from_slice(&0i32.to_le_bytes());
        reseal(&mut payload);
        let err = decode(&payload).unwrap_err();
        assert!(err.to_string().contains("only one component"), "{}", err);
    }

    #[test]
    fn test_origin_is_not_absent() {
        let regions = vec![SourceRegion::new("000000", "Null Island").with_center(0.0, 0.0)];
        let index = decode(&encode(&regions).unwrap()).unwrap();
        assert_eq!(
            index.provinces()[0].center(),
            Some(Coordinate::new(0.0, 0.0))
        );
    }

    #[test]
    fn test_fixed_point() {
        assert_eq!(to_fixed(116.41), Some(116_410_000));
        assert_eq!(from_fixed(116_410_000), 116.41);
        assert_eq!(to_fixed(-180.0), Some(-180_000_000));
    }

    #[test]
    fn test_fixed_point_rejects_unrepresentable() {
        assert_eq!(to_fixed(-2147.483648), None);
        assert_eq!(to_fixed(2147.483648), None);
        assert_eq!(to_fixed(f64::NAN), None);
        assert_eq!(to_fixed(f64::INFINITY), None);
        assert_eq!(to_fixed(-2147.483647), Some(i32::MIN + 1));
    }
}
