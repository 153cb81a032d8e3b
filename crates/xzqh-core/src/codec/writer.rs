//! Payload encoding.
//!
//! [`Encoder`] writes a [`SourceRegion`] tree in the version 1 layout. It
//! enforces the same rules the decoder checks, so anything it produces
//! decodes with the default [`DecoderConfig`](super::DecoderConfig).

use super::wire::encode_varint;
use super::{
    checksum, to_fixed, Header, ABSENT_COORDINATE, DEFAULT_MAX_CHILDREN, DEFAULT_MAX_NAME_LEN,
    FORMAT_VERSION, HEADER_LEN, MAX_CODE_WIDTH,
};
use crate::error::{Error, Result};
use crate::index::Level;
use crate::source::SourceRegion;
use tracing::debug;

/// Code width used when neither the config nor the data decides one
const FALLBACK_CODE_WIDTH: u8 = 6;

/// Configuration for the encoder
#[derive(Debug, Clone, Default)]
pub struct EncoderConfig {
    /// Fixed code width; inferred from the first region when unset
    pub code_width: Option<u8>,
}

impl EncoderConfig {
    /// Creates a new encoder config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the code width
    pub fn code_width(mut self, width: u8) -> Self {
        self.code_width = Some(width);
        self
    }
}

/// Encodes source trees into payloads
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    config: EncoderConfig,
}

impl Encoder {
    /// Creates a new encoder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new encoder with custom configuration
    pub fn with_config(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Encodes a list of provinces
    pub fn encode(&self, provinces: &[SourceRegion]) -> Result<Vec<u8>> {
        let code_width = self.code_width(provinces)?;

        let mut body = Vec::new();
        write_count(provinces.len(), "", &mut body)?;
        for province in provinces {
            write_record(province, Level::Province, code_width, &mut body)?;
        }

        let body_len = u32::try_from(body.len())
            .map_err(|_| Error::encode("", format!("body of {} bytes exceeds 4 GiB", body.len())))?;
        let header = Header {
            version: FORMAT_VERSION,
            code_width,
            body_len,
            checksum: checksum(&body),
        };

        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        header.write(&mut out);
        out.extend_from_slice(&body);

        debug!(
            "Encoded {} provinces into {} bytes (code width {})",
            provinces.len(),
            out.len(),
            code_width
        );
        Ok(out)
    }

    fn code_width(&self, provinces: &[SourceRegion]) -> Result<u8> {
        let width = match (self.config.code_width, provinces.first()) {
            (Some(width), _) => width,
            (None, Some(first)) => u8::try_from(first.code.len()).unwrap_or(u8::MAX),
            (None, None) => FALLBACK_CODE_WIDTH,
        };

        if width == 0 || width > MAX_CODE_WIDTH {
            let code = provinces.first().map(|p| p.code.as_str()).unwrap_or("");
            return Err(Error::encode(
                code,
                format!("code width {} outside 1..={}", width, MAX_CODE_WIDTH),
            ));
        }
        Ok(width)
    }
}

/// Encodes a list of provinces with the default configuration
pub fn encode(provinces: &[SourceRegion]) -> Result<Vec<u8>> {
    Encoder::new().encode(provinces)
}

fn write_count(count: usize, code: &str, out: &mut Vec<u8>) -> Result<()> {
    if count > DEFAULT_MAX_CHILDREN {
        return Err(Error::encode(
            code,
            format!("{} children exceed the limit of {}", count, DEFAULT_MAX_CHILDREN),
        ));
    }
    encode_varint(count as u64, out);
    Ok(())
}

fn write_record(region: &SourceRegion, level: Level, code_width: u8, out: &mut Vec<u8>) -> Result<()> {
    let code = region.code.as_str();

    if code.len() != code_width as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::encode(
            code,
            format!("code must be exactly {} ASCII digits", code_width),
        ));
    }
    if region.name.len() > DEFAULT_MAX_NAME_LEN {
        return Err(Error::encode(
            code,
            format!("name of {} bytes exceeds {}", region.name.len(), DEFAULT_MAX_NAME_LEN),
        ));
    }

    encode_varint(region.name.len() as u64, out);
    out.extend_from_slice(region.name.as_bytes());
    out.extend_from_slice(code.as_bytes());

    let (lng, lat) = match region.center {
        None => (ABSENT_COORDINATE, ABSENT_COORDINATE),
        Some(center) => match (
            center.is_valid(),
            to_fixed(center.longitude),
            to_fixed(center.latitude),
        ) {
            (true, Some(lng), Some(lat)) => (lng, lat),
            _ => {
                return Err(Error::encode(
                    code,
                    format!(
                        "coordinate ({}, {}) out of range",
                        center.longitude, center.latitude
                    ),
                ))
            }
        },
    };
    out.extend_from_slice(&lng.to_le_bytes());
    out.extend_from_slice(&lat.to_le_bytes());

    match level.child() {
        Some(child_level) => {
            write_count(region.children.len(), code, out)?;
            for child in &region.children {
                write_record(child, child_level, code_width, out)?;
            }
        }
        None if !region.children.is_empty() => {
            return Err(Error::encode(
                code,
                "regions below county level are not supported",
            ));
        }
        None => {}
    }

    Ok(())
}
