//! Low-level wire primitives for the region payload.
//!
//! The payload uses three field encodings:
//! - LEB128 varints for counts and name lengths (at most 10 bytes)
//! - little-endian fixed-width integers for header fields and coordinates
//! - raw byte runs for names and codes
//!
//! [`Reader`] wraps a byte slice and tracks the absolute offset so every
//! error can point at the byte where decoding went wrong.

use crate::error::{Error, Result};

/// Maximum encoded length of a 64-bit varint
pub const MAX_VARINT_LEN: usize = 10;

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(Error::varint_decode(i));
        }

        let value = (byte & 0x7F) as u64;
        if shift == 63 && value > 1 {
            return Err(Error::varint_decode(i));
        }
        result |= value << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(Error::varint_decode(data.len()))
}

/// Append a varint encoding of `value` to `out`.
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Bounds-checked cursor over a payload.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader whose offsets start at zero
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    /// Creates a reader whose reported offsets start at `base`
    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Absolute offset of the next byte
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads exactly `n` bytes
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::truncated(self.offset(), context));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads a fixed-size array
    pub fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, context)?);
        Ok(out)
    }

    /// Reads a single byte
    pub fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        Ok(self.read_array::<1>(context)?[0])
    }

    /// Reads a little-endian u16
    pub fn read_u16(&mut self, context: &'static str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian u32
    pub fn read_u32(&mut self, context: &'static str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian i32
    pub fn read_i32(&mut self, context: &'static str) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a varint
    pub fn read_varint(&mut self) -> Result<u64> {
        let start = self.offset();
        let (value, len) = decode_varint(&self.data[self.pos..]).map_err(|e| match e {
            Error::VarintDecode { offset } => Error::varint_decode(start + offset),
            other => other,
        })?;
        self.pos += len;
        Ok(value)
    }

    /// Reads a varint length and checks it against a limit and the bytes
    /// left, assuming each counted unit occupies at least `unit_len` bytes.
    pub fn read_length(&mut self, field: &'static str, max: usize, unit_len: usize) -> Result<usize> {
        let offset = self.offset();
        let raw = self.read_varint()?;
        let len = usize::try_from(raw).unwrap_or(usize::MAX);

        if len > max {
            return Err(Error::LengthExceedsLimit {
                offset,
                field,
                len,
                max,
            });
        }

        let remaining = self.remaining();
        if len.saturating_mul(unit_len.max(1)) > remaining {
            return Err(Error::LengthExceedsRemaining {
                offset,
                field,
                len,
                remaining,
            });
        }

        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_varint_single_byte() {
        let data = [0x08];
        let (value, len) = decode_varint(&data).unwrap();
        assert_eq!(value, 8);
        assert_eq!(len, 1);
    }

    #[test]
    fn test_decode_varint_multi_byte() {
        let data = [0xAC, 0x02]; // Value 300
        let (value, len) = decode_varint(&data).unwrap();
        assert_eq!(value, 300);
        assert_eq!(len, 2);
    }

    #[test]
    fn test_decode_varint_max() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let (value, len) = decode_varint(&data).unwrap();
        assert_eq!(value, u64::MAX);
        assert_eq!(len, 10);
    }

    #[test]
    fn test_decode_varint_overflow() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02];
        assert!(decode_varint(&data).is_err());

        let too_long = [0x80; 11];
        assert!(decode_varint(&too_long).is_err());
    }

    #[test]
    fn test_decode_varint_unterminated() {
        let data = [0x80, 0x80];
        assert!(matches!(
            decode_varint(&data),
            Err(Error::VarintDecode { offset: 2 })
        ));
    }

    #[test]
    fn test_encode_varint() {
        let mut out = Vec::new();
        encode_varint(300, &mut out);
        assert_eq!(out, [0xAC, 0x02]);

        out.clear();
        encode_varint(u64::MAX, &mut out);
        assert_eq!(decode_varint(&out).unwrap(), (u64::MAX, 10));
    }

    #[test]
    fn test_reader_fixed_width() {
        let data = [0x01, 0x02, 0x00, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.read_u8("a").unwrap(), 1);
        assert_eq!(reader.read_u16("b").unwrap(), 2);
        assert_eq!(reader.read_i32("c").unwrap(), -1);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_reader_truncated_reports_offset() {
        let data = [0x00, 0x01];
        let mut reader = Reader::with_base(&data, 20);
        reader.read_u8("first").unwrap();
        assert!(matches!(
            reader.read_u32("coordinate"),
            Err(Error::Truncated {
                offset: 21,
                context: "coordinate"
            })
        ));
    }

    #[test]
    fn test_read_length_bounds() {
        // Declares 5 units of at least 2 bytes each with 3 bytes left
        let data = [0x05, 0x00, 0x00, 0x00];
        let mut reader = Reader::new(&data);
        assert!(matches!(
            reader.read_length("children", 100, 2),
            Err(Error::LengthExceedsRemaining { len: 5, remaining: 3, .. })
        ));

        let mut reader = Reader::new(&data);
        assert!(matches!(
            reader.read_length("children", 4, 0),
            Err(Error::LengthExceedsLimit { len: 5, max: 4, .. })
        ));
    }
}
