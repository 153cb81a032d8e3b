//! Error types for the xzqh-core library.
//!
//! Every failure is a variant of [`Error`]. Variants fall into the broad
//! categories reported by [`Error::kind`]: construction-time failures
//! (format, memory) are fatal to loading, query-time failures (index,
//! use-after-free) only affect the call that produced them.

use crate::index::Level;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for xzqh operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or truncated binary payload
    Format,
    /// Buffer allocation or copy failed
    Memory,
    /// Caller supplied an invalid or inconsistent index
    Index,
    /// Query issued against a destroyed instance
    UseAfterFree,
    /// Filesystem failure
    Io,
    /// Source data could not be encoded
    Encode,
}

impl ErrorKind {
    /// Returns the stable name of this category
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Format => "FormatError",
            ErrorKind::Memory => "MemoryError",
            ErrorKind::Index => "IndexError",
            ErrorKind::UseAfterFree => "UseAfterFreeError",
            ErrorKind::Io => "IoError",
            ErrorKind::Encode => "EncodeError",
        }
    }
}

/// Comprehensive error type for all xzqh operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Payload does not start with the expected marker
    #[error("invalid magic bytes: expected XZQH, found {found:?}")]
    InvalidMagic {
        /// The bytes found where the magic was expected
        found: [u8; 4],
    },

    /// Payload declares a layout version this crate cannot read
    #[error("unsupported payload version: {version}")]
    UnsupportedVersion {
        /// The declared version
        version: u8,
    },

    /// Header field holds a value outside its allowed range
    #[error("invalid header: {details}")]
    InvalidHeader {
        /// What is wrong with the header
        details: String,
    },

    /// Input ended in the middle of a field
    #[error("unexpected end of input at offset {offset} while reading {context}")]
    Truncated {
        /// Byte offset where the read started
        offset: usize,
        /// What was being read
        context: &'static str,
    },

    /// A declared length or count cannot fit in the bytes that remain
    #[error("{field} at offset {offset} declares {len} but only {remaining} bytes remain")]
    LengthExceedsRemaining {
        /// Byte offset of the length prefix
        offset: usize,
        /// Which length was declared
        field: &'static str,
        /// The declared value
        len: usize,
        /// Bytes left in the input
        remaining: usize,
    },

    /// A declared length or count is above the configured limit
    #[error("{field} at offset {offset} is {len}, above the limit of {max}")]
    LengthExceedsLimit {
        /// Byte offset of the length prefix
        offset: usize,
        /// Which length was declared
        field: &'static str,
        /// The declared value
        len: usize,
        /// The configured maximum
        max: usize,
    },

    /// Failed to decode a varint
    #[error("failed to decode varint at offset {offset}: buffer too small or invalid encoding")]
    VarintDecode {
        /// Byte offset where the error occurred
        offset: usize,
    },

    /// Body checksum does not match the header
    #[error("checksum mismatch: header says {expected:02x?}, body hashes to {actual:02x?}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: [u8; 8],
        /// Checksum computed over the body
        actual: [u8; 8],
    },

    /// A record holds a value that violates the layout rules
    #[error("invalid record at offset {offset}: {details}")]
    InvalidRecord {
        /// Byte offset of the offending field
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Bytes follow the declared end of the body
    #[error("{count} unexpected trailing bytes after body")]
    TrailingBytes {
        /// Number of extra bytes
        count: usize,
    },

    /// Buffer could not be allocated or populated
    #[error("failed to allocate {requested} bytes: {details}")]
    Allocation {
        /// Number of bytes requested
        requested: usize,
        /// Why the allocation failed
        details: String,
    },

    /// Index is outside the valid range for its level
    #[error("{level} index {index} out of range (count: {len})")]
    IndexOutOfRange {
        /// Level the index addresses
        level: Level,
        /// The supplied index
        index: i64,
        /// Number of nodes at that position
        len: usize,
    },

    /// A deeper index was supplied without its parent
    #[error("{level} index {index} supplied without a parent index")]
    MissingParent {
        /// Level of the orphaned index
        level: Level,
        /// The supplied index
        index: i64,
    },

    /// Query issued after the instance was destroyed
    #[error("{operation} called on a destroyed instance")]
    UseAfterFree {
        /// Name of the rejected operation
        operation: &'static str,
    },

    /// Source data cannot be represented in the binary layout
    #[error("cannot encode region '{code}': {details}")]
    Encode {
        /// Code of the offending region
        code: String,
        /// Detailed description of the issue
        details: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new header error
    pub fn invalid_header(details: impl Into<String>) -> Self {
        Self::InvalidHeader {
            details: details.into(),
        }
    }

    /// Creates a new truncation error
    pub fn truncated(offset: usize, context: &'static str) -> Self {
        Self::Truncated { offset, context }
    }

    /// Creates a new varint decode error
    pub fn varint_decode(offset: usize) -> Self {
        Self::VarintDecode { offset }
    }

    /// Creates a new record error
    pub fn invalid_record(offset: usize, details: impl Into<String>) -> Self {
        Self::InvalidRecord {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new allocation error
    pub fn allocation(requested: usize, details: impl Into<String>) -> Self {
        Self::Allocation {
            requested,
            details: details.into(),
        }
    }

    /// Creates a new out-of-range index error
    pub fn index_out_of_range(level: Level, index: i64, len: usize) -> Self {
        Self::IndexOutOfRange { level, index, len }
    }

    /// Creates a new use-after-free error
    pub fn use_after_free(operation: &'static str) -> Self {
        Self::UseAfterFree { operation }
    }

    /// Creates a new encode error
    pub fn encode(code: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Encode {
            code: code.into(),
            details: details.into(),
        }
    }

    /// Returns the category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileRead { .. } => ErrorKind::Io,
            Self::Allocation { .. } => ErrorKind::Memory,
            Self::IndexOutOfRange { .. } | Self::MissingParent { .. } => ErrorKind::Index,
            Self::UseAfterFree { .. } => ErrorKind::UseAfterFree,
            Self::Encode { .. } => ErrorKind::Encode,
            Self::InvalidMagic { .. }
            | Self::UnsupportedVersion { .. }
            | Self::InvalidHeader { .. }
            | Self::Truncated { .. }
            | Self::LengthExceedsRemaining { .. }
            | Self::LengthExceedsLimit { .. }
            | Self::VarintDecode { .. }
            | Self::ChecksumMismatch { .. }
            | Self::InvalidRecord { .. }
            | Self::TrailingBytes { .. } => ErrorKind::Format,
        }
    }

    /// Returns true if the instance stays usable after this error
    ///
    /// Query-time failures are reported per call; construction-time
    /// failures mean the dataset could not be loaded at all.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Index | ErrorKind::UseAfterFree)
    }
}

/// Converts a position into the signed form used in index errors
pub(crate) fn signed(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
