//! # xzqh-core
//!
//! Compact binary storage and hierarchical lookup of administrative
//! divisions (province → city → county).
//!
//! A payload is decoded once into an immutable [`RegionIndex`] and then
//! queried repeatedly without re-parsing. This crate provides:
//! - A versioned binary layout with an encoder and a single-pass decoder
//! - The three-level index with stable positional identifiers
//! - A stateless [`QueryEngine`] producing flat exchange records
//! - [`Instance`] handles that own the payload buffer and refuse queries
//!   after being destroyed
//!
//! ## Architecture
//!
//! - [`codec`]: Binary layout, decoding and encoding
//! - [`index`]: The decoded region tree
//! - [`query`]: Index validation and exchange records
//! - [`instance`]: Buffer ownership and lifecycle
//! - [`source`]: Source tree accepted by the encoder
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use xzqh_core::{encode, load, SourceRegion, ABSENT};
//!
//! let county = SourceRegion::new("110101", "Dongcheng").with_center(116.41, 39.92);
//! let city = SourceRegion::new("110100", "Beijing City").with_children(vec![county]);
//! let province = SourceRegion::new("110000", "Beijing").with_children(vec![city]);
//!
//! let payload = encode(&[province])?;
//! let mut instance = load(&payload)?;
//!
//! assert_eq!(instance.cities(0)?[0].code, "110100");
//! assert_eq!(instance.detail(0, 0, 0)?.lng, Some(116.41));
//! assert_eq!(instance.detail(0, ABSENT, ABSENT)?.lng, None);
//!
//! instance.destroy();
//! assert!(instance.provinces().is_err());
//! # Ok::<(), xzqh_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! The [`BufferAllocator`] trait decides where payload bytes live.
//! [`HeapAllocator`] and [`FallbackAllocator`] cover the common cases.
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod codec;
pub mod error;
pub mod index;
pub mod instance;
pub mod query;
pub mod source;

#[cfg(test)]
mod test_support;

// Re-export primary types for convenience
pub use codec::{decode, encode, Decoder, DecoderConfig, Encoder, EncoderConfig};
pub use error::{Error, ErrorKind, Result};
pub use index::{Coordinate, IndexStats, Level, RegionIndex, RegionNode, RegionPath};
pub use instance::{
    load, load_file, BufferAllocator, FallbackAllocator, HeapAllocator, Instance, LifecycleState,
    Loader, OwnedBuffer,
};
pub use query::{MissingCoordinate, QueryEngine, RegionDetail, RegionEntry, SearchHit, ABSENT};
pub use source::SourceRegion;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
