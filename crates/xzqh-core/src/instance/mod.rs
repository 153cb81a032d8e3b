//! Instance handles: one owned buffer plus the index decoded from it.
//!
//! ## Lifecycle
//!
//! ```text
//! Loader::load* ──ok──▶ Loaded ──destroy()──▶ Destroyed ──destroy()──▶ Destroyed
//!        │
//!        └──err──▶ buffer released, no instance
//! ```
//!
//! There is no observable uninitialized state: construction either
//! decodes the whole payload or fails and releases the buffer. Once
//! destroyed, every query returns [`Error::UseAfterFree`] without touching
//! the released buffer.

mod buffer;

use crate::codec::{Decoder, DecoderConfig};
use crate::error::{Error, Result};
use crate::index::{IndexStats, RegionIndex};
use crate::query::{MissingCoordinate, QueryEngine, RegionDetail, RegionEntry, SearchHit};
use std::fmt;
use std::path::Path;
use tracing::{debug, trace};

pub use buffer::{BufferAllocator, FallbackAllocator, HeapAllocator, OwnedBuffer, ReleaseHook};

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Buffer and index are live; queries are permitted
    Loaded,
    /// Buffer released; queries fail
    Destroyed,
}

enum State {
    Loaded {
        buffer: OwnedBuffer,
        index: RegionIndex,
    },
    Destroyed,
}

/// Owns one payload buffer and its decoded index
pub struct Instance {
    state: State,
}

impl Instance {
    /// Takes ownership of `buffer` and decodes it
    ///
    /// On failure the buffer is released before the error is returned.
    pub fn construct(buffer: OwnedBuffer, decoder: &Decoder) -> Result<Self> {
        match decoder.decode(buffer.as_bytes()) {
            Ok(index) => {
                debug!(
                    "Instance loaded: {} bytes, {} provinces",
                    buffer.len(),
                    index.provinces().len()
                );
                Ok(Self {
                    state: State::Loaded { buffer, index },
                })
            }
            Err(e) => {
                debug!("Decode failed, releasing {} byte buffer: {}", buffer.len(), e);
                drop(buffer);
                Err(e)
            }
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        match self.state {
            State::Loaded { .. } => LifecycleState::Loaded,
            State::Destroyed => LifecycleState::Destroyed,
        }
    }

    /// Returns true once [`destroy`](Self::destroy) has run
    pub fn is_destroyed(&self) -> bool {
        self.state() == LifecycleState::Destroyed
    }

    /// Query engine over the live index
    pub fn engine(&self) -> Result<QueryEngine<'_>> {
        self.live("engine")
    }

    /// The live index
    pub fn index(&self) -> Result<&RegionIndex> {
        Ok(self.live("index")?.index())
    }

    /// Length of the owned buffer
    pub fn buffer_len(&self) -> Result<usize> {
        match &self.state {
            State::Loaded { buffer, .. } => Ok(buffer.len()),
            State::Destroyed => Err(Error::use_after_free("buffer_len")),
        }
    }

    /// All provinces
    pub fn provinces(&self) -> Result<Vec<RegionEntry>> {
        Ok(self.live("provinces")?.provinces())
    }

    /// Cities of a province
    pub fn cities(&self, province: i64) -> Result<Vec<RegionEntry>> {
        self.live("cities")?.cities(province)
    }

    /// Counties of a city
    pub fn counties(&self, province: i64, city: i64) -> Result<Vec<RegionEntry>> {
        self.live("counties")?.counties(province, city)
    }

    /// Detail of the deepest specified level; see [`QueryEngine::detail`]
    pub fn detail(&self, province: i64, city: i64, county: i64) -> Result<RegionDetail> {
        self.live("detail")?.detail(province, city, county)
    }

    /// Regions named exactly `name`
    pub fn search(&self, name: &str) -> Result<Vec<SearchHit>> {
        Ok(self.live("search")?.search(name))
    }

    /// Node counts and coordinate coverage
    pub fn stats(&self) -> Result<IndexStats> {
        Ok(self.live("stats")?.stats())
    }

    /// Regions lacking a coordinate
    pub fn missing_coordinates(&self) -> Result<Vec<MissingCoordinate>> {
        Ok(self.live("missing_coordinates")?.missing_coordinates())
    }

    /// Releases the buffer and index
    ///
    /// Calling this again is a no-op.
    pub fn destroy(&mut self) {
        match std::mem::replace(&mut self.state, State::Destroyed) {
            State::Loaded { buffer, index } => {
                debug!(
                    "Destroying instance: {} bytes, {} provinces",
                    buffer.len(),
                    index.provinces().len()
                );
                drop(index);
                drop(buffer);
            }
            State::Destroyed => trace!("Instance already destroyed"),
        }
    }

    fn live(&self, operation: &'static str) -> Result<QueryEngine<'_>> {
        match &self.state {
            State::Loaded { index, .. } => Ok(QueryEngine::new(index)),
            State::Destroyed => Err(Error::use_after_free(operation)),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Instance");
        s.field("state", &self.state());
        if let State::Loaded { buffer, index } = &self.state {
            s.field("buffer", buffer)
                .field("provinces", &index.provinces().len());
        }
        s.finish()
    }
}

/// Builds instances with an injected buffer capability
pub struct Loader {
    allocator: Box<dyn BufferAllocator>,
    decoder: Decoder,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    /// Creates a loader that copies onto the heap
    pub fn new() -> Self {
        Self::with_allocator(HeapAllocator::new())
    }

    /// Creates a loader with a custom allocator
    pub fn with_allocator(allocator: impl BufferAllocator + 'static) -> Self {
        Self {
            allocator: Box::new(allocator),
            decoder: Decoder::new(),
        }
    }

    /// Sets the decoder configuration
    pub fn decoder_config(mut self, config: DecoderConfig) -> Self {
        self.decoder = Decoder::with_config(config);
        self
    }

    /// Copies `bytes` into a new buffer and constructs an instance
    pub fn load(&self, bytes: &[u8]) -> Result<Instance> {
        let buffer = self.allocator.allocate(bytes)?;
        Instance::construct(buffer, &self.decoder)
    }

    /// Constructs an instance from an already-populated buffer
    pub fn load_owned(&self, buffer: OwnedBuffer) -> Result<Instance> {
        Instance::construct(buffer, &self.decoder)
    }

    /// Reads a payload file and constructs an instance
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Instance> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
        trace!("Read {} bytes from {}", data.len(), path.display());
        let buffer = self.allocator.adopt(data)?;
        Instance::construct(buffer, &self.decoder)
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("allocator", &self.allocator.name())
            .field("decoder", &self.decoder)
            .finish()
    }
}

/// Loads a payload with the default loader
pub fn load(bytes: &[u8]) -> Result<Instance> {
    Loader::new().load(bytes)
}

/// Loads a payload file with the default loader
pub fn load_file(path: impl AsRef<Path>) -> Result<Instance> {
    Loader::new().load_file(path)
}
