//! Owned payload buffers and the capability that allocates them.
//!
//! An [`OwnedBuffer`] is not `Clone` and only accepts bytes nothing else
//! references: owned vectors, or a [`Bytes`] handle that is the sole
//! reference to its storage. One buffer belongs to one instance.
//! Dropping it releases the bytes and fires its release hook, which
//! happens exactly once because `Drop` runs exactly once.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::fmt;
use tracing::{debug, trace};

/// Callback run when a buffer is released, with its length
pub type ReleaseHook = Box<dyn FnOnce(usize) + Send + Sync>;

/// Immutable payload bytes with exclusive ownership
pub struct OwnedBuffer {
    bytes: Bytes,
    on_release: Option<ReleaseHook>,
}

impl OwnedBuffer {
    /// Takes ownership of `bytes` without copying
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_unique(Bytes::from(bytes.into()))
    }

    fn from_unique(bytes: Bytes) -> Self {
        Self {
            bytes,
            on_release: None,
        }
    }

    /// Attaches a callback that runs when the buffer is released
    pub fn with_release_hook(mut self, hook: impl FnOnce(usize) + Send + Sync + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// The payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for OwnedBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<Box<[u8]>> for OwnedBuffer {
    fn from(bytes: Box<[u8]>) -> Self {
        Self::new(bytes)
    }
}

/// Adopts a [`Bytes`] handle only if no other handle shares its storage
impl TryFrom<Bytes> for OwnedBuffer {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self> {
        let len = bytes.len();
        bytes
            .try_into_mut()
            .map(|unique| Self::from_unique(unique.freeze()))
            .map_err(|_| Error::allocation(len, "bytes are shared with another handle"))
    }
}

impl fmt::Debug for OwnedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedBuffer")
            .field("len", &self.bytes.len())
            .field("release_hook", &self.on_release.is_some())
            .finish()
    }
}

impl Drop for OwnedBuffer {
    fn drop(&mut self) {
        trace!("Releasing {} byte buffer", self.bytes.len());
        if let Some(hook) = self.on_release.take() {
            hook(self.bytes.len());
        }
    }
}

/// Capability for obtaining payload buffers
///
/// Injected into a [`Loader`](super::Loader) so loading never depends on
/// ambient state.
pub trait BufferAllocator: Send + Sync {
    /// Copies `bytes` into a new buffer
    fn allocate(&self, bytes: &[u8]) -> Result<OwnedBuffer>;

    /// Takes ownership of already-populated bytes
    ///
    /// The default implementation copies through [`allocate`](Self::allocate).
    fn adopt(&self, bytes: Vec<u8>) -> Result<OwnedBuffer> {
        self.allocate(&bytes)
    }

    /// Short name used in logs
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Allocates on the global heap, with an optional size limit
#[derive(Debug, Clone, Default)]
pub struct HeapAllocator {
    limit: Option<usize>,
}

impl HeapAllocator {
    /// Creates an allocator without a size limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator that rejects buffers above `max_bytes`
    pub fn with_limit(max_bytes: usize) -> Self {
        Self {
            limit: Some(max_bytes),
        }
    }

    fn check(&self, len: usize) -> Result<()> {
        match self.limit {
            Some(limit) if len > limit => Err(Error::allocation(
                len,
                format!("exceeds the limit of {} bytes", limit),
            )),
            _ => Ok(()),
        }
    }
}

impl BufferAllocator for HeapAllocator {
    fn allocate(&self, bytes: &[u8]) -> Result<OwnedBuffer> {
        self.check(bytes.len())?;

        let mut data = Vec::new();
        data.try_reserve_exact(bytes.len())
            .map_err(|e| Error::allocation(bytes.len(), e.to_string()))?;
        data.extend_from_slice(bytes);

        Ok(OwnedBuffer::from(data))
    }

    fn adopt(&self, bytes: Vec<u8>) -> Result<OwnedBuffer> {
        self.check(bytes.len())?;
        Ok(OwnedBuffer::from(bytes))
    }

    fn name(&self) -> &'static str {
        "heap"
    }
}

/// Tries a list of allocators in order; the first success wins
#[derive(Default)]
pub struct FallbackAllocator {
    chain: Vec<Box<dyn BufferAllocator>>,
}

impl FallbackAllocator {
    /// Creates an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an allocator to the end of the chain
    pub fn then(mut self, allocator: impl BufferAllocator + 'static) -> Self {
        self.chain.push(Box::new(allocator));
        self
    }

    /// Number of allocators in the chain
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Returns true if the chain is empty
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl fmt::Debug for FallbackAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.chain.iter().map(|a| a.name()))
            .finish()
    }
}

impl BufferAllocator for FallbackAllocator {
    fn allocate(&self, bytes: &[u8]) -> Result<OwnedBuffer> {
        let mut last_error = None;

        for allocator in &self.chain {
            match allocator.allocate(bytes) {
                Ok(buffer) => {
                    debug!("Allocated {} bytes with {}", bytes.len(), allocator.name());
                    return Ok(buffer);
                }
                Err(e) => {
                    debug!("Allocator {} failed: {}", allocator.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::allocation(bytes.len(), "no allocator configured")))
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_release_hook_runs_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);

        let buffer = OwnedBuffer::new(vec![1, 2, 3]).with_release_hook(move |len| {
            counter.fetch_add(len, Ordering::SeqCst);
        });
        assert_eq!(buffer.as_bytes(), &[1, 2, 3]);
        drop(buffer);

        assert_eq!(released.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_shared_bytes_rejected() {
        let shared = Bytes::from(vec![7u8; 32]);
        let alias = shared.clone();

        let err = OwnedBuffer::try_from(alias).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Memory);

        // The rejected alias is gone, so the remaining handle is unique
        let buffer = OwnedBuffer::try_from(shared).unwrap();
        assert_eq!(buffer.len(), 32);
    }

    #[test]
    fn test_static_bytes_rejected() {
        assert!(OwnedBuffer::try_from(Bytes::from_static(b"XZQH")).is_err());
    }

    #[test]
    fn test_heap_allocator_copies() {
        let source = vec![9u8; 16];
        let buffer = HeapAllocator::new().allocate(&source).unwrap();
        assert_eq!(buffer.as_bytes(), source.as_slice());
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn test_heap_allocator_limit() {
        let allocator = HeapAllocator::with_limit(4);
        let err = allocator.allocate(&[0; 5]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Memory);
        assert!(allocator.adopt(vec![0; 5]).is_err());
        assert!(allocator.adopt(vec![0; 4]).is_ok());
    }

    #[test]
    fn test_fallback_order() {
        let allocator = FallbackAllocator::new()
            .then(HeapAllocator::with_limit(2))
            .then(HeapAllocator::new());
        assert_eq!(allocator.len(), 2);
        assert_eq!(allocator.allocate(&[1, 2, 3]).unwrap().len(), 3);

        let strict = FallbackAllocator::new().then(HeapAllocator::with_limit(2));
        let err = strict.allocate(&[1, 2, 3]).unwrap_err();
        assert!(err.to_string().contains("limit of 2"), "{}", err);
    }

    #[test]
    fn test_empty_fallback() {
        let err = FallbackAllocator::new().allocate(&[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Memory);
    }
}
