//! Frozen and mutable memory regions.
//!
//! A `MutableMemoryRegion` is an exclusively owned, writable buffer handed
//! out by a `MappedSerializer`. Freezing it produces a `FrozenMemoryRegion`:
//! an immutable `(handle, pointer, length)` view that can be cloned, sliced
//! with `range` and shared across threads without copying bytes.
//!
//! ```text
//! allocate_writable ──► MutableMemoryRegion ──freeze()──► FrozenMemoryRegion
//!                         (single writer)                   │  range(a, b)
//!                                                           ▼
//!                                                     FrozenMemoryRegion
//!                                                     (same handle)
//! ```

pub mod handle;
pub mod typed;

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;
use std::sync::Arc;

use crate::error::{BlockError, Result};
use crate::serializer::MappedSerializer;

pub use handle::OwnershipHandle;
pub use typed::{FrozenMemoryRegionT, MutableMemoryRegionT, PlainData};

// ── FrozenMemoryRegion ─────────────────────────────────────────────

/// Immutable, shareable view over a byte range.
///
/// The bytes stay valid for as long as this view or any clone or sub-range
/// of it is alive; they are never written through any view after freezing.
#[derive(Clone)]
pub struct FrozenMemoryRegion {
    handle: Option<OwnershipHandle>,
    data: NonNull<u8>,
    length: usize,
}

// Safety: the pointed-to bytes are immutable for the lifetime of the view
// and kept alive by `handle`, whose reference count is atomic.
unsafe impl Send for FrozenMemoryRegion {}
unsafe impl Sync for FrozenMemoryRegion {}

impl FrozenMemoryRegion {
    /// Build a view from raw parts.
    ///
    /// # Safety
    ///
    /// `data` must be valid for reads of `length` bytes for as long as
    /// `handle` (or any clone of it) is alive, and those bytes must not be
    /// mutated through any other pointer from now on.
    pub unsafe fn from_raw_parts(handle: OwnershipHandle, data: *const u8, length: usize) -> Self {
        Self {
            handle: Some(handle),
            data: NonNull::new(data as *mut u8).unwrap_or(NonNull::dangling()),
            length,
        }
    }

    /// The empty region. It has no backing handle.
    pub fn empty() -> Self {
        Self {
            handle: None,
            data: NonNull::dangling(),
            length: 0,
        }
    }

    /// Take ownership of a byte vector without copying it.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let handle = OwnershipHandle::new(bytes);
        // The pointer is taken from the owner only after it reached its final
        // place behind the handle.
        let (data, length) = match handle.downcast_ref::<Vec<u8>>() {
            Some(owned) => (owned.as_ptr(), owned.len()),
            None => return Self::empty(),
        };
        unsafe { Self::from_raw_parts(handle, data, length) }
    }

    /// View over static bytes. No release action is needed.
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self {
            handle: None,
            data: NonNull::new(bytes.as_ptr() as *mut u8).unwrap_or(NonNull::dangling()),
            length: bytes.len(),
        }
    }

    /// The region's bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.data.as_ptr(), self.length) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Address of the first byte.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// Handle keeping the bytes alive (`None` for empty and static regions).
    pub fn handle(&self) -> Option<&OwnershipHandle> {
        self.handle.as_ref()
    }

    /// Zero-copy sub-view over `[start, end)`.
    ///
    /// Requires `start <= end <= len()`. The result shares this region's
    /// handle and outlives it if needed.
    pub fn range(&self, start: usize, end: usize) -> Result<FrozenMemoryRegion> {
        if start > end || end > self.length {
            return Err(BlockError::invalid_argument(format!(
                "range [{}, {}) out of bounds for region of {} bytes",
                start, end, self.length
            )));
        }
        Ok(Self {
            handle: self.handle.clone(),
            data: unsafe { NonNull::new_unchecked(self.data.as_ptr().add(start)) },
            length: end - start,
        })
    }

    /// Copy these bytes into storage owned by `serializer`.
    pub fn reserialize(&self, serializer: &dyn MappedSerializer) -> Result<FrozenMemoryRegion> {
        serializer.copy(self)
    }
}

impl Default for FrozenMemoryRegion {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for FrozenMemoryRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data()
    }
}

impl AsRef<[u8]> for FrozenMemoryRegion {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl fmt::Debug for FrozenMemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrozenMemoryRegion")
            .field("data", &self.data.as_ptr())
            .field("length", &self.length)
            .field("handle", &self.handle)
            .finish()
    }
}

// ── MutableMemoryRegion ────────────────────────────────────────────

/// Exclusively owned writable buffer created by a `MappedSerializer`.
///
/// `freeze` consumes the region, so it can neither be frozen twice nor
/// written after freezing.
pub struct MutableMemoryRegion {
    handle: OwnershipHandle,
    data: NonNull<u8>,
    length: usize,
    owner: Arc<dyn MappedSerializer>,
}

// Safety: the region is the only writer of its bytes; shared references
// only hand out `&[u8]`.
unsafe impl Send for MutableMemoryRegion {}
unsafe impl Sync for MutableMemoryRegion {}

impl MutableMemoryRegion {
    /// Build a writable region. Called by serializer implementations.
    ///
    /// # Safety
    ///
    /// `data` must be valid for reads and writes of `length` bytes while
    /// `handle` is alive, initialized, and not reachable through any other
    /// pointer.
    pub unsafe fn new(
        handle: OwnershipHandle,
        data: *mut u8,
        length: usize,
        owner: Arc<dyn MappedSerializer>,
    ) -> Self {
        Self {
            handle,
            data: NonNull::new(data).unwrap_or(NonNull::dangling()),
            length,
            owner,
        }
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.data.as_ptr(), self.length) }
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.data.as_ptr(), self.length) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    pub fn handle(&self) -> &OwnershipHandle {
        &self.handle
    }

    /// The serializer that allocated this region and will freeze it.
    pub fn owner(&self) -> &Arc<dyn MappedSerializer> {
        &self.owner
    }

    /// Ask the owning serializer to turn this buffer into a frozen region.
    ///
    /// The region is consumed, so it cannot be frozen a second time:
    ///
    /// ```compile_fail
    /// use rfdb_block::{MappedSerializer, MemorySerializer};
    ///
    /// let region = MemorySerializer::new().allocate_writable(8, 8).unwrap();
    /// let first = region.freeze();
    /// let second = region.freeze();
    /// ```
    pub fn freeze(self) -> Result<FrozenMemoryRegion> {
        let owner = Arc::clone(&self.owner);
        owner.freeze(self)
    }

    /// Reinterpret the same bytes, under the same handle, as a frozen view.
    ///
    /// Zero-copy building block for `MappedSerializer::freeze`.
    pub fn into_shared_view(self) -> FrozenMemoryRegion {
        FrozenMemoryRegion {
            handle: Some(self.handle),
            data: self.data,
            length: self.length,
        }
    }
}

impl Deref for MutableMemoryRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data()
    }
}

impl DerefMut for MutableMemoryRegion {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data_mut()
    }
}

impl fmt::Debug for MutableMemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableMemoryRegion")
            .field("data", &self.data.as_ptr())
            .field("length", &self.length)
            .field("handle", &self.handle)
            .finish()
    }
}
