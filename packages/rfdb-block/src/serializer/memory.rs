//! Heap-backed serializer with zero-copy freeze.

use std::alloc::{self, Layout};
use std::mem;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::error::{BlockError, Result};
use crate::region::{FrozenMemoryRegion, MutableMemoryRegion, OwnershipHandle};
use crate::serializer::MappedSerializer;

/// Aligned heap block, freed when the owning handle is released.
struct HeapBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

// Safety: the block is plain memory; access is governed by the regions
// pointing into it.
unsafe impl Send for HeapBlock {}
unsafe impl Sync for HeapBlock {}

impl Drop for HeapBlock {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// Allocate a zeroed heap block and wrap it as a region frozen by `owner`.
///
/// Zero-byte requests still get a one-byte block so every region has a
/// real, aligned address.
pub(crate) fn allocate_aligned(
    bytes_required: u64,
    alignment: usize,
    owner: Arc<dyn MappedSerializer>,
) -> Result<MutableMemoryRegion> {
    let length = usize::try_from(bytes_required).map_err(|_| {
        BlockError::invalid_argument(format!(
            "{} bytes cannot be addressed on this platform",
            bytes_required
        ))
    })?;
    let alignment = alignment.max(mem::size_of::<*const u8>());

    let allocation_error = |message: String| {
        tracing::warn!(bytes_required, alignment, "writable allocation failed: {}", message);
        BlockError::Allocation {
            bytes_required,
            alignment,
            message,
        }
    };

    let layout = Layout::from_size_align(length.max(1), alignment)
        .map_err(|e| allocation_error(e.to_string()))?;
    let ptr = NonNull::new(unsafe { alloc::alloc_zeroed(layout) })
        .ok_or_else(|| allocation_error("out of memory".to_string()))?;

    tracing::debug!(bytes_required, alignment, "allocated writable heap block");
    let handle = OwnershipHandle::new(HeapBlock { ptr, layout });
    Ok(unsafe { MutableMemoryRegion::new(handle, ptr.as_ptr(), length, owner) })
}

/// Serializer backed by aligned heap allocations.
///
/// Freezing is zero-copy: the frozen region keeps the same handle and
/// pointer as the mutable one. Heap memory needs no commit step.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemorySerializer;

impl MemorySerializer {
    pub fn new() -> Self {
        Self
    }
}

impl MappedSerializer for MemorySerializer {
    fn allocate_writable(
        &self,
        bytes_required: u64,
        alignment: usize,
    ) -> Result<MutableMemoryRegion> {
        allocate_aligned(bytes_required, alignment, Arc::new(*self))
    }

    fn freeze(&self, region: MutableMemoryRegion) -> Result<FrozenMemoryRegion> {
        Ok(region.into_shared_view())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }
}
