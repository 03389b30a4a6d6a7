//! Pluggable factories of writable regions.
//!
//! A `MappedSerializer` knows how to allocate a `MutableMemoryRegion` for a
//! particular backing and how to freeze it. Copying a frozen region into the
//! backing and writing through a buffered stream are generic algorithms built
//! on those two primitives.

pub mod memory;

use std::sync::Arc;

use crate::error::Result;
use crate::region::{FrozenMemoryRegion, MutableMemoryRegion, MutableMemoryRegionT, PlainData};
use crate::stream::SerializerStream;

pub use memory::MemorySerializer;

/// Backing-specific factory of writable regions.
pub trait MappedSerializer: Send + Sync {
    /// Allocate at least `bytes_required` bytes aligned to
    /// `max(alignment, size_of::<usize>())`.
    fn allocate_writable(&self, bytes_required: u64, alignment: usize)
        -> Result<MutableMemoryRegion>;

    /// Turn a region allocated by this serializer into a frozen one.
    fn freeze(&self, region: MutableMemoryRegion) -> Result<FrozenMemoryRegion>;

    /// Flush or finalize whatever the backing needs.
    fn commit(&self) -> Result<()>;

    /// Materialize `region` as a new region owned by this serializer.
    fn copy(&self, region: &FrozenMemoryRegion) -> Result<FrozenMemoryRegion> {
        write_frozen(self, region.data())
    }

    /// Receive the bytes written through a stream from `get_stream`.
    ///
    /// The default commits them as a new owned region.
    fn commit_stream(&self, bytes: &[u8]) -> Result<FrozenMemoryRegion> {
        write_frozen(self, bytes)
    }

    /// Buffered write adapter; its bytes reach `commit_stream` on close.
    fn get_stream(&self) -> SerializerStream<'_, Self>
    where
        Self: Sized,
    {
        SerializerStream::new(self)
    }
}

/// Allocate, byte-copy, freeze.
fn write_frozen<S>(serializer: &S, bytes: &[u8]) -> Result<FrozenMemoryRegion>
where
    S: MappedSerializer + ?Sized,
{
    let mut serialize_to = serializer.allocate_writable(bytes.len() as u64, 1 /* alignment */)?;
    serialize_to.data_mut()[..bytes.len()].copy_from_slice(bytes);
    let frozen = serialize_to.freeze()?;
    if frozen.len() > bytes.len() {
        return frozen.range(0, bytes.len());
    }
    Ok(frozen)
}

// ── Forwarding impls ───────────────────────────────────────────────

macro_rules! forward_mapped_serializer {
    ($($ptr:ty),*) => {$(
        impl<S: MappedSerializer + ?Sized> MappedSerializer for $ptr {
            fn allocate_writable(
                &self,
                bytes_required: u64,
                alignment: usize,
            ) -> Result<MutableMemoryRegion> {
                (**self).allocate_writable(bytes_required, alignment)
            }

            fn freeze(&self, region: MutableMemoryRegion) -> Result<FrozenMemoryRegion> {
                (**self).freeze(region)
            }

            fn commit(&self) -> Result<()> {
                (**self).commit()
            }

            fn copy(&self, region: &FrozenMemoryRegion) -> Result<FrozenMemoryRegion> {
                (**self).copy(region)
            }

            fn commit_stream(&self, bytes: &[u8]) -> Result<FrozenMemoryRegion> {
                (**self).commit_stream(bytes)
            }
        }
    )*};
}

forward_mapped_serializer!(&S, Box<S>, Arc<S>);

// ── Typed allocation ───────────────────────────────────────────────

/// Typed helpers available on every serializer, including trait objects.
pub trait MappedSerializerExt: MappedSerializer {
    /// Allocate room for `count` values of `T`, aligned for `T`.
    fn allocate_writable_t<T: PlainData>(&self, count: usize) -> Result<MutableMemoryRegionT<T>> {
        let bytes = (count as u64).saturating_mul(std::mem::size_of::<T>() as u64);
        let raw = self.allocate_writable(bytes, std::mem::align_of::<T>())?;
        MutableMemoryRegionT::new(raw)
    }
}

impl<S: MappedSerializer + ?Sized> MappedSerializerExt for S {}
