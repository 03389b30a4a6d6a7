//! Typed views over regions holding fixed-width column values.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::slice;

use crate::error::{BlockError, Result};
use crate::region::{FrozenMemoryRegion, MutableMemoryRegion};

/// Fixed-width values with no padding for which every bit pattern is valid.
///
/// # Safety
///
/// Implementors must be `Copy`, non-zero-sized, contain no padding bytes
/// and no pointers, and accept any bit pattern as a valid value.
pub unsafe trait PlainData: Copy + Send + Sync + 'static {}

unsafe impl PlainData for u8 {}
unsafe impl PlainData for i8 {}
unsafe impl PlainData for u16 {}
unsafe impl PlainData for i16 {}
unsafe impl PlainData for u32 {}
unsafe impl PlainData for i32 {}
unsafe impl PlainData for u64 {}
unsafe impl PlainData for i64 {}
unsafe impl PlainData for u128 {}
unsafe impl PlainData for i128 {}
unsafe impl PlainData for usize {}
unsafe impl PlainData for isize {}
unsafe impl PlainData for f32 {}
unsafe impl PlainData for f64 {}

fn check_layout<T: PlainData>(ptr: *const u8, length: usize) -> Result<()> {
    let size = mem::size_of::<T>();
    if size == 0 {
        return Err(BlockError::invalid_argument(
            "typed views need a value type of at least one byte",
        ));
    }
    if length % size != 0 {
        return Err(BlockError::invalid_argument(format!(
            "region of {} bytes is not a whole number of {}-byte values",
            length, size
        )));
    }
    if length > 0 && (ptr as usize) % mem::align_of::<T>() != 0 {
        return Err(BlockError::invalid_argument(format!(
            "region at {:p} is not aligned to {} bytes",
            ptr,
            mem::align_of::<T>()
        )));
    }
    Ok(())
}

// ── FrozenMemoryRegionT ────────────────────────────────────────────

/// Frozen region viewed as a slice of `T`.
#[derive(Clone)]
pub struct FrozenMemoryRegionT<T> {
    raw: FrozenMemoryRegion,
    _marker: PhantomData<T>,
}

impl<T: PlainData> FrozenMemoryRegionT<T> {
    /// Reinterpret `raw`. Fails unless it is aligned for `T` and a whole
    /// number of values long.
    pub fn new(raw: FrozenMemoryRegion) -> Result<Self> {
        check_layout::<T>(raw.as_ptr(), raw.len())?;
        Ok(Self {
            raw,
            _marker: PhantomData,
        })
    }

    pub fn as_slice(&self) -> &[T] {
        if self.raw.is_empty() {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.raw.as_ptr() as *const T, self.len()) }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.raw.len() / mem::size_of::<T>()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Zero-copy sub-view over values `[start, end)`.
    pub fn range(&self, start: usize, end: usize) -> Result<Self> {
        let size = mem::size_of::<T>();
        let raw = self
            .raw
            .range(start.saturating_mul(size), end.saturating_mul(size))?;
        Self::new(raw)
    }

    pub fn raw(&self) -> &FrozenMemoryRegion {
        &self.raw
    }

    pub fn into_raw(self) -> FrozenMemoryRegion {
        self.raw
    }
}

impl<T: PlainData> Deref for FrozenMemoryRegionT<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: PlainData + fmt::Debug> fmt::Debug for FrozenMemoryRegionT<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

// ── MutableMemoryRegionT ───────────────────────────────────────────

/// Writable region viewed as a slice of `T`.
pub struct MutableMemoryRegionT<T> {
    raw: MutableMemoryRegion,
    _marker: PhantomData<T>,
}

impl<T: PlainData> MutableMemoryRegionT<T> {
    pub fn new(raw: MutableMemoryRegion) -> Result<Self> {
        check_layout::<T>(raw.as_ptr(), raw.len())?;
        Ok(Self {
            raw,
            _marker: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.raw.len() / mem::size_of::<T>()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        if self.raw.is_empty() {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.raw.as_ptr() as *const T, self.len()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if self.raw.is_empty() {
            return &mut [];
        }
        let len = self.len();
        let data = self.raw.data_mut().as_mut_ptr() as *mut T;
        unsafe { slice::from_raw_parts_mut(data, len) }
    }

    /// Freeze through the owning serializer, keeping the typed view.
    pub fn freeze(self) -> Result<FrozenMemoryRegionT<T>> {
        FrozenMemoryRegionT::new(self.raw.freeze()?)
    }

    pub fn into_raw(self) -> MutableMemoryRegion {
        self.raw
    }
}

impl<T: PlainData> Deref for MutableMemoryRegionT<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: PlainData> DerefMut for MutableMemoryRegionT<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}
