//! Cache-line aligned heap buffers
//!
//! An `AlignedBuffer<T>` is one allocation of `len * size_of::<T>() + offset`
//! bytes aligned to [`CACHE_LINE`]. The element view starts `offset` bytes
//! past the aligned base, which lets callers shift the arrays relative to
//! cache-line boundaries.

use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::AllocationError;
use crate::element::StreamElement;

/// Alignment of every benchmark allocation.
pub const CACHE_LINE: usize = 64;

pub struct AlignedBuffer<T: StreamElement> {
    base: NonNull<u8>,
    layout: Layout,
    offset: usize,
    len: usize,
    _marker: PhantomData<T>,
}

// SAFETY: the buffer exclusively owns its allocation and only hands out
// references tied to `&self` / `&mut self`.
unsafe impl<T: StreamElement> Send for AlignedBuffer<T> {}
unsafe impl<T: StreamElement> Sync for AlignedBuffer<T> {}

impl<T: StreamElement> AlignedBuffer<T> {
    /// Allocates `len` elements, `CACHE_LINE`-aligned, with `offset_bytes`
    /// of extra leading capacity.
    ///
    /// Pages are obtained zeroed and are normally not touched until the
    /// caller fills the buffer.
    pub fn new(len: usize, offset_bytes: usize) -> Result<Self, AllocationError> {
        if len == 0 {
            return Err(AllocationError::ZeroLength);
        }

        let element_size = size_of::<T>();
        if offset_bytes % element_size != 0 {
            return Err(AllocationError::MisalignedOffset {
                offset: offset_bytes,
                element_size,
            });
        }

        let overflow = AllocationError::SizeOverflow {
            len,
            offset: offset_bytes,
        };
        let bytes = len
            .checked_mul(element_size)
            .and_then(|b| b.checked_add(offset_bytes))
            .ok_or_else(|| overflow.clone())?;
        let layout = Layout::from_size_align(bytes, CACHE_LINE).map_err(|_| overflow)?;

        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let base = NonNull::new(ptr).ok_or(AllocationError::OutOfMemory {
            bytes,
            align: CACHE_LINE,
        })?;

        Ok(Self {
            base,
            layout,
            offset: offset_bytes,
            len,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of the element view from the aligned base, in bytes.
    #[inline]
    pub fn offset_bytes(&self) -> usize {
        self.offset
    }

    /// Total size of the underlying allocation.
    #[inline]
    pub fn capacity_bytes(&self) -> usize {
        self.layout.size()
    }

    #[inline]
    fn data_ptr(&self) -> *mut T {
        // SAFETY: offset < layout.size() and is a multiple of the element
        // size, so the pointer is in bounds and aligned for T.
        unsafe { self.base.as_ptr().add(self.offset).cast::<T>() }
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the allocation holds `len` initialized (zeroed or written)
        // elements past `offset`; zero bits are a valid float.
        unsafe { std::slice::from_raw_parts(self.data_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: see `as_slice`; `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.data_ptr(), self.len) }
    }

    pub fn fill(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }
}

impl<T: StreamElement> Drop for AlignedBuffer<T> {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with this exact layout.
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
    }
}

impl<T: StreamElement> std::fmt::Debug for AlignedBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("element", &T::NAME)
            .field("len", &self.len)
            .field("offset", &self.offset)
            .field("base", &self.base)
            .finish()
    }
}
