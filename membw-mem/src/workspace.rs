//! The three benchmark arrays

use crate::AllocationError;
use crate::buffer::AlignedBuffer;
use crate::element::StreamElement;

/// Initial value of every source element.
pub const SOURCE_INIT: f64 = 1.0;
/// Initial value of every destination element.
pub const DEST_INIT: f64 = 2.0;
/// Initial value of every scratch element.
pub const SCRATCH_INIT: f64 = 0.0;

/// Source `a`, destination `b` and scratch `c`, all of identical length,
/// alignment and offset.
#[derive(Debug)]
pub struct Workspace<T: StreamElement> {
    source: AlignedBuffer<T>,
    destination: AlignedBuffer<T>,
    scratch: AlignedBuffer<T>,
}

impl<T: StreamElement> Workspace<T> {
    /// Allocates the three arrays. Contents are zero until
    /// [`initialize`](Self::initialize) is called.
    pub fn allocate(element_count: usize, offset_bytes: usize) -> Result<Self, AllocationError> {
        let source = AlignedBuffer::new(element_count, offset_bytes)?;
        let destination = AlignedBuffer::new(element_count, offset_bytes)?;
        let scratch = AlignedBuffer::new(element_count, offset_bytes)?;
        log::debug!(
            "allocated 3 x {} {} elements (offset {} bytes)",
            element_count,
            T::NAME,
            offset_bytes
        );
        Ok(Self {
            source,
            destination,
            scratch,
        })
    }

    /// Writes the initial values, touching every page of the source and
    /// destination before any timed region.
    pub fn initialize(&mut self) {
        self.source.fill(T::from_f64(SOURCE_INIT));
        self.destination.fill(T::from_f64(DEST_INIT));
        self.scratch.fill(T::from_f64(SCRATCH_INIT));
    }

    #[inline]
    pub fn element_count(&self) -> usize {
        self.source.len()
    }

    #[inline]
    pub fn offset_bytes(&self) -> usize {
        self.source.offset_bytes()
    }

    /// Bytes held by all three allocations.
    pub fn allocated_bytes(&self) -> usize {
        self.source.capacity_bytes()
            + self.destination.capacity_bytes()
            + self.scratch.capacity_bytes()
    }

    pub fn source(&self) -> &[T] {
        self.source.as_slice()
    }

    pub fn destination(&self) -> &[T] {
        self.destination.as_slice()
    }

    pub fn scratch(&self) -> &[T] {
        self.scratch.as_slice()
    }

    /// Borrows the source for reading and the destination for writing at
    /// the same time.
    pub fn copy_views(&mut self) -> (&[T], &mut [T]) {
        (self.source.as_slice(), self.destination.as_mut_slice())
    }
}
