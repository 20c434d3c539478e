//! membw-mem: aligned memory and streaming copy kernels
//!
//! Owns the three benchmark arrays and the SIMD kernel that streams one of
//! them into another.
//!
//! ```rust
//! use membw_mem::{Workspace, kernel::stream_copy};
//!
//! let mut ws = Workspace::<f32>::allocate(1024, 0).unwrap();
//! ws.initialize();
//! let (src, dst) = ws.copy_views();
//! stream_copy(src, dst);
//! assert!(ws.destination().iter().all(|&x| x == 1.0));
//! ```

pub mod buffer;
pub mod element;
pub mod kernel;
pub mod validate;
pub mod workspace;

pub use buffer::{AlignedBuffer, CACHE_LINE};
pub use element::{ElementWidth, StreamElement};
pub use kernel::{KernelChoice, SimdLevel};
pub use validate::{ValidationError, validate_copy};
pub use workspace::Workspace;

use thiserror::Error;

/// Workspace allocation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("cannot allocate a zero-length buffer")]
    ZeroLength,

    #[error("offset of {offset} bytes is not a multiple of the {element_size}-byte element size")]
    MisalignedOffset { offset: usize, element_size: usize },

    #[error("buffer of {len} elements plus {offset} bytes overflows the address space")]
    SizeOverflow { len: usize, offset: usize },

    #[error("allocator could not provide {bytes} bytes aligned to {align}")]
    OutOfMemory { bytes: usize, align: usize },
}
