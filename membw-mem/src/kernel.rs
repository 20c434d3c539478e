//! Streaming-store copy kernels
//!
//! Copies one array into another with non-temporal stores so the written
//! data bypasses the cache hierarchy, which makes the measured rate reflect
//! DRAM bandwidth instead of cache bandwidth.
//!
//! # Architecture Support
//! - **x86_64**: AVX-512F (`_mm512_stream_ps/pd`), AVX (`_mm256_stream_ps/pd`),
//!   SSE2 (`_mm_stream_ps/pd`)
//! - **Other targets**: portable `copy_from_slice`
//!
//! Streaming stores need a destination aligned to the vector size. When the
//! destination view is shifted off that alignment (non-zero workspace offset)
//! the kernel keeps the vector loop but uses regular unaligned stores.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::element::StreamElement;

/// Instruction set used by the copy kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SimdLevel {
    /// Scalar/compiler-vectorized copy
    Portable = 0,
    /// 128-bit streaming stores
    Sse2 = 1,
    /// 256-bit streaming stores
    Avx = 2,
    /// 512-bit streaming stores
    Avx512 = 3,
}

impl SimdLevel {
    /// Vector register width in bytes (elements are copied one at a time in
    /// the portable kernel, reported as 0).
    pub const fn vector_bytes(self) -> usize {
        match self {
            SimdLevel::Portable => 0,
            SimdLevel::Sse2 => 16,
            SimdLevel::Avx => 32,
            SimdLevel::Avx512 => 64,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SimdLevel::Portable => "portable",
            SimdLevel::Sse2 => "sse2-stream",
            SimdLevel::Avx => "avx-stream",
            SimdLevel::Avx512 => "avx512-stream",
        }
    }

    /// Name of this level when the destination is not vector-aligned and
    /// the kernel uses ordinary stores instead of streaming ones.
    pub const fn temporal_name(self) -> &'static str {
        match self {
            SimdLevel::Portable => "portable",
            SimdLevel::Sse2 => "sse2-temporal",
            SimdLevel::Avx => "avx-temporal",
            SimdLevel::Avx512 => "avx512-temporal",
        }
    }

    /// Whether a copy into a destination starting at `addr` takes the
    /// streaming path. Never true for the portable kernel.
    #[inline]
    pub const fn streams_to(self, addr: usize) -> bool {
        let align = self.vector_bytes();
        align != 0 && addr % align == 0
    }

    /// Whether the running CPU can execute this level.
    pub fn is_supported(self) -> bool {
        match self {
            SimdLevel::Portable => true,
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Sse2 => is_x86_feature_detected!("sse2"),
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx => is_x86_feature_detected!("avx"),
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx512 => is_x86_feature_detected!("avx512f"),
            #[cfg(not(target_arch = "x86_64"))]
            _ => false,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SimdLevel::Portable),
            1 => Some(SimdLevel::Sse2),
            2 => Some(SimdLevel::Avx),
            3 => Some(SimdLevel::Avx512),
            _ => None,
        }
    }
}

impl fmt::Display for SimdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kernel selection requested by the configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelChoice {
    /// Best streaming kernel the CPU supports
    #[default]
    Auto,
    /// Portable copy without streaming stores
    Portable,
}

impl KernelChoice {
    pub fn resolve(self) -> SimdLevel {
        match self {
            KernelChoice::Auto => active_level(),
            KernelChoice::Portable => SimdLevel::Portable,
        }
    }
}

const LEVEL_UNKNOWN: u8 = u8::MAX;

/// Cached after first detection to avoid repeated CPUID calls.
static ACTIVE_LEVEL: AtomicU8 = AtomicU8::new(LEVEL_UNKNOWN);

fn detect_level() -> SimdLevel {
    [SimdLevel::Avx512, SimdLevel::Avx, SimdLevel::Sse2]
        .into_iter()
        .find(|level| level.is_supported())
        .unwrap_or(SimdLevel::Portable)
}

/// Best kernel level for the running CPU
#[inline]
pub fn active_level() -> SimdLevel {
    if let Some(level) = SimdLevel::from_u8(ACTIVE_LEVEL.load(Ordering::Relaxed)) {
        return level;
    }
    let detected = detect_level();
    log::debug!("detected copy kernel: {}", detected);
    ACTIVE_LEVEL.store(detected as u8, Ordering::Relaxed);
    detected
}

/// Name of the kernel [`stream_copy`] dispatches to.
pub fn kernel_name() -> &'static str {
    active_level().name()
}

/// Streaming copy with runtime dispatch
///
/// # Panics
/// Panics if `dst` and `src` have different lengths.
pub fn stream_copy<T: StreamElement>(src: &[T], dst: &mut [T]) {
    stream_copy_at(active_level(), src, dst);
}

/// Streaming copy at an explicit level
///
/// Levels the CPU does not support fall back to the portable kernel.
///
/// # Panics
/// Panics if `dst` and `src` have different lengths.
pub fn stream_copy_at<T: StreamElement>(level: SimdLevel, src: &[T], dst: &mut [T]) {
    assert_eq!(
        dst.len(),
        src.len(),
        "Destination and source slices must have the same length"
    );
    if src.is_empty() {
        return;
    }
    let level = if level.is_supported() {
        level
    } else {
        SimdLevel::Portable
    };
    T::copy_at_level(level, src, dst);
}

#[inline]
fn copy_portable<T: Copy>(src: &[T], dst: &mut [T]) {
    dst.copy_from_slice(src);
}

/// Generates one x86 streaming kernel.
///
/// The vector loop covers `len - len % lanes` elements; the tail is copied
/// with plain stores.
macro_rules! x86_stream_kernel {
    ($name:ident, $level:expr, $feature:literal, $ty:ty, $lanes:expr, $load:ident, $stream:ident, $store:ident) => {
        #[cfg(target_arch = "x86_64")]
        #[target_feature(enable = $feature)]
        unsafe fn $name(src: &[$ty], dst: &mut [$ty]) {
            let len = src.len();
            let src_ptr = src.as_ptr();
            let dst_ptr = dst.as_mut_ptr();
            let vector_end = len - len % $lanes;
            let streamable = $level.streams_to(dst_ptr as usize);

            let mut i = 0;
            unsafe {
                if streamable {
                    while i < vector_end {
                        let v = $load(src_ptr.add(i));
                        $stream(dst_ptr.add(i), v);
                        i += $lanes;
                    }
                    // Order the weakly-ordered streaming stores before the
                    // end-of-kernel timestamp.
                    _mm_sfence();
                } else {
                    while i < vector_end {
                        let v = $load(src_ptr.add(i));
                        $store(dst_ptr.add(i), v);
                        i += $lanes;
                    }
                }

                if i < len {
                    std::ptr::copy_nonoverlapping(src_ptr.add(i), dst_ptr.add(i), len - i);
                }
            }
        }
    };
}

x86_stream_kernel!(copy_f32_avx512, SimdLevel::Avx512, "avx512f", f32, 16, _mm512_loadu_ps, _mm512_stream_ps, _mm512_storeu_ps);
x86_stream_kernel!(copy_f32_avx, SimdLevel::Avx, "avx", f32, 8, _mm256_loadu_ps, _mm256_stream_ps, _mm256_storeu_ps);
x86_stream_kernel!(copy_f32_sse2, SimdLevel::Sse2, "sse2", f32, 4, _mm_loadu_ps, _mm_stream_ps, _mm_storeu_ps);
x86_stream_kernel!(copy_f64_avx512, SimdLevel::Avx512, "avx512f", f64, 8, _mm512_loadu_pd, _mm512_stream_pd, _mm512_storeu_pd);
x86_stream_kernel!(copy_f64_avx, SimdLevel::Avx, "avx", f64, 4, _mm256_loadu_pd, _mm256_stream_pd, _mm256_storeu_pd);
x86_stream_kernel!(copy_f64_sse2, SimdLevel::Sse2, "sse2", f64, 2, _mm_loadu_pd, _mm_stream_pd, _mm_storeu_pd);

pub(crate) fn copy_f32(level: SimdLevel, src: &[f32], dst: &mut [f32]) {
    // SAFETY: `stream_copy_at` only passes levels that `is_supported`, and
    // the slices have equal length.
    match level {
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Avx512 => unsafe { copy_f32_avx512(src, dst) },
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Avx => unsafe { copy_f32_avx(src, dst) },
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Sse2 => unsafe { copy_f32_sse2(src, dst) },
        _ => copy_portable(src, dst),
    }
}

pub(crate) fn copy_f64(level: SimdLevel, src: &[f64], dst: &mut [f64]) {
    // SAFETY: see `copy_f32`.
    match level {
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Avx512 => unsafe { copy_f64_avx512(src, dst) },
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Avx => unsafe { copy_f64_avx(src, dst) },
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Sse2 => unsafe { copy_f64_sse2(src, dst) },
        _ => copy_portable(src, dst),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AlignedBuffer;
    use proptest::prelude::*;

    const ALL_LEVELS: [SimdLevel; 4] = [
        SimdLevel::Portable,
        SimdLevel::Sse2,
        SimdLevel::Avx,
        SimdLevel::Avx512,
    ];

    fn aligned_pair<T: StreamElement>(len: usize, offset: usize) -> (AlignedBuffer<T>, AlignedBuffer<T>) {
        let mut src = AlignedBuffer::<T>::new(len, offset).unwrap();
        for (i, x) in src.as_mut_slice().iter_mut().enumerate() {
            *x = T::from_f64(i as f64 + 0.5);
        }
        let dst = AlignedBuffer::<T>::new(len, offset).unwrap();
        (src, dst)
    }

    #[test]
    fn test_every_level_copies_f32() {
        for level in ALL_LEVELS {
            let (src, mut dst) = aligned_pair::<f32>(1024, 0);
            stream_copy_at(level, src.as_slice(), dst.as_mut_slice());
            assert_eq!(src.as_slice(), dst.as_slice(), "level {}", level);
        }
    }

    #[test]
    fn test_every_level_copies_f64() {
        for level in ALL_LEVELS {
            let (src, mut dst) = aligned_pair::<f64>(1000, 0);
            stream_copy_at(level, src.as_slice(), dst.as_mut_slice());
            assert_eq!(src.as_slice(), dst.as_slice(), "level {}", level);
        }
    }

    #[test]
    fn test_misaligned_destination() {
        // A 4-byte offset breaks every vector alignment.
        for level in ALL_LEVELS {
            let (src, mut dst) = aligned_pair::<f32>(257, 4);
            stream_copy_at(level, src.as_slice(), dst.as_mut_slice());
            assert_eq!(src.as_slice(), dst.as_slice(), "level {}", level);
        }
    }

    #[test]
    fn test_tail_elements() {
        for len in [1, 3, 7, 15, 17, 31, 33] {
            let (src, mut dst) = aligned_pair::<f64>(len, 0);
            stream_copy(src.as_slice(), dst.as_mut_slice());
            assert_eq!(src.as_slice(), dst.as_slice(), "len {}", len);
        }
    }

    #[test]
    fn test_empty_slices() {
        let src: [f32; 0] = [];
        let mut dst: [f32; 0] = [];
        stream_copy(&src, &mut dst);
    }

    #[test]
    #[should_panic(expected = "Destination and source slices must have the same length")]
    fn test_length_mismatch() {
        let src = [1.0f32, 2.0, 3.0];
        let mut dst = [0.0f32; 2];
        stream_copy(&src, &mut dst);
    }

    #[test]
    fn test_active_level_is_supported() {
        let level = active_level();
        assert!(level.is_supported());
        assert_eq!(active_level(), level);
        assert_eq!(kernel_name(), level.name());
        println!("Active kernel: {}", level);
    }

    #[test]
    fn test_streams_only_to_aligned_destinations() {
        assert!(SimdLevel::Avx512.streams_to(128));
        assert!(!SimdLevel::Avx512.streams_to(80));
        assert!(SimdLevel::Sse2.streams_to(80));
        assert!(!SimdLevel::Sse2.streams_to(84));
        assert!(!SimdLevel::Portable.streams_to(0));
        assert_eq!(SimdLevel::Avx.temporal_name(), "avx-temporal");
        assert_eq!(SimdLevel::Portable.temporal_name(), "portable");
    }

    #[test]
    fn test_portable_choice() {
        assert_eq!(KernelChoice::Portable.resolve(), SimdLevel::Portable);
        assert_eq!(KernelChoice::Auto.resolve(), active_level());
    }

    proptest! {
        #[test]
        fn prop_stream_copy_matches_source(
            src in prop::collection::vec(-1.0e6f32..1.0e6, 0..4096)
        ) {
            let mut dst = vec![0.0f32; src.len()];
            stream_copy(&src, &mut dst);
            prop_assert_eq!(&dst[..], &src[..]);
        }
    }
}
