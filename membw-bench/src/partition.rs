//! Work partitioning and CPU placement
//!
//! The arrays are split into `threads` contiguous chunks of equal length,
//! each a multiple of the vector width:
//!
//! ```text
//! | worker 0 | worker 1 | ... | worker n-1 | tail (never copied) |
//! 0        chunk     2*chunk            n*chunk          element_count
//! ```

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use membw_mem::SimdLevel;
use membw_osal::affinity;

use crate::config::ConfigError;

/// One worker's share of the arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub worker: usize,
    /// First element index, in both source and destination
    pub start: usize,
    pub len: usize,
    /// Logical CPU the worker is pinned to
    pub cpu: usize,
}

impl Partition {
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Maps a worker index to the logical CPU it is pinned to.
pub trait CpuMapper: fmt::Debug + Send + Sync {
    fn cpu_for(&self, worker: usize) -> usize;
}

/// Worker `i` runs on CPU `i`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMap;

impl CpuMapper for IdentityMap {
    #[inline]
    fn cpu_for(&self, worker: usize) -> usize {
        worker
    }
}

/// Spreads consecutive workers across `groups` CPU groups `stride` apart,
/// e.g. one worker per core before filling the SMT siblings.
///
/// `cpu = (base + (worker % groups) * stride + worker / groups) % total`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScatterMap {
    pub groups: usize,
    pub stride: usize,
    pub base: usize,
    pub total: usize,
}

impl ScatterMap {
    /// 60 cores with 4 hardware threads each, CPU 0 left to the OS
    /// (Xeon Phi numbering).
    pub const fn knights_landing() -> Self {
        Self {
            groups: 60,
            stride: 4,
            base: 1,
            total: 240,
        }
    }

    /// One group per physical core, `logical / physical` CPUs apart.
    pub fn for_topology(logical: usize, physical: usize) -> Self {
        let total = logical.max(1);
        let groups = physical.clamp(1, total);
        Self {
            groups,
            stride: (total / groups).max(1),
            base: 0,
            total,
        }
    }

    /// Layout of the running host.
    pub fn for_host() -> Self {
        Self::for_topology(affinity::available_cpus(), affinity::physical_cpus())
    }
}

impl CpuMapper for ScatterMap {
    fn cpu_for(&self, worker: usize) -> usize {
        let group = worker % self.groups;
        let index = worker / self.groups;
        (self.base + group * self.stride + index) % self.total
    }
}

/// Serializable choice of [`CpuMapper`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CpuMapConfig {
    #[default]
    Identity,
    Scatter(ScatterMap),
}

impl CpuMapConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            CpuMapConfig::Identity => Ok(()),
            CpuMapConfig::Scatter(map) if map.groups == 0 || map.total == 0 => Err(
                ConfigError::Invalid("scatter map needs non-zero groups and total".into()),
            ),
            CpuMapConfig::Scatter(_) => Ok(()),
        }
    }

    pub fn mapper(&self) -> Box<dyn CpuMapper> {
        match *self {
            CpuMapConfig::Identity => Box::new(IdentityMap),
            CpuMapConfig::Scatter(map) => Box::new(map),
        }
    }
}

/// Per-worker element count: `element_count / threads` rounded down to a
/// multiple of `vector_width`.
#[inline]
pub fn chunk_size(element_count: usize, threads: usize, vector_width: usize) -> usize {
    (element_count / threads) / vector_width * vector_width
}

/// Splits `element_count` elements into `threads` ordered, disjoint
/// partitions of `chunk_size` elements each.
pub fn partition(
    element_count: usize,
    threads: usize,
    vector_width: usize,
    mapper: &dyn CpuMapper,
) -> Result<Vec<Partition>, ConfigError> {
    if threads == 0 {
        return Err(ConfigError::Invalid("threads must be at least 1".into()));
    }
    if vector_width == 0 {
        return Err(ConfigError::Invalid(
            "vector_width must be at least 1".into(),
        ));
    }

    let chunk = chunk_size(element_count, threads, vector_width);
    let partitions: Vec<Partition> = (0..threads)
        .map(|worker| Partition {
            worker,
            start: worker * chunk,
            len: chunk,
            cpu: mapper.cpu_for(worker),
        })
        .collect();

    let tail = unprocessed_tail(element_count, &partitions);
    if tail > 0 {
        log::warn!(
            "{} trailing elements are not covered by any worker (chunk = {})",
            tail,
            chunk
        );
    }
    Ok(partitions)
}

/// Elements the workers actually copy.
pub fn processed_elements(partitions: &[Partition]) -> usize {
    partitions.iter().map(|p| p.len).sum()
}

pub fn unprocessed_tail(element_count: usize, partitions: &[Partition]) -> usize {
    element_count.saturating_sub(processed_elements(partitions))
}

/// Workers whose destination slice starts off the vector alignment of
/// `level`, given the address of destination element 0. Those workers copy
/// with ordinary stores instead of streaming ones.
pub fn unaligned_workers(
    dst_base: usize,
    element_size: usize,
    partitions: &[Partition],
    level: SimdLevel,
) -> Vec<usize> {
    if level == SimdLevel::Portable {
        return Vec::new();
    }
    partitions
        .iter()
        .filter(|p| p.len > 0)
        .filter(|p| !level.streams_to(dst_base + p.start * element_size))
        .map(|p| p.worker)
        .collect()
}

/// Cuts the source and destination into one `(src, dst)` slice pair per
/// partition.
///
/// # Panics
/// Panics if the partitions are not ascending and disjoint, or run past the
/// end of either slice.
pub fn split_views<'a, T>(
    mut src: &'a [T],
    mut dst: &'a mut [T],
    partitions: &[Partition],
) -> Vec<(&'a [T], &'a mut [T])> {
    let mut cursor = 0;
    let mut views = Vec::with_capacity(partitions.len());
    for p in partitions {
        assert!(
            p.start >= cursor,
            "partition {} overlaps its predecessor",
            p.worker
        );
        let skip = p.start - cursor;

        let (_, rest) = src.split_at(skip);
        let (head, rest) = rest.split_at(p.len);
        src = rest;

        let (_, rest) = std::mem::take(&mut dst).split_at_mut(skip);
        let (head_mut, rest) = rest.split_at_mut(p.len);
        dst = rest;

        views.push((head, head_mut));
        cursor = p.end();
    }
    views
}
