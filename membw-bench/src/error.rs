//! Error taxonomy of a benchmark run
//!
//! Every variant is fatal: a run either completes all trials on all workers
//! or produces no result.

use thiserror::Error;

use membw_mem::{AllocationError, ValidationError};
use membw_osal::AffinityError;

use crate::barrier::BarrierError;
use crate::config::ConfigError;

pub type BenchResult<T> = Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("workspace allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    #[error("failed to spawn worker {worker}: {source}")]
    ThreadCreation {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {worker} could not be pinned: {source}")]
    Affinity {
        worker: usize,
        #[source]
        source: AffinityError,
    },

    #[error("barrier error: {0}")]
    Barrier(#[from] BarrierError),

    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    #[error("worker {worker} stopped because a peer failed")]
    Aborted { worker: usize },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl BenchError {
    /// Errors that only happen as a consequence of another worker failing.
    pub fn is_secondary(&self) -> bool {
        matches!(
            self,
            BenchError::Aborted { .. } | BenchError::Barrier(BarrierError::Cancelled)
        )
    }
}

/// Keeps the first root-cause error, replacing secondary ones.
pub(crate) fn keep_root_cause(slot: &mut Option<BenchError>, err: BenchError) {
    let replace = match slot {
        None => true,
        Some(existing) => existing.is_secondary() && !err.is_secondary(),
    };
    if replace {
        *slot = Some(err);
    }
}
