//! One pinned worker thread per partition
//!
//! ```text
//! Created -> Pinned -> WaitingAtStart -> Executing -> WaitingAtEnd -> Joined
//! ```
//!
//! A worker that cannot be pinned still arrives at the start barrier so its
//! peers are not left waiting; it raises the shared abort flag first, and
//! every worker checks that flag once the start barrier opens.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use membw_mem::{SimdLevel, StreamElement, kernel};
use membw_osal::pin_current_thread_to;

use crate::barrier::TrialBarrier;
use crate::error::BenchError;
use crate::partition::Partition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Created,
    Pinned,
    WaitingAtStart,
    Executing,
    WaitingAtEnd,
    Joined,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerPhase::Created => "created",
            WorkerPhase::Pinned => "pinned",
            WorkerPhase::WaitingAtStart => "waiting at start barrier",
            WorkerPhase::Executing => "executing",
            WorkerPhase::WaitingAtEnd => "waiting at end barrier",
            WorkerPhase::Joined => "joined",
        };
        f.write_str(name)
    }
}

/// Timing produced by one worker for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WorkerReport {
    pub worker: usize,
    pub cpu: usize,
    pub elements: usize,
    /// Start barrier release to end barrier release, in seconds
    pub elapsed_seconds: f64,
}

/// State shared by all workers of one trial.
#[derive(Debug)]
pub struct TrialShared<'a> {
    pub barrier: &'a TrialBarrier,
    pub abort: &'a AtomicBool,
    pub level: SimdLevel,
    pub pin: bool,
}

/// Cancels the barrier if the worker unwinds, so peers do not wait forever.
struct CancelOnPanic<'a>(&'a TrialBarrier);

impl Drop for CancelOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.cancel();
        }
    }
}

pub struct Worker<'a, T: StreamElement> {
    partition: Partition,
    src: &'a [T],
    dst: &'a mut [T],
    shared: &'a TrialShared<'a>,
    phase: WorkerPhase,
}

impl<'a, T: StreamElement> Worker<'a, T> {
    pub fn new(
        partition: Partition,
        src: &'a [T],
        dst: &'a mut [T],
        shared: &'a TrialShared<'a>,
    ) -> Self {
        debug_assert_eq!(src.len(), partition.len);
        debug_assert_eq!(dst.len(), partition.len);
        Self {
            partition,
            src,
            dst,
            shared,
            phase: WorkerPhase::Created,
        }
    }

    fn enter(&mut self, phase: WorkerPhase) {
        log::trace!(
            "worker {} (cpu {}): {} -> {}",
            self.partition.worker,
            self.partition.cpu,
            self.phase,
            phase
        );
        self.phase = phase;
    }

    /// Runs the worker to completion on the calling thread.
    pub fn run(mut self) -> Result<WorkerReport, BenchError> {
        let shared = self.shared;
        let _guard = CancelOnPanic(shared.barrier);
        let Partition { worker, cpu, .. } = self.partition;

        let pinned = if shared.pin {
            pin_current_thread_to(cpu)
        } else {
            Ok(())
        };
        match &pinned {
            Ok(()) => self.enter(WorkerPhase::Pinned),
            Err(err) => {
                log::debug!("worker {} could not be pinned to CPU {}: {}", worker, cpu, err);
                shared.abort.store(true, Ordering::Release);
            }
        }

        self.enter(WorkerPhase::WaitingAtStart);
        shared.barrier.wait()?;

        if let Err(source) = pinned {
            return Err(BenchError::Affinity { worker, source });
        }
        if shared.abort.load(Ordering::Acquire) {
            return Err(BenchError::Aborted { worker });
        }

        self.enter(WorkerPhase::Executing);
        let start = membw_osal::now();
        kernel::stream_copy_at(shared.level, self.src, self.dst);

        self.enter(WorkerPhase::WaitingAtEnd);
        shared.barrier.wait()?;
        let elapsed_seconds = membw_osal::now() - start;

        self.enter(WorkerPhase::Joined);
        Ok(WorkerReport {
            worker,
            cpu,
            elements: self.partition.len,
            elapsed_seconds,
        })
    }
}
