//! One timed trial: spawn a pinned worker per partition, join them all
//!
//! Threads are created fresh for every trial and joined before it returns.
//! A trial's time is the mean of its workers' barrier-to-barrier windows.

use std::sync::atomic::AtomicBool;
use std::thread;

use serde::Serialize;

use membw_mem::{SimdLevel, StreamElement};

use crate::barrier::TrialBarrier;
use crate::error::{BenchError, BenchResult, keep_root_cause};
use crate::partition::{Partition, split_views};
use crate::stats;
use crate::worker::{TrialShared, Worker, WorkerReport};

/// Result of one trial, warm-up or measured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialSample {
    pub trial: usize,
    /// Mean worker elapsed time, in seconds
    pub time: f64,
    pub workers: Vec<WorkerReport>,
}

/// Runs one trial of the copy `src -> dst` over `partitions`.
///
/// Either every worker completes or the most relevant error is returned;
/// a failure on one worker never leaves its peers blocked.
pub fn run_trial<T: StreamElement>(
    trial: usize,
    src: &[T],
    dst: &mut [T],
    partitions: &[Partition],
    level: SimdLevel,
    pin: bool,
) -> BenchResult<TrialSample> {
    let barrier = TrialBarrier::new(partitions.len())?;
    let abort = AtomicBool::new(false);
    let shared = TrialShared {
        barrier: &barrier,
        abort: &abort,
        level,
        pin,
    };
    let views = split_views(src, dst, partitions);

    let mut failure: Option<BenchError> = None;
    let workers = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(partitions.len());
        for (part, (s, d)) in partitions.iter().zip(views) {
            let worker = Worker::new(*part, s, d, &shared);
            let spawned = thread::Builder::new()
                .name(format!("membw-worker-{}", part.worker))
                .spawn_scoped(scope, move || worker.run());
            match spawned {
                Ok(handle) => handles.push((part.worker, handle)),
                Err(source) => {
                    // 已启动的线程在栅栏处等待，取消后它们才会返回
                    shared.barrier.cancel();
                    keep_root_cause(
                        &mut failure,
                        BenchError::ThreadCreation {
                            worker: part.worker,
                            source,
                        },
                    );
                    break;
                }
            }
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (worker, handle) in handles {
            match handle.join() {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(err)) => keep_root_cause(&mut failure, err),
                Err(_) => keep_root_cause(&mut failure, BenchError::WorkerPanicked { worker }),
            }
        }
        reports
    });

    if let Some(err) = failure {
        return Err(err);
    }

    let times: Vec<f64> = workers.iter().map(|w| w.elapsed_seconds).collect();
    let time = stats::mean(&times);
    log::debug!(
        "trial {}: {:.6}s over {} workers",
        trial,
        time,
        workers.len()
    );
    Ok(TrialSample {
        trial,
        time,
        workers,
    })
}
