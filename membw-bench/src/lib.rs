//! membw-bench: 多线程流式拷贝带宽测试
//!
//! Drives the whole measurement: validate the configuration, allocate and
//! initialize the workspace, partition it across pinned workers, run the
//! trials, reduce the times and turn the best one into MB/s.
//!
//! ```rust,no_run
//! use membw_bench::{BenchConfig, run_benchmark};
//!
//! let report = run_benchmark(&BenchConfig::with_threads(4)).unwrap();
//! println!("{}", report.summary_line());
//! ```

pub mod barrier;
pub mod config;
pub mod error;
pub mod partition;
pub mod report;
pub mod stats;
pub mod trial;
pub mod worker;

pub use barrier::{BarrierError, BarrierWaitResult, TrialBarrier};
pub use config::{BenchConfig, ConfigError};
pub use error::{BenchError, BenchResult};
pub use partition::{CpuMapConfig, CpuMapper, IdentityMap, Partition, ScatterMap};
pub use report::{BenchmarkReport, ByteAccounting};
pub use stats::{Reducer, TrialStats};
pub use trial::{TrialSample, run_trial};
pub use worker::WorkerReport;

use membw_mem::workspace::DEST_INIT;
use membw_mem::{ElementWidth, SimdLevel, StreamElement, Workspace, validate_copy};

/// Trials shorter than this many clock ticks are reported as unreliable.
const MIN_TICKS_PER_TRIAL: f64 = 20.0;

/// Raw outcome of all trials of one run.
#[derive(Debug, Clone)]
pub struct BenchmarkRun {
    pub trials: Vec<TrialSample>,
    pub stats: TrialStats,
}

impl BenchmarkRun {
    /// Trial times in execution order, warm-up included.
    pub fn times(&self) -> Vec<f64> {
        self.trials.iter().map(|t| t.time).collect()
    }
}

/// A prepared benchmark over elements of type `T`.
#[derive(Debug)]
pub struct Benchmark<T: StreamElement> {
    config: BenchConfig,
    workspace: Workspace<T>,
    partitions: Vec<Partition>,
    level: SimdLevel,
    /// Every worker's destination slice is aligned for streaming stores
    streaming: bool,
}

impl<T: StreamElement> Benchmark<T> {
    /// Validates `config`, then allocates, initializes and partitions the
    /// workspace. Nothing is timed yet.
    pub fn new(config: &BenchConfig) -> BenchResult<Self> {
        config.validate()?;
        if config.element_width != T::WIDTH {
            return Err(ConfigError::Invalid(format!(
                "element_width {} does not match element type {}",
                config.element_width,
                T::NAME
            ))
            .into());
        }

        let mapper = config.cpu_map.mapper();
        let partitions = partition::partition(
            config.element_count,
            config.threads,
            config.effective_vector_width(),
            mapper.as_ref(),
        )?;

        let mut workspace = Workspace::allocate(config.element_count, config.offset_bytes)?;
        let ((), init_ns) = membw_osal::measure(|| workspace.initialize());
        log::debug!("initialized workspace in {:.3} ms", init_ns as f64 * 1.0e-6);

        let level = config.kernel.resolve();
        let unaligned = partition::unaligned_workers(
            workspace.destination().as_ptr() as usize,
            T::WIDTH.bytes(),
            &partitions,
            level,
        );
        if !unaligned.is_empty() {
            log::warn!(
                "workers {:?} have destinations off the {}-byte vector alignment \
                 (offset_bytes {}, vector_width {}); {} falls back to ordinary stores",
                unaligned,
                level.vector_bytes(),
                config.offset_bytes,
                config.effective_vector_width(),
                level
            );
        }
        let streaming = level != SimdLevel::Portable && unaligned.is_empty();

        log::info!(
            "{} threads, {} x {} elements, chunk {}, kernel {}",
            config.threads,
            config.element_count,
            T::NAME,
            partitions.first().map_or(0, |p| p.len),
            level
        );

        Ok(Self {
            config: config.clone(),
            workspace,
            partitions,
            level,
            streaming,
        })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn workspace(&self) -> &Workspace<T> {
        &self.workspace
    }

    #[inline]
    pub fn level(&self) -> SimdLevel {
        self.level
    }

    /// Whether every worker copies with streaming stores.
    #[inline]
    pub fn streaming(&self) -> bool {
        self.streaming
    }

    /// Kernel name as reported, reflecting the store path actually taken.
    pub fn kernel_label(&self) -> &'static str {
        if self.streaming {
            self.level.name()
        } else {
            self.level.temporal_name()
        }
    }

    /// Runs every trial, reduces the measured ones and checks the copy.
    pub fn run(&mut self) -> BenchResult<BenchmarkRun> {
        let mut reducer = Reducer::new(self.config.warmup_trials);
        let mut trials = Vec::with_capacity(self.config.repetitions);

        for trial in 0..self.config.repetitions {
            let (src, dst) = self.workspace.copy_views();
            let sample = run_trial(
                trial,
                src,
                dst,
                &self.partitions,
                self.level,
                self.config.pin_threads,
            )?;
            reducer.push(sample.time);
            trials.push(sample);
        }
        let stats = reducer.finish();

        self.check_timer_resolution(&stats);
        if self.config.validate {
            self.validate()?;
        }

        Ok(BenchmarkRun { trials, stats })
    }

    fn check_timer_resolution(&self, stats: &TrialStats) {
        let tick_us = membw_osal::clock_granularity_us();
        if tick_us == 0 || stats.is_empty() {
            return;
        }
        let ticks = stats.min * 1.0e6 / tick_us as f64;
        if ticks < MIN_TICKS_PER_TRIAL {
            log::warn!(
                "fastest trial took only {:.1} clock ticks ({} us each); increase element_count",
                ticks,
                tick_us
            );
        }
    }

    /// Destination equals source over the processed prefix and still holds
    /// its initial value beyond it.
    pub fn validate(&self) -> BenchResult<()> {
        let processed = partition::processed_elements(&self.partitions);
        validate_copy(
            self.workspace.source(),
            self.workspace.destination(),
            processed,
            T::from_f64(DEST_INIT),
        )?;
        Ok(())
    }

    /// Converts a finished run into the reported numbers.
    pub fn report(&self, run: BenchmarkRun) -> BenchmarkReport {
        let processed = partition::processed_elements(&self.partitions);
        let elements = self
            .config
            .accounting
            .elements(processed, self.config.element_count);
        let bytes = report::bytes_moved(T::WIDTH.bytes(), elements);
        let bandwidth = report::bandwidth_mbs(bytes, run.stats.min);

        let insufficient = bandwidth == 0.0;
        if insufficient {
            log::warn!(
                "insufficient array size: {} elements over {} threads leaves nothing measurable",
                self.config.element_count,
                self.config.threads
            );
        }

        BenchmarkReport {
            threads: self.config.threads,
            element_type: T::NAME,
            kernel: self.kernel_label(),
            streaming: self.streaming,
            accounting: self.config.accounting,
            element_count: self.config.element_count,
            processed_elements: processed,
            bytes_moved: bytes,
            bandwidth_mbs: bandwidth,
            insufficient,
            stats: run.stats,
            partitions: self.partitions.clone(),
            trials: run.trials,
        }
    }
}

/// Prepares and runs a benchmark for the configured element width.
pub fn run_benchmark(config: &BenchConfig) -> BenchResult<BenchmarkReport> {
    match config.element_width {
        ElementWidth::Four => run_typed::<f32>(config),
        ElementWidth::Eight => run_typed::<f64>(config),
    }
}

fn run_typed<T: StreamElement>(config: &BenchConfig) -> BenchResult<BenchmarkReport> {
    let mut bench = Benchmark::<T>::new(config)?;
    let run = bench.run()?;
    Ok(bench.report(run))
}
