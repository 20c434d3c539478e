//! membw: 多线程流式拷贝内存带宽测试
//!
//! ```bash
//! membw 8
//! membw 8 --elements 64000000 --element-width 8 --verbose
//! RUST_LOG=debug membw 4 --config membw.toml --json
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{error, info, warn};

use membw_bench::{BenchConfig, ByteAccounting, CpuMapConfig, ScatterMap, run_benchmark};
use membw_mem::{ElementWidth, KernelChoice, kernel};
use membw_osal::{PlatformInfo, clock_granularity_us};

/// Measure sustained read+write memory bandwidth with a streaming copy.
#[derive(Parser, Debug)]
#[command(name = "membw", version, about)]
struct Args {
    /// Number of worker threads, each pinned to its own CPU
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    threads: u32,

    /// TOML configuration file, overridden by the flags below
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Elements per array
    #[arg(short = 'n', long)]
    elements: Option<usize>,

    /// Total trials, warm-up included
    #[arg(short = 'r', long)]
    repetitions: Option<usize>,

    /// Element size in bytes (4 = f32, 8 = f64)
    #[arg(long, value_parser = parse_width)]
    element_width: Option<ElementWidth>,

    /// Byte offset of every array from its aligned base
    #[arg(short = 'o', long)]
    offset_bytes: Option<usize>,

    /// Partition granularity in elements
    #[arg(long)]
    vector_width: Option<usize>,

    /// Leading trials excluded from the statistics
    #[arg(long)]
    warmup: Option<usize>,

    #[arg(long, value_enum)]
    cpu_map: Option<CpuMapArg>,

    #[arg(long, value_enum)]
    accounting: Option<AccountingArg>,

    #[arg(long, value_enum)]
    kernel: Option<KernelArg>,

    /// Do not pin workers to CPUs
    #[arg(long)]
    no_pin: bool,

    /// Skip the post-run copy check
    #[arg(long)]
    no_validate: bool,

    /// Print the per-trial table after the summary line
    #[arg(short, long)]
    verbose: bool,

    /// Print the full report as JSON after the summary line
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CpuMapArg {
    /// Worker i on CPU i
    Identity,
    /// One worker per core before the SMT siblings
    Scatter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AccountingArg {
    /// Count only the elements actually copied
    Moved,
    /// Count the full array length
    Nominal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KernelArg {
    Auto,
    Portable,
}

fn parse_width(s: &str) -> Result<ElementWidth, String> {
    let bytes: u8 = s
        .parse()
        .map_err(|_| format!("invalid element width '{s}'"))?;
    ElementWidth::try_from(bytes)
}

/// defaults < config file < flags
fn build_config(args: &Args) -> Result<BenchConfig> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => BenchConfig::default(),
    };

    config.threads = args.threads as usize;
    if let Some(n) = args.elements {
        config.element_count = n;
    }
    if let Some(r) = args.repetitions {
        config.repetitions = r;
    }
    if let Some(w) = args.element_width {
        config.element_width = w;
    }
    if let Some(o) = args.offset_bytes {
        config.offset_bytes = o;
    }
    if args.vector_width.is_some() {
        config.vector_width = args.vector_width;
    }
    if let Some(w) = args.warmup {
        config.warmup_trials = w;
    }
    match args.cpu_map {
        Some(CpuMapArg::Identity) => config.cpu_map = CpuMapConfig::Identity,
        // 保留配置文件中的拓扑参数，否则按本机拓扑生成
        Some(CpuMapArg::Scatter) if !matches!(config.cpu_map, CpuMapConfig::Scatter(_)) => {
            config.cpu_map = CpuMapConfig::Scatter(ScatterMap::for_host());
        }
        _ => {}
    }
    if let Some(a) = args.accounting {
        config.accounting = match a {
            AccountingArg::Moved => ByteAccounting::Moved,
            AccountingArg::Nominal => ByteAccounting::Nominal,
        };
    }
    if let Some(k) = args.kernel {
        config.kernel = match k {
            KernelArg::Auto => KernelChoice::Auto,
            KernelArg::Portable => KernelChoice::Portable,
        };
    }
    if args.no_pin {
        config.pin_threads = false;
    }
    if args.no_validate {
        config.validate = false;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args)?;

    let platform = PlatformInfo::get();
    info!("Host: {}", platform);
    info!("Clock granularity: {} us", clock_granularity_us());
    info!("Best copy kernel: {}", kernel::kernel_name());
    if config.threads > platform.cpu_count {
        warn!(
            "{} threads requested but only {} logical CPUs are online",
            config.threads, platform.cpu_count
        );
    }
    let workspace_bytes = 3 * (config.array_bytes() + config.offset_bytes as u64);
    if !platform.fits_in_memory(workspace_bytes) {
        warn!(
            "workspace needs {} MB but the host has {} MB",
            workspace_bytes / (1024 * 1024),
            platform.total_memory / (1024 * 1024)
        );
    }

    let report = run_benchmark(&config).context("benchmark failed")?;

    println!("{}", report.summary_line());
    if args.verbose {
        print!("{}", report.table());
    }
    if args.json {
        println!("{}", report.to_json().context("serializing report")?);
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "warn")).init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        process::exit(1);
    }
}
