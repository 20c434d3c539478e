//! 端到端带宽测试
//!
//! Small workspaces, pinning disabled so the tests run inside restricted
//! CPU sets.
//!
//! ```bash
//! cargo test --package membw-bench --test end_to_end -- --nocapture
//! ```

use membw_bench::{
    Benchmark, BenchConfig, BenchError, ByteAccounting, ConfigError, CpuMapConfig, ScatterMap,
    run_benchmark,
};
use membw_mem::{ElementWidth, KernelChoice};

fn small_config(threads: usize, element_count: usize) -> BenchConfig {
    BenchConfig {
        threads,
        element_count,
        repetitions: 4,
        vector_width: Some(16),
        pin_threads: false,
        ..BenchConfig::default()
    }
}

#[test]
fn test_single_thread_full_copy() {
    let config = small_config(1, 1024);
    let mut bench = Benchmark::<f32>::new(&config).unwrap();

    assert_eq!(bench.partitions().len(), 1);
    assert_eq!(bench.partitions()[0].len, 1024);

    let run = bench.run().unwrap();
    let ws = bench.workspace();
    assert_eq!(ws.destination(), ws.source());
    assert!(ws.scratch().iter().all(|&x| x == 0.0));

    let report = bench.report(run);
    println!("{}", report.summary_line());
    assert_eq!(report.processed_elements, 1024);
    assert_eq!(report.bytes_moved, 2 * 4 * 1024);
    assert_eq!(report.stats.count, 3);
    assert_eq!(report.trials.len(), 4);
    assert!(report.bandwidth_mbs >= 0.0);
    assert!(
        report
            .summary_line()
            .starts_with("Threads:\t1\tRead and write bandwidth (MB/s):\t")
    );
}

#[test]
fn test_zero_chunk_reports_zero_bandwidth() {
    let report = run_benchmark(&small_config(7, 100)).unwrap();

    assert_eq!(report.partitions.len(), 7);
    assert!(report.partitions.iter().all(|p| p.len == 0));
    assert_eq!(report.processed_elements, 0);
    assert_eq!(report.bytes_moved, 0);
    assert_eq!(report.bandwidth_mbs, 0.0);
    assert!(report.insufficient);
    assert!(report.summary_line().ends_with("         0.0"));
}

#[test]
fn test_multi_thread_with_tail() {
    let config = small_config(3, 1000);
    let mut bench = Benchmark::<f32>::new(&config).unwrap();
    bench.run().unwrap();

    let dst = bench.workspace().destination();
    assert!(dst[..960].iter().all(|&x| x == 1.0));
    assert!(dst[960..].iter().all(|&x| x == 2.0));
}

#[test]
fn test_nominal_accounting_counts_full_array() {
    let moved = run_benchmark(&small_config(3, 1000)).unwrap();
    let nominal = run_benchmark(&BenchConfig {
        accounting: ByteAccounting::Nominal,
        ..small_config(3, 1000)
    })
    .unwrap();

    assert_eq!(moved.bytes_moved, 2 * 4 * 960);
    assert_eq!(nominal.bytes_moved, 2 * 4 * 1000);
}

#[test]
fn test_f64_with_offset_and_portable_kernel() {
    let config = BenchConfig {
        element_width: ElementWidth::Eight,
        offset_bytes: 8,
        vector_width: None,
        kernel: KernelChoice::Portable,
        ..small_config(2, 2048)
    };
    let report = run_benchmark(&config).unwrap();

    assert_eq!(report.element_type, "f64");
    assert_eq!(report.kernel, "portable");
    assert_eq!(report.processed_elements, 2048);
}

#[test]
fn test_scatter_map_assigns_cpus() {
    let config = BenchConfig {
        cpu_map: CpuMapConfig::Scatter(ScatterMap {
            groups: 2,
            stride: 2,
            base: 0,
            total: 4,
        }),
        ..small_config(4, 4096)
    };
    let bench = Benchmark::<f32>::new(&config).unwrap();
    let cpus: Vec<_> = bench.partitions().iter().map(|p| p.cpu).collect();
    assert_eq!(cpus, vec![0, 2, 1, 3]);
}

#[test]
fn test_invalid_config_is_reported() {
    let config = BenchConfig {
        repetitions: 1,
        ..small_config(1, 1024)
    };
    match run_benchmark(&config) {
        Err(BenchError::Config(ConfigError::TooFewRepetitions { repetitions, warmup })) => {
            assert_eq!((repetitions, warmup), (1, 1));
        }
        other => panic!("expected a configuration error, got {:?}", other.map(|r| r.bandwidth_mbs)),
    }
}

#[test]
fn test_json_report() {
    let report = run_benchmark(&small_config(2, 2048)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(value["threads"], 2);
    assert_eq!(value["trials"].as_array().unwrap().len(), 4);
    assert_eq!(value["partitions"][1]["start"], 1024);
}
