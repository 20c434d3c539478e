//! Bandwidth computation and output formatting

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::partition::Partition;
use crate::stats::TrialStats;
use crate::trial::TrialSample;

/// Which element count the reported byte total is based on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteAccounting {
    /// Elements actually copied, `threads * chunk`
    #[default]
    Moved,
    /// Full array length, whether copied or not
    Nominal,
}

impl ByteAccounting {
    pub fn elements(self, processed: usize, element_count: usize) -> usize {
        match self {
            ByteAccounting::Moved => processed,
            ByteAccounting::Nominal => element_count,
        }
    }
}

/// One read plus one write per element.
#[inline]
pub fn bytes_moved(element_size: usize, elements: usize) -> u64 {
    2 * element_size as u64 * elements as u64
}

/// `1e-6 * bytes / min_time`, or 0 when there is nothing meaningful to
/// divide.
pub fn bandwidth_mbs(bytes: u64, min_time: f64) -> f64 {
    if bytes == 0 || !min_time.is_finite() || min_time <= 0.0 {
        return 0.0;
    }
    1.0e-6 * bytes as f64 / min_time
}

/// Everything measured by one benchmark run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub threads: usize,
    pub element_type: &'static str,
    /// `*-stream` only when every worker used streaming stores
    pub kernel: &'static str,
    pub streaming: bool,
    pub accounting: ByteAccounting,
    pub element_count: usize,
    pub processed_elements: usize,
    pub bytes_moved: u64,
    pub bandwidth_mbs: f64,
    /// No bytes were moved, or no trial took measurable time
    pub insufficient: bool,
    pub stats: TrialStats,
    pub partitions: Vec<Partition>,
    /// Every trial, warm-up included
    pub trials: Vec<TrialSample>,
}

impl BenchmarkReport {
    pub fn summary_line(&self) -> String {
        format!(
            "Threads:\t{}\tRead and write bandwidth (MB/s):\t{:12.1}",
            self.threads, self.bandwidth_mbs
        )
    }

    /// STREAM-style table with per-trial detail underneath.
    pub fn table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Function    Best Rate MB/s  Avg time     Min time     Max time"
        );
        let _ = writeln!(
            out,
            "Copy:       {:12.1}  {:11.6}  {:11.6}  {:11.6}",
            self.bandwidth_mbs,
            self.stats.avg(),
            self.stats.min,
            self.stats.max
        );
        let _ = writeln!(
            out,
            "kernel {} ({}), {} of {} elements copied",
            self.kernel, self.element_type, self.processed_elements, self.element_count
        );
        for sample in &self.trials {
            let _ = writeln!(out, "  trial {:>3}: {:11.6}s", sample.trial, sample.time);
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(bandwidth: f64) -> BenchmarkReport {
        BenchmarkReport {
            threads: 4,
            element_type: "f32",
            kernel: "portable",
            streaming: false,
            accounting: ByteAccounting::Moved,
            element_count: 1024,
            processed_elements: 1024,
            bytes_moved: bytes_moved(4, 1024),
            bandwidth_mbs: bandwidth,
            insufficient: false,
            stats: TrialStats::from_times(&[3.0, 1.0, 2.0], 1),
            partitions: Vec::new(),
            trials: Vec::new(),
        }
    }

    #[test]
    fn test_bandwidth() {
        assert_eq!(bytes_moved(4, 1000), 8000);
        assert!((bandwidth_mbs(8_000_000, 0.5) - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_bandwidth_zero_guards() {
        assert_eq!(bandwidth_mbs(0, 1.0), 0.0);
        assert_eq!(bandwidth_mbs(100, 0.0), 0.0);
        assert_eq!(bandwidth_mbs(100, -1.0), 0.0);
        assert_eq!(bandwidth_mbs(100, f64::NAN), 0.0);
    }

    #[test]
    fn test_accounting() {
        assert_eq!(ByteAccounting::Moved.elements(960, 1000), 960);
        assert_eq!(ByteAccounting::Nominal.elements(960, 1000), 1000);
        assert_eq!(ByteAccounting::default(), ByteAccounting::Moved);
    }

    #[test]
    fn test_summary_line_format() {
        assert_eq!(
            report(12345.678).summary_line(),
            "Threads:\t4\tRead and write bandwidth (MB/s):\t     12345.7"
        );
        assert_eq!(
            report(0.0).summary_line(),
            "Threads:\t4\tRead and write bandwidth (MB/s):\t         0.0"
        );
    }

    #[test]
    fn test_table() {
        let table = report(100.0).table();
        let mut lines = table.lines();
        assert!(lines.next().unwrap().starts_with("Function    Best Rate MB/s"));
        let copy = lines.next().unwrap();
        assert!(copy.starts_with("Copy:"));
        assert!(copy.contains("1.500000"));
    }

    #[test]
    fn test_json() {
        let json = report(42.0).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["threads"], 4);
        assert_eq!(value["accounting"], "moved");
        assert_eq!(value["streaming"], false);
        assert_eq!(value["bandwidth_mbs"], 42.0);
        assert_eq!(value["stats"]["count"], 2);
    }
}
