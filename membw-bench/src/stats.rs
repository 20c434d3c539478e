//! Trial time reduction
//!
//! The first `warmup` trials are discarded; the rest feed a running
//! sum/min/max. Bandwidth is computed from the minimum, the least perturbed
//! sample.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialStats {
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl Default for TrialStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TrialStats {
    pub const fn new() -> Self {
        Self {
            sum: 0.0,
            min: f64::MAX,
            max: 0.0,
            count: 0,
        }
    }

    pub fn observe(&mut self, time: f64) {
        self.sum += time;
        self.min = self.min.min(time);
        self.max = self.max.max(time);
        self.count += 1;
    }

    /// Mean of the observed times, 0 when nothing was observed.
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Reduces a full sequence of trial times, skipping the first `warmup`.
    pub fn from_times(times: &[f64], warmup: usize) -> Self {
        let mut reducer = Reducer::new(warmup);
        for &t in times {
            reducer.push(t);
        }
        reducer.finish()
    }
}

/// Incremental reducer that drops the warm-up trials.
#[derive(Debug, Clone)]
pub struct Reducer {
    warmup: usize,
    seen: usize,
    stats: TrialStats,
}

impl Reducer {
    pub fn new(warmup: usize) -> Self {
        Self {
            warmup,
            seen: 0,
            stats: TrialStats::new(),
        }
    }

    /// Feeds the next trial time; returns whether it was counted.
    pub fn push(&mut self, time: f64) -> bool {
        self.seen += 1;
        if self.seen <= self.warmup {
            log::debug!("discarding warm-up trial {} ({:.6}s)", self.seen, time);
            return false;
        }
        self.stats.observe(time);
        true
    }

    pub fn stats(&self) -> &TrialStats {
        &self.stats
    }

    pub fn finish(self) -> TrialStats {
        self.stats
    }
}

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
