//! Stage timing collection.
//!
//! Every registration stage pushes its wall time in milliseconds under a
//! fixed key. The collected samples are summarized on demand.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Sampling time of one cloud.
pub const SAMPLE_DURATION_KEY: &str = "sample_duration_ms";
/// Spherical correlation time of one registration.
pub const CORRELATION_DURATION_KEY: &str = "correlation_duration_ms";
/// Translation alignment time of one registration.
pub const TRANSLATION_DURATION_KEY: &str = "translation_duration_ms";

/// Wall-clock timer.
pub struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Summary of the samples under one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticSummary {
    pub count: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Summaries of every key, in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub entries: BTreeMap<String, StatisticSummary>,
}

impl StatisticsReport {
    pub fn get(&self, key: &str) -> Option<&StatisticSummary> {
        self.entries.get(key)
    }
}

/// Named series of timing samples.
#[derive(Debug, Clone, Default)]
pub struct StatisticsManager {
    values: BTreeMap<String, Vec<f64>>,
}

impl StatisticsManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emplace_value(&mut self, key: &str, value: f64) {
        self.values.entry(key.to_string()).or_default().push(value);
    }

    /// Samples under `key`, empty if none were recorded.
    pub fn values(&self, key: &str) -> &[f64] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append every series of `other`.
    pub fn merge(&mut self, other: &StatisticsManager) {
        for (key, values) in &other.values {
            self.values
                .entry(key.clone())
                .or_default()
                .extend_from_slice(values);
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn report(&self) -> StatisticsReport {
        let entries = self
            .values
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(key, values)| {
                let count = values.len();
                let summary = StatisticSummary {
                    count,
                    mean_ms: values.iter().sum::<f64>() / count as f64,
                    min_ms: values.iter().copied().fold(f64::INFINITY, f64::min),
                    max_ms: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                };
                (key.clone(), summary)
            })
            .collect();
        StatisticsReport { entries }
    }
}

/// Time an expression and record its duration under a statistics key.
///
/// Usage:
/// ```ignore
/// let values = time_stage!(self.statistics, SAMPLE_DURATION_KEY, {
///     sampler.sample_uniformly(&cloud, &query)?
/// });
/// ```
#[macro_export]
macro_rules! time_stage {
    ($manager:expr, $key:expr, $block:expr) => {{
        let _timer = $crate::statistics::Timer::new($key);
        let result = $block;
        $manager.emplace_value($key, _timer.elapsed_ms());
        result
    }};
}
