//! Load statistics - percentiles, throughput and degradation heuristics
//!
//! Metrics are derived once from a finished sample buffer; nothing here is
//! updated incrementally.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Trailing-third mean latency above this multiple of the leading third is degradation
pub const LATENCY_DEGRADATION_FACTOR: f64 = 1.5;

/// Share of memory transitions that may be increases before growth is flagged
pub const MEMORY_GROWTH_RATIO: f64 = 0.7;

/// One request's outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub latency: Duration,
    pub success: bool,
}

/// Child process resource usage at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceSample {
    pub memory_mb: f64,
    pub cpu_pct: f64,
}

/// Summary of one load run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub concurrency: usize,
    pub requests: usize,
    pub successes: usize,
    pub failures: usize,
    pub duration_secs: f64,
    pub rps: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub error_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_pct: Option<f64>,
}

impl PerformanceMetrics {
    /// Summarise a finished run. `wall` is the run's elapsed wall-clock time.
    pub fn from_samples(samples: &[Sample], wall: Duration, concurrency: usize) -> Self {
        let requests = samples.len();
        let successes = samples.iter().filter(|s| s.success).count();
        let failures = requests - successes;

        let mut latencies: Vec<f64> = samples.iter().map(|s| millis(s.latency)).collect();
        latencies.sort_by(f64::total_cmp);

        let duration_secs = wall.as_secs_f64();
        let rps = if duration_secs > 0.0 {
            requests as f64 / duration_secs
        } else {
            0.0
        };
        let error_rate = if requests > 0 {
            failures as f64 / requests as f64
        } else {
            0.0
        };

        Self {
            concurrency,
            requests,
            successes,
            failures,
            duration_secs,
            rps,
            mean_ms: mean(&latencies),
            median_ms: percentile(&latencies, 50),
            p95_ms: percentile(&latencies, 95),
            p99_ms: percentile(&latencies, 99),
            min_ms: latencies.first().copied().unwrap_or(0.0),
            max_ms: latencies.last().copied().unwrap_or(0.0),
            error_rate,
            memory_mb: None,
            cpu_pct: None,
        }
    }

    pub fn with_resources(mut self, resources: Option<ResourceSample>) -> Self {
        if let Some(r) = resources {
            self.memory_mb = Some(r.memory_mb);
            self.cpu_pct = Some(r.cpu_pct);
        }
        self
    }
}

/// Nearest-rank percentile over an ascending slice; 0 when empty
pub fn percentile(sorted: &[f64], p: u32) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let p = p.clamp(1, 100) as usize;
    let rank = (sorted.len() * p).div_ceil(100).max(1);
    sorted[rank - 1]
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// One concurrency level of a stress run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressStep {
    pub concurrency: usize,
    pub metrics: PerformanceMetrics,
    pub broke: bool,
}

/// Outcome of a stress run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub steps: Vec<StressStep>,
    /// Concurrency at which a threshold was first exceeded
    pub breaking_point: Option<usize>,
    pub max_users: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StressReport {
    pub fn summary(&self) -> String {
        match (self.breaking_point, &self.reason) {
            (Some(level), Some(reason)) => {
                format!("breaking point at {} concurrent users ({})", level, reason)
            }
            (Some(level), None) => format!("breaking point at {} concurrent users", level),
            (None, _) => format!("no breaking point found up to {} users", self.max_users),
        }
    }
}

/// One sampling interval of an endurance run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnduranceSample {
    pub elapsed_secs: f64,
    pub requests: usize,
    pub failures: usize,
    pub mean_latency_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
}

/// Outcome of an endurance run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnduranceReport {
    pub duration_secs: f64,
    pub requests: usize,
    pub failures: usize,
    pub error_rate: f64,
    pub samples: Vec<EnduranceSample>,
    pub leading_mean_ms: f64,
    pub trailing_mean_ms: f64,
    pub latency_degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_increase_ratio: Option<f64>,
    pub memory_growth: bool,
}

impl EnduranceReport {
    pub fn from_samples(samples: Vec<EnduranceSample>, wall: Duration) -> Self {
        let requests = samples.iter().map(|s| s.requests).sum();
        let failures = samples.iter().map(|s| s.failures).sum();
        let error_rate = if requests > 0 {
            failures as f64 / requests as f64
        } else {
            0.0
        };

        let latencies: Vec<f64> = samples
            .iter()
            .filter(|s| s.requests > 0)
            .map(|s| s.mean_latency_ms)
            .collect();
        let trend = latency_trend(&latencies);

        let memory: Vec<f64> = samples.iter().filter_map(|s| s.memory_mb).collect();
        let memory_increase_ratio = memory_increase_ratio(&memory);

        Self {
            duration_secs: wall.as_secs_f64(),
            requests,
            failures,
            error_rate,
            samples,
            leading_mean_ms: trend.map(|t| t.0).unwrap_or(0.0),
            trailing_mean_ms: trend.map(|t| t.1).unwrap_or(0.0),
            latency_degraded: trend.is_some_and(|(lead, trail)| {
                lead > 0.0 && trail > lead * LATENCY_DEGRADATION_FACTOR
            }),
            memory_increase_ratio,
            memory_growth: memory_increase_ratio.is_some_and(|r| r > MEMORY_GROWTH_RATIO),
        }
    }

    pub fn degraded(&self) -> bool {
        self.latency_degraded || self.memory_growth
    }
}

/// Mean of the leading and trailing thirds; needs at least three values
pub fn latency_trend(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 3 {
        return None;
    }
    let third = values.len() / 3;
    let leading = mean(&values[..third]);
    let trailing = mean(&values[values.len() - third..]);
    Some((leading, trailing))
}

/// Fraction of sample-to-sample transitions that increase; needs at least three values
pub fn memory_increase_ratio(values: &[f64]) -> Option<f64> {
    if values.len() < 3 {
        return None;
    }
    let transitions = values.len() - 1;
    let increases = values.windows(2).filter(|w| w[1] > w[0]).count();
    Some(increases as f64 / transitions as f64)
}
