//! Load, stress and endurance drivers
//!
//! Workers are plain futures joined on the calling task and gated by a
//! semaphore; every request is a sequential round-trip on the shared exchange.

use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::monitor::ResourceMonitor;
use super::stats::{
    mean, EnduranceReport, EnduranceSample, PerformanceMetrics, Sample, StressReport, StressStep,
};
use crate::config::HarnessConfig;
use crate::protocol::jsonrpc::{validate_envelope, ResponseBody};
use crate::transport::{Exchange, Reply, Roundtrip};

/// Parameters of one load run
#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub concurrency: usize,
    pub requests_per_worker: usize,
    pub ramp_up: Duration,
    pub think_time: Duration,
    pub timeout: Duration,
    pub method: String,
    pub params: Option<Value>,
}

impl LoadPlan {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            concurrency: config.load.concurrency,
            requests_per_worker: config.load.requests_per_worker,
            ramp_up: config.ramp_up(),
            think_time: config.think_time(),
            timeout: config.timeout(),
            method: config.load.method.clone(),
            params: config.load.params.clone(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_requests_per_worker(mut self, requests: usize) -> Self {
        self.requests_per_worker = requests;
        self
    }

    /// Start delay for worker `index`
    fn stagger(&self, index: usize) -> Duration {
        if self.concurrency == 0 || self.ramp_up.is_zero() {
            return Duration::ZERO;
        }
        self.ramp_up.mul_f64(index as f64 / self.concurrency as f64)
    }
}

/// A round-trip counts as a success only with an in-time, well-formed result
pub fn is_success(roundtrip: &Roundtrip) -> bool {
    roundtrip
        .reply
        .as_ref()
        .and_then(Reply::as_json)
        .is_some_and(|v| matches!(validate_envelope(v, &roundtrip.id), Ok(ResponseBody::Result(_))))
}

async fn one_request(exchange: &dyn Exchange, plan: &LoadPlan) -> Sample {
    let started = Instant::now();
    match exchange
        .send(&plan.method, plan.params.clone(), plan.timeout)
        .await
    {
        Ok(roundtrip) => Sample {
            latency: roundtrip.elapsed,
            success: is_success(&roundtrip),
        },
        Err(e) => {
            debug!("Load request failed: {}", e);
            Sample {
                latency: started.elapsed(),
                success: false,
            }
        }
    }
}

async fn worker(
    exchange: &dyn Exchange,
    plan: &LoadPlan,
    semaphore: &Semaphore,
    index: usize,
) -> Vec<Sample> {
    let delay = plan.stagger(index);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let Ok(_permit) = semaphore.acquire().await else {
        return Vec::new();
    };

    let mut samples = Vec::with_capacity(plan.requests_per_worker);
    for n in 0..plan.requests_per_worker {
        samples.push(one_request(exchange, plan).await);
        if !plan.think_time.is_zero() && n + 1 < plan.requests_per_worker {
            tokio::time::sleep(plan.think_time).await;
        }
    }
    samples
}

/// Run `plan.concurrency` workers to completion and summarise them
pub async fn run_load(exchange: &dyn Exchange, plan: &LoadPlan) -> PerformanceMetrics {
    debug!(
        "Load run: {} workers x {} requests of {}",
        plan.concurrency, plan.requests_per_worker, plan.method
    );

    let mut monitor = ResourceMonitor::for_pid(exchange.pid());
    let semaphore = Semaphore::new(plan.concurrency.max(1));
    let started = Instant::now();

    let per_worker = join_all(
        (0..plan.concurrency).map(|index| worker(exchange, plan, &semaphore, index)),
    )
    .await;

    let wall = started.elapsed();
    let samples: Vec<Sample> = per_worker.into_iter().flatten().collect();
    let resources = monitor.as_mut().and_then(ResourceMonitor::sample);

    PerformanceMetrics::from_samples(&samples, wall, plan.concurrency).with_resources(resources)
}

/// Why a stress step counts as broken, if it does
fn threshold_breach(metrics: &PerformanceMetrics, config: &HarnessConfig) -> Option<String> {
    if metrics.error_rate > config.stress.failure_threshold {
        return Some(format!(
            "error rate {:.1}% above {:.1}%",
            metrics.error_rate * 100.0,
            config.stress.failure_threshold * 100.0
        ));
    }
    if metrics.p95_ms > config.stress.latency_threshold_ms {
        return Some(format!(
            "p95 latency {:.1}ms above {:.1}ms",
            metrics.p95_ms, config.stress.latency_threshold_ms
        ));
    }
    None
}

/// Step concurrency up by `increment` until a threshold breaks or `max_users` is reached
pub async fn run_stress(exchange: &dyn Exchange, config: &HarnessConfig) -> StressReport {
    let increment = config.stress.increment.max(1);
    let max_users = config.stress.max_users;
    let base = LoadPlan::from_config(config)
        .with_requests_per_worker(config.stress.requests_per_worker);

    let mut steps = Vec::new();
    let mut breaking_point = None;
    let mut reason = None;

    let mut level = increment.min(max_users.max(1));
    while level <= max_users {
        let plan = base.clone().with_concurrency(level);
        let metrics = run_load(exchange, &plan).await;
        let breach = threshold_breach(&metrics, config);
        info!(
            "Stress step {} users: {:.1} rps, p95 {:.1}ms, errors {:.1}%",
            level,
            metrics.rps,
            metrics.p95_ms,
            metrics.error_rate * 100.0
        );

        steps.push(StressStep {
            concurrency: level,
            metrics,
            broke: breach.is_some(),
        });

        if breach.is_some() {
            breaking_point = Some(level);
            reason = breach;
            break;
        }
        level += increment;
    }

    StressReport {
        steps,
        breaking_point,
        max_users,
        reason,
    }
}

fn close_window(
    window: &mut Vec<Sample>,
    elapsed: Duration,
    monitor: Option<&mut ResourceMonitor>,
) -> EnduranceSample {
    let latencies: Vec<f64> = window
        .iter()
        .map(|s| s.latency.as_secs_f64() * 1000.0)
        .collect();
    let sample = EnduranceSample {
        elapsed_secs: elapsed.as_secs_f64(),
        requests: window.len(),
        failures: window.iter().filter(|s| !s.success).count(),
        mean_latency_ms: mean(&latencies),
        memory_mb: monitor.and_then(|m| m.sample()).map(|r| r.memory_mb),
    };
    window.clear();
    sample
}

/// Issue requests at a fixed rate for the configured duration, one sample per interval
pub async fn run_endurance(exchange: &dyn Exchange, config: &HarnessConfig) -> EnduranceReport {
    let duration = config.endurance_duration();
    let interval = config.sample_interval();
    let period = Duration::from_secs_f64(1.0 / config.endurance.rate_per_sec.max(0.001));
    let plan = LoadPlan::from_config(config).with_concurrency(1);

    let mut monitor = ResourceMonitor::for_pid(exchange.pid());
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let started = Instant::now();
    let mut window_started = started;
    let mut window = Vec::new();
    let mut samples = Vec::new();

    loop {
        ticker.tick().await;
        if started.elapsed() >= duration {
            break;
        }
        window.push(one_request(exchange, &plan).await);

        if window_started.elapsed() >= interval {
            let sample = close_window(&mut window, started.elapsed(), monitor.as_mut());
            debug!(
                "Endurance sample at {:.0}s: {} requests, mean {:.1}ms",
                sample.elapsed_secs, sample.requests, sample.mean_latency_ms
            );
            samples.push(sample);
            window_started = Instant::now();
        }
    }

    if !window.is_empty() {
        samples.push(close_window(&mut window, started.elapsed(), monitor.as_mut()));
    }

    EnduranceReport::from_samples(samples, started.elapsed())
}
