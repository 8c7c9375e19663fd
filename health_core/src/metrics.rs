//! Process-wide request counters and platform gauges

use crate::collaborators::{SecurityPosture, SecuritySnapshot, SystemGauges};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{debug, warn};

const RESPONSE_TIME_WINDOW: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemMetrics {
    pub uptime_start: DateTime<Utc>,
    pub uptime_ms: i64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time_ms: f64,
    pub system_load: f64,
    pub memory_usage: f64,
    pub error_rate: f64,
    pub security: SecuritySnapshot,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct GaugeReadings {
    system_load: f64,
    memory_usage: f64,
    security: SecuritySnapshot,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Counters are only ever zeroed by [`MetricsAggregator::reset`]. Error rate
/// and average response time are derived from them on every read; gauges
/// and the security posture are sampled by [`MetricsAggregator::snapshot`].
#[derive(Clone)]
pub struct MetricsAggregator {
    total_requests: Arc<AtomicU64>,
    successful_requests: Arc<AtomicU64>,
    failed_requests: Arc<AtomicU64>,
    response_times: Arc<RwLock<VecDeque<u64>>>,
    uptime_start: Arc<RwLock<DateTime<Utc>>>,
    readings: Arc<RwLock<GaugeReadings>>,
    gauges: Option<Arc<dyn SystemGauges>>,
    security: Option<Arc<dyn SecurityPosture>>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            total_requests: Arc::new(AtomicU64::new(0)),
            successful_requests: Arc::new(AtomicU64::new(0)),
            failed_requests: Arc::new(AtomicU64::new(0)),
            response_times: Arc::new(RwLock::new(VecDeque::with_capacity(RESPONSE_TIME_WINDOW))),
            uptime_start: Arc::new(RwLock::new(Utc::now())),
            readings: Arc::new(RwLock::new(GaugeReadings::default())),
            gauges: None,
            security: None,
        }
    }

    pub fn with_gauges(mut self, gauges: Option<Arc<dyn SystemGauges>>) -> Self {
        self.gauges = gauges;
        self
    }

    pub fn with_security(mut self, security: Option<Arc<dyn SecurityPosture>>) -> Self {
        self.security = security;
        self
    }

    pub fn record_request(&self, success: bool, duration_ms: u64) {
        self.total_requests.fetch_add(1, Ordering::SeqCst);
        if success {
            self.successful_requests.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed_requests.fetch_add(1, Ordering::SeqCst);
        }

        let mut times = self.response_times.write();
        if times.len() == RESPONSE_TIME_WINDOW {
            times.pop_front();
        }
        times.push_back(duration_ms);
    }

    /// Samples gauges and security posture, then returns the full record.
    pub async fn snapshot(&self) -> SystemMetrics {
        let (system_load, memory_usage) = match &self.gauges {
            Some(gauges) => (
                percent(gauges.system_load()),
                percent(gauges.memory_usage_percent()),
            ),
            None => (0.0, 0.0),
        };

        let security = match &self.security {
            Some(source) => match source.security_snapshot().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Security posture unavailable: {}", e);
                    SecuritySnapshot::unavailable()
                }
            },
            None => SecuritySnapshot::unavailable(),
        };

        {
            let mut readings = self.readings.write();
            readings.system_load = system_load;
            readings.memory_usage = memory_usage;
            readings.security = security;
            readings.refreshed_at = Some(Utc::now());
        }

        let metrics = self.current();
        debug!(
            "Refreshed metrics: load {:.1}%, memory {:.1}%, error rate {:.2}%",
            metrics.system_load, metrics.memory_usage, metrics.error_rate
        );
        metrics
    }

    /// The record as of the last snapshot, with counters read live.
    pub fn current(&self) -> SystemMetrics {
        // failed before total keeps failed <= total under concurrent increments
        let failed = self.failed_requests.load(Ordering::SeqCst);
        let successful = self.successful_requests.load(Ordering::SeqCst);
        let total = self.total_requests.load(Ordering::SeqCst);

        let average_response_time_ms = {
            let times = self.response_times.read();
            if times.is_empty() {
                0.0
            } else {
                times.iter().map(|t| *t as f64).sum::<f64>() / times.len() as f64
            }
        };

        let uptime_start = *self.uptime_start.read();
        let readings = self.readings.read().clone();

        SystemMetrics {
            uptime_start,
            uptime_ms: (Utc::now() - uptime_start).num_milliseconds().max(0),
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            average_response_time_ms,
            system_load: readings.system_load,
            memory_usage: readings.memory_usage,
            error_rate: error_rate(total, failed),
            security: readings.security,
            refreshed_at: readings.refreshed_at,
        }
    }

    pub fn uptime_ms(&self) -> i64 {
        (Utc::now() - *self.uptime_start.read()).num_milliseconds().max(0)
    }

    /// Zeroes every counter and restarts the uptime clock. Gauge readings
    /// are kept until the next snapshot.
    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::SeqCst);
        self.successful_requests.store(0, Ordering::SeqCst);
        self.failed_requests.store(0, Ordering::SeqCst);
        self.response_times.write().clear();
        *self.uptime_start.write() = Utc::now();
        debug!("Metrics counters reset");
    }
}

impl std::fmt::Debug for MetricsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsAggregator")
            .field("total_requests", &self.total_requests.load(Ordering::Relaxed))
            .field("gauges", &self.gauges.is_some())
            .field("security", &self.security.is_some())
            .finish()
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentage of failed requests; zero when nothing was recorded.
pub fn error_rate(total: u64, failed: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (failed.min(total) as f64 / total as f64) * 100.0
    }
}

fn percent(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 100.0),
        _ => 0.0,
    }
}
