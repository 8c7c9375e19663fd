//! Platform gauges backed by sysinfo

use crate::collaborators::SystemGauges;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sysinfo::System;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_usage_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub memory_usage_percent: f64,
    pub cpu_count: usize,
}

struct CpuSample {
    usage_percent: f32,
    count: usize,
}

struct MemorySample {
    used_bytes: u64,
    total_bytes: u64,
}

impl MemorySample {
    fn usage_percent(&self) -> f64 {
        if self.total_bytes > 0 {
            (self.used_bytes as f64 / self.total_bytes as f64) * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Clone)]
pub struct SystemMonitor {
    system: Arc<Mutex<System>>,
}

impl SystemMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();

        Self {
            system: Arc::new(Mutex::new(system)),
        }
    }

    fn sample_cpu(&self) -> CpuSample {
        let mut system = self.system.lock();
        system.refresh_cpu();
        CpuSample {
            usage_percent: system.global_cpu_info().cpu_usage(),
            count: system.cpus().len(),
        }
    }

    fn sample_memory(&self) -> MemorySample {
        let mut system = self.system.lock();
        system.refresh_memory();
        MemorySample {
            used_bytes: system.used_memory(),
            total_bytes: system.total_memory(),
        }
    }

    pub fn resource_usage(&self) -> ResourceUsage {
        let cpu = self.sample_cpu();
        let memory = self.sample_memory();

        let usage = ResourceUsage {
            cpu_usage_percent: cpu.usage_percent,
            memory_used_bytes: memory.used_bytes,
            memory_total_bytes: memory.total_bytes,
            memory_usage_percent: memory.usage_percent(),
            cpu_count: cpu.count,
        };

        debug!(
            "Sampled resources: CPU {:.1}%, memory {:.1}%",
            usage.cpu_usage_percent, usage.memory_usage_percent
        );
        usage
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Each gauge refreshes only the resource it reports.
impl SystemGauges for SystemMonitor {
    /// Global CPU utilisation stands in for system load.
    fn system_load(&self) -> Option<f64> {
        let cpu = self.sample_cpu();
        if cpu.count == 0 {
            return None;
        }
        Some(f64::from(cpu.usage_percent).clamp(0.0, 100.0))
    }

    fn memory_usage_percent(&self) -> Option<f64> {
        let memory = self.sample_memory();
        if memory.total_bytes == 0 {
            return None;
        }
        Some(memory.usage_percent().clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_usage_is_sane() {
        let monitor = SystemMonitor::new();
        let usage = monitor.resource_usage();

        assert!(usage.cpu_usage_percent >= 0.0);
        assert!(usage.memory_usage_percent >= 0.0 && usage.memory_usage_percent <= 100.0);
    }

    #[test]
    fn test_gauges_stay_in_range() {
        let monitor = SystemMonitor::new();

        if let Some(load) = monitor.system_load() {
            assert!((0.0..=100.0).contains(&load));
        }
        if let Some(memory) = monitor.memory_usage_percent() {
            assert!((0.0..=100.0).contains(&memory));
        }
    }

    #[test]
    fn test_memory_percent_from_sample() {
        let half = MemorySample {
            used_bytes: 512,
            total_bytes: 1024,
        };
        assert_eq!(half.usage_percent(), 50.0);

        let unknown = MemorySample {
            used_bytes: 0,
            total_bytes: 0,
        };
        assert_eq!(unknown.usage_percent(), 0.0);
    }
}
