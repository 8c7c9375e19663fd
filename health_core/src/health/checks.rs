//! Built-in probes for common module and integration checks

use super::probe::{Probe, ProbeReport};
use super::status::HealthStatus;
use crate::{EngineError, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::net::TcpStream;

/// Wraps a synchronous closure. `Ok(message)` is healthy, `Err` is a probe failure.
pub struct FnProbe {
    check_fn: Box<dyn Fn() -> Result<String> + Send + Sync>,
}

impl FnProbe {
    pub fn new<F>(check_fn: F) -> Self
    where
        F: Fn() -> Result<String> + Send + Sync + 'static,
    {
        Self {
            check_fn: Box::new(check_fn),
        }
    }
}

#[async_trait::async_trait]
impl Probe for FnProbe {
    async fn probe(&self, id: &str) -> Result<ProbeReport> {
        let start = Instant::now();

        match (self.check_fn)() {
            Ok(message) => Ok(ProbeReport::healthy()
                .with_response_time(start.elapsed().as_millis() as u64)
                .with_details(serde_json::json!({ "message": message }))),
            Err(e) => Err(EngineError::probe(id, e.to_string())),
        }
    }
}

/// Checks that every path exists, is readable and is writable.
/// Some paths failing is degraded, all of them failing is unhealthy.
pub struct FilesystemProbe {
    paths: Vec<PathBuf>,
}

impl FilesystemProbe {
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    async fn is_writable(path: &Path) -> bool {
        let dir = if path.is_dir() {
            Some(path)
        } else {
            path.parent()
        };

        let Some(dir) = dir else {
            return false;
        };

        let temp_file = dir.join(".health_probe_temp");
        match fs::write(&temp_file, "probe").await {
            Ok(_) => {
                let _ = fs::remove_file(&temp_file).await;
                true
            }
            Err(_) => false,
        }
    }
}

#[async_trait::async_trait]
impl Probe for FilesystemProbe {
    async fn probe(&self, _id: &str) -> Result<ProbeReport> {
        let start = Instant::now();
        let mut issues = Vec::new();
        let mut failed_paths = 0usize;
        let mut details = serde_json::Map::new();

        for path in &self.paths {
            let key = path.display().to_string();

            if !path.exists() {
                issues.push(format!("Path does not exist: {}", key));
                failed_paths += 1;
                details.insert(key, serde_json::json!({
                    "exists": false,
                    "readable": false,
                    "writable": false
                }));
                continue;
            }

            let readable = fs::metadata(path).await.is_ok();
            let writable = Self::is_writable(path).await;

            if !readable {
                issues.push(format!("Cannot read path: {}", key));
            }
            if !writable {
                issues.push(format!("Cannot write to path: {}", key));
            }
            if !readable || !writable {
                failed_paths += 1;
            }

            details.insert(key, serde_json::json!({
                "exists": true,
                "readable": readable,
                "writable": writable
            }));
        }

        let status = if failed_paths == 0 {
            HealthStatus::Healthy
        } else if failed_paths < self.paths.len() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };

        Ok(ProbeReport::new(status)
            .with_response_time(start.elapsed().as_millis() as u64)
            .with_details(serde_json::json!({
                "paths": details,
                "issues": issues
            })))
    }
}

/// Opens a TCP connection to an external endpoint. Slow connects are degraded.
pub struct TcpProbe {
    address: String,
    slow_threshold: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            slow_threshold: Duration::from_millis(1000),
        }
    }

    pub fn with_slow_threshold(mut self, slow_threshold: Duration) -> Self {
        self.slow_threshold = slow_threshold;
        self
    }
}

#[async_trait::async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, id: &str) -> Result<ProbeReport> {
        let start = Instant::now();

        match TcpStream::connect(&self.address).await {
            Ok(_) => {
                let elapsed = start.elapsed();
                let status = if elapsed > self.slow_threshold {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                };

                Ok(ProbeReport::new(status)
                    .with_response_time(elapsed.as_millis() as u64)
                    .with_details(serde_json::json!({
                        "address": self.address,
                        "connect_time_ms": elapsed.as_millis() as u64,
                        "threshold_ms": self.slow_threshold.as_millis() as u64
                    })))
            }
            Err(e) => Err(EngineError::probe(
                id,
                format!("connection to {} failed: {}", self.address, e),
            )),
        }
    }
}
