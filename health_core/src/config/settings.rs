use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "health.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub thresholds: ThresholdConfig,
    pub maintenance: MaintenanceConfig,
    pub cache: CacheConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<PathBuf>,
    #[serde(default)]
    pub integrations: Vec<IntegrationEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub module_sweep_interval_ms: u64,
    pub integration_sweep_interval_ms: u64,
    pub metrics_interval_ms: u64,
    pub probe_timeout_ms: u64,
}

/// Recommendation thresholds, in percent. A value strictly above the
/// threshold triggers the rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdConfig {
    pub system_load_percent: f64,
    pub memory_usage_percent: f64,
    pub error_rate_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    pub stale_data_retention_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_size: usize,
    pub default_ttl_seconds: u64,
    pub enable_stats: bool,
}

/// An external endpoint the server binary registers and probes over TCP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrationEndpoint {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub integration_type: String,
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            module_sweep_interval_ms: 60_000,
            integration_sweep_interval_ms: 300_000,
            metrics_interval_ms: 30_000,
            probe_timeout_ms: 5_000,
        }
    }
}

impl SchedulerConfig {
    pub fn module_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.module_sweep_interval_ms)
    }

    pub fn integration_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.integration_sweep_interval_ms)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            system_load_percent: 80.0,
            memory_usage_percent: 80.0,
            error_rate_percent: 5.0,
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            stale_data_retention_days: 30,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            default_ttl_seconds: 300,
            enable_stats: true,
        }
    }
}

impl EngineConfig {
    /// Defaults, then `health.toml` if present, then `HEALTH_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&EngineConfig::default())?);

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("HEALTH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        let intervals = [
            ("module_sweep_interval_ms", self.scheduler.module_sweep_interval_ms),
            ("integration_sweep_interval_ms", self.scheduler.integration_sweep_interval_ms),
            ("metrics_interval_ms", self.scheduler.metrics_interval_ms),
            ("probe_timeout_ms", self.scheduler.probe_timeout_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Message(format!(
                    "scheduler.{} must be greater than 0",
                    name
                )));
            }
        }

        let scheduler = &self.scheduler;
        if scheduler.metrics_interval_ms >= scheduler.module_sweep_interval_ms
            || scheduler.module_sweep_interval_ms >= scheduler.integration_sweep_interval_ms
        {
            tracing::warn!(
                "Recommended interval ordering is metrics < module sweep < integration sweep (got {} / {} / {} ms)",
                scheduler.metrics_interval_ms,
                scheduler.module_sweep_interval_ms,
                scheduler.integration_sweep_interval_ms
            );
        }

        let thresholds = [
            ("system_load_percent", self.thresholds.system_load_percent),
            ("memory_usage_percent", self.thresholds.memory_usage_percent),
            ("error_rate_percent", self.thresholds.error_rate_percent),
        ];
        for (name, value) in thresholds {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Message(format!(
                    "thresholds.{} must be between 0 and 100",
                    name
                )));
            }
        }

        if self.maintenance.stale_data_retention_days == 0 {
            return Err(ConfigError::Message(
                "Stale data retention must be at least 1 day".to_string(),
            ));
        }

        if self.cache.max_size == 0 {
            return Err(ConfigError::Message(
                "Cache max size must be greater than 0".to_string(),
            ));
        }

        for endpoint in &self.integrations {
            if endpoint.id.trim().is_empty() || endpoint.address.trim().is_empty() {
                return Err(ConfigError::Message(
                    "Integration endpoints need an id and an address".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.scheduler.module_sweep_interval_ms, 60_000);
        assert_eq!(config.thresholds, ThresholdConfig::default());
        assert_eq!(config.thresholds.error_rate_percent, 5.0);
        assert_eq!(config.maintenance.stale_data_retention_days, 30);
        assert!(config.manifest_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.scheduler.metrics_interval_ms = 0;
        assert!(config.validate().is_err());

        config = EngineConfig::default();
        config.thresholds.memory_usage_percent = 120.0;
        assert!(config.validate().is_err());

        config = EngineConfig::default();
        config.maintenance.stale_data_retention_days = 0;
        assert!(config.validate().is_err());

        config = EngineConfig::default();
        config.integrations.push(IntegrationEndpoint {
            id: "stripe".to_string(),
            name: "Stripe".to_string(),
            integration_type: "payment".to_string(),
            address: String::new(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_ordering_is_only_a_recommendation() {
        let mut config = EngineConfig::default();
        config.scheduler.metrics_interval_ms = 900_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_address() {
        let mut config = EngineConfig::default();
        config.server.host = "0.0.0.0".to_string();
        config.server.port = 9000;
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
manifest_path = "modules.toml"

[scheduler]
module_sweep_interval_ms = 1000
integration_sweep_interval_ms = 5000
metrics_interval_ms = 500
probe_timeout_ms = 250

[thresholds]
system_load_percent = 90.0
memory_usage_percent = 80.0
error_rate_percent = 2.5

[[integrations]]
id = "stripe"
name = "Stripe"
type = "payment"
address = "api.stripe.com:443"
"#
        )
        .unwrap();

        let config = EngineConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.scheduler.module_sweep_interval_ms, 1000);
        assert_eq!(config.scheduler.probe_timeout(), Duration::from_millis(250));
        assert_eq!(config.thresholds.error_rate_percent, 2.5);
        assert_eq!(config.manifest_path, Some(PathBuf::from("modules.toml")));
        assert_eq!(config.integrations.len(), 1);
        assert_eq!(config.integrations[0].integration_type, "payment");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[scheduler]\nprobe_timeout_ms = 0").unwrap();

        assert!(EngineConfig::load_from(Some(file.path())).is_err());
    }
}
