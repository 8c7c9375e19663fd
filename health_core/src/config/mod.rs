pub mod settings;

pub use settings::{
    CacheConfig, EngineConfig, IntegrationEndpoint, MaintenanceConfig, SchedulerConfig,
    ServerConfig, ThresholdConfig,
};
