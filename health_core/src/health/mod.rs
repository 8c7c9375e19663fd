pub mod checks;
pub mod probe;
pub mod resolver;
pub mod status;


pub use checks::{FilesystemProbe, FnProbe, TcpProbe};
pub use probe::{Probe, ProbeCatalog, ProbeKey, ProbeReport};
pub use resolver::{DependencyResolver, SweepKind, SweepSummary};
pub use status::{HealthStatus, IntegrationHealth, ModuleStatus};
