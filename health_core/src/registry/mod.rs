pub mod graph;
pub mod integrations;
pub mod manifest;
pub mod modules;

pub use integrations::{IntegrationCheck, IntegrationDescriptor, IntegrationRecord, IntegrationRegistry};
pub use manifest::{ModuleDefinition, ModuleManifest};
pub use modules::{ModuleCheck, ModuleRecord, ModuleRegistry};
