pub mod system;

pub use system::{ResourceUsage, SystemMonitor};
