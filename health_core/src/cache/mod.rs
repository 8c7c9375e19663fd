pub mod memory;

pub use memory::{CacheEntry, CacheManager, CacheStats};
