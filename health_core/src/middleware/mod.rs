//! Middleware for the reporting routes

pub mod accounting;
pub mod logging;

pub use accounting::record_requests;
pub use logging::with_tracing;
