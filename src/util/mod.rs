//! Utility modules for tricot

pub mod logging;

pub use logging::{init_default, init_logging, LoggingConfig};
