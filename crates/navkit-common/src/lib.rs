//! # NavKit Common
//!
//! Logging configuration shared by the NavKit crates and tools.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LoggingError};
