//! Logging initialization (`log` facade + `env_logger` backend).

mod init;

pub use init::{init_logging, LoggingConfig};
