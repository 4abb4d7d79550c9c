//! Request-scoped structured logging.

pub mod level;
pub mod logger;
pub mod middleware;

pub use level::{LogLevel, ParseLevelError};
pub use logger::{ServiceLogger, get_logger};
pub use middleware::{LoggingLayer, LoggingService};
