//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - pretty or JSON console output on stderr
//! - JSON rolling files through tracing-appender

/// Subscriber setup.
pub mod logger;

pub use logger::LoggerImpl;
