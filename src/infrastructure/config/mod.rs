//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading
//! - Environment variable overrides
//! - Configuration validation

/// Figment-backed loader and validation.
pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
