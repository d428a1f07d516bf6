//! Domain layer for courseware navigation
//!
//! This module contains the courseware models, domain errors and the port
//! traits that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
