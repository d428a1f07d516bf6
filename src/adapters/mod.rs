//! Infrastructure adapters for external systems.

pub mod lms;
pub mod mock;
