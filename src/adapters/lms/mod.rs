//! LMS adapter: courseware metadata, progress, completion and position
//! saving over HTTP.

pub mod client;
/// Transport errors and their domain mapping.
pub mod error;
pub mod models;

pub use client::LmsClient;
pub use error::LmsError;
