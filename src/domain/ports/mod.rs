//! Port trait definitions (Hexagonal Architecture)
//!
//! Interfaces the services depend on and adapters implement:
//! - ProgressClient: authoritative grade/progress record
//! - CoursewareApi: course and sequence metadata, block completion
//! - PositionClient: saved sequence position
//! - Navigator: route replacement and external redirects
//! - PollScheduler: delays between convergence polls

/// Courseware metadata, completion checks and position saves.
pub mod courseware_api;
/// Routing.
pub mod navigator;
/// Authoritative progress.
pub mod progress_client;
/// Poll delays.
pub mod scheduler;

pub use courseware_api::{CourseOutline, CoursewareApi, PositionClient, SequenceMetadata};
pub use navigator::Navigator;
pub use progress_client::ProgressClient;
pub use scheduler::{PollScheduler, TokioScheduler};
