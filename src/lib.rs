//! Courseware - learner navigation and completion reconciliation
//!
//! Decides which unit of a course a learner should see, keeps their saved
//! position in step with the LMS, and reconciles completion messages from
//! embedded graded activities against the authoritative progress record.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): navigation state machine, position
//!   persistence, completion reconciliation and the session tying them together
//! - **Adapters** (`adapters`): LMS HTTP client and in-memory test doubles
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use courseware::services::{CoursewareSession, SessionPorts};
//!
//! let mut session = CoursewareSession::new(ports, &config);
//! let outcome = session.route_changed(NavigationTarget::course(course)).await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    CompletionDisplay, CompletionNotification, Config, CourseRef, NavigationTarget,
    ProgressSnapshot, ReconciliationState, ReconciliationStatus, Redirect, RouteDecision,
    SequenceRef, UnitRef,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    CoursewareSession, NavigationStateMachine, ReconciliationEngine, ReconciliationHandle,
    SessionPorts,
};
