//! Domain models: identifiers, courseware, navigation, completion and
//! configuration.

/// Frame notifications, progress snapshots and reconciliation status.
pub mod completion;
/// Configuration model.
pub mod config;
/// Courses, sequences, units and loaded state.
pub mod courseware;
/// Opaque identifiers.
pub mod ids;
/// Navigation targets, redirects and phases.
pub mod navigation;

pub use completion::{
    CompletionDisplay, CompletionNotification, FrameEnvelope, ProgressSnapshot,
    ReconciliationState, ReconciliationStatus,
};
pub use config::{Config, LmsConfig, LoggingConfig, ReconciliationConfig};
pub use courseware::{Course, CoursewareState, LoadStatus, Sequence, Unit};
pub use ids::{CourseRef, SequenceRef, UnitRef};
pub use navigation::{ExternalReason, NavigationPhase, NavigationTarget, Redirect, RouteDecision};
