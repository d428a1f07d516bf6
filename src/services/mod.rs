//! Services: courseware loading, navigation, position persistence and
//! completion reconciliation, composed by `CoursewareSession`.

pub mod block_completion;
pub mod frame_bus;
pub mod loader;
pub mod navigation;
pub mod position_persistence;
pub mod position_store;
pub mod presentation;
pub mod reconciliation;
pub mod session;

pub use block_completion::BlockCompletionChecker;
pub use frame_bus::{FrameListener, FrameMessageBus};
pub use loader::CoursewareLoader;
pub use navigation::NavigationStateMachine;
pub use position_persistence::{PendingSave, PositionPersistenceHandler, PositionSave};
pub use position_store::{LoadStart, LoadTicket, SequencePositionStore};
pub use reconciliation::{ReconciliationEngine, ReconciliationHandle, ReconciliationPolicy};
pub use session::{CoursewareSession, RouteOutcome, SessionPorts};
