//! Courseware session: one learner's route, the units it displays, and the
//! reconciliation engine attached to the displayed gated activity.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CompletionDisplay, Config, NavigationPhase, NavigationTarget, ProgressSnapshot, Redirect,
    ReconciliationStatus, RouteDecision, SequenceRef, UnitRef,
};
use crate::domain::ports::{CoursewareApi, Navigator, PollScheduler, PositionClient, ProgressClient};
use crate::services::block_completion::BlockCompletionChecker;
use crate::services::frame_bus::FrameMessageBus;
use crate::services::loader::CoursewareLoader;
use crate::services::navigation::NavigationStateMachine;
use crate::services::position_persistence::{PendingSave, PositionPersistenceHandler};
use crate::services::position_store::SequencePositionStore;
use crate::services::reconciliation::{
    ReconciliationEngine, ReconciliationHandle, ReconciliationPolicy,
};

/// Internal redirects followed for a single route change.
const MAX_REDIRECT_HOPS: usize = 8;

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct SessionPorts {
    /// Course and sequence metadata, completion checks.
    pub courseware: Arc<dyn CoursewareApi>,
    /// Saved positions.
    pub positions: Arc<dyn PositionClient>,
    /// Authoritative progress for reconciliation.
    pub progress: Arc<dyn ProgressClient>,
    /// Where redirects go.
    pub navigator: Arc<dyn Navigator>,
    /// Poll delays.
    pub scheduler: Arc<dyn PollScheduler>,
}

/// Result of handling a route change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Redirects issued, in order.
    pub redirects: Vec<Redirect>,
    /// Where the route ended up.
    pub target: NavigationTarget,
    /// Final decision for that route.
    pub decision: RouteDecision,
}

impl RouteOutcome {
    /// Unit on screen, if the route resolved to one.
    pub fn displayed_unit(&self) -> Option<&UnitRef> {
        match &self.decision {
            RouteDecision::Display(unit) => Some(unit),
            _ => None,
        }
    }
}

/// One learner browsing one course: routing, position saves and completion
/// reconciliation for the displayed unit.
pub struct CoursewareSession {
    ports: SessionPorts,
    store: Arc<SequencePositionStore>,
    loader: CoursewareLoader,
    machine: NavigationStateMachine,
    persistence: PositionPersistenceHandler,
    completion: BlockCompletionChecker,
    policy: ReconciliationPolicy,
    bus: FrameMessageBus,
    target: Option<NavigationTarget>,
    engine: Option<ReconciliationHandle>,
    last_persisted: Option<(SequenceRef, usize)>,
}

impl CoursewareSession {
    /// Session with a fresh store.
    pub fn new(ports: SessionPorts, config: &Config) -> Self {
        Self::with_store(ports, config, Arc::new(SequencePositionStore::new()))
    }

    /// Session over an existing store.
    pub fn with_store(ports: SessionPorts, config: &Config, store: Arc<SequencePositionStore>) -> Self {
        Self {
            loader: CoursewareLoader::new(Arc::clone(&ports.courseware), Arc::clone(&store)),
            machine: NavigationStateMachine::new(config.lms.normalized_base_url()),
            persistence: PositionPersistenceHandler::new(
                Arc::clone(&ports.positions),
                Arc::clone(&store),
            ),
            completion: BlockCompletionChecker::new(Arc::clone(&ports.courseware), Arc::clone(&store)),
            policy: ReconciliationPolicy::from(&config.reconciliation),
            bus: FrameMessageBus::new(),
            target: None,
            engine: None,
            last_persisted: None,
            ports,
            store,
        }
    }

    /// Shared courseware state.
    pub fn store(&self) -> &Arc<SequencePositionStore> {
        &self.store
    }

    /// Message channel embedded frames post to.
    pub fn bus(&self) -> &FrameMessageBus {
        &self.bus
    }

    /// Route the session currently sits on.
    pub fn target(&self) -> Option<&NavigationTarget> {
        self.target.as_ref()
    }

    /// Navigation phase of the current route.
    pub async fn phase(&self) -> Option<NavigationPhase> {
        let target = self.target.as_ref()?;
        Some(self.machine.phase(&self.store.snapshot().await, target))
    }

    /// Handle a new route: load what it needs, follow internal redirects,
    /// and display the unit it resolves to.
    ///
    /// A failed redirect is returned to the caller and not retried.
    #[instrument(skip(self), fields(target = %target))]
    pub async fn route_changed(&mut self, target: NavigationTarget) -> DomainResult<RouteOutcome> {
        let mut target = target;
        let mut redirects = Vec::new();

        for _ in 0..MAX_REDIRECT_HOPS {
            let decision = self.settle(&target).await;
            match decision {
                RouteDecision::Redirect(redirect) => {
                    info!(location = %redirect.location(), terminal = redirect.is_terminal(), "redirecting");
                    self.ports.navigator.navigate(&redirect)?;
                    redirects.push(redirect.clone());
                    if let Redirect::Internal { target: next } = redirect {
                        target = next;
                        continue;
                    }
                    self.release_engine().await;
                    self.target = Some(target.clone());
                    return Ok(RouteOutcome {
                        redirects,
                        target,
                        decision: RouteDecision::Redirect(redirect),
                    });
                }
                RouteDecision::Display(unit) => {
                    self.display_unit(&target, &unit).await;
                    self.target = Some(target.clone());
                    return Ok(RouteOutcome {
                        redirects,
                        target,
                        decision: RouteDecision::Display(unit),
                    });
                }
                other => {
                    if !matches!(other, RouteDecision::Wait) {
                        self.release_engine().await;
                    }
                    debug!(decision = ?other, "route settled without a unit");
                    self.target = Some(target.clone());
                    return Ok(RouteOutcome {
                        redirects,
                        target,
                        decision: other,
                    });
                }
            }
        }

        Err(DomainError::InvalidStateTransition {
            from: target.path(),
            to: "redirect".to_string(),
            reason: format!("more than {MAX_REDIRECT_HOPS} redirects"),
        })
    }

    /// Navigate to another unit of the current sequence.
    ///
    /// The unit being left gets a completion check, the destination's
    /// position is saved, then the route moves.
    pub async fn on_unit_change(&mut self, next_unit: UnitRef) -> DomainResult<RouteOutcome> {
        let current = self.current_unit_target()?;
        let (course, sequence) = (current.course.clone(), current.sequence.clone());
        let Some(sequence) = sequence else {
            return Err(DomainError::NavigationBlocked(format!(
                "no sequence on route {current}"
            )));
        };

        if let Some(leaving) = current.unit.as_ref() {
            self.completion.check(&course, &sequence, leaving).await;
        }
        self.persist(&NavigationTarget::unit(course.clone(), sequence.clone(), next_unit.clone()))
            .await;

        let next = NavigationTarget::unit(course, sequence, next_unit);
        self.ports.navigator.navigate(&Redirect::internal(next.clone()))?;
        self.route_changed(next).await
    }

    /// Jump to the first unit of the following sequence. `None` on the last
    /// sequence.
    pub async fn next_sequence(&mut self) -> DomainResult<Option<RouteOutcome>> {
        let current = self.current_unit_target()?;
        let Some(sequence) = current.sequence.as_ref() else {
            return Ok(None);
        };
        let state = self.store.snapshot().await;
        let Some(next) = self.machine.next_unit(&state, &current.course, sequence) else {
            debug!(sequence_id = %sequence, "already on the last sequence");
            return Ok(None);
        };
        self.move_to(next).await.map(Some)
    }

    /// Jump to the last unit of the preceding sequence. `None` on the
    /// first sequence.
    pub async fn previous_sequence(&mut self) -> DomainResult<Option<RouteOutcome>> {
        let current = self.current_unit_target()?;
        let Some(sequence) = current.sequence.as_ref() else {
            return Ok(None);
        };
        let state = self.store.snapshot().await;
        let Some(previous) = self.machine.previous_unit(&state, &current.course, sequence) else {
            debug!(sequence_id = %sequence, "already on the first sequence");
            return Ok(None);
        };
        self.move_to(previous).await.map(Some)
    }

    /// Status of the active reconciliation engine, if a gated unit is shown.
    pub fn completion_status(&self) -> Option<ReconciliationStatus> {
        self.engine.as_ref().map(ReconciliationHandle::status)
    }

    /// Completion message for the displayed unit.
    pub fn completion_display(&self) -> CompletionDisplay {
        self.engine
            .as_ref()
            .map_or(CompletionDisplay::None, ReconciliationHandle::display)
    }

    /// Active engine, if a gated unit is shown.
    pub fn completion_handle(&self) -> Option<&ReconciliationHandle> {
        self.engine.as_ref()
    }

    /// Dispose the active engine.
    pub async fn close(&mut self) {
        self.release_engine().await;
    }

    async fn move_to(&mut self, target: NavigationTarget) -> DomainResult<RouteOutcome> {
        self.ports.navigator.navigate(&Redirect::internal(target.clone()))?;
        self.route_changed(target).await
    }

    fn current_unit_target(&self) -> DomainResult<NavigationTarget> {
        self.target
            .clone()
            .ok_or_else(|| DomainError::NavigationBlocked("no route yet".to_string()))
    }

    /// Load whatever `target` needs, then evaluate it.
    async fn settle(&self, target: &NavigationTarget) -> RouteDecision {
        if !target.course.is_blank() {
            if let Err(err) = self.loader.load_course(&target.course).await {
                debug!(error = %err, "course unavailable");
            }
        }

        let state = self.store.snapshot().await;
        let wants_sequence = target.sequence.as_ref().filter(|sequence| {
            !sequence.is_blank()
                && state
                    .course(&target.course)
                    .is_some_and(|course| course.user_has_access)
                && state.sequence_ids(&target.course).contains(sequence)
        });
        if let Some(sequence) = wants_sequence {
            if let Err(err) = self.loader.load_sequence(sequence).await {
                debug!(error = %err, "sequence unavailable");
            }
        }

        self.machine.evaluate(&self.store.snapshot().await, target)
    }

    async fn display_unit(&mut self, target: &NavigationTarget, unit: &UnitRef) {
        if self.engine.as_ref().is_some_and(|engine| engine.unit() == unit) {
            return;
        }
        self.release_engine().await;
        self.persist(target).await;

        let state = self.store.snapshot().await;
        let Some(record) = state.unit(unit) else {
            return;
        };
        if !record.is_gated_activity() {
            return;
        }

        let mut engine = ReconciliationEngine::new(
            target.course.clone(),
            unit.clone(),
            Arc::clone(&self.ports.progress),
            Arc::clone(&self.ports.scheduler),
            self.policy,
        );
        if state
            .course(&target.course)
            .is_some_and(|course| course.certificate_available)
        {
            engine = engine.with_initial_snapshot(ProgressSnapshot::new(false, true));
        }
        info!(unit_id = %unit, "attaching completion reconciliation");
        self.engine = Some(engine.spawn(self.bus.attach()));
    }

    async fn persist(&mut self, target: &NavigationTarget) -> Option<PendingSave> {
        let (Some(sequence), Some(unit)) = (target.sequence.as_ref(), target.unit.as_ref()) else {
            return None;
        };
        let state = self.store.snapshot().await;
        let save = PositionPersistenceHandler::plan(&state, &target.course, sequence, unit)?;
        let key = (save.sequence.clone(), save.unit_index);
        if self.last_persisted.as_ref() == Some(&key) {
            return None;
        }
        let pending = self.persistence.persist(&target.course, sequence, unit).await;
        if pending.is_some() {
            self.last_persisted = Some(key);
        } else {
            warn!(sequence_id = %sequence, unit_id = %unit, "position save planned but not issued");
        }
        pending
    }

    async fn release_engine(&mut self) {
        if let Some(engine) = self.engine.take() {
            debug!(unit_id = %engine.unit(), "disposing completion reconciliation");
            engine.dispose().await;
        }
    }
}
