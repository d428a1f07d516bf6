//! Navigation state machine.
//!
//! Pure functions of a [`CoursewareState`] snapshot and the route's
//! [`NavigationTarget`]. Nothing here mutates state or performs I/O; the
//! session issues whatever redirect these functions return.

use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CourseRef, CoursewareState, ExternalReason, LoadStatus, NavigationPhase, NavigationTarget,
    Redirect, RouteDecision, SequenceRef,
};

/// Computes redirects towards a canonical `(course, sequence, unit)` route.
#[derive(Debug, Clone)]
pub struct NavigationStateMachine {
    lms_base_url: String,
}

impl NavigationStateMachine {
    /// External redirects are built against `lms_base_url`.
    pub fn new(lms_base_url: impl Into<String>) -> Self {
        let lms_base_url = lms_base_url.into().trim_end_matches('/').to_string();
        Self { lms_base_url }
    }

    /// Where the route currently stands.
    pub fn phase(&self, state: &CoursewareState, target: &NavigationTarget) -> NavigationPhase {
        if target.course.is_blank() {
            return NavigationPhase::NoCourse;
        }
        match state.course_status_for(&target.course) {
            LoadStatus::Unloaded => return NavigationPhase::NoCourse,
            LoadStatus::Loading => return NavigationPhase::CourseLoading,
            LoadStatus::Failed => return NavigationPhase::CourseFailed,
            LoadStatus::Loaded => {}
        }
        let Some(sequence_id) = target.sequence.as_ref() else {
            return NavigationPhase::NoSequence;
        };
        match state.sequence_status_for(sequence_id) {
            LoadStatus::Unloaded | LoadStatus::Loading => NavigationPhase::SequenceLoading,
            LoadStatus::Failed => NavigationPhase::SequenceFailed,
            LoadStatus::Loaded => {
                let resolved = target.unit.as_ref().filter(|unit| {
                    state
                        .sequence(sequence_id)
                        .is_some_and(|sequence| sequence.unit_index(unit).is_some())
                });
                match resolved {
                    Some(unit) => NavigationPhase::UnitResolved { unit: unit.clone() },
                    None => NavigationPhase::NoUnit,
                }
            }
        }
    }

    /// Decide what to do with the route.
    ///
    /// Order: access denied, course entry, load failures, exam redirect,
    /// sequence entry, then display.
    pub fn evaluate(&self, state: &CoursewareState, target: &NavigationTarget) -> RouteDecision {
        if is_malformed(target) {
            debug!(target = %target, "ignoring malformed route");
            return RouteDecision::Wait;
        }

        match state.course_status_for(&target.course) {
            LoadStatus::Loaded => {}
            LoadStatus::Failed => return RouteDecision::LoadFailed,
            LoadStatus::Unloaded | LoadStatus::Loading => return RouteDecision::Wait,
        }

        if let Some(redirect) = self.access_denied_redirect(state, target) {
            return RouteDecision::Redirect(redirect);
        }

        match self.resolve_course_entry(state, target) {
            Ok(Some(redirect)) => return RouteDecision::Redirect(redirect),
            Ok(None) => {}
            Err(DomainError::EmptyCourse(_)) => return RouteDecision::EmptyCourse,
            Err(_) => return RouteDecision::NotFound,
        }

        let Some(sequence_id) = target.sequence.as_ref() else {
            return RouteDecision::Wait;
        };
        if !state.sequence_ids(&target.course).contains(sequence_id) {
            return RouteDecision::NotFound;
        }
        match state.sequence_status_for(sequence_id) {
            LoadStatus::Loaded => {}
            LoadStatus::Failed => return RouteDecision::LoadFailed,
            LoadStatus::Unloaded | LoadStatus::Loading => return RouteDecision::Wait,
        }
        let Some(sequence) = state.sequence(sequence_id) else {
            return RouteDecision::NotFound;
        };

        if let Some(redirect) = self.exam_redirect(state, target) {
            return RouteDecision::Redirect(redirect);
        }

        if let Some(redirect) = self.resolve_sequence_entry(state, target) {
            return RouteDecision::Redirect(redirect);
        }

        match target.unit.as_ref() {
            None => RouteDecision::EmptySequence,
            Some(unit) if sequence.unit_index(unit).is_some() => RouteDecision::Display(unit.clone()),
            Some(_) => RouteDecision::NotFound,
        }
    }

    /// Complete a course-only route with the first sequence.
    ///
    /// Returns `EmptyCourse` when the loaded course has no sequences.
    pub fn resolve_course_entry(
        &self,
        state: &CoursewareState,
        target: &NavigationTarget,
    ) -> DomainResult<Option<Redirect>> {
        if target.sequence.is_some() || !state.course_status_for(&target.course).is_loaded() {
            return Ok(None);
        }
        let course = state
            .course(&target.course)
            .ok_or_else(|| DomainError::CourseNotFound(target.course.clone()))?;
        let first = course
            .first_sequence_id()
            .ok_or_else(|| DomainError::EmptyCourse(target.course.clone()))?;
        Ok(Some(Redirect::internal(NavigationTarget::sequence(
            target.course.clone(),
            first.clone(),
        ))))
    }

    /// Complete a sequence route with the saved unit, clamped into range.
    ///
    /// Empty sequences produce no redirect.
    pub fn resolve_sequence_entry(
        &self,
        state: &CoursewareState,
        target: &NavigationTarget,
    ) -> Option<Redirect> {
        let sequence_id = target.sequence.as_ref()?;
        if target.unit.is_some() || !state.sequence_status_for(sequence_id).is_loaded() {
            return None;
        }
        let sequence = state.sequence(sequence_id)?;
        let index = sequence.resume_index()?;
        if sequence.position.is_some_and(|saved| saved != index) {
            debug!(
                sequence_id = %sequence_id,
                saved = ?sequence.position,
                clamped = index,
                "saved position out of range"
            );
        }
        let unit = sequence.unit_ids.get(index)?;
        Some(Redirect::internal(NavigationTarget::unit(
            target.course.clone(),
            sequence_id.clone(),
            unit.clone(),
        )))
    }

    /// Send learners without access to the course landing page.
    pub fn access_denied_redirect(
        &self,
        state: &CoursewareState,
        target: &NavigationTarget,
    ) -> Option<Redirect> {
        if !state.course_status_for(&target.course).is_loaded() {
            return None;
        }
        let course = state.course(&target.course)?;
        if course.user_has_access {
            return None;
        }
        Some(Redirect::External {
            url: format!("{}/courses/{}/course/", self.lms_base_url, course.id),
            reason: ExternalReason::AccessDenied,
        })
    }

    /// Hand timed and proctored sequences over to the LMS.
    pub fn exam_redirect(
        &self,
        state: &CoursewareState,
        target: &NavigationTarget,
    ) -> Option<Redirect> {
        let sequence_id = target.sequence.as_ref()?;
        if !state.sequence_status_for(sequence_id).is_loaded() {
            return None;
        }
        let sequence = state.sequence(sequence_id)?;
        if !sequence.is_time_limited {
            return None;
        }
        let Some(url) = sequence.lms_web_url.clone() else {
            debug!(sequence_id = %sequence_id, "time-limited sequence without an LMS URL");
            return None;
        };
        Some(Redirect::External {
            url,
            reason: ExternalReason::TimeLimitedExam,
        })
    }

    /// First unit of the following sequence; `None` on the last sequence.
    pub fn next_unit(
        &self,
        state: &CoursewareState,
        course: &CourseRef,
        current_sequence: &SequenceRef,
    ) -> Option<NavigationTarget> {
        let ids = state.sequence_ids(course);
        let index = ids.iter().position(|id| id == current_sequence)?;
        let next = state.sequence(ids.get(index + 1)?)?;
        let unit = next.first_unit()?;
        Some(NavigationTarget::unit(course.clone(), next.id.clone(), unit.clone()))
    }

    /// Last unit of the preceding sequence; `None` on the first sequence.
    pub fn previous_unit(
        &self,
        state: &CoursewareState,
        course: &CourseRef,
        current_sequence: &SequenceRef,
    ) -> Option<NavigationTarget> {
        let ids = state.sequence_ids(course);
        let index = ids.iter().position(|id| id == current_sequence)?;
        let previous = state.sequence(ids.get(index.checked_sub(1)?)?)?;
        let unit = previous.last_unit()?;
        Some(NavigationTarget::unit(
            course.clone(),
            previous.id.clone(),
            unit.clone(),
        ))
    }
}

fn is_malformed(target: &NavigationTarget) -> bool {
    target.course.is_blank()
        || target.sequence.as_ref().is_some_and(SequenceRef::is_blank)
        || target.unit.as_ref().is_some_and(|unit| unit.is_blank())
}
