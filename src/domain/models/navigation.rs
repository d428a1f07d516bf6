//! Navigation targets, redirects and the navigation phase.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{CourseRef, SequenceRef, UnitRef};

/// The location the route asks for. Sequence and unit may be missing, in
/// which case navigation completes them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NavigationTarget {
    /// Always present; every route is scoped to a course.
    pub course: CourseRef,
    /// Requested sequence, if the route names one.
    pub sequence: Option<SequenceRef>,
    /// Requested unit. Only meaningful together with a sequence.
    pub unit: Option<UnitRef>,
}

impl NavigationTarget {
    /// Course-only route: `/course/{course}`.
    pub fn course(course: CourseRef) -> Self {
        Self {
            course,
            sequence: None,
            unit: None,
        }
    }

    /// Sequence route without a unit.
    pub fn sequence(course: CourseRef, sequence: SequenceRef) -> Self {
        Self {
            course,
            sequence: Some(sequence),
            unit: None,
        }
    }

    /// Fully specified route.
    pub fn unit(course: CourseRef, sequence: SequenceRef, unit: UnitRef) -> Self {
        Self {
            course,
            sequence: Some(sequence),
            unit: Some(unit),
        }
    }

    /// Canonical route path for this target.
    pub fn path(&self) -> String {
        match (&self.sequence, &self.unit) {
            (Some(sequence), Some(unit)) => format!("/course/{}/{sequence}/{unit}", self.course),
            (Some(sequence), None) => format!("/course/{}/{sequence}", self.course),
            _ => format!("/course/{}", self.course),
        }
    }

    /// Parse a `/course/{course}[/{sequence}[/{unit}]]` path.
    ///
    /// Blank segments are treated as absent; anything else that does not fit
    /// the pattern yields `None`.
    pub fn parse_path(path: &str) -> Option<Self> {
        let mut segments = path.trim_matches('/').split('/');
        if segments.next()? != "course" {
            return None;
        }
        let course = segments.next().filter(|s| !s.trim().is_empty())?;
        let sequence = segments.next().filter(|s| !s.trim().is_empty());
        let unit = segments.next().filter(|s| !s.trim().is_empty());
        if segments.next().is_some() || (sequence.is_none() && unit.is_some()) {
            return None;
        }
        Some(Self {
            course: CourseRef::new(course),
            sequence: sequence.map(SequenceRef::new),
            unit: unit.map(UnitRef::new),
        })
    }
}

impl fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A navigation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Redirect {
    /// Replace the current route with a canonical in-app path.
    Internal {
        /// Canonical in-app location.
        target: NavigationTarget,
    },
    /// Leave the app for an absolute URL.
    External {
        /// Absolute LMS URL.
        url: String,
        /// Why the learner is sent there.
        reason: ExternalReason,
    },
}

impl Redirect {
    /// In-app redirect to `target`.
    pub fn internal(target: NavigationTarget) -> Self {
        Self::Internal { target }
    }

    /// Path or URL the redirect points at.
    pub fn location(&self) -> String {
        match self {
            Self::Internal { target } => target.path(),
            Self::External { url, .. } => url.clone(),
        }
    }

    /// External redirects end in-app navigation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::External { .. })
    }
}

/// Why navigation left the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalReason {
    /// The learner may not view this course.
    AccessDenied,
    /// Timed exams are rendered by the LMS itself.
    TimeLimitedExam,
}

/// Where the navigation state machine currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum NavigationPhase {
    /// No course requested.
    NoCourse,
    /// Course metadata is being fetched.
    CourseLoading,
    /// Course fetch failed or the course is unknown.
    CourseFailed,
    /// Course loaded, sequence not yet chosen.
    NoSequence,
    /// Sequence metadata is being fetched.
    SequenceLoading,
    /// Sequence fetch failed or the sequence is unknown.
    SequenceFailed,
    /// Sequence loaded, unit not yet chosen.
    NoUnit,
    /// A unit is on screen.
    UnitResolved {
        /// Unit being displayed.
        unit: UnitRef,
    },
}

/// Outcome of evaluating a route against the loaded courseware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Data is still loading or the route is malformed; stay put.
    Wait,
    /// Navigate somewhere else first.
    Redirect(Redirect),
    /// The loaded course has no sequences.
    EmptyCourse,
    /// The loaded sequence has no units.
    EmptySequence,
    /// The route names a course, sequence or unit the LMS does not know.
    NotFound,
    /// The course or sequence fetch failed.
    LoadFailed,
    /// Render this unit.
    Display(UnitRef),
}
