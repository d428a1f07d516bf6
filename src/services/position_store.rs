//! Shared courseware state: sequence lists, unit lists and saved positions.
//!
//! Writers are the loader, position persistence and completion checks. The
//! navigation state machine only ever sees immutable snapshots.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::models::{
    CourseRef, CoursewareState, LoadStatus, SequenceRef, UnitRef,
};
use crate::domain::ports::{CourseOutline, SequenceMetadata};

/// Held by whoever is driving a load. Dropping it before the load is
/// finished, for example because the caller's future was abandoned, lets
/// the next caller restart that load instead of waiting on it forever.
#[derive(Debug)]
#[must_use = "dropping the ticket abandons the load"]
pub struct LoadTicket(Arc<()>);

impl LoadTicket {
    fn issue(slot: &mut Weak<()>) -> Self {
        let ticket = Arc::new(());
        *slot = Arc::downgrade(&ticket);
        Self(ticket)
    }
}

/// Outcome of asking the store to start a load.
#[derive(Debug)]
pub enum LoadStart {
    /// The caller owns the load and must finish or fail it.
    Started(LoadTicket),
    /// Nothing to do: the id is loaded, or a live load is in flight.
    Skipped(LoadStatus),
}

#[derive(Debug, Default)]
struct InFlight {
    course: Weak<()>,
    sequence: Weak<()>,
}

/// Courseware state store.
#[derive(Debug, Default)]
pub struct SequencePositionStore {
    state: RwLock<CoursewareState>,
    in_flight: Mutex<InFlight>,
}

impl SequencePositionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing state (tests, offline fixtures).
    pub fn with_state(state: CoursewareState) -> Self {
        Self {
            state: RwLock::new(state),
            in_flight: Mutex::default(),
        }
    }

    /// Clone the current state.
    pub async fn snapshot(&self) -> CoursewareState {
        self.state.read().await.clone()
    }

    /// Loaded course id, if any.
    pub async fn loaded_course(&self) -> Option<CourseRef> {
        self.state.read().await.course_id.clone()
    }

    /// Loaded sequence id, if any.
    pub async fn loaded_sequence(&self) -> Option<SequenceRef> {
        self.state.read().await.sequence_id.clone()
    }

    /// Claim the load of `course`. Skipped while the course is loaded or a
    /// load for it is still held by a live [`LoadTicket`].
    pub async fn begin_course_load(&self, course: &CourseRef) -> LoadStart {
        let mut state = self.state.write().await;
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let status = state.course_status_for(course);
        match status {
            LoadStatus::Loaded => return LoadStart::Skipped(status),
            LoadStatus::Loading if in_flight.course.strong_count() > 0 => {
                return LoadStart::Skipped(status)
            }
            LoadStatus::Loading => debug!(course_id = %course, "restarting abandoned course load"),
            LoadStatus::Unloaded | LoadStatus::Failed => {}
        }
        state.course_id = Some(course.clone());
        state.course_status = LoadStatus::Loading;
        LoadStart::Started(LoadTicket::issue(&mut in_flight.course))
    }

    /// Store a fetched course. Returns false when a newer request for a
    /// different course has taken over, in which case nothing is written.
    pub async fn finish_course_load(&self, outline: CourseOutline) -> bool {
        let mut state = self.state.write().await;
        if state.course_id.as_ref() != Some(&outline.course.id) {
            debug!(course_id = %outline.course.id, "discarding superseded course load");
            return false;
        }
        state.insert_course(outline.course, outline.sequences);
        state.course_status = LoadStatus::Loaded;
        true
    }

    /// Mark the current course load failed. Returns false if `course` was superseded.
    pub async fn fail_course_load(&self, course: &CourseRef) -> bool {
        let mut state = self.state.write().await;
        if state.course_id.as_ref() != Some(course) {
            return false;
        }
        state.course_status = LoadStatus::Failed;
        true
    }

    /// Claim the load of `sequence`; same rules as courses.
    pub async fn begin_sequence_load(&self, sequence: &SequenceRef) -> LoadStart {
        let mut state = self.state.write().await;
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let status = state.sequence_status_for(sequence);
        match status {
            LoadStatus::Loaded => return LoadStart::Skipped(status),
            LoadStatus::Loading if in_flight.sequence.strong_count() > 0 => {
                return LoadStart::Skipped(status)
            }
            LoadStatus::Loading => {
                debug!(sequence_id = %sequence, "restarting abandoned sequence load");
            }
            LoadStatus::Unloaded | LoadStatus::Failed => {}
        }
        state.sequence_id = Some(sequence.clone());
        state.sequence_status = LoadStatus::Loading;
        LoadStart::Started(LoadTicket::issue(&mut in_flight.sequence))
    }

    /// Store a fetched sequence; same supersession rule as courses.
    pub async fn finish_sequence_load(&self, metadata: SequenceMetadata) -> bool {
        let mut state = self.state.write().await;
        if state.sequence_id.as_ref() != Some(&metadata.sequence.id) {
            debug!(sequence_id = %metadata.sequence.id, "discarding superseded sequence load");
            return false;
        }
        state.insert_sequence(metadata.sequence, metadata.units);
        state.sequence_status = LoadStatus::Loaded;
        true
    }

    /// Mark the current sequence load failed; same rule as courses.
    pub async fn fail_sequence_load(&self, sequence: &SequenceRef) -> bool {
        let mut state = self.state.write().await;
        if state.sequence_id.as_ref() != Some(sequence) {
            return false;
        }
        state.sequence_status = LoadStatus::Failed;
        true
    }

    /// Record a saved position locally. Returns false for unknown sequences.
    pub async fn set_position(&self, sequence: &SequenceRef, unit_index: usize) -> bool {
        let mut state = self.state.write().await;
        match state.sequences.get_mut(sequence) {
            Some(record) => {
                record.position = Some(unit_index);
                true
            }
            None => false,
        }
    }

    /// Mark a unit complete. Returns false for unknown units.
    pub async fn mark_complete(&self, unit: &UnitRef) -> bool {
        let mut state = self.state.write().await;
        match state.units.get_mut(unit) {
            Some(record) => {
                record.complete = true;
                true
            }
            None => false,
        }
    }
}
