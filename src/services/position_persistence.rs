//! Saves the learner's unit position within a sequence.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::models::{CourseRef, CoursewareState, SequenceRef, UnitRef};
use crate::domain::ports::PositionClient;
use crate::services::position_store::SequencePositionStore;

/// A position save that was decided on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSave {
    /// Course the sequence belongs to.
    pub course: CourseRef,
    /// Sequence whose position is saved.
    pub sequence: SequenceRef,
    /// 0-based index of the displayed unit.
    pub unit_index: usize,
}

/// A position save in flight. Dropping it does not cancel the request.
#[derive(Debug)]
pub struct PendingSave {
    /// What is being saved.
    pub save: PositionSave,
    /// Background task performing the request.
    pub handle: JoinHandle<()>,
}

/// Issues fire-and-forget position saves.
pub struct PositionPersistenceHandler {
    client: Arc<dyn PositionClient>,
    store: Arc<SequencePositionStore>,
}

impl PositionPersistenceHandler {
    /// Handler saving through `client` and recording in `store`.
    pub fn new(client: Arc<dyn PositionClient>, store: Arc<SequencePositionStore>) -> Self {
        Self { client, store }
    }

    /// Decide whether a save is due for `unit` in `sequence`.
    ///
    /// Requires the sequence to be the loaded one and to ask for saved
    /// positions. A unit missing from the unit list (the sequence changed
    /// underneath us) is skipped silently.
    pub fn plan(
        state: &CoursewareState,
        course: &CourseRef,
        sequence: &SequenceRef,
        unit: &UnitRef,
    ) -> Option<PositionSave> {
        if !state.sequence_status_for(sequence).is_loaded() {
            return None;
        }
        let record = state.sequence(sequence)?;
        if !record.save_position {
            return None;
        }
        let Some(unit_index) = record.unit_index(unit) else {
            debug!(sequence_id = %sequence, unit_id = %unit, "unit not in sequence, skipping position save");
            return None;
        };
        Some(PositionSave {
            course: course.clone(),
            sequence: sequence.clone(),
            unit_index,
        })
    }

    /// Record the position locally and send it to the LMS in the background.
    ///
    /// The local update happens before this returns, so navigation that
    /// follows sees the new position.
    pub async fn persist(
        &self,
        course: &CourseRef,
        sequence: &SequenceRef,
        unit: &UnitRef,
    ) -> Option<PendingSave> {
        let state = self.store.snapshot().await;
        let save = Self::plan(&state, course, sequence, unit)?;
        self.store.set_position(&save.sequence, save.unit_index).await;

        let client = Arc::clone(&self.client);
        let request = save.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = client
                .save_position(&request.course, &request.sequence, request.unit_index)
                .await
            {
                warn!(
                    course_id = %request.course,
                    sequence_id = %request.sequence,
                    unit_index = request.unit_index,
                    error = %err,
                    "failed to save sequence position"
                );
            }
        });
        debug!(sequence_id = %save.sequence, unit_index = save.unit_index, "position save issued");
        Some(PendingSave { save, handle })
    }
}
