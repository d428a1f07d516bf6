use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Course, CourseRef, Sequence, SequenceRef, Unit, UnitRef};

/// Course metadata plus sequence skeletons, as returned by the LMS.
#[derive(Debug, Clone)]
pub struct CourseOutline {
    /// Course metadata.
    pub course: Course,
    /// Sequence skeletons in course order.
    pub sequences: Vec<Sequence>,
}

/// Full sequence metadata and its units.
#[derive(Debug, Clone)]
pub struct SequenceMetadata {
    /// Sequence with its saved position.
    pub sequence: Sequence,
    /// Units in order.
    pub units: Vec<Unit>,
}

/// Port for courseware metadata and block completion.
#[async_trait]
pub trait CoursewareApi: Send + Sync {
    /// Fetch course metadata and its ordered sequences.
    async fn fetch_course(&self, course: &CourseRef) -> DomainResult<CourseOutline>;

    /// Fetch a sequence with its units and saved position.
    async fn fetch_sequence(&self, sequence: &SequenceRef) -> DomainResult<SequenceMetadata>;

    /// Ask the LMS whether a unit is complete now that the learner left it.
    async fn check_completion(
        &self,
        course: &CourseRef,
        sequence: &SequenceRef,
        unit: &UnitRef,
    ) -> DomainResult<bool>;
}

/// Port for saving a learner's position within a sequence. Best effort.
#[async_trait]
pub trait PositionClient: Send + Sync {
    /// Persist `unit_index` (0-based) as the saved position.
    async fn save_position(
        &self,
        course: &CourseRef,
        sequence: &SequenceRef,
        unit_index: usize,
    ) -> DomainResult<()>;
}
