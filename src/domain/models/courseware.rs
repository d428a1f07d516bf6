//! Course, sequence and unit models plus the loaded-courseware state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ids::{CourseRef, SequenceRef, UnitRef};

/// Load status of a course or sequence fetch.
///
/// Redirect and position logic only runs against `Loaded` data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    /// Nothing requested yet.
    #[default]
    Unloaded,
    /// A fetch is in flight.
    Loading,
    /// Data is present and authoritative.
    Loaded,
    /// The fetch failed or the id is unknown.
    Failed,
}

impl LoadStatus {
    /// Stable lowercase name for logs and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        }
    }

    /// True only for `Loaded`.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

/// Course-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Course run id.
    pub id: CourseRef,
    /// Display name.
    pub title: String,
    /// When false the learner is sent to the course landing page.
    pub user_has_access: bool,
    /// Sequences in pedagogical order.
    pub sequence_ids: Vec<SequenceRef>,
    /// A certificate has been issued for this learner.
    #[serde(default)]
    pub certificate_available: bool,
}

impl Course {
    /// Where a bare course route lands.
    pub fn first_sequence_id(&self) -> Option<&SequenceRef> {
        self.sequence_ids.first()
    }

    /// Position of a sequence in course order.
    pub fn sequence_index(&self, sequence_id: &SequenceRef) -> Option<usize> {
        self.sequence_ids.iter().position(|id| id == sequence_id)
    }
}

/// A sequence and its ordered units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    /// Sequence id.
    pub id: SequenceRef,
    /// Display name.
    pub title: String,
    /// Units in pedagogical order.
    pub unit_ids: Vec<UnitRef>,
    /// Saved unit index (0-based). Only authoritative once the sequence is loaded.
    pub position: Option<usize>,
    /// Whether the LMS wants the learner's position in this sequence saved.
    #[serde(default)]
    pub save_position: bool,
    /// Timed or proctored exam; rendered by the LMS instead of inline.
    #[serde(default)]
    pub is_time_limited: bool,
    /// Absolute LMS URL for the sequence, used for exam redirects.
    #[serde(default)]
    pub lms_web_url: Option<String>,
}

impl Sequence {
    /// Skeleton built from course metadata before the sequence itself is fetched.
    pub fn skeleton(id: SequenceRef, title: impl Into<String>, unit_ids: Vec<UnitRef>) -> Self {
        Self {
            id,
            title: title.into(),
            unit_ids,
            position: None,
            save_position: false,
            is_time_limited: false,
            lms_web_url: None,
        }
    }

    /// Position of a unit within the sequence.
    pub fn unit_index(&self, unit_id: &UnitRef) -> Option<usize> {
        self.unit_ids.iter().position(|id| id == unit_id)
    }

    /// Where "next" lands when crossing into this sequence.
    pub fn first_unit(&self) -> Option<&UnitRef> {
        self.unit_ids.first()
    }

    /// Where "previous" lands when crossing into this sequence.
    pub fn last_unit(&self) -> Option<&UnitRef> {
        self.unit_ids.last()
    }

    /// Saved position clamped into `[0, len - 1]`; `None` for an empty sequence.
    pub fn resume_index(&self) -> Option<usize> {
        let last = self.unit_ids.len().checked_sub(1)?;
        Some(self.position.unwrap_or(0).min(last))
    }
}

/// A single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unit id.
    pub id: UnitRef,
    /// Owning sequence.
    pub sequence_id: SequenceRef,
    /// Page title shown in the unit navigation.
    pub title: String,
    /// The LMS reported the unit complete.
    #[serde(default)]
    pub complete: bool,
    /// Explicitly gated by an external grader.
    #[serde(default)]
    pub gated: bool,
}

impl Unit {
    /// Gated activities get a completion reconciliation engine.
    pub fn is_gated_activity(&self) -> bool {
        self.gated || self.title.trim().eq_ignore_ascii_case("final exam")
    }
}

/// Everything the navigation layer knows about the loaded courseware.
///
/// `course_id` / `sequence_id` name what is actually loaded, which can lag
/// behind the route while a fetch is in flight.
#[derive(Debug, Clone, Default)]
pub struct CoursewareState {
    /// Course the status below applies to.
    pub course_id: Option<CourseRef>,
    /// Sequence the status below applies to.
    pub sequence_id: Option<SequenceRef>,
    /// Status of the `course_id` load.
    pub course_status: LoadStatus,
    /// Status of the `sequence_id` load.
    pub sequence_status: LoadStatus,
    /// Every course fetched so far.
    pub courses: HashMap<CourseRef, Course>,
    /// Sequence skeletons and fully loaded sequences.
    pub sequences: HashMap<SequenceRef, Sequence>,
    /// Units of every loaded sequence.
    pub units: HashMap<UnitRef, Unit>,
}

impl CoursewareState {
    /// Look up a fetched course.
    pub fn course(&self, id: &CourseRef) -> Option<&Course> {
        self.courses.get(id)
    }

    /// Look up a sequence record.
    pub fn sequence(&self, id: &SequenceRef) -> Option<&Sequence> {
        self.sequences.get(id)
    }

    /// Look up a loaded unit.
    pub fn unit(&self, id: &UnitRef) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Ordered sequence ids of a course; empty if the course is unknown.
    pub fn sequence_ids(&self, course_id: &CourseRef) -> &[SequenceRef] {
        self.courses
            .get(course_id)
            .map_or(&[], |course| course.sequence_ids.as_slice())
    }

    /// Course status, but only for the course actually loaded.
    pub fn course_status_for(&self, course_id: &CourseRef) -> LoadStatus {
        if self.course_id.as_ref() == Some(course_id) {
            self.course_status
        } else {
            LoadStatus::Unloaded
        }
    }

    /// Sequence status, but only for the sequence actually loaded.
    pub fn sequence_status_for(&self, sequence_id: &SequenceRef) -> LoadStatus {
        if self.sequence_id.as_ref() == Some(sequence_id) {
            self.sequence_status
        } else {
            LoadStatus::Unloaded
        }
    }

    /// Insert a course together with sequence skeletons. Existing sequence
    /// records (which may already be fully loaded) are left alone.
    pub fn insert_course(&mut self, course: Course, skeletons: Vec<Sequence>) {
        for skeleton in skeletons {
            self.sequences.entry(skeleton.id.clone()).or_insert(skeleton);
        }
        self.courses.insert(course.id.clone(), course);
    }

    /// Insert a fully loaded sequence and its units.
    pub fn insert_sequence(&mut self, sequence: Sequence, units: Vec<Unit>) {
        for unit in units {
            self.units.insert(unit.id.clone(), unit);
        }
        self.sequences.insert(sequence.id.clone(), sequence);
    }
}
