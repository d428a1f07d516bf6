//! LMS request and response payloads.
//!
//! These map the JSON the LMS speaks onto domain models. They are not part
//! of the public domain model.

use serde::{Deserialize, Serialize};

use crate::domain::models::{
    Course, CourseRef, ProgressSnapshot, Sequence, SequenceRef, Unit, UnitRef,
};
use crate::domain::ports::{CourseOutline, SequenceMetadata};

/// `GET /api/courseware/course/{course}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseResponse {
    /// Course run id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// False sends the learner to the landing page.
    pub user_has_access: bool,
    /// A certificate has been issued.
    #[serde(default)]
    pub certificate_available: bool,
    /// Sequences in course order.
    #[serde(default)]
    pub sequences: Vec<SequenceSummary>,
}

/// A sequence as listed in the course outline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceSummary {
    /// Sequence id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub title: String,
    /// Units in order.
    #[serde(default)]
    pub unit_ids: Vec<String>,
}

impl CourseResponse {
    /// Map onto the domain course and sequence skeletons.
    pub fn into_outline(self) -> CourseOutline {
        let sequences: Vec<Sequence> = self
            .sequences
            .into_iter()
            .map(|summary| {
                Sequence::skeleton(
                    SequenceRef::new(summary.id),
                    summary.title,
                    summary.unit_ids.into_iter().map(UnitRef::new).collect(),
                )
            })
            .collect();
        CourseOutline {
            course: Course {
                id: CourseRef::new(self.id),
                title: self.name,
                user_has_access: self.user_has_access,
                sequence_ids: sequences.iter().map(|s| s.id.clone()).collect(),
                certificate_available: self.certificate_available,
            },
            sequences,
        }
    }
}

/// `GET /api/courseware/sequence/{sequence}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceResponse {
    /// Sequence id.
    pub item_id: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Units in order.
    #[serde(default)]
    pub items: Vec<SequenceItem>,
    /// 1-based saved position.
    #[serde(default)]
    pub position: Option<usize>,
    /// Whether position saves are wanted.
    #[serde(default)]
    pub save_position: bool,
    /// Timed or proctored exam.
    #[serde(default)]
    pub is_time_limited: bool,
    /// Where the LMS renders the sequence itself.
    #[serde(default)]
    pub lms_web_url: Option<String>,
}

/// A unit as listed in a sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceItem {
    /// Unit id.
    pub id: String,
    /// Page title.
    #[serde(default)]
    pub page_title: String,
    /// Completion as last recorded.
    #[serde(default)]
    pub complete: bool,
    /// Gated by an external grader.
    #[serde(default)]
    pub gated: bool,
}

impl SequenceResponse {
    /// Map onto domain models, converting the position to 0-based.
    pub fn into_metadata(self) -> SequenceMetadata {
        let sequence_id = SequenceRef::new(self.item_id);
        let units: Vec<Unit> = self
            .items
            .into_iter()
            .map(|item| Unit {
                id: UnitRef::new(item.id),
                sequence_id: sequence_id.clone(),
                title: item.page_title,
                complete: item.complete,
                gated: item.gated,
            })
            .collect();
        let sequence = Sequence {
            position: self.position.and_then(|p| p.checked_sub(1)),
            save_position: self.save_position,
            is_time_limited: self.is_time_limited,
            lms_web_url: self.lms_web_url,
            ..Sequence::skeleton(
                sequence_id,
                self.display_name,
                units.iter().map(|u| u.id.clone()).collect(),
            )
        };
        SequenceMetadata { sequence, units }
    }
}

/// `GET /api/course_home/progress/{course}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResponse {
    /// Current grade.
    pub course_grade: CourseGrade,
    /// Certificate details, when the LMS sends them.
    #[serde(default)]
    pub certificate_data: Option<CertificateData>,
}

/// Grade section of the progress payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseGrade {
    /// Passing grade reached.
    pub is_passing: bool,
}

/// Certificate section of the progress payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateData {
    /// Set only once a certificate exists.
    #[serde(default)]
    pub cert_web_view_url: Option<String>,
}

impl ProgressResponse {
    /// A certificate counts only with a non-empty URL.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let certificate_available = self
            .certificate_data
            .as_ref()
            .and_then(|data| data.cert_web_view_url.as_deref())
            .is_some_and(|url| !url.is_empty());
        ProgressSnapshot::new(self.course_grade.is_passing, certificate_available)
    }
}

/// Body of the `get_completion` xblock handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Unit to check.
    pub usage_key: String,
}

/// Reply of the `get_completion` handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The unit is complete.
    pub complete: bool,
}

/// Body of the `goto_position` xblock handler; `position` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRequest {
    /// 1-based unit position.
    pub position: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sequence_position_is_one_based_on_the_wire() {
        let response: SequenceResponse = serde_json::from_value(json!({
            "item_id": "s1",
            "display_name": "Week 1",
            "items": [
                {"id": "u1", "page_title": "Intro", "complete": true},
                {"id": "u2", "page_title": "Final Exam"}
            ],
            "position": 2,
            "save_position": true,
        }))
        .unwrap();
        let metadata = response.into_metadata();
        assert_eq!(metadata.sequence.position, Some(1));
        assert_eq!(metadata.sequence.unit_ids, vec![UnitRef::new("u1"), UnitRef::new("u2")]);
        assert!(metadata.units[0].complete);
        assert!(metadata.units[1].is_gated_activity());
    }

    #[test]
    fn test_zero_position_means_unset() {
        let response: SequenceResponse =
            serde_json::from_value(json!({"item_id": "s1", "position": 0})).unwrap();
        assert_eq!(response.into_metadata().sequence.position, None);
    }

    #[test]
    fn test_certificate_requires_url() {
        let response: ProgressResponse = serde_json::from_value(json!({
            "course_grade": {"is_passing": false},
            "certificate_data": {"cert_web_view_url": null},
        }))
        .unwrap();
        assert_eq!(response.snapshot(), ProgressSnapshot::failing());

        let response: ProgressResponse = serde_json::from_value(json!({
            "course_grade": {"is_passing": true},
            "certificate_data": {"cert_web_view_url": "/certificates/abc"},
        }))
        .unwrap();
        assert_eq!(response.snapshot(), ProgressSnapshot::new(true, true));
    }
}
