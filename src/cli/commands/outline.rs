//! `courseware outline`: show a course's sequences and units.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

use crate::cli::display::{flag, list_table, render_list};
use crate::cli::output::progress::create_spinner;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{Config, Course, CourseRef, LoadStatus, Sequence};
use crate::services::{CoursewareLoader, SequencePositionStore};

/// Arguments for `courseware outline`.
#[derive(Args, Debug)]
pub struct OutlineArgs {
    /// Course id (e.g. course-v1:edX+DemoX+Demo_Course)
    #[arg(long)]
    pub course: String,
}

/// One sequence of the outline.
#[derive(Debug, Serialize)]
pub struct SequenceOutput {
    /// Sequence id.
    pub id: String,
    /// Display name.
    pub title: String,
    /// Units in order.
    pub unit_ids: Vec<String>,
}

impl From<&Sequence> for SequenceOutput {
    fn from(sequence: &Sequence) -> Self {
        Self {
            id: sequence.id.to_string(),
            title: sequence.title.clone(),
            unit_ids: sequence.unit_ids.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Course outline as printed.
#[derive(Debug, Serialize)]
pub struct OutlineOutput {
    /// Course id.
    pub id: String,
    /// Display name.
    pub title: String,
    /// Whether the learner may view the course.
    pub user_has_access: bool,
    /// A certificate has been issued.
    pub certificate_available: bool,
    /// Sequences in course order.
    pub sequences: Vec<SequenceOutput>,
}

impl OutlineOutput {
    fn new(course: &Course, sequences: Vec<SequenceOutput>) -> Self {
        Self {
            id: course.id.to_string(),
            title: course.title.clone(),
            user_has_access: course.user_has_access,
            certificate_available: course.certificate_available,
            sequences,
        }
    }
}

impl CommandOutput for OutlineOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["#", "sequence", "title", "units"]);
        for (index, sequence) in self.sequences.iter().enumerate() {
            table.add_row(vec![
                (index + 1).to_string(),
                sequence.id.clone(),
                truncate(&sequence.title, 40),
                sequence.unit_ids.len().to_string(),
            ]);
        }
        format!(
            "{} ({})\naccess {}  certificate {}\n\n{}",
            self.title,
            self.id,
            flag(self.user_has_access),
            flag(self.certificate_available),
            render_list("sequence", &table, self.sequences.len())
        )
    }
}

/// Fetch and print a course outline.
pub async fn execute(args: OutlineArgs, config: &Config, json_mode: bool) -> Result<()> {
    let client = super::lms_client(config)?;
    let store = Arc::new(SequencePositionStore::new());
    let loader = CoursewareLoader::new(client, Arc::clone(&store));
    let course = CourseRef::new(args.course);

    let spinner = create_spinner(format!("Loading {course}"), json_mode);
    let status = loader.load_course(&course).await;
    spinner.finish_and_clear();

    let status = status.with_context(|| format!("Failed to load course {course}"))?;
    if status != LoadStatus::Loaded {
        anyhow::bail!("Course {course} not found");
    }

    let state = store.snapshot().await;
    let record = state
        .course(&course)
        .with_context(|| format!("Course {course} missing after load"))?;
    let sequences = state
        .sequence_ids(&course)
        .iter()
        .filter_map(|id| state.sequence(id))
        .map(SequenceOutput::from)
        .collect();

    output(&OutlineOutput::new(record, sequences), json_mode);
    Ok(())
}
