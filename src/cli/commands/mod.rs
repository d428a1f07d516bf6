//! CLI command implementations.

pub mod config;
pub mod outline;
pub mod resolve;
pub mod watch;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::adapters::lms::LmsClient;
use crate::domain::errors::DomainResult;
use crate::domain::models::{Config, CourseRef, Redirect, SequenceRef};
use crate::domain::ports::{Navigator, PositionClient};

pub(crate) fn lms_client(config: &Config) -> Result<Arc<LmsClient>> {
    let client = LmsClient::new(&config.lms)
        .with_context(|| format!("Failed to build LMS client for {}", config.lms.base_url))?;
    Ok(Arc::new(client))
}

/// Navigator for one-shot commands: redirects are reported, not followed
/// in a browser.
#[derive(Debug, Default)]
pub(crate) struct ReportingNavigator;

impl Navigator for ReportingNavigator {
    fn navigate(&self, redirect: &Redirect) -> DomainResult<()> {
        info!(location = %redirect.location(), "redirect");
        Ok(())
    }
}

/// Position client that leaves the learner's saved position untouched.
#[derive(Debug, Default)]
pub(crate) struct DryRunPositions;

#[async_trait]
impl PositionClient for DryRunPositions {
    async fn save_position(
        &self,
        course: &CourseRef,
        sequence: &SequenceRef,
        unit_index: usize,
    ) -> DomainResult<()> {
        info!(course_id = %course, sequence_id = %sequence, unit_index, "position save skipped (dry run)");
        Ok(())
    }
}
