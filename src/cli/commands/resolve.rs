//! `courseware resolve`: run a route through the navigation state machine.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

use crate::cli::output::progress::create_spinner;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{
    Config, CourseRef, NavigationTarget, Redirect, RouteDecision, SequenceRef, UnitRef,
};
use crate::domain::ports::TokioScheduler;
use crate::services::{CoursewareSession, RouteOutcome, SessionPorts};

use super::{DryRunPositions, ReportingNavigator};

/// Arguments for `courseware resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Course id
    #[arg(long)]
    pub course: String,

    /// Sequence id; resolved from the course when omitted
    #[arg(long)]
    pub sequence: Option<String>,

    /// Unit id; resolved from the saved position when omitted
    #[arg(long, requires = "sequence")]
    pub unit: Option<String>,
}

impl ResolveArgs {
    /// Route named by the arguments.
    pub fn target(&self) -> NavigationTarget {
        NavigationTarget {
            course: CourseRef::new(self.course.as_str()),
            sequence: self.sequence.as_deref().map(SequenceRef::new),
            unit: self.unit.as_deref().map(UnitRef::new),
        }
    }
}

/// Result of resolving a route.
#[derive(Debug, Serialize)]
pub struct ResolveOutput {
    /// Route as given.
    pub requested: String,
    /// Route after internal redirects.
    pub resolved: String,
    /// Redirects issued, in order.
    pub redirects: Vec<Redirect>,
    /// Final decision name.
    pub decision: String,
    /// Displayed unit, if any.
    pub unit: Option<String>,
    /// Where the learner was sent outside the app, if anywhere.
    pub external_url: Option<String>,
}

impl ResolveOutput {
    fn new(requested: &NavigationTarget, outcome: &RouteOutcome) -> Self {
        let (decision, external_url) = match &outcome.decision {
            RouteDecision::Wait => ("wait", None),
            RouteDecision::Redirect(redirect) => ("redirect", Some(redirect.location())),
            RouteDecision::EmptyCourse => ("empty_course", None),
            RouteDecision::EmptySequence => ("empty_sequence", None),
            RouteDecision::NotFound => ("not_found", None),
            RouteDecision::LoadFailed => ("load_failed", None),
            RouteDecision::Display(_) => ("display", None),
        };
        Self {
            requested: requested.path(),
            resolved: outcome.target.path(),
            redirects: outcome.redirects.clone(),
            decision: decision.to_string(),
            unit: outcome.displayed_unit().map(ToString::to_string),
            external_url,
        }
    }
}

impl CommandOutput for ResolveOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("{} -> {}", self.requested, self.resolved)];
        for redirect in &self.redirects {
            let kind = if redirect.is_terminal() { "external" } else { "internal" };
            lines.push(format!("  {kind} redirect: {}", redirect.location()));
        }
        match (&self.unit, &self.external_url) {
            (Some(unit), _) => lines.push(format!("display unit {unit}")),
            (None, Some(url)) => lines.push(format!("leave for {url}")),
            (None, None) => lines.push(self.decision.replace('_', " ")),
        }
        lines.join("\n")
    }
}

/// Resolve a route against the LMS without saving positions.
pub async fn execute(args: ResolveArgs, config: &Config, json_mode: bool) -> Result<()> {
    let client = super::lms_client(config)?;
    let ports = SessionPorts {
        courseware: client.clone(),
        positions: Arc::new(DryRunPositions),
        progress: client,
        navigator: Arc::new(ReportingNavigator),
        scheduler: Arc::new(TokioScheduler),
    };
    let mut session = CoursewareSession::new(ports, config);
    let target = args.target();

    let spinner = create_spinner(format!("Resolving {target}"), json_mode);
    let outcome = session.route_changed(target.clone()).await;
    spinner.finish_and_clear();
    session.close().await;

    let outcome = outcome.with_context(|| format!("Failed to resolve {target}"))?;
    output(&ResolveOutput::new(&target, &outcome), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ExternalReason;

    #[test]
    fn test_target_from_args() {
        let args = ResolveArgs {
            course: "c1".to_string(),
            sequence: Some("s1".to_string()),
            unit: None,
        };
        assert_eq!(args.target().path(), "/course/c1/s1");
    }

    #[test]
    fn test_output_for_external_redirect() {
        let requested = NavigationTarget::course(CourseRef::new("c1"));
        let redirect = Redirect::External {
            url: "https://lms.example.com/courses/c1/course/".to_string(),
            reason: ExternalReason::AccessDenied,
        };
        let outcome = RouteOutcome {
            redirects: vec![redirect.clone()],
            target: requested.clone(),
            decision: RouteDecision::Redirect(redirect),
        };
        let out = ResolveOutput::new(&requested, &outcome);
        assert_eq!(out.decision, "redirect");
        assert!(out.to_human().contains("leave for https://lms.example.com/courses/c1/course/"));
        assert_eq!(out.to_json()["redirects"][0]["kind"], "external");
    }
}
