//! `courseware watch`: feed frame messages from stdin into a reconciliation
//! engine and print every status it publishes.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::cli::display::{colorize_display, colorize_state};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{
    CompletionDisplay, CompletionNotification, Config, CourseRef, ReconciliationState,
    ReconciliationStatus, UnitRef,
};
use crate::domain::ports::TokioScheduler;
use crate::services::presentation::project_status;
use crate::services::{FrameMessageBus, ReconciliationEngine, ReconciliationPolicy};

/// Arguments for `courseware watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Course id
    #[arg(long)]
    pub course: String,

    /// Unit hosting the gated activity
    #[arg(long)]
    pub unit: String,

    /// Override the number of convergence polls
    #[arg(long)]
    pub max_poll_attempts: Option<u32>,
}

/// One printed status update.
#[derive(Debug, Serialize)]
pub struct StatusLine {
    /// Status revision.
    pub revision: u64,
    /// Notification round.
    pub generation: u64,
    /// Reconciliation state name.
    pub state: &'static str,
    /// Completion message.
    pub display: CompletionDisplay,
    /// Attempts claimed by the latest notification.
    pub attempts_used: Option<u32>,
    /// Polls made in the current round.
    pub poll_attempts: Option<u32>,
    /// Latest observed grade.
    pub is_passing: Option<bool>,
    /// Latest observed certificate state.
    pub certificate_available: Option<bool>,
}

impl From<&ReconciliationStatus> for StatusLine {
    fn from(status: &ReconciliationStatus) -> Self {
        let poll_attempts = match status.state {
            ReconciliationState::AwaitingConvergence { attempts, .. } => Some(attempts),
            _ => None,
        };
        Self {
            revision: status.revision,
            generation: status.generation,
            state: status.state.as_str(),
            display: project_status(status),
            attempts_used: status.attempts_used,
            poll_attempts,
            is_passing: status.snapshot.map(|s| s.is_passing),
            certificate_available: status.snapshot.map(|s| s.certificate_available),
        }
    }
}

/// Wrapper so human output can color the state.
#[derive(Debug, Serialize)]
#[serde(transparent)]
struct StatusReport<'a> {
    #[serde(skip)]
    status: &'a ReconciliationStatus,
    line: StatusLine,
}

impl CommandOutput for StatusReport<'_> {
    fn to_human(&self) -> String {
        let mut text = format!(
            "[{:>3}] {:<22} {}",
            self.line.revision,
            colorize_state(&self.status.state),
            colorize_display(self.line.display)
        );
        if let Some(attempts) = self.line.attempts_used {
            text.push_str(&format!("  attempts_used={attempts}"));
        }
        if let Some(polls) = self.line.poll_attempts {
            text.push_str(&format!("  polls={polls}"));
        }
        if let Some(passing) = self.line.is_passing {
            text.push_str(&format!("  passing={passing}"));
        }
        text
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.line).unwrap_or_default()
    }
}

fn print_status(status: &ReconciliationStatus, json_mode: bool) {
    let report = StatusReport {
        status,
        line: StatusLine::from(status),
    };
    if json_mode {
        // One compact object per line
        println!("{}", report.to_json());
    } else {
        output(&report, false);
    }
}

/// Feed stdin frame messages to an engine and print every status.
pub async fn execute(args: WatchArgs, config: &Config, json_mode: bool) -> Result<()> {
    let client = super::lms_client(config)?;
    let mut policy = ReconciliationPolicy::from(&config.reconciliation);
    if let Some(attempts) = args.max_poll_attempts {
        anyhow::ensure!(
            (1..=20).contains(&attempts),
            "--max-poll-attempts must be between 1 and 20"
        );
        policy.max_poll_attempts = attempts;
    }

    let bus = FrameMessageBus::new();
    let engine = ReconciliationEngine::new(
        CourseRef::new(args.course),
        UnitRef::new(args.unit),
        client,
        Arc::new(TokioScheduler),
        policy,
    );
    let handle = engine.spawn(bus.attach());
    let mut statuses = handle.subscribe();

    let reader_bus = bus.clone();
    let mut reader = tokio::spawn(async move {
        let mut submits = 0_u64;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(message) => {
                        if CompletionNotification::from_message(&message).is_ok() {
                            submits += 1;
                        }
                        reader_bus.publish(message);
                    }
                    Err(err) => warn!(error = %err, "skipping line that is not JSON"),
                },
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "stdin read failed");
                    break;
                }
            }
        }
        submits
    });

    // Generation the engine must reach before we stop; known once stdin closes.
    let mut expected: Option<u64> = None;
    let settled = |status: &ReconciliationStatus, expected: Option<u64>| {
        expected.is_some_and(|generation| {
            status.generation >= generation && !status.state.is_awaiting()
        })
    };
    loop {
        tokio::select! {
            changed = statuses.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = statuses.borrow_and_update().clone();
                print_status(&status, json_mode);
                if settled(&status, expected) {
                    break;
                }
            }
            submits = &mut reader, if expected.is_none() => {
                let submits = submits.unwrap_or_default();
                debug!(submits, "stdin closed");
                expected = Some(submits);
                if settled(&statuses.borrow(), expected) {
                    break;
                }
            }
        }
    }

    handle.dispose().await;
    Ok(())
}
