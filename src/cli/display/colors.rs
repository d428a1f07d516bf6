//! Color mapping for completion and navigation states.
//!
//! `console` disables styling when stdout is not a terminal or `NO_COLOR`
//! is set.

use console::{style, StyledObject};

use crate::domain::models::{CompletionDisplay, ReconciliationState};

/// Completion message in its status color.
pub fn colorize_display(display: CompletionDisplay) -> StyledObject<&'static str> {
    let label = display.as_str();
    match display {
        CompletionDisplay::Success => style(label).green().bold(),
        CompletionDisplay::Checking => style(label).yellow(),
        CompletionDisplay::FailureFinal => style(label).red().bold(),
        CompletionDisplay::FailureRetryAvailable => style(label).red(),
        CompletionDisplay::None => style(label).dim(),
    }
}

/// Reconciliation state in its status color.
pub fn colorize_state(state: &ReconciliationState) -> StyledObject<&'static str> {
    let label = state.as_str();
    match state {
        ReconciliationState::Idle => style(label).dim(),
        ReconciliationState::AwaitingConvergence { .. } => style(label).yellow(),
        ReconciliationState::Resolved { .. } => style(label).cyan(),
    }
}

/// Green check or red cross.
pub fn flag(value: bool) -> StyledObject<&'static str> {
    if value {
        style("\u{2713}").green()
    } else {
        style("\u{2717}").red()
    }
}
