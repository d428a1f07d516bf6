//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::{
    config::ConfigArgs, outline::OutlineArgs, resolve::ResolveArgs, watch::WatchArgs,
};

/// Command-line entry point.
#[derive(Parser, Debug)]
#[command(name = "courseware")]
#[command(about = "Courseware navigation and completion reconciliation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .courseware/config.yaml)
    #[arg(short, long, global = true, env = "COURSEWARE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show a course's sequences and units
    Outline(OutlineArgs),

    /// Resolve a route to the unit that would be displayed
    Resolve(ResolveArgs),

    /// Reconcile frame submit messages read from stdin
    Watch(WatchArgs),

    /// Configuration commands
    Config(ConfigArgs),
}
