//! `courseware config`: inspect the effective configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

/// Arguments for `courseware config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config subcommand.
    #[command(subcommand)]
    pub command: ConfigCommands,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the merged configuration (access token masked)
    Show,
}

/// Effective configuration with secrets masked.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigOutput {
    /// Merged configuration.
    pub config: Config,
}

impl ConfigOutput {
    fn masked(config: &Config) -> Self {
        let mut config = config.clone();
        if let Some(token) = config.lms.access_token.as_mut() {
            *token = "********".to_string();
        }
        Self { config }
    }
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_default()
    }
}

/// Run a config subcommand.
pub async fn execute(args: ConfigArgs, config: &Config, json_mode: bool) -> Result<()> {
    match args.command {
        ConfigCommands::Show => output(&ConfigOutput::masked(config), json_mode),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_masked() {
        let mut config = Config::default();
        config.lms.access_token = Some("secret-token".to_string());
        let out = ConfigOutput::masked(&config);
        assert!(!out.to_human().contains("secret-token"));
        assert_eq!(out.to_json()["lms"]["access_token"], "********");
        assert_eq!(out.to_json()["reconciliation"]["max_poll_attempts"], 3);
    }
}
