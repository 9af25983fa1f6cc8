//! CLI interface module
//!
//! This module provides command-line interface functionality for ipgeo.

pub mod commands;

use crate::cli::{Commands, ConfigCommands};
use crate::errors::GeoIpError;
use commands::{check_database, config_generate, run_update};
use std::fmt;

#[derive(Debug)]
pub enum CliError {
    ConfigError(String),
    UpdateError(GeoIpError),
    CommandError(String),
}

impl CliError {
    /// Format as simple output
    pub fn format_simple(&self) -> String {
        match self {
            CliError::ConfigError(msg) => format!("Config error: {}", msg),
            CliError::UpdateError(err) => format!("Update failed: {}", err.format_simple()),
            CliError::CommandError(msg) => format!("Command error: {}", msg),
        }
    }

    /// Format as colored output
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        match self {
            CliError::ConfigError(msg) => {
                format!("{} {}", "Config error:".yellow().bold(), msg.white())
            }
            CliError::UpdateError(err) => {
                format!("{}\n{}", "Update failed".red().bold(), err.format_colored())
            }
            CliError::CommandError(msg) => {
                format!("{} {}", "Command error:".red().bold(), msg.white())
            }
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for CliError {}

impl From<GeoIpError> for CliError {
    fn from(err: GeoIpError) -> Self {
        CliError::UpdateError(err)
    }
}

/// Run a CLI command from clap-parsed input
pub async fn run_cli_command(cmd: Commands) -> Result<(), CliError> {
    match cmd {
        Commands::Update { archive } => run_update(archive).await,
        Commands::Check => check_database().await,
        Commands::Config {
            action: ConfigCommands::Generate { output_path, force },
        } => config_generate(output_path, force).await,
    }
}
