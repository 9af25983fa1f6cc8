//! Command-line interface definitions using clap
//!
//! This module defines the CLI structure for ipgeo using clap's derive macros.

use clap::{Parser, Subcommand};

/// ipgeo - IP geolocation service with a self-updating GeoLite2 database
#[derive(Parser)]
#[command(name = "ipgeo")]
#[command(version)]
#[command(about = "IP geolocation service with a self-updating GeoLite2 database", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands; no command starts the HTTP server
#[derive(Subcommand)]
pub enum Commands {
    /// Run one forced database update and exit
    Update {
        /// Use a local tar.gz instead of downloading from the provider
        #[arg(long)]
        archive: Option<String>,
    },

    /// Compare the remote Last-Modified with the local database file
    Check,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Force overwrite without confirmation
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_command_means_serve() {
        let cli = Cli::try_parse_from(["ipgeo"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_update_with_archive_and_global_config() {
        let cli =
            Cli::try_parse_from(["ipgeo", "update", "--archive", "db.tar.gz", "-c", "a.toml"])
                .unwrap();
        assert_eq!(cli.config.as_deref(), Some("a.toml"));
        match cli.command {
            Some(Commands::Update { archive }) => assert_eq!(archive.as_deref(), Some("db.tar.gz")),
            _ => panic!("expected update command"),
        }
    }

    #[test]
    fn test_config_generate() {
        let cli = Cli::try_parse_from(["ipgeo", "config", "generate", "out.toml", "--force"])
            .unwrap();
        match cli.command {
            Some(Commands::Config {
                action: ConfigCommands::Generate { output_path, force },
            }) => {
                assert_eq!(output_path.as_deref(), Some("out.toml"));
                assert!(force);
            }
            _ => panic!("expected config generate"),
        }
    }
}
