//! Update and check commands

use std::path::Path;
use std::sync::Arc;

use colored::Colorize;

use crate::config::get_config;
use crate::database::{ArchiveSource, LocalArchiveSource, UpdateOutcome};
use crate::interfaces::cli::CliError;
use crate::runtime::lifetime::startup::{build_updater, check_config, http_source};

fn join_error(e: tokio::task::JoinError) -> CliError {
    CliError::CommandError(format!("update task failed: {}", e))
}

/// Run one forced update cycle, from the provider or a local archive
pub async fn run_update(archive: Option<String>) -> Result<(), CliError> {
    let config = get_config();
    check_config(&config).map_err(|e| CliError::ConfigError(e.to_string()))?;

    let source: Arc<dyn ArchiveSource> = match archive {
        Some(path) => {
            if !Path::new(&path).is_file() {
                return Err(CliError::CommandError(format!(
                    "archive not found: {}",
                    path
                )));
            }
            Arc::new(LocalArchiveSource::new(path))
        }
        None => {
            if !config.geoip.has_credentials() {
                return Err(CliError::ConfigError(
                    "geoip.account_id and geoip.license_key are required to download".to_string(),
                ));
            }
            http_source(&config.geoip)
        }
    };

    println!(
        "{} {}",
        "Updating ip database from".yellow(),
        source.describe().blue()
    );

    let updater = build_updater(&config.geoip, source);
    let worker = updater.clone();
    let outcome = tokio::task::spawn_blocking(move || worker.force_update())
        .await
        .map_err(join_error)??;

    match outcome {
        UpdateOutcome::Updated { .. } => {
            let path = updater.settings().database_path();
            println!(
                "  {} {}",
                "Database updated:".green(),
                path.display().to_string().blue()
            );
            if let Some(report) = updater.status().last_run {
                println!("  {} {} ms", "Took".dimmed(), report.duration_ms);
            }
            Ok(())
        }
        other => Err(CliError::CommandError(format!("update did not run: {}", other))),
    }
}

/// Print local vs remote modification times
pub async fn check_database() -> Result<(), CliError> {
    let config = get_config();
    check_config(&config).map_err(|e| CliError::ConfigError(e.to_string()))?;

    let updater = build_updater(&config.geoip, http_source(&config.geoip));
    let worker = updater.clone();
    let report = tokio::task::spawn_blocking(move || worker.check_freshness())
        .await
        .map_err(join_error)?;

    let fmt_ts = |ts: Option<chrono::DateTime<chrono::Utc>>| match ts {
        Some(ts) => ts.to_rfc2822().normal(),
        None => "unknown".red(),
    };

    println!(
        "{} {}",
        "Database file:".bold(),
        updater.settings().database_path().display()
    );
    println!("  {} {}", "Local modified: ".cyan(), fmt_ts(report.local));
    println!("  {} {}", "Remote modified:".cyan(), fmt_ts(report.remote));
    if report.update_due {
        println!("  {}", "Update available".green().bold());
    } else if report.local.is_none() {
        println!("  {}", "No local database; run `ipgeo update`".yellow());
    } else {
        println!("  {}", "Up to date".green());
    }
    Ok(())
}
