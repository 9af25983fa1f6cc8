use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info, warn};

use crate::api::ApiSettings;
use crate::config::{GeoIpConfig, StaticConfig, get_config, validate_config};
use crate::database::{
    ArchiveSource, BootstrapOutcome, Credentials, DatabaseSwapper, DatabaseUpdater,
    HttpArchiveSource, SchedulerHandle, UpdaterSettings, WeeklySchedule, spawn_weekly_updates,
};
use crate::services::MaxMindOpener;

pub struct StartupContext {
    pub swapper: Arc<DatabaseSwapper>,
    pub updater: Arc<DatabaseUpdater>,
    pub api_settings: ApiSettings,
    pub bootstrap: BootstrapOutcome,
    /// `None` when auto-update is disabled
    pub scheduler: Option<SchedulerHandle>,
}

/// Log every configuration issue; fail on errors
pub fn check_config(config: &StaticConfig) -> Result<()> {
    let issues = validate_config(config);
    let mut errors = 0;
    for issue in &issues {
        if issue.is_error() {
            error!("Config error: {}", issue.message());
            errors += 1;
        } else {
            warn!("Config warning: {}", issue.message());
        }
    }
    if errors > 0 {
        bail!("{} configuration error(s), see log", errors);
    }
    Ok(())
}

/// The provider described by `[geoip]`
pub fn http_source(geoip: &GeoIpConfig) -> Arc<dyn ArchiveSource> {
    Arc::new(HttpArchiveSource::new(
        geoip.download_url.clone(),
        Credentials::new(geoip.account_id.clone(), geoip.license_key.clone()),
        &geoip.timeouts,
    ))
}

/// Swapper backed by the MaxMind reader, plus an updater around it
pub fn build_updater(geoip: &GeoIpConfig, source: Arc<dyn ArchiveSource>) -> Arc<DatabaseUpdater> {
    let swapper = Arc::new(DatabaseSwapper::new(Arc::new(MaxMindOpener)));
    Arc::new(DatabaseUpdater::new(
        UpdaterSettings::from_config(geoip),
        source,
        swapper,
    ))
}

/// 准备服务器启动的上下文
///
/// Validates configuration, loads (or first fetches) the database and starts
/// the weekly scheduler. A missing database is not fatal: the server starts
/// and answers 503 until an update succeeds.
pub async fn prepare_server_startup() -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let config = get_config();
    check_config(&config)?;

    let updater = build_updater(&config.geoip, http_source(&config.geoip));
    let swapper = updater.swapper().clone();

    let bootstrap = {
        let updater = updater.clone();
        tokio::task::spawn_blocking(move || updater.bootstrap())
            .await
            .context("Database bootstrap task failed")?
    };
    match &bootstrap {
        BootstrapOutcome::Loaded {
            generation,
            retries,
        } => info!(
            "ip database ready (generation {}, {} download attempt(s))",
            generation, retries
        ),
        BootstrapOutcome::Unavailable { reason } => warn!(
            "Starting without an ip database ({}); lookups return 503 until an update succeeds",
            reason
        ),
    }

    let scheduler = if config.geoip.auto_update {
        let schedule = WeeklySchedule::from_config(&config.geoip.schedule)
            .context("Invalid update schedule")?;
        Some(spawn_weekly_updates(updater.clone(), schedule))
    } else {
        info!("Automatic database updates disabled");
        None
    };

    info!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );

    Ok(StartupContext {
        swapper,
        updater,
        api_settings: ApiSettings::from_config(&config),
        bootstrap,
        scheduler,
    })
}
