//! Update orchestrator
//!
//! One update cycle:
//!
//! ```text
//! CHECK_FRESHNESS ─ fresh ─▶ DONE_NOOP
//!       │ stale (or forced)
//!       ▼
//! DOWNLOAD ▶ EXTRACT ▶ LOCATE_PAYLOAD ▶ PUBLISH ▶ RELOAD ▶ CLEANUP ▶ SUCCESS
//!     └──────────┴───────────┴─────────────┴─────────┴──▶ FAILED
//! ```
//!
//! DOWNLOAD through PUBLISH run under a single lock so nothing else writes the
//! storage directory meanwhile. A run-in-progress flag makes a second caller
//! return `Skipped` instead of waiting; the storage lock file does the same
//! for a second process working on the same directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::extractor::{extract, locate_payload};
use super::fetcher::ArchiveSource;
use super::lockfile::StorageLock;
use super::swapper::DatabaseSwapper;
use super::types::{
    BootstrapOutcome, FreshnessReport, UpdateOutcome, UpdateReport, UpdateRun, UpdateStatus,
    UpdateTrigger,
};
use crate::config::{ARCHIVE_FILENAME, DATABASE_FILENAME, GeoIpConfig, TEMP_DIR_PREFIX};
use crate::errors::{GeoIpError, Result};

/// Extra open attempts at startup, each preceded by one update cycle
pub const BOOTSTRAP_MAX_RETRIES: u32 = 1;

/// Filesystem layout and policy the updater works with
#[derive(Debug, Clone)]
pub struct UpdaterSettings {
    pub auto_update: bool,
    pub storage_dir: PathBuf,
    pub database_file_name: String,
    pub archive_file_name: String,
}

impl UpdaterSettings {
    pub fn new(storage_dir: impl Into<PathBuf>, auto_update: bool) -> Self {
        Self {
            auto_update,
            storage_dir: storage_dir.into(),
            database_file_name: DATABASE_FILENAME.to_string(),
            archive_file_name: ARCHIVE_FILENAME.to_string(),
        }
    }

    pub fn from_config(config: &GeoIpConfig) -> Self {
        Self::new(config.storage_dir(), config.auto_update)
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join(&self.database_file_name)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.storage_dir.join(&self.archive_file_name)
    }
}

/// Clears the run-in-progress flag when the run ends, however it ends
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Millisecond comparison; equal counts as not newer
fn is_newer(remote: &DateTime<Utc>, local: &DateTime<Utc>) -> bool {
    remote.timestamp_millis() > local.timestamp_millis()
}

fn local_modified(path: &Path) -> std::io::Result<DateTime<Utc>> {
    Ok(DateTime::<Utc>::from(fs::metadata(path)?.modified()?))
}

pub struct DatabaseUpdater {
    settings: UpdaterSettings,
    source: Arc<dyn ArchiveSource>,
    swapper: Arc<DatabaseSwapper>,
    /// Serializes download, extraction and publish
    fs_lock: Mutex<()>,
    in_progress: AtomicBool,
    status: RwLock<UpdateStatus>,
}

impl DatabaseUpdater {
    pub fn new(
        settings: UpdaterSettings,
        source: Arc<dyn ArchiveSource>,
        swapper: Arc<DatabaseSwapper>,
    ) -> Self {
        Self {
            settings,
            source,
            swapper,
            fs_lock: Mutex::new(()),
            in_progress: AtomicBool::new(false),
            status: RwLock::new(UpdateStatus::default()),
        }
    }

    pub fn settings(&self) -> &UpdaterSettings {
        &self.settings
    }

    pub fn swapper(&self) -> &Arc<DatabaseSwapper> {
        &self.swapper
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn status(&self) -> UpdateStatus {
        let mut status = self.status.read().clone();
        status.in_progress = self.is_running();
        status
    }

    /// Startup: load the local database, fetching it first if it is missing
    /// or cannot be opened
    ///
    /// With auto-update enabled, one unconditional cycle is run and the open
    /// retried once. Nothing here is fatal; the worst case
    /// is a service without a database.
    pub fn bootstrap(&self) -> BootstrapOutcome {
        if let Err(e) = fs::create_dir_all(&self.settings.storage_dir) {
            error!(
                "Failed to create database directory {}: {}",
                self.settings.storage_dir.display(),
                e
            );
            return BootstrapOutcome::Unavailable {
                reason: format!("cannot create storage directory: {}", e),
            };
        }

        self.sweep_stale_temp_dirs();

        let db_path = self.settings.database_path();
        let mut retries = 0;
        loop {
            let reason = if db_path.exists() {
                match self.swapper.reload(&db_path) {
                    Ok(generation) => {
                        return BootstrapOutcome::Loaded {
                            generation,
                            retries,
                        };
                    }
                    Err(e) => e.to_string(),
                }
            } else {
                "database file does not exist".to_string()
            };

            if !self.settings.auto_update || retries >= BOOTSTRAP_MAX_RETRIES {
                error!(
                    "ip database {} unusable ({}), lookups are unavailable",
                    db_path.display(),
                    reason
                );
                return BootstrapOutcome::Unavailable { reason };
            }

            retries += 1;
            warn!(
                "ip database {} unusable ({}), downloading (attempt {}/{})",
                db_path.display(),
                reason,
                retries,
                BOOTSTRAP_MAX_RETRIES
            );
            // the loaded handle comes from the open at the top of the loop
            if let Err(e) = self.run(UpdateTrigger::Bootstrap, |run| {
                self.fetch_and_publish(run).map(|_| UpdateOutcome::Published)
            }) {
                error!("Bootstrap update failed: {}", e);
            }
        }
    }

    /// Scheduled path: update only when the provider has something newer
    /// than the local file
    pub fn auto_update(&self) -> Result<UpdateOutcome> {
        if !self.settings.auto_update {
            debug!("Auto update disabled, nothing to do");
            return Ok(UpdateOutcome::Disabled);
        }
        self.run(UpdateTrigger::Scheduled, |run| {
            let db_path = self.settings.database_path();
            let local = match local_modified(&db_path) {
                Ok(ts) => ts,
                Err(e) => {
                    error!("ip database file {} unavailable: {}", db_path.display(), e);
                    return Ok(UpdateOutcome::NoLocalDatabase);
                }
            };

            // HEAD only reads; the storage lock is taken by `run`, fs_lock is not needed
            let Some(remote) = self.source.remote_last_modified() else {
                info!("Remote freshness unknown, skipping update");
                return Ok(UpdateOutcome::FreshnessUnknown);
            };

            if !is_newer(&remote, &local) {
                info!(
                    "ip database is up to date (local {}, remote {})",
                    local, remote
                );
                return Ok(UpdateOutcome::UpToDate);
            }

            info!(
                "ip database is stale (local {}, remote {}), updating",
                local, remote
            );
            self.update_and_reload(run)
        })
    }

    /// Freshness comparison without updating anything
    pub fn check_freshness(&self) -> FreshnessReport {
        let local = local_modified(&self.settings.database_path()).ok();
        let remote = self.source.remote_last_modified();
        let update_due = match (&remote, &local) {
            (Some(remote), Some(local)) => is_newer(remote, local),
            _ => false,
        };
        FreshnessReport {
            local,
            remote,
            update_due,
        }
    }

    /// Manual path: full cycle without the freshness check
    pub fn force_update(&self) -> Result<UpdateOutcome> {
        self.run(UpdateTrigger::Manual, |run| self.update_and_reload(run))
    }

    /// Run `cycle` under the run-in-progress flag and record its report
    fn run<F>(&self, trigger: UpdateTrigger, cycle: F) -> Result<UpdateOutcome>
    where
        F: FnOnce(&UpdateRun) -> Result<UpdateOutcome>,
    {
        let Some(_guard) = RunGuard::acquire(&self.in_progress) else {
            warn!("Database update ({}) skipped: another update is running", trigger);
            return Ok(UpdateOutcome::Skipped);
        };
        let _storage_lock = match StorageLock::try_acquire(&self.settings.storage_dir) {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                warn!(
                    "Database update ({}) skipped: {} is being updated by another process",
                    trigger,
                    self.settings.storage_dir.display()
                );
                return Ok(UpdateOutcome::Skipped);
            }
            Err(e) => {
                error!("Database update ({}) failed: {}", trigger, e);
                return Err(e);
            }
        };

        let run = UpdateRun::new(trigger, &self.settings.storage_dir);
        let started_at = Utc::now();
        self.status.write().current_trigger = Some(trigger);
        debug!("Update run {} ({}) started", run.token, trigger);

        let result = cycle(&run);

        let report = match &result {
            Ok(outcome) => UpdateReport::success(trigger, *outcome, started_at),
            Err(e) => {
                error!("Database update ({}) failed: {}", trigger, e);
                UpdateReport::failure(trigger, started_at, e.to_string())
            }
        };
        {
            let mut status = self.status.write();
            status.current_trigger = None;
            if report.outcome.is_some_and(|o| o.changed_database()) {
                status.last_success = Some(report.clone());
            }
            status.last_run = Some(report);
        }
        result
    }

    fn update_and_reload(&self, run: &UpdateRun) -> Result<UpdateOutcome> {
        self.fetch_and_publish(run)?;

        let reloaded = self.swapper.reload(&self.settings.database_path());
        // the new file is already in place, so temp artifacts go either way
        self.cleanup(run);
        let generation = reloaded?;
        info!("ip database updated and reloaded (generation {})", generation);
        Ok(UpdateOutcome::Updated { generation })
    }

    /// DOWNLOAD → EXTRACT → LOCATE_PAYLOAD → PUBLISH
    ///
    /// Returns the canonical database path. The archive and temp directory are
    /// left behind after an extraction failure, for inspection.
    fn fetch_and_publish(&self, run: &UpdateRun) -> Result<PathBuf> {
        let _lock = self.fs_lock.lock();
        fs::create_dir_all(&self.settings.storage_dir)?;
        let archive_path = self.settings.archive_path();

        info!(
            "Downloading ip database from {} (run {})",
            self.source.describe(),
            run.token
        );
        if let Err(e) = self.source.download(&archive_path) {
            remove_file_quietly(&archive_path);
            return Err(e);
        }

        extract(&archive_path, &run.temp_dir)?;
        info!("ip database archive extracted to {}", run.temp_dir.display());

        let Some(payload) = locate_payload(&run.temp_dir, &self.settings.database_file_name)
        else {
            self.cleanup(run);
            return Err(GeoIpError::payload_missing(format!(
                "no {} found in {}",
                self.settings.database_file_name,
                run.temp_dir.display()
            )));
        };

        let db_path = self.settings.database_path();
        if let Err(e) = fs::rename(&payload, &db_path) {
            self.cleanup(run);
            return Err(GeoIpError::file_operation(format!(
                "failed to move {} to {}: {}",
                payload.display(),
                db_path.display(),
                e
            )));
        }
        info!("ip database file replaced at {}", db_path.display());

        if run.trigger == UpdateTrigger::Bootstrap {
            self.cleanup(run);
        }
        Ok(db_path)
    }

    /// Remove `temp-*` directories that failed extractions left behind
    ///
    /// Only done while holding the storage lock, so no live run loses its
    /// working directory.
    fn sweep_stale_temp_dirs(&self) {
        let lock = match StorageLock::try_acquire(&self.settings.storage_dir) {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                debug!("Storage directory busy, stale temp directories kept");
                return;
            }
            Err(e) => {
                warn!("Cannot sweep stale temp directories: {}", e);
                return;
            }
        };

        let Ok(entries) = fs::read_dir(&self.settings.storage_dir) else {
            return;
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let stale = path.is_dir()
                && entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(TEMP_DIR_PREFIX);
            if !stale {
                continue;
            }
            match fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove stale {}: {}", path.display(), e),
            }
        }
        if removed > 0 {
            info!("Removed {} stale temp director(ies)", removed);
        }
        drop(lock);
    }

    /// Best effort; failures here never fail the cycle
    fn cleanup(&self, run: &UpdateRun) {
        if run.temp_dir.exists()
            && let Err(e) = fs::remove_dir_all(&run.temp_dir)
        {
            warn!(
                "Failed to remove temp directory {}: {}",
                run.temp_dir.display(),
                e
            );
        }
        remove_file_quietly(&self.settings.archive_path());
    }
}

fn remove_file_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
