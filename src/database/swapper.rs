//! Database swapper
//!
//! Owns the live database handle. Readers take a cheap `Arc` snapshot with
//! `current()`; the updater publishes replacements with `swap()`. A replaced
//! handle is closed when its last in-flight reader lets go of it, so there is
//! never a moment without a usable handle once one has been published.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::errors::{GeoIpError, Result};
use crate::services::geoip::{DatabaseOpener, GeoIpLookup, GeoRecord};

/// An open, queryable database
pub struct ActiveDatabase {
    reader: Box<dyn GeoIpLookup>,
    path: PathBuf,
    generation: u64,
    loaded_at: DateTime<Utc>,
}

impl ActiveDatabase {
    pub fn lookup(&self, ip: IpAddr, locale: &str) -> Result<Option<GeoRecord>> {
        self.reader.lookup(ip, locale)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Increases by one for every successfully opened database
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn provider_name(&self) -> &'static str {
        self.reader.name()
    }
}

impl Drop for ActiveDatabase {
    fn drop(&mut self) {
        debug!(
            "Closing geo database generation {} ({})",
            self.generation,
            self.path.display()
        );
    }
}

impl std::fmt::Debug for ActiveDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveDatabase")
            .field("provider", &self.reader.name())
            .field("path", &self.path)
            .field("generation", &self.generation)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

pub struct DatabaseSwapper {
    opener: Arc<dyn DatabaseOpener>,
    active: ArcSwapOption<ActiveDatabase>,
    generation: AtomicU64,
}

impl DatabaseSwapper {
    pub fn new(opener: Arc<dyn DatabaseOpener>) -> Self {
        Self {
            opener,
            active: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
        }
    }

    /// Open `path` without publishing it
    pub fn open(&self, path: &Path) -> Result<ActiveDatabase> {
        let reader = self.opener.open(path).map_err(|e| match e {
            GeoIpError::DatabaseOpen(_) => e,
            other => GeoIpError::database_open(other.message()),
        })?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ActiveDatabase {
            reader,
            path: path.to_path_buf(),
            generation,
            loaded_at: Utc::now(),
        })
    }

    /// Publish `database` for all subsequent queries and hand back the one it
    /// replaced
    pub fn swap(&self, database: ActiveDatabase) -> Option<Arc<ActiveDatabase>> {
        let generation = database.generation;
        let previous = self.active.swap(Some(Arc::new(database)));
        match &previous {
            Some(old) => info!(
                "Geo database generation {} replaced generation {}",
                generation, old.generation
            ),
            None => info!("Geo database generation {} is now active", generation),
        }
        previous
    }

    /// Open then swap. If the open fails the current handle stays in place.
    pub fn reload(&self, path: &Path) -> Result<u64> {
        let database = match self.open(path) {
            Ok(db) => db,
            Err(e) => {
                error!("Failed to load ip database {}: {}", path.display(), e);
                return Err(e);
            }
        };
        let generation = database.generation;
        // previous handle is released here, or later by the last reader holding it
        drop(self.swap(database));
        Ok(generation)
    }

    /// Snapshot of the active handle, `None` while no database is loaded
    pub fn current(&self) -> Option<Arc<ActiveDatabase>> {
        self.active.load_full()
    }

    /// Like `current`, but as an error the query path can report
    pub fn require(&self) -> Result<Arc<ActiveDatabase>> {
        self.current()
            .ok_or_else(|| GeoIpError::unavailable("ip database is not loaded"))
    }

    pub fn is_loaded(&self) -> bool {
        self.active.load().is_some()
    }
}
