//! Geo database lifecycle
//!
//! Download, unpack, publish and hot-swap the on-disk GeoLite2 database, plus
//! the weekly schedule that drives it.

pub mod extractor;
pub mod fetcher;
pub mod lockfile;
pub mod scheduler;
pub mod swapper;
pub mod types;
pub mod updater;

pub use extractor::{ExtractSummary, extract, locate_payload};
pub use fetcher::{ArchiveSource, HttpArchiveSource, LocalArchiveSource, parse_http_date};
pub use lockfile::StorageLock;
pub use scheduler::{SchedulerHandle, WeeklySchedule, spawn_weekly_updates};
pub use swapper::{ActiveDatabase, DatabaseSwapper};
pub use types::{
    BootstrapOutcome, Credentials, FreshnessReport, UpdateOutcome, UpdateReport, UpdateStatus,
    UpdateTrigger,
};
pub use updater::{BOOTSTRAP_MAX_RETRIES, DatabaseUpdater, UpdaterSettings};
