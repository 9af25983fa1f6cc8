//! Database lifecycle type definitions
//!
//! - `Credentials`: provider account id / license key
//! - `UpdateTrigger`: who started an update cycle
//! - `UpdateOutcome`: how a cycle ended when it did not fail
//! - `UpdateReport`: record of a finished cycle
//! - `UpdateStatus`: current updater status

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::TEMP_DIR_PREFIX;

/// HTTP Basic credentials for the database provider
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub account_id: String,
    pub license_key: String,
}

impl Credentials {
    pub fn new(account_id: impl Into<String>, license_key: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            license_key: license_key.into(),
        }
    }

    /// Value of the `Authorization` header
    pub fn basic_auth_header(&self) -> String {
        let raw = format!("{}:{}", self.account_id, self.license_key);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("license_key", &"<redacted>")
            .finish()
    }
}

/// What started an update cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateTrigger {
    /// Process start, local database missing
    Bootstrap,
    /// Weekly scheduler tick
    Scheduled,
    /// CLI `update` or `POST /admin/update`
    Manual,
}

impl fmt::Display for UpdateTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateTrigger::Bootstrap => write!(f, "bootstrap"),
            UpdateTrigger::Scheduled => write!(f, "scheduled"),
            UpdateTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Non-failing end states of an update cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// New database published and loaded
    Updated { generation: u64 },
    /// New database published, loading deferred to the caller
    Published,
    /// Remote archive is not newer than the local file
    UpToDate,
    /// Provider did not report a usable Last-Modified header
    FreshnessUnknown,
    /// Auto-update disabled by configuration
    Disabled,
    /// Scheduled update needs an existing local file
    NoLocalDatabase,
    /// Another cycle was already running
    Skipped,
}

impl UpdateOutcome {
    /// Whether the cycle replaced the on-disk database
    pub fn changed_database(&self) -> bool {
        matches!(
            self,
            UpdateOutcome::Updated { .. } | UpdateOutcome::Published
        )
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::Updated { generation } => write!(f, "updated (generation {})", generation),
            UpdateOutcome::Published => write!(f, "published"),
            UpdateOutcome::UpToDate => write!(f, "up to date"),
            UpdateOutcome::FreshnessUnknown => write!(f, "freshness unknown"),
            UpdateOutcome::Disabled => write!(f, "auto update disabled"),
            UpdateOutcome::NoLocalDatabase => write!(f, "no local database"),
            UpdateOutcome::Skipped => write!(f, "skipped, update in progress"),
        }
    }
}

/// One fetch → extract → swap attempt
///
/// The token names the temporary extraction directory, so concurrent or
/// retried runs never share one.
#[derive(Debug, Clone)]
pub struct UpdateRun {
    pub token: Uuid,
    pub trigger: UpdateTrigger,
    pub temp_dir: PathBuf,
}

impl UpdateRun {
    pub fn new(trigger: UpdateTrigger, storage_dir: &Path) -> Self {
        let token = Uuid::new_v4();
        Self {
            token,
            trigger,
            temp_dir: storage_dir.join(format!("{}{}", TEMP_DIR_PREFIX, token)),
        }
    }
}

/// Record of a finished update cycle
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub trigger: UpdateTrigger,
    pub success: bool,
    pub outcome: Option<UpdateOutcome>,
    /// Error message if failed
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl UpdateReport {
    pub fn success(
        trigger: UpdateTrigger,
        outcome: UpdateOutcome,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        Self {
            trigger,
            success: true,
            outcome: Some(outcome),
            message: None,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
        }
    }

    pub fn failure(trigger: UpdateTrigger, started_at: DateTime<Utc>, error: String) -> Self {
        let finished_at = Utc::now();
        Self {
            trigger,
            success: false,
            outcome: None,
            message: Some(error),
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
        }
    }
}

/// Current status of the updater
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateStatus {
    pub in_progress: bool,
    pub current_trigger: Option<UpdateTrigger>,
    pub last_run: Option<UpdateReport>,
    /// Last run that actually replaced the database
    pub last_success: Option<UpdateReport>,
}

/// Local vs remote modification times
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FreshnessReport {
    /// `None` when there is no local database file
    pub local: Option<DateTime<Utc>>,
    /// `None` when the provider did not report one
    pub remote: Option<DateTime<Utc>>,
    /// Remote is strictly newer than local
    pub update_due: bool,
}

/// Result of the startup bootstrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Loaded { generation: u64, retries: u32 },
    Unavailable { reason: String },
}
