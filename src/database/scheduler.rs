//! Weekly update scheduler
//!
//! Fires `DatabaseUpdater::auto_update` once a week at a fixed local time. A
//! tick that arrives while a run is still going is dropped, not queued.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Local, NaiveTime, TimeZone, Weekday};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::types::UpdateOutcome;
use super::updater::DatabaseUpdater;
use crate::config::ScheduleConfig;
use crate::errors::{GeoIpError, Result};

/// A weekday plus wall-clock time, e.g. Monday 10:00
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    weekday: Weekday,
    time: NaiveTime,
}

impl WeeklySchedule {
    pub fn new(weekday: Weekday, hour: u32, minute: u32) -> Result<Self> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            GeoIpError::config(format!("invalid schedule time {:02}:{:02}", hour, minute))
        })?;
        Ok(Self { weekday, time })
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        Self::new(config.weekday, config.hour, config.minute)
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// First fire time strictly after `now`, in `now`'s time zone
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let today = now.date_naive();
        let days_ahead = (7 + self.weekday.num_days_from_monday()
            - today.weekday().num_days_from_monday())
            % 7;

        // two weeks covers the same-day-already-passed case and a skipped
        // local time on a DST transition
        for offset in [0, 7, 14] {
            let date = today + Duration::days(i64::from(days_ahead + offset));
            if let Some(candidate) = tz.from_local_datetime(&date.and_time(self.time)).earliest()
                && candidate > *now
            {
                return candidate;
            }
        }
        now.clone() + Duration::days(7)
    }
}

impl std::fmt::Display for WeeklySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "every {} at {}", self.weekday, self.time.format("%H:%M"))
    }
}

/// Running scheduler; dropping the handle leaves the task running
pub struct SchedulerHandle {
    task: JoinHandle<()>,
    schedule: WeeklySchedule,
}

impl SchedulerHandle {
    pub fn schedule(&self) -> WeeklySchedule {
        self.schedule
    }

    pub fn stop(self) {
        self.task.abort();
        info!("Database update scheduler stopped");
    }
}

/// One scheduler tick
///
/// Returns `false` when the tick was dropped because a run is active. The
/// update itself runs on the blocking pool and is not awaited, so a slow
/// download never delays the next tick computation.
pub fn tick(updater: &Arc<DatabaseUpdater>) -> bool {
    if updater.is_running() {
        warn!("Scheduled database update skipped: previous run still active");
        return false;
    }
    let updater = updater.clone();
    tokio::task::spawn_blocking(move || match updater.auto_update() {
        Ok(UpdateOutcome::Updated { generation }) => {
            info!("Scheduled database update finished (generation {})", generation)
        }
        Ok(outcome) => debug!("Scheduled database update: {}", outcome),
        Err(e) => error!("Scheduled database update failed: {}", e),
    });
    true
}

/// Start the weekly loop on the current tokio runtime
pub fn spawn_weekly_updates(
    updater: Arc<DatabaseUpdater>,
    schedule: WeeklySchedule,
) -> SchedulerHandle {
    let task = tokio::spawn(async move {
        loop {
            let now = Local::now();
            let next = schedule.next_after(&now);
            debug!("Next scheduled database update at {}", next);

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            tick(&updater);
        }
    });

    info!("Database update scheduler started ({})", schedule);
    SchedulerHandle { task, schedule }
}
