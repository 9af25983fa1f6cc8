use tokio::signal;
use tracing::{info, warn};

use crate::database::SchedulerHandle;

pub async fn listen_for_shutdown() {
    // 等待 Ctrl+C 信号
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }
}

/// 停止后台任务
///
/// An update already running on the blocking pool is not interrupted; its
/// temp files are left for the next run to ignore.
pub fn perform_shutdown_tasks(scheduler: Option<SchedulerHandle>) {
    if let Some(scheduler) = scheduler {
        scheduler.stop();
    }
    info!("All shutdown tasks completed");
}
