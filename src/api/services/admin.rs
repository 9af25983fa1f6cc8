//! Admin API
//!
//! - `POST /admin/update`: run a forced update cycle now
//! - `GET /admin/update`: updater status

use actix_web::{HttpResponse, Responder, web};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::response::{ApiResponse, ErrorCode};
use crate::database::{DatabaseUpdater, UpdateOutcome};

pub struct AdminService;

impl AdminService {
    pub async fn trigger_update(updater: web::Data<Arc<DatabaseUpdater>>) -> impl Responder {
        if updater.is_running() {
            return Self::in_progress();
        }

        info!("Manual database update requested via admin API");
        let worker = updater.get_ref().clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = worker.force_update();
            (result, worker.status().last_run)
        })
        .await;

        match joined {
            Ok((Ok(UpdateOutcome::Skipped), _)) => Self::in_progress(),
            Ok((Ok(outcome), report)) => {
                info!("Manual database update finished: {}", outcome);
                HttpResponse::Ok().json(ApiResponse {
                    code: ErrorCode::Success as i32,
                    message: outcome.to_string(),
                    data: report,
                })
            }
            Ok((Err(e), report)) => {
                error!("Manual database update failed: {}", e);
                HttpResponse::InternalServerError().json(ApiResponse {
                    code: ErrorCode::UpdateFailed as i32,
                    message: e.format_simple(),
                    data: report,
                })
            }
            Err(e) => {
                error!("Manual database update task panicked: {}", e);
                HttpResponse::InternalServerError().json(ApiResponse::<()>::error(
                    ErrorCode::InternalServerError,
                    "update task failed",
                ))
            }
        }
    }

    pub async fn update_status(updater: web::Data<Arc<DatabaseUpdater>>) -> impl Responder {
        HttpResponse::Ok().json(ApiResponse::ok(updater.status()))
    }

    fn in_progress() -> HttpResponse {
        warn!("Manual database update rejected: another update is running");
        HttpResponse::Conflict().json(ApiResponse::<()>::error(
            ErrorCode::UpdateInProgress,
            "an update is already in progress",
        ))
    }
}

/// Admin 路由配置，外层 scope 需包裹 `AdminAuth`
pub fn admin_routes() -> actix_web::Scope {
    web::scope("")
        .route("/update", web::post().to(AdminService::trigger_update))
        .route("/update", web::get().to(AdminService::update_status))
}
