use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, trace};

use super::response::{ApiResponse, ErrorCode};
use crate::database::{DatabaseSwapper, DatabaseUpdater, UpdateStatus};

// 应用启动时间结构体
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthDatabaseCheck {
    pub status: String,
    pub provider: Option<&'static str>,
    pub generation: Option<u64>,
    pub path: Option<String>,
    pub loaded_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub uptime: u32,
    pub database: HealthDatabaseCheck,
    pub updater: UpdateStatus,
    pub response_time_ms: u32,
}

/// Health Service
///
/// 只读取当前句柄和更新器状态，不做查询，探针可以频繁调用。
pub struct HealthService;

impl HealthService {
    pub async fn health_check(
        swapper: web::Data<Arc<DatabaseSwapper>>,
        updater: web::Data<Arc<DatabaseUpdater>>,
        app_start_time: web::Data<AppStartTime>,
    ) -> impl Responder {
        let start_time = Instant::now();
        trace!("Received health check request");

        let database = match swapper.current() {
            Some(db) => HealthDatabaseCheck {
                status: "healthy".to_string(),
                provider: Some(db.provider_name()),
                generation: Some(db.generation()),
                path: Some(db.path().display().to_string()),
                loaded_at: Some(db.loaded_at().to_rfc3339()),
            },
            None => HealthDatabaseCheck {
                status: "unavailable".to_string(),
                provider: None,
                generation: None,
                path: None,
                loaded_at: None,
            },
        };
        let is_healthy = database.generation.is_some();

        let now = chrono::Utc::now();
        let uptime_seconds = (now - app_start_time.start_datetime).num_seconds().max(0) as u32;

        let health_data = HealthResponse {
            status: if is_healthy { "healthy" } else { "unhealthy" }.to_string(),
            timestamp: now.to_rfc3339(),
            uptime: uptime_seconds,
            database,
            updater: updater.status(),
            response_time_ms: start_time.elapsed().as_millis() as u32,
        };

        let (response_status, body) = if is_healthy {
            (StatusCode::OK, ApiResponse::ok(health_data))
        } else {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiResponse::error(ErrorCode::ServiceUnavailable, "Service Unavailable")
                    .with_data(health_data),
            )
        };

        info!(
            "Health check completed in {:?}, status: {}, uptime: {}s",
            start_time.elapsed(),
            if is_healthy { "healthy" } else { "unhealthy" },
            uptime_seconds
        );

        HttpResponse::build(response_status)
            .append_header(("Content-Type", "application/json; charset=utf-8"))
            .json(body)
    }

    // 就绪检查：有可用数据库句柄才返回 200
    pub async fn readiness_check(swapper: web::Data<Arc<DatabaseSwapper>>) -> impl Responder {
        trace!("Received readiness check request");

        if swapper.is_loaded() {
            HttpResponse::Ok()
                .append_header(("Content-Type", "text/plain"))
                .body("OK")
        } else {
            HttpResponse::ServiceUnavailable()
                .append_header(("Content-Type", "text/plain"))
                .body("database not loaded")
        }
    }

    // 活跃性检查
    pub async fn liveness_check() -> impl Responder {
        trace!("Received liveness check request");

        HttpResponse::NoContent().finish()
    }
}

/// Health 路由配置
pub fn health_routes() -> actix_web::Scope {
    web::scope("/health")
        .route("", web::get().to(HealthService::health_check))
        .route("", web::head().to(HealthService::health_check))
        .route("/ready", web::get().to(HealthService::readiness_check))
        .route("/ready", web::head().to(HealthService::readiness_check))
        .route("/live", web::get().to(HealthService::liveness_check))
        .route("/live", web::head().to(HealthService::liveness_check))
}
