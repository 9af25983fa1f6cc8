//! Server mode
//!
//! This module contains the HTTP server startup logic.
//! It configures and starts the HTTP server with all necessary routes.

use actix_web::{
    App, HttpServer,
    middleware::{Compress, DefaultHeaders},
    web,
};
use anyhow::{Context, Result};
use tracing::warn;

use crate::api::middleware::AdminAuth;
use crate::api::services::{AppStartTime, admin_routes, health_routes, query_routes};
use crate::runtime::lifetime;

/// Run the HTTP server
///
/// This function:
/// 1. Records startup time
/// 2. Loads the database and starts the update scheduler
/// 3. Configures and starts the HTTP server
/// 4. Listens for graceful shutdown signals
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server() -> Result<()> {
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    let startup = lifetime::startup::prepare_server_startup()
        .await
        .inspect_err(|e| tracing::error!("Server startup failed: {}", e))?;

    let config = crate::config::get_config();
    let cpu_count = config.server.cpu_count.clamp(1, 32);
    warn!("Using {} CPU cores for the server", cpu_count);

    let swapper = startup.swapper.clone();
    let updater = startup.updater.clone();
    let api_settings = startup.api_settings.clone();

    if api_settings.admin_enabled() {
        warn!("Admin API available at: /admin");
    } else {
        warn!("Admin API is disabled (api.admin_token is empty)");
    }
    if api_settings.trusted_proxies.is_empty() {
        warn!(
            "Client IP: auto-detect mode. Connections from private IPs will use X-Forwarded-For. \
             To disable, configure server.trusted_proxies explicitly."
        );
    }

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(DefaultHeaders::new().add(("Cache-Control", "no-cache, no-store, must-revalidate")))
            .app_data(web::Data::new(swapper.clone()))
            .app_data(web::Data::new(updater.clone()))
            .app_data(web::Data::new(api_settings.clone()))
            .app_data(web::Data::new(app_start_time.clone()))
            .service(
                web::scope("/admin")
                    .wrap(AdminAuth::new(api_settings.admin_token.as_str()))
                    .service(admin_routes()),
            )
            .service(health_routes())
            .service(query_routes())
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .workers(cpu_count);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{}", bind_address);
    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();

    tokio::select! {
        res = server => {
            res?;
        }
        _ = lifetime::shutdown::listen_for_shutdown() => {
            warn!("Graceful shutdown requested");
        }
    }

    lifetime::shutdown::perform_shutdown_tasks(startup.scheduler);
    Ok(())
}
