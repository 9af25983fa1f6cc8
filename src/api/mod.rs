//! HTTP API
//!
//! - `services`: query, health and admin handlers
//! - `middleware`: admin bearer-token authentication

pub mod middleware;
pub mod services;

use crate::config::StaticConfig;

/// Request-path settings, fixed at server start
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Locale used for place names in query responses
    pub locale: String,
    pub trusted_proxies: Vec<String>,
    /// Empty disables the admin API
    pub admin_token: String,
}

impl ApiSettings {
    pub fn from_config(config: &StaticConfig) -> Self {
        Self {
            locale: config.geoip.locale.clone(),
            trusted_proxies: config.server.trusted_proxies.clone(),
            admin_token: config.api.admin_token.clone(),
        }
    }

    pub fn admin_enabled(&self) -> bool {
        !self.admin_token.is_empty()
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self::from_config(&StaticConfig::default())
    }
}
