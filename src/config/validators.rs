//! 配置校验模块
//!
//! 启动时检查静态配置，区分致命错误与仅需提示的问题。

use std::net::IpAddr;

use super::StaticConfig;
use crate::utils::ip::parse_cidr;

/// 配置问题
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    /// 无法启动
    Error(String),
    /// 可以启动，但功能会受限
    Warning(String),
}

impl ConfigIssue {
    pub fn is_error(&self) -> bool {
        matches!(self, ConfigIssue::Error(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ConfigIssue::Error(msg) | ConfigIssue::Warning(msg) => msg,
        }
    }
}

/// 校验静态配置
pub fn validate_config(config: &StaticConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();
    let geoip = &config.geoip;

    if geoip.path.trim().is_empty() {
        issues.push(ConfigIssue::Error("geoip.path must not be empty".to_string()));
    }

    if geoip.schedule.hour > 23 {
        issues.push(ConfigIssue::Error(format!(
            "geoip.schedule.hour must be 0-23, got {}",
            geoip.schedule.hour
        )));
    }
    if geoip.schedule.minute > 59 {
        issues.push(ConfigIssue::Error(format!(
            "geoip.schedule.minute must be 0-59, got {}",
            geoip.schedule.minute
        )));
    }

    if geoip.auto_update {
        if !geoip.download_url.starts_with("http://") && !geoip.download_url.starts_with("https://")
        {
            issues.push(ConfigIssue::Error(format!(
                "geoip.download_url is not an http(s) url: '{}'",
                geoip.download_url
            )));
        }
        if !geoip.has_credentials() {
            issues.push(ConfigIssue::Warning(
                "geoip.auto_update is enabled but account_id/license_key are empty; \
                 the provider will most likely reject downloads"
                    .to_string(),
            ));
        }
    }

    let timeouts = &geoip.timeouts;
    if timeouts.connect_secs == 0 || timeouts.response_secs == 0 || timeouts.download_secs == 0 {
        issues.push(ConfigIssue::Error(
            "geoip.timeouts values must be greater than zero".to_string(),
        ));
    }

    for proxy in &config.server.trusted_proxies {
        let valid = if proxy.contains('/') {
            parse_cidr(proxy).is_some()
        } else {
            proxy.parse::<IpAddr>().is_ok()
        };
        if !valid {
            issues.push(ConfigIssue::Warning(format!(
                "server.trusted_proxies entry '{}' is neither an IP nor a CIDR, ignored",
                proxy
            )));
        }
    }

    if !matches!(config.logging.format.as_str(), "text" | "json") {
        issues.push(ConfigIssue::Warning(format!(
            "logging.format '{}' is unknown, falling back to text",
            config.logging.format
        )));
    }

    issues
}
