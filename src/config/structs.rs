use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// 数据库文件名（解压后的数据文件与线上文件同名）
pub const DATABASE_FILENAME: &str = "GeoLite2-City.mmdb";
/// 下载的临时归档文件名
pub const ARCHIVE_FILENAME: &str = "GeoLite2-City.tar.gz";
/// 归档内数据目录前缀
pub const PAYLOAD_DIR_PREFIX: &str = "GeoLite2-";
/// 每次更新的临时解压目录前缀
pub const TEMP_DIR_PREFIX: &str = "temp-";
/// 跨进程更新锁文件名
pub const UPDATE_LOCK_FILENAME: &str = ".update.lock";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - server: 服务器地址、端口、CPU 数量、可信代理
/// - api: 管理接口
/// - geoip: 数据库存储与自动更新
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：IPGEO，分隔符：__
    /// 示例：IPGEO__GEOIP__LICENSE_KEY=xxxx
    pub fn load(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 IPGEO，分隔符 __
            .add_source(
                Environment::with_prefix("IPGEO")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
    /// 可信代理列表（单 IP 或 CIDR），为空时自动信任私有地址
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

/// 管理接口配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    /// 为空时禁用 /admin 接口
    #[serde(default)]
    pub admin_token: String,
}

/// GeoIP 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    /// 是否启用自动更新（启动引导 + 每周定时）
    #[serde(default)]
    pub auto_update: bool,
    /// 数据库存储目录
    #[serde(default = "default_geoip_path")]
    pub path: String,
    /// 归档下载地址
    #[serde(default = "default_download_url")]
    pub download_url: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub license_key: String,
    /// 对外返回的名称语言
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl GeoIpConfig {
    pub fn storage_dir(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage_dir().join(DATABASE_FILENAME)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.storage_dir().join(ARCHIVE_FILENAME)
    }

    pub fn has_credentials(&self) -> bool {
        !self.account_id.is_empty() && !self.license_key.is_empty()
    }
}

/// 每周更新时间（服务器本地时区）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_weekday")]
    pub weekday: Weekday,
    #[serde(default = "default_schedule_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

/// 网络超时配置（秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    #[serde(default = "default_response_secs")]
    pub response_secs: u64,
    #[serde(default = "default_download_secs")]
    pub download_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn response(&self) -> Duration {
        Duration::from_secs(self.response_secs)
    }

    pub fn download(&self) -> Duration {
        Duration::from_secs(self.download_secs)
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_geoip_path() -> String {
    "data".to_string()
}

fn default_download_url() -> String {
    "https://download.maxmind.com/geoip/databases/GeoLite2-City/download?suffix=tar.gz".to_string()
}

fn default_locale() -> String {
    "zh-CN".to_string()
}

fn default_schedule_weekday() -> Weekday {
    Weekday::Mon
}

fn default_schedule_hour() -> u32 {
    10
}

fn default_connect_secs() -> u64 {
    10
}

fn default_response_secs() -> u64 {
    30
}

fn default_download_secs() -> u64 {
    600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            auto_update: false,
            path: default_geoip_path(),
            download_url: default_download_url(),
            account_id: String::new(),
            license_key: String::new(),
            locale: default_locale(),
            schedule: ScheduleConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weekday: default_schedule_weekday(),
            hour: default_schedule_hour(),
            minute: 0,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            response_secs: default_response_secs(),
            download_secs: default_download_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let cfg = GeoIpConfig {
            path: "/var/lib/ipgeo".to_string(),
            ..Default::default()
        };
        assert_eq!(
            cfg.database_path(),
            PathBuf::from("/var/lib/ipgeo/GeoLite2-City.mmdb")
        );
        assert_eq!(
            cfg.archive_path(),
            PathBuf::from("/var/lib/ipgeo/GeoLite2-City.tar.gz")
        );
    }

    #[test]
    fn test_sample_config_roundtrips_through_toml() {
        let sample = StaticConfig::generate_sample_config();
        assert!(sample.contains("[geoip.schedule]"));
        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.geoip.schedule.weekday, Weekday::Mon);
        assert_eq!(parsed.geoip.schedule.hour, 10);
        assert_eq!(parsed.geoip.locale, "zh-CN");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: StaticConfig = toml::from_str(
            r#"
            [geoip]
            auto_update = true
            account_id = "42"
            license_key = "secret"
            "#,
        )
        .unwrap();
        assert!(parsed.geoip.auto_update);
        assert!(parsed.geoip.has_credentials());
        assert_eq!(parsed.geoip.path, "data");
        assert_eq!(parsed.geoip.timeouts.download_secs, 600);
        assert_eq!(parsed.server.port, 8080);
    }
}
