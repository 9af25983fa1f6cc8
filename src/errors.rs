use std::fmt;

/// 错误分类
///
/// 对应数据库更新周期中的四类失败，外加查询路径的错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 配置或鉴权错误（URL 非法、凭据错误）
    Configuration,
    /// 瞬时网络错误（超时、非 2xx、连接失败）
    Transient,
    /// 归档损坏（gzip/tar 流错误、缺少数据文件）
    Corruption,
    /// 文件系统错误（权限、磁盘满）
    Filesystem,
    /// 查询路径错误
    Query,
}

#[derive(Debug, Clone)]
pub enum GeoIpError {
    Config(String),
    Network(String),
    HttpStatus(u16),
    Archive(String),
    PayloadMissing(String),
    FileOperation(String),
    DatabaseOpen(String),
    Lookup(String),
    Unavailable(String),
    UpdateInProgress(String),
}

impl GeoIpError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            GeoIpError::Config(_) => "E001",
            GeoIpError::Network(_) => "E002",
            GeoIpError::HttpStatus(_) => "E003",
            GeoIpError::Archive(_) => "E004",
            GeoIpError::PayloadMissing(_) => "E005",
            GeoIpError::FileOperation(_) => "E006",
            GeoIpError::DatabaseOpen(_) => "E007",
            GeoIpError::Lookup(_) => "E008",
            GeoIpError::Unavailable(_) => "E009",
            GeoIpError::UpdateInProgress(_) => "E010",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            GeoIpError::Config(_) => "Configuration Error",
            GeoIpError::Network(_) => "Network Error",
            GeoIpError::HttpStatus(_) => "Unexpected HTTP Status",
            GeoIpError::Archive(_) => "Archive Error",
            GeoIpError::PayloadMissing(_) => "Payload Not Found",
            GeoIpError::FileOperation(_) => "File Operation Error",
            GeoIpError::DatabaseOpen(_) => "Database Open Error",
            GeoIpError::Lookup(_) => "Lookup Error",
            GeoIpError::Unavailable(_) => "Data Unavailable",
            GeoIpError::UpdateInProgress(_) => "Update In Progress",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> String {
        match self {
            GeoIpError::HttpStatus(status) => format!("status code {}", status),
            GeoIpError::Config(msg)
            | GeoIpError::Network(msg)
            | GeoIpError::Archive(msg)
            | GeoIpError::PayloadMissing(msg)
            | GeoIpError::FileOperation(msg)
            | GeoIpError::DatabaseOpen(msg)
            | GeoIpError::Lookup(msg)
            | GeoIpError::Unavailable(msg)
            | GeoIpError::UpdateInProgress(msg) => msg.clone(),
        }
    }

    /// 错误所属分类
    pub fn category(&self) -> ErrorCategory {
        match self {
            GeoIpError::Config(_) => ErrorCategory::Configuration,
            // 401/403 说明凭据有误，重试没有意义
            GeoIpError::HttpStatus(401 | 403) => ErrorCategory::Configuration,
            GeoIpError::Network(_) | GeoIpError::HttpStatus(_) => ErrorCategory::Transient,
            GeoIpError::Archive(_) | GeoIpError::PayloadMissing(_) => ErrorCategory::Corruption,
            GeoIpError::FileOperation(_) | GeoIpError::DatabaseOpen(_) => {
                ErrorCategory::Filesystem
            }
            GeoIpError::Lookup(_)
            | GeoIpError::Unavailable(_)
            | GeoIpError::UpdateInProgress(_) => ErrorCategory::Query,
        }
    }

    /// 格式化为彩色输出（用于 CLI 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for GeoIpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for GeoIpError {}

// 便捷的构造函数
impl GeoIpError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        GeoIpError::Config(msg.into())
    }

    pub fn network<T: Into<String>>(msg: T) -> Self {
        GeoIpError::Network(msg.into())
    }

    pub fn archive<T: Into<String>>(msg: T) -> Self {
        GeoIpError::Archive(msg.into())
    }

    pub fn payload_missing<T: Into<String>>(msg: T) -> Self {
        GeoIpError::PayloadMissing(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        GeoIpError::FileOperation(msg.into())
    }

    pub fn database_open<T: Into<String>>(msg: T) -> Self {
        GeoIpError::DatabaseOpen(msg.into())
    }

    pub fn lookup<T: Into<String>>(msg: T) -> Self {
        GeoIpError::Lookup(msg.into())
    }

    pub fn unavailable<T: Into<String>>(msg: T) -> Self {
        GeoIpError::Unavailable(msg.into())
    }

    pub fn update_in_progress<T: Into<String>>(msg: T) -> Self {
        GeoIpError::UpdateInProgress(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<std::io::Error> for GeoIpError {
    fn from(err: std::io::Error) -> Self {
        GeoIpError::FileOperation(err.to_string())
    }
}

impl From<ureq::Error> for GeoIpError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => GeoIpError::HttpStatus(status),
            ureq::Error::BadUri(msg) => GeoIpError::Config(format!("invalid url: {}", msg)),
            other => GeoIpError::Network(other.to_string()),
        }
    }
}

impl From<maxminddb::MaxMindDbError> for GeoIpError {
    fn from(err: maxminddb::MaxMindDbError) -> Self {
        GeoIpError::DatabaseOpen(err.to_string())
    }
}

impl From<chrono::ParseError> for GeoIpError {
    fn from(err: chrono::ParseError) -> Self {
        GeoIpError::Network(format!("invalid Last-Modified header: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, GeoIpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            GeoIpError::config("x"),
            GeoIpError::network("x"),
            GeoIpError::HttpStatus(500),
            GeoIpError::archive("x"),
            GeoIpError::payload_missing("x"),
            GeoIpError::file_operation("x"),
            GeoIpError::database_open("x"),
            GeoIpError::lookup("x"),
            GeoIpError::unavailable("x"),
            GeoIpError::update_in_progress("x"),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_auth_status_is_configuration_error() {
        assert_eq!(
            GeoIpError::HttpStatus(401).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            GeoIpError::HttpStatus(503).category(),
            ErrorCategory::Transient
        );
        assert_eq!(
            GeoIpError::payload_missing("no dir").category(),
            ErrorCategory::Corruption
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: GeoIpError = io.into();
        assert!(matches!(err, GeoIpError::FileOperation(_)));
        assert_eq!(err.category(), ErrorCategory::Filesystem);
        assert!(err.to_string().contains("denied"));
    }
}
