//! 统一 API 响应与错误码

use serde::Serialize;
use serde_repr::Serialize_repr;

/// API 错误码
///
/// 按千位分域：
/// - 0: 成功
/// - 1000-1099: 通用错误
/// - 7000-7099: 数据库更新错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,

    Unauthorized = 1001,
    InternalServerError = 1005,
    ServiceUnavailable = 1030,

    UpdateInProgress = 7000,
    UpdateFailed = 7001,
}

/// 管理与健康接口的统一响应外壳
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: ErrorCode::Success as i32,
            message: "OK".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }
}
