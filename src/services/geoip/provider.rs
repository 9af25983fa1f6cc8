//! GeoIP 查询抽象层
//!
//! 查询路径只依赖这里的 trait：
//! - `GeoIpLookup`: 已打开的数据库，按 IP 查询位置记录
//! - `DatabaseOpener`: 打开数据库文件，生成 `GeoIpLookup`

use std::net::IpAddr;
use std::path::Path;

use serde::Serialize;

use crate::errors::Result;

/// 地理位置记录（名称已按 locale 取值）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoRecord {
    pub country: String,
    /// 一级行政区（取第一个 subdivision）
    pub region: String,
    pub city: String,
    pub continent: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub accuracy: Option<u16>,
    pub metro_code: Option<u16>,
}

/// GeoIP 查询 trait
pub trait GeoIpLookup: Send + Sync {
    /// 查询 IP 地址的地理位置，数据库中没有记录时返回 `Ok(None)`
    fn lookup(&self, ip: IpAddr, locale: &str) -> Result<Option<GeoRecord>>;

    /// 获取 provider 名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 数据库打开器
pub trait DatabaseOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn GeoIpLookup>>;
}
