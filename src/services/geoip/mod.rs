//! GeoIP 服务模块
//!
//! 提供 IP 地址地理位置查询功能，基于本地 MaxMind GeoLite2 数据库。
//! 数据库文件的下载与热替换见 `crate::database`。

mod maxmind;
mod provider;

pub use maxmind::{MaxMindOpener, MaxMindProvider};
pub use provider::{DatabaseOpener, GeoIpLookup, GeoRecord};
