//! MaxMind GeoLite2 数据库实现
//!
//! 使用本地 MaxMind GeoLite2-City.mmdb 文件进行 IP 地理位置查询

use std::net::IpAddr;
use std::path::Path;

use maxminddb::Reader;
use tracing::{debug, trace};

use super::provider::{DatabaseOpener, GeoIpLookup, GeoRecord};
use crate::errors::{GeoIpError, Result};

/// 按 locale 选择名称字段，未知 locale 返回 None
macro_rules! localized {
    ($names:expr, $locale:expr) => {
        match $locale {
            "de" => $names.german,
            "en" => $names.english,
            "es" => $names.spanish,
            "fr" => $names.french,
            "ja" => $names.japanese,
            "pt-BR" => $names.brazilian_portuguese,
            "ru" => $names.russian,
            "zh-CN" => $names.simplified_chinese,
            _ => None,
        }
        .unwrap_or_default()
        .to_string()
    };
}

/// MaxMind GeoIP Provider
pub struct MaxMindProvider {
    reader: Reader<Vec<u8>>,
}

impl MaxMindProvider {
    /// 从文件路径打开数据库
    pub fn open(path: &Path) -> Result<Self> {
        let reader = Reader::open_readfile(path)?;
        debug!(
            "Opened MaxMind database {} (build epoch {})",
            path.display(),
            reader.metadata.build_epoch
        );
        Ok(Self { reader })
    }
}

impl GeoIpLookup for MaxMindProvider {
    fn lookup(&self, ip: IpAddr, locale: &str) -> Result<Option<GeoRecord>> {
        let result = self
            .reader
            .lookup(ip)
            .map_err(|e| GeoIpError::lookup(e.to_string()))?;
        let Some(city) = result
            .decode::<maxminddb::geoip2::City>()
            .map_err(|e| GeoIpError::lookup(e.to_string()))?
        else {
            trace!("MaxMind lookup for {}: no record", ip);
            return Ok(None);
        };

        let region = city
            .subdivisions
            .first()
            .map(|s| localized!(s.names, locale))
            .unwrap_or_default();

        let record = GeoRecord {
            country: localized!(city.country.names, locale),
            region,
            city: localized!(city.city.names, locale),
            continent: localized!(city.continent.names, locale),
            latitude: city.location.latitude,
            longitude: city.location.longitude,
            timezone: city.location.time_zone.map(String::from),
            accuracy: city.location.accuracy_radius,
            metro_code: city.location.metro_code,
        };

        trace!(
            "MaxMind lookup for {}: country={}, city={}",
            ip, record.country, record.city
        );

        Ok(Some(record))
    }

    fn name(&self) -> &'static str {
        "MaxMind"
    }
}

/// 生产环境使用的打开器
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxMindOpener;

impl DatabaseOpener for MaxMindOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn GeoIpLookup>> {
        Ok(Box::new(MaxMindProvider::open(path)?))
    }
}
