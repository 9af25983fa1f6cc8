//! Shared fixtures: a fake database format, archive builder and a stub
//! provider, so tests never need a real GeoLite2 file or network access.

#![allow(dead_code)]

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{Builder, EntryType, Header};

use ipgeo::database::{ArchiveSource, DatabaseSwapper, DatabaseUpdater, UpdaterSettings};
use ipgeo::errors::{GeoIpError, Result};
use ipgeo::services::{DatabaseOpener, GeoIpLookup, GeoRecord};

pub const FAKE_MAGIC: &[u8] = b"FAKE-MMDB";

/// Address with no record in the fake database
pub const UNKNOWN_IP: &str = "203.0.113.7";
/// Address whose lookup fails
pub const BROKEN_IP: &str = "198.51.100.9";

pub fn fake_db_bytes(city: &str) -> Vec<u8> {
    [FAKE_MAGIC, city.as_bytes()].concat()
}

pub struct FakeLookup {
    city: String,
}

impl GeoIpLookup for FakeLookup {
    fn lookup(&self, ip: IpAddr, locale: &str) -> Result<Option<GeoRecord>> {
        if ip.to_string() == UNKNOWN_IP {
            return Ok(None);
        }
        if ip.to_string() == BROKEN_IP {
            return Err(GeoIpError::lookup("corrupt search tree"));
        }
        Ok(Some(GeoRecord {
            country: format!("Testland ({})", locale),
            region: "North".to_string(),
            city: self.city.clone(),
            continent: "Testinent".to_string(),
            latitude: Some(12.5),
            longitude: Some(-45.25),
            timezone: Some("Etc/UTC".to_string()),
            accuracy: Some(100),
            metro_code: None,
        }))
    }

    fn name(&self) -> &'static str {
        "Fake"
    }
}

pub struct FakeOpener;

impl DatabaseOpener for FakeOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn GeoIpLookup>> {
        let bytes = fs::read(path)?;
        let Some(rest) = bytes.strip_prefix(FAKE_MAGIC) else {
            return Err(GeoIpError::database_open("not a fake database"));
        };
        Ok(Box::new(FakeLookup {
            city: String::from_utf8_lossy(rest).into_owned(),
        }))
    }
}

/// Build a `tar.gz`; a `None` body makes a directory entry
pub fn write_archive(path: &Path, entries: &[(&str, Option<&[u8]>)]) {
    let encoder = GzEncoder::new(fs::File::create(path).unwrap(), Compression::fast());
    let mut builder = Builder::new(encoder);
    for (name, body) in entries {
        let mut header = Header::new_gnu();
        match body {
            Some(bytes) => {
                header.set_entry_type(EntryType::Regular);
                header.set_size(bytes.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append_data(&mut header, name, *bytes).unwrap();
            }
            None => {
                header.set_entry_type(EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                header.set_cksum();
                builder
                    .append_data(&mut header, name, std::io::empty())
                    .unwrap();
            }
        }
    }
    builder.into_inner().unwrap().finish().unwrap();
}

/// Archive laid out the way the provider ships it
pub fn write_provider_archive(path: &Path, city: &str) {
    let db = fake_db_bytes(city);
    write_archive(
        path,
        &[
            ("GeoLite2-City_20241015/", None),
            ("GeoLite2-City_20241015/LICENSE.txt", Some(&b"license"[..])),
            ("GeoLite2-City_20241015/GeoLite2-City.mmdb", Some(db.as_slice())),
        ],
    );
}

/// Provider stand-in serving a prepared archive
pub struct StubSource {
    pub archive: PathBuf,
    pub last_modified: Option<DateTime<Utc>>,
    pub downloads: AtomicUsize,
}

impl StubSource {
    pub fn new(archive: impl Into<PathBuf>, last_modified: Option<DateTime<Utc>>) -> Arc<Self> {
        Arc::new(Self {
            archive: archive.into(),
            last_modified,
            downloads: AtomicUsize::new(0),
        })
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl ArchiveSource for StubSource {
    fn remote_last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    fn download(&self, destination: &Path) -> Result<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(fs::copy(&self.archive, destination)?)
    }

    fn describe(&self) -> String {
        format!("stub:{}", self.archive.display())
    }
}

pub fn updater(
    storage: &Path,
    auto_update: bool,
    source: Arc<dyn ArchiveSource>,
) -> Arc<DatabaseUpdater> {
    Arc::new(DatabaseUpdater::new(
        UpdaterSettings::new(storage, auto_update),
        source,
        Arc::new(DatabaseSwapper::new(Arc::new(FakeOpener))),
    ))
}

/// Names in `dir` other than the database file and the update lock
pub fn leftovers(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| {
            n != ipgeo::config::DATABASE_FILENAME && n != ipgeo::config::UPDATE_LOCK_FILENAME
        })
        .collect()
}
