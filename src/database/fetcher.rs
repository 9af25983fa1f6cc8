//! Archive fetcher
//!
//! Talks to the database provider: a HEAD request for the freshness check and
//! an authenticated GET that streams the archive to disk. ureq is blocking, so
//! callers on the async side go through `spawn_blocking`.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use ureq::Agent;

use super::types::Credentials;
use crate::config::TimeoutConfig;
use crate::errors::{GeoIpError, Result};

/// Where update cycles get their archive from
pub trait ArchiveSource: Send + Sync {
    /// Provider-reported modification time, `None` when unknown
    fn remote_last_modified(&self) -> Option<DateTime<Utc>>;

    /// Write the archive to `destination`, replacing any existing file.
    /// Returns the number of bytes written.
    fn download(&self, destination: &Path) -> Result<u64>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Parse an HTTP date (RFC 1123, e.g. `Wed, 21 Oct 2015 07:28:00 GMT`)
pub fn parse_http_date(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc2822(value.trim())?.with_timezone(&Utc))
}

/// Agent for metadata requests: bounded connect and response timeouts
fn metadata_agent(timeouts: &TimeoutConfig) -> Agent {
    Agent::config_builder()
        .timeout_connect(Some(timeouts.connect()))
        .timeout_recv_response(Some(timeouts.response()))
        .build()
        .into()
}

/// Agent for archive downloads: the whole transfer is bounded as well
fn download_agent(timeouts: &TimeoutConfig) -> Agent {
    Agent::config_builder()
        .timeout_connect(Some(timeouts.connect()))
        .timeout_recv_response(Some(timeouts.response()))
        .timeout_global(Some(timeouts.download()))
        .build()
        .into()
}

/// Ask the provider when the archive was last modified
///
/// Every failure (request error, missing or malformed header) is logged and
/// reported as `None`, meaning "skip this update".
pub fn check_remote_freshness(
    agent: &Agent,
    url: &str,
    credentials: &Credentials,
) -> Option<DateTime<Utc>> {
    let resp = match agent
        .head(url)
        .header("Authorization", &credentials.basic_auth_header())
        .call()
    {
        Ok(r) => r,
        Err(e) => {
            error!("Freshness check against {} failed: {}", url, e);
            return None;
        }
    };

    let Some(header) = resp.headers().get("last-modified") else {
        warn!("Provider response has no Last-Modified header");
        return None;
    };

    let Ok(value) = header.to_str() else {
        warn!("Last-Modified header is not valid ASCII");
        return None;
    };

    match parse_http_date(value) {
        Ok(ts) => {
            debug!("Remote database last modified at {}", ts);
            Some(ts)
        }
        Err(e) => {
            error!("Failed to parse Last-Modified '{}': {}", value, e);
            None
        }
    }
}

/// Download the archive at `url` into `destination`
pub fn download(
    agent: &Agent,
    url: &str,
    credentials: &Credentials,
    destination: &Path,
) -> Result<u64> {
    let resp = agent
        .get(url)
        .header("Authorization", &credentials.basic_auth_header())
        .call()?;

    let status = resp.status().as_u16();
    if status != 200 {
        return Err(GeoIpError::HttpStatus(status));
    }

    let mut reader = resp.into_body().into_reader();
    let file = File::create(destination).map_err(|e| {
        GeoIpError::file_operation(format!(
            "failed to create {}: {}",
            destination.display(),
            e
        ))
    })?;
    let mut writer = BufWriter::new(file);

    let written = io::copy(&mut reader, &mut writer).map_err(|e| {
        // read side errors surface as io errors too; both abort the cycle
        GeoIpError::network(format!("failed to stream archive: {}", e))
    })?;
    writer.flush()?;

    info!(
        "Downloaded {} bytes to {}",
        written,
        destination.display()
    );
    Ok(written)
}

/// The real provider, reached over HTTPS
pub struct HttpArchiveSource {
    url: String,
    credentials: Credentials,
    metadata_agent: Agent,
    download_agent: Agent,
}

impl HttpArchiveSource {
    pub fn new(url: impl Into<String>, credentials: Credentials, timeouts: &TimeoutConfig) -> Self {
        Self {
            url: url.into(),
            credentials,
            metadata_agent: metadata_agent(timeouts),
            download_agent: download_agent(timeouts),
        }
    }
}

impl ArchiveSource for HttpArchiveSource {
    fn remote_last_modified(&self) -> Option<DateTime<Utc>> {
        check_remote_freshness(&self.metadata_agent, &self.url, &self.credentials)
    }

    fn download(&self, destination: &Path) -> Result<u64> {
        download(
            &self.download_agent,
            &self.url,
            &self.credentials,
            destination,
        )
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// An archive already on disk (`ipgeo update --archive <file>`)
///
/// Freshness is the file's modification time.
pub struct LocalArchiveSource {
    path: PathBuf,
}

impl LocalArchiveSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ArchiveSource for LocalArchiveSource {
    fn remote_last_modified(&self) -> Option<DateTime<Utc>> {
        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    fn download(&self, destination: &Path) -> Result<u64> {
        if self.path == destination {
            return Ok(fs::metadata(destination)?.len());
        }
        fs::copy(&self.path, destination).map_err(|e| {
            GeoIpError::file_operation(format!(
                "failed to copy {} to {}: {}",
                self.path.display(),
                destination.display(),
                e
            ))
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::{BufRead, BufReader, Read};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// One-shot HTTP responder; hands back the request head it received
    fn serve_once(response: Vec<u8>) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                head.push_str(&line);
            }
            stream.write_all(&response).unwrap();
            stream.flush().unwrap();
            let _ = tx.send(head);
        });
        (format!("http://{}/GeoLite2-City.tar.gz", addr), rx)
    }

    fn test_agent() -> Agent {
        metadata_agent(&TimeoutConfig {
            connect_secs: 2,
            response_secs: 2,
            download_secs: 5,
        })
    }

    #[test]
    fn test_parse_http_date() {
        let ts = parse_http_date("Tue, 15 Oct 2024 09:30:00 GMT").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 10, 15, 9, 30, 0).unwrap());
        assert!(parse_http_date("yesterday").is_err());
    }

    #[test]
    fn test_freshness_reads_last_modified() {
        let (url, rx) = serve_once(
            b"HTTP/1.1 200 OK\r\nLast-Modified: Tue, 15 Oct 2024 09:30:00 GMT\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_vec(),
        );
        let creds = Credentials::new("42", "key");
        let ts = check_remote_freshness(&test_agent(), &url, &creds);
        assert_eq!(ts, Some(Utc.with_ymd_and_hms(2024, 10, 15, 9, 30, 0).unwrap()));

        let head = rx.recv().unwrap();
        assert!(head.starts_with("HEAD "));
        assert!(head.to_lowercase().contains(&format!(
            "authorization: {}",
            creds.basic_auth_header().to_lowercase()
        )));
    }

    #[test]
    fn test_freshness_without_header_is_none() {
        let (url, _rx) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
        );
        let ts = check_remote_freshness(&test_agent(), &url, &Credentials::default());
        assert!(ts.is_none());
    }

    #[test]
    fn test_freshness_with_garbage_header_is_none() {
        let (url, _rx) = serve_once(
            b"HTTP/1.1 200 OK\r\nLast-Modified: last tuesday\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_vec(),
        );
        let ts = check_remote_freshness(&test_agent(), &url, &Credentials::default());
        assert!(ts.is_none());
    }

    #[test]
    fn test_download_writes_body() {
        let body = b"pretend this is a tarball";
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        let (url, rx) = serve_once(response);

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("archive.tar.gz");
        fs::write(&dest, b"stale content that is longer than the body").unwrap();

        let written = download(&test_agent(), &url, &Credentials::new("a", "b"), &dest).unwrap();
        assert_eq!(written, body.len() as u64);

        let mut on_disk = Vec::new();
        File::open(&dest).unwrap().read_to_end(&mut on_disk).unwrap();
        assert_eq!(on_disk, body);
        assert!(rx.recv().unwrap().starts_with("GET "));
    }

    #[test]
    fn test_download_rejects_error_status() {
        let (url, _rx) = serve_once(
            b"HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
        );
        let dir = tempfile::tempdir().unwrap();
        let err = download(
            &test_agent(),
            &url,
            &Credentials::default(),
            &dir.path().join("a.tar.gz"),
        )
        .unwrap_err();
        assert!(matches!(err, GeoIpError::HttpStatus(401)));
    }

    #[test]
    fn test_download_connection_refused_is_network_error() {
        // bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let dir = tempfile::tempdir().unwrap();
        let err = download(
            &test_agent(),
            &format!("http://127.0.0.1:{}/x", port),
            &Credentials::default(),
            &dir.path().join("a.tar.gz"),
        )
        .unwrap_err();
        assert!(matches!(err, GeoIpError::Network(_)));
    }

    #[test]
    fn test_local_source_copies_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.tar.gz");
        fs::write(&src, b"archive bytes").unwrap();

        let source = LocalArchiveSource::new(&src);
        assert!(source.remote_last_modified().is_some());

        let dest = dir.path().join("dest.tar.gz");
        assert_eq!(source.download(&dest).unwrap(), 13);
        assert_eq!(fs::read(&dest).unwrap(), b"archive bytes");
    }
}
