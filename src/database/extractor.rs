//! Archive extractor
//!
//! Unpacks the provider's `tar.gz` into a per-run directory and finds the
//! database file inside it.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::{debug, trace, warn};

use crate::config::PAYLOAD_DIR_PREFIX;
use crate::errors::{GeoIpError, Result};

/// What `extract` wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
    /// Links, devices and other entry types that were ignored
    pub skipped: usize,
}

fn archive_error(archive_path: &Path, e: io::Error) -> GeoIpError {
    GeoIpError::archive(format!("{}: {}", archive_path.display(), e))
}

/// Relative, traversal-free form of an entry path. `Ok(None)` for entries that
/// name the archive root itself (`./`).
fn sanitize_entry_path(path: &Path) -> Result<Option<PathBuf>> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(GeoIpError::archive(format!(
                    "entry escapes extraction directory: {}",
                    path.display()
                )));
            }
        }
    }
    Ok((!clean.as_os_str().is_empty()).then_some(clean))
}

#[cfg(unix)]
fn apply_mode(target: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn apply_mode(_target: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Unpack `archive_path` (gzip-compressed tar) into `destination_dir`
///
/// Directories are created, regular files are written with the mode declared
/// in the archive, every other entry type is skipped. On error, whatever was
/// already written stays in `destination_dir`; the caller owns its cleanup.
pub fn extract(archive_path: &Path, destination_dir: &Path) -> Result<ExtractSummary> {
    fs::create_dir_all(destination_dir).map_err(|e| {
        GeoIpError::file_operation(format!(
            "failed to create {}: {}",
            destination_dir.display(),
            e
        ))
    })?;

    let file = File::open(archive_path).map_err(|e| {
        GeoIpError::file_operation(format!("failed to open {}: {}", archive_path.display(), e))
    })?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    let mut summary = ExtractSummary::default();

    let entries = archive
        .entries()
        .map_err(|e| archive_error(archive_path, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(archive_path, e))?;
        let raw_path = entry
            .path()
            .map_err(|e| archive_error(archive_path, e))?
            .into_owned();
        let Some(relative) = sanitize_entry_path(&raw_path)? else {
            continue;
        };
        let target = destination_dir.join(&relative);

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target)?;
                summary.directories += 1;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mode = entry.header().mode().unwrap_or(0o644);

                let mut out = BufWriter::new(File::create(&target)?);
                let written = io::copy(&mut entry, &mut out)
                    .map_err(|e| archive_error(archive_path, e))?;
                out.flush()?;
                drop(out);
                apply_mode(&target, mode)?;

                trace!("Extracted {} ({} bytes)", relative.display(), written);
                summary.files += 1;
                summary.bytes += written;
            }
            other => {
                trace!("Skipping {:?} entry {}", other, relative.display());
                summary.skipped += 1;
            }
        }
    }

    debug!(
        "Extracted {} into {}: {} dirs, {} files, {} bytes, {} skipped",
        archive_path.display(),
        destination_dir.display(),
        summary.directories,
        summary.files,
        summary.bytes,
        summary.skipped
    );
    Ok(summary)
}

/// Find `expected_file_name` inside the provider directory (`GeoLite2-*`)
/// at the top level of `destination_dir`
///
/// `None` means no such directory or no such file in it; callers treat it as
/// a failed cycle.
pub fn locate_payload(destination_dir: &Path, expected_file_name: &str) -> Option<PathBuf> {
    let entries = match fs::read_dir(destination_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                "Failed to read extraction directory {}: {}",
                destination_dir.display(),
                e
            );
            return None;
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with(PAYLOAD_DIR_PREFIX)
        })
        .map(|entry| entry.path())
        .collect();
    // read_dir order is platform dependent
    candidates.sort();

    let dir = candidates.into_iter().next()?;
    let payload = dir.join(expected_file_name);
    if payload.is_file() {
        Some(payload)
    } else {
        warn!(
            "{} has no {}",
            dir.display(),
            expected_file_name
        );
        None
    }
}
