//! Static-content digest
//!
//! Clients cache the served UI assets; the `hash` message lets them detect
//! staleness without re-fetching. The digest covers the sorted file list of
//! the asset directory, hashing each relative path with its mtime.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};
use tracing::debug;

/// Hex SHA-256 digest of the asset directory contents.
///
/// `None` (or an unreadable directory) yields the digest of no entries, so
/// the `hash` reply contract holds even when nothing is served.
pub fn content_digest(dir: Option<&Path>) -> String {
    let mut hasher = Sha256::new();

    if let Some(dir) = dir {
        match collect_files(dir) {
            Ok(mut files) => {
                files.sort();
                for path in files {
                    let rel = path.strip_prefix(dir).unwrap_or(&path);
                    hasher.update(rel.to_string_lossy().as_bytes());
                    hasher.update(mtime_seconds(&path).to_le_bytes());
                }
            }
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "asset directory unreadable");
            }
        }
    }

    hex::encode(hasher.finalize())
}

fn collect_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    Ok(files)
}

fn mtime_seconds(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
