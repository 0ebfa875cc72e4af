//! Content-addressed on-disk cache for game records and media blobs.
//!
//! Layout under the cache root:
//!
//! ```text
//! games/<system-id>/<keyhash>.json        + .json.meta sidecar
//! media/<system-id>/<game-id>/<keyhash>.<ext>  + .<ext>.meta sidecar
//! ```
//!
//! `<keyhash>` is the first 16 bytes of SHA-256 over the logical key, hex.
//! Sidecars record the original key and an RFC3339 creation timestamp;
//! entries older than the TTL are removed on read. Read failures of any kind
//! degrade to a miss so a corrupt cache never fails a scrape.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ScrapeError;

/// Extension marking a cached "this media does not exist upstream" record.
pub const NOMEDIA_EXT: &str = "nomedia";

/// Probe order when looking up a cached media blob. The absence marker is
/// checked first so a known-missing item never touches the real extensions.
const MEDIA_EXTENSIONS: [&str; 4] = [NOMEDIA_EXT, "png", "jpg", "mp4"];

/// How the cache participates in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Read and write.
    #[default]
    Normal,
    /// Never read (forces refetch) but keep writing fresh results.
    NoRead,
    /// Read but never write.
    ReadOnly,
}

/// A cached media lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedMedia {
    /// A `.nomedia` marker: the item is known to not exist upstream.
    Absent,
    /// Real cached bytes with their file extension.
    Data { bytes: Vec<u8>, extension: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    key: String,
    created_at: String,
}

/// Content-addressed disk cache with TTL expiry.
#[derive(Debug)]
pub struct DiskCache {
    root: PathBuf,
    ttl: Duration,
    mode: CacheMode,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration, mode: CacheMode) -> Self {
        Self {
            root: root.into(),
            ttl,
            mode,
        }
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Hex of the first 16 bytes of SHA-256 over the logical key.
    fn key_hash(key: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        digest[..16].iter().map(|b| format!("{b:02x}")).collect()
    }

    fn game_path(&self, system_id: &str, hash_key: &str) -> (PathBuf, String) {
        let key = format!("game:{system_id}:{hash_key}");
        let file = self
            .root
            .join("games")
            .join(system_id)
            .join(format!("{}.json", Self::key_hash(&key)));
        (file, key)
    }

    fn media_path(
        &self,
        system_id: &str,
        game_id: &str,
        media_type: &str,
        region: &str,
        ext: &str,
    ) -> (PathBuf, String) {
        let key = format!("media:{system_id}:{game_id}:{media_type}:{region}");
        let file = self
            .root
            .join("media")
            .join(system_id)
            .join(game_id)
            .join(format!("{}.{}", Self::key_hash(&key), ext));
        (file, key)
    }

    /// Cached game record payload, or `None` on miss/expiry/read error.
    pub fn get_game_info(&self, system_id: &str, hash_key: &str) -> Option<Vec<u8>> {
        if self.mode == CacheMode::NoRead {
            return None;
        }
        let (path, _) = self.game_path(system_id, hash_key);
        self.read_valid(&path)
    }

    /// Write a game record payload and its sidecar.
    pub fn set_game_info(
        &self,
        system_id: &str,
        hash_key: &str,
        bytes: &[u8],
    ) -> Result<(), ScrapeError> {
        if self.mode == CacheMode::ReadOnly {
            return Ok(());
        }
        let (path, key) = self.game_path(system_id, hash_key);
        self.write_with_sidecar(&path, &key, bytes)
    }

    /// Cached media for `(system, game, type, region)`, or `None` on miss.
    ///
    /// Extensions are probed in a fixed order to discover which concrete
    /// file was written; a `.nomedia` hit is reported as [`CachedMedia::Absent`]
    /// and must be treated as "no media available upstream".
    pub fn get_media(
        &self,
        system_id: &str,
        game_id: &str,
        media_type: &str,
        region: &str,
    ) -> Option<CachedMedia> {
        if self.mode == CacheMode::NoRead {
            return None;
        }
        for ext in MEDIA_EXTENSIONS {
            let (path, _) = self.media_path(system_id, game_id, media_type, region, ext);
            if let Some(bytes) = self.read_valid(&path) {
                if ext == NOMEDIA_EXT {
                    return Some(CachedMedia::Absent);
                }
                return Some(CachedMedia::Data {
                    bytes,
                    extension: ext.to_string(),
                });
            }
        }
        None
    }

    /// Write media bytes (or a zero-length absence marker when `ext` is
    /// [`NOMEDIA_EXT`]) and the sidecar.
    pub fn set_media(
        &self,
        system_id: &str,
        game_id: &str,
        media_type: &str,
        region: &str,
        bytes: &[u8],
        ext: &str,
    ) -> Result<(), ScrapeError> {
        if self.mode == CacheMode::ReadOnly {
            return Ok(());
        }
        let (path, key) = self.media_path(system_id, game_id, media_type, region, ext);
        self.write_with_sidecar(&path, &key, bytes)
    }

    /// Read a payload if its sidecar exists and has not expired.
    ///
    /// Expired entries are removed. Any I/O or parse failure is a miss.
    fn read_valid(&self, path: &Path) -> Option<Vec<u8>> {
        let meta_path = sidecar_path(path);
        let meta_bytes = std::fs::read(&meta_path).ok()?;
        let sidecar: Sidecar = match serde_json::from_slice(&meta_bytes) {
            Ok(s) => s,
            Err(e) => {
                log::debug!("Unreadable cache sidecar {}: {}", meta_path.display(), e);
                return None;
            }
        };

        let created = match chrono::DateTime::parse_from_rfc3339(&sidecar.created_at) {
            Ok(t) => t.with_timezone(&chrono::Utc),
            Err(e) => {
                log::debug!("Bad timestamp in {}: {}", meta_path.display(), e);
                return None;
            }
        };
        let age = chrono::Utc::now().signed_duration_since(created);
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        if age > ttl {
            // Expired: drop payload and sidecar, report a miss.
            let _ = std::fs::remove_file(path);
            let _ = std::fs::remove_file(&meta_path);
            return None;
        }

        match std::fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::debug!("Cache read failed for {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write_with_sidecar(&self, path: &Path, key: &str, bytes: &[u8]) -> Result<(), ScrapeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Payload first, sidecar last: a reader requires the sidecar, so a
        // partially written entry is invisible rather than half-valid.
        std::fs::write(path, bytes)?;
        let sidecar = Sidecar {
            key: key.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        std::fs::write(sidecar_path(path), serde_json::to_vec(&sidecar)?)?;
        Ok(())
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".meta");
    PathBuf::from(s)
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
