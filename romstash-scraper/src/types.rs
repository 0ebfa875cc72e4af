use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;
use crate::media::OutputMediaType;

/// Where a lookup entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
    /// Parsed from a DAT file.
    Dat,
    /// Discovered by scanning a ROM folder.
    Scan,
}

/// ROM file hashes. All hex strings are stored lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hashes {
    pub sha1: Option<String>,
    pub md5: Option<String>,
    pub crc32: Option<String>,
}

impl Hashes {
    /// Derived cache key: `sha1:<hex>`, else `md5:<hex>`, else `crc32:<hex>`.
    ///
    /// The strongest available hash wins so the same ROM always maps to the
    /// same key no matter which subset of hashes a source provides it with.
    pub fn cache_key(&self) -> Option<String> {
        if let Some(ref h) = self.sha1 {
            Some(format!("sha1:{}", h.to_lowercase()))
        } else if let Some(ref h) = self.md5 {
            Some(format!("md5:{}", h.to_lowercase()))
        } else {
            self.crc32.as_ref().map(|h| format!("crc32:{}", h.to_lowercase()))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sha1.is_none() && self.md5.is_none() && self.crc32.is_none()
    }
}

/// One input unit identifying a ROM to scrape.
#[derive(Debug, Clone)]
pub struct LookupEntry {
    /// Display name (usually the filename without tags).
    pub name: String,
    /// ROM filename with extension.
    pub filename: String,
    /// Filename without extension; used for media output naming.
    pub base_name: String,
    pub hashes: Hashes,
    /// Serial / game code from the ROM header, if known.
    pub serial: Option<String>,
    /// File size in bytes.
    pub file_size: u64,
    /// Ordered region hints parsed from the filename.
    pub regions: Vec<String>,
    pub source: EntrySource,
    /// Set by the upstream filter for entries that must not be scraped
    /// (BIOS images and the like). The orchestrator reports these as skipped.
    pub skip_reason: Option<String>,
}

impl LookupEntry {
    /// Key identifying this entry for cache and dedup purposes.
    ///
    /// Hash-derived when any hash is present; serial-derived otherwise.
    /// `None` means the entry carries neither a hash nor a serial and
    /// cannot be looked up at all.
    pub fn cache_key(&self) -> Option<String> {
        self.hashes.cache_key().or_else(|| {
            self.serial
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| format!("serial:{}", s.to_lowercase()))
        })
    }
}

/// Text tagged with a catalog region code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionText {
    #[serde(default)]
    pub region: String,
    pub text: String,
}

/// Text tagged with a language code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageText {
    #[serde(default, rename = "langue")]
    pub language: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdText {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
}

/// One downloadable media artwork descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMedia {
    #[serde(rename = "type")]
    pub media_type: String,
    pub url: String,
    #[serde(default)]
    pub region: String,
    /// File-format extension reported by the catalog (e.g. "png").
    #[serde(default)]
    pub format: String,
}

/// A game record from the catalog service.
///
/// Field names follow the ScreenScraper v2 wire dialect via serde renames;
/// the struct serializes back to the same dialect for cache round-trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "noms")]
    pub names: Vec<RegionText>,
    #[serde(default, rename = "synopsis")]
    pub synopses: Vec<LanguageText>,
    #[serde(default)]
    pub dates: Vec<RegionText>,
    #[serde(default, rename = "medias")]
    pub media: Vec<GameMedia>,
    #[serde(default, rename = "developpeur")]
    pub developer: Option<IdText>,
    #[serde(default, rename = "editeur")]
    pub publisher: Option<IdText>,
    #[serde(default, rename = "joueurs")]
    pub players: Option<IdText>,
    #[serde(default, rename = "note")]
    pub rating: Option<IdText>,
}

/// Result of processing one entry.
#[derive(Debug)]
pub struct ScrapeResult {
    pub entry: LookupEntry,
    pub game: Option<Game>,
    /// Output media type -> path written, relative to the media output dir.
    pub media_paths: HashMap<OutputMediaType, PathBuf>,
    pub error: Option<ScrapeError>,
    /// The game record came from the disk cache rather than the network.
    pub cached: bool,
    pub skipped: bool,
    /// Catalog API calls avoided for this entry (dedup, disk cache, or
    /// pre-existing output files).
    pub cache_hits: u32,
    /// Why the entry could not be identified, when `game` is absent without
    /// an error (e.g. no hashes and no serial).
    pub not_found_reason: Option<String>,
}

impl ScrapeResult {
    pub fn new(entry: LookupEntry) -> Self {
        Self {
            entry,
            game: None,
            media_paths: HashMap::new(),
            error: None,
            cached: false,
            skipped: false,
            cache_hits: 0,
            not_found_reason: None,
        }
    }

    pub fn skipped(entry: LookupEntry) -> Self {
        Self {
            skipped: true,
            ..Self::new(entry)
        }
    }
}

#[cfg(test)]
#[path = "tests/types_tests.rs"]
mod tests;
