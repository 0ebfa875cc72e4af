//! Folder scanning: discover ROM files, hash them, build lookup entries.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use romstash_scraper::{EntrySource, Hashes, LookupEntry};

const CHUNK_SIZE: usize = 64 * 1024; // 64 KB

/// Extensions scanned when the user doesn't supply a list.
pub const DEFAULT_EXTENSIONS: [&str; 18] = [
    "nes", "sfc", "smc", "n64", "z64", "gb", "gbc", "gba", "nds", "md", "gen", "sms", "gg", "pce",
    "bin", "iso", "cue", "chd",
];

/// Build the extension set for scanning (lowercased, no dots).
pub fn extension_set(extensions: Option<&[String]>) -> HashSet<String> {
    match extensions {
        Some(list) => list
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect(),
        None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
    }
}

/// Scan a folder for ROM files and build lookup entries, hashing each file.
///
/// `on_file` is called with each filename before it is hashed, for progress
/// display. Entries come back sorted by filename.
pub fn scan_folder(
    folder: &Path,
    extensions: &HashSet<String>,
    mut on_file: impl FnMut(&str),
) -> std::io::Result<Vec<LookupEntry>> {
    let mut paths = Vec::new();
    for dir_entry in std::fs::read_dir(folder)? {
        let path = dir_entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e.to_lowercase()));
        if matches {
            paths.push(path);
        }
    }
    paths.sort();

    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let base_name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or(&filename)
            .to_string();
        on_file(&filename);

        let (hashes, file_size) = match hash_file(&path) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Skipping unreadable file {}: {e}", path.display());
                continue;
            }
        };

        let skip_reason = if base_name.to_lowercase().contains("[bios]") {
            Some("bios image".to_string())
        } else {
            None
        };

        entries.push(LookupEntry {
            name: base_name.clone(),
            filename,
            regions: parse_region_tags(&base_name),
            base_name,
            hashes,
            serial: None,
            file_size,
            source: EntrySource::Scan,
            skip_reason,
        });
    }
    Ok(entries)
}

/// Compute CRC32, MD5 and SHA1 in one chunked pass.
fn hash_file(path: &Path) -> std::io::Result<(Hashes, u64)> {
    use sha1::Digest;

    let mut file = std::fs::File::open(path)?;
    let mut crc = crc32fast::Hasher::new();
    let mut sha = sha1::Sha1::new();
    let mut md5_ctx = md5::Context::new();
    let mut size: u64 = 0;
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        crc.update(&buf[..n]);
        sha.update(&buf[..n]);
        md5_ctx.consume(&buf[..n]);
        size += n as u64;
    }

    let hashes = Hashes {
        crc32: Some(format!("{:08x}", crc.finalize())),
        sha1: Some(format!("{:x}", sha.finalize())),
        md5: Some(format!("{:x}", md5_ctx.compute())),
    };
    Ok((hashes, size))
}

/// Parse region hints from parenthesized filename tags, in order.
///
/// Recognizes the common No-Intro style tags: `Game (USA).sfc`,
/// `Game (Japan, USA) (Rev 1).n64`, `Game (Europe) (En,Fr,De).gbc`.
pub fn parse_region_tags(stem: &str) -> Vec<String> {
    let mut regions = Vec::new();
    let mut rest = stem;
    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')') else {
            break;
        };
        let group = &rest[open + 1..open + close];
        for token in group.split(',') {
            if let Some(code) = region_code(token.trim()) {
                let code = code.to_string();
                if !regions.contains(&code) {
                    regions.push(code);
                }
            }
        }
        rest = &rest[open + close + 1..];
    }
    regions
}

fn region_code(tag: &str) -> Option<&'static str> {
    match tag.to_lowercase().as_str() {
        "usa" | "us" => Some("us"),
        "europe" | "eu" => Some("eu"),
        "japan" | "jp" => Some("jp"),
        "world" => Some("wor"),
        "france" => Some("fr"),
        "germany" => Some("de"),
        "spain" => Some("es"),
        "italy" => Some("it"),
        "netherlands" => Some("nl"),
        "sweden" => Some("se"),
        "denmark" => Some("dk"),
        "finland" => Some("fi"),
        "portugal" => Some("pt"),
        "uk" | "united kingdom" => Some("uk"),
        "korea" => Some("kr"),
        "china" => Some("cn"),
        "taiwan" => Some("tw"),
        "hong kong" => Some("hk"),
        "brazil" => Some("br"),
        "mexico" => Some("mex"),
        "canada" => Some("ca"),
        "australia" => Some("au"),
        "new zealand" => Some("nz"),
        "asia" => Some("asi"),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/scan_tests.rs"]
mod tests;
