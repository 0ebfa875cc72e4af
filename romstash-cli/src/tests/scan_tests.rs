use super::*;

use tempfile::TempDir;

#[test]
fn region_tags_parse_in_order() {
    assert_eq!(parse_region_tags("Game (USA)"), vec!["us"]);
    assert_eq!(parse_region_tags("Game (Japan, USA) (Rev 1)"), vec!["jp", "us"]);
    assert_eq!(parse_region_tags("Game (Europe) (En,Fr,De)"), vec!["eu"]);
    assert_eq!(parse_region_tags("Game (World)"), vec!["wor"]);
    assert!(parse_region_tags("Game").is_empty());
    assert!(parse_region_tags("Game (Rev 2)").is_empty());
}

#[test]
fn duplicate_region_tags_collapse() {
    assert_eq!(parse_region_tags("Game (USA) (USA)"), vec!["us"]);
}

#[test]
fn extension_set_normalizes_case_and_dots() {
    let set = extension_set(Some(&[".SFC".to_string(), "Nes".to_string()]));
    assert!(set.contains("sfc"));
    assert!(set.contains("nes"));
    assert_eq!(set.len(), 2);

    let defaults = extension_set(None);
    assert!(defaults.contains("gba"));
}

#[test]
fn scan_hashes_files_and_tags_entries() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Alpha (USA).sfc"), b"abc").unwrap();
    std::fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();
    std::fs::write(tmp.path().join("[BIOS] Boot (World).sfc"), b"bios").unwrap();

    let mut seen = Vec::new();
    let entries = scan_folder(tmp.path(), &extension_set(None), |f| {
        seen.push(f.to_string())
    })
    .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(seen.len(), 2);

    // '[' sorts after 'A', so the BIOS entry comes second.
    let bios = &entries[1];
    assert_eq!(bios.base_name, "[BIOS] Boot (World)");
    assert!(bios.skip_reason.is_some());

    let alpha = &entries[0];
    assert_eq!(alpha.filename, "Alpha (USA).sfc");
    assert_eq!(alpha.base_name, "Alpha (USA)");
    assert_eq!(alpha.regions, vec!["us"]);
    assert_eq!(alpha.file_size, 3);
    assert_eq!(
        alpha.hashes.sha1.as_deref(),
        Some("a9993e364706816aba3e25717850c26c9cd0d89d")
    );
    assert_eq!(
        alpha.hashes.md5.as_deref(),
        Some("900150983cd24fb0d6963f7d28e17f72")
    );
    assert_eq!(alpha.hashes.crc32.as_deref(), Some("352441c2"));
    assert_eq!(
        alpha.cache_key().as_deref(),
        Some("sha1:a9993e364706816aba3e25717850c26c9cd0d89d")
    );
}
