use super::*;

fn entry_with(hashes: Hashes, serial: Option<&str>) -> LookupEntry {
    LookupEntry {
        name: "Some Game".to_string(),
        filename: "Some Game (USA).sfc".to_string(),
        base_name: "Some Game (USA)".to_string(),
        hashes,
        serial: serial.map(|s| s.to_string()),
        file_size: 1024,
        regions: vec!["us".to_string()],
        source: EntrySource::Scan,
        skip_reason: None,
    }
}

#[test]
fn cache_key_prefers_sha1() {
    let hashes = Hashes {
        sha1: Some("ABCD1234".to_string()),
        md5: Some("ffff".to_string()),
        crc32: Some("0000".to_string()),
    };
    assert_eq!(hashes.cache_key().as_deref(), Some("sha1:abcd1234"));
}

#[test]
fn cache_key_falls_back_to_md5_then_crc32() {
    let md5_only = Hashes {
        sha1: None,
        md5: Some("FFFF".to_string()),
        crc32: Some("1234".to_string()),
    };
    assert_eq!(md5_only.cache_key().as_deref(), Some("md5:ffff"));

    let crc_only = Hashes {
        sha1: None,
        md5: None,
        crc32: Some("DEADBEEF".to_string()),
    };
    assert_eq!(crc_only.cache_key().as_deref(), Some("crc32:deadbeef"));

    assert_eq!(Hashes::default().cache_key(), None);
}

#[test]
fn entry_key_uses_serial_when_no_hashes() {
    let entry = entry_with(Hashes::default(), Some("SLUS-01234"));
    assert_eq!(entry.cache_key().as_deref(), Some("serial:slus-01234"));
}

#[test]
fn entry_without_hashes_or_serial_has_no_key() {
    let entry = entry_with(Hashes::default(), None);
    assert_eq!(entry.cache_key(), None);

    // An empty serial doesn't count either.
    let entry = entry_with(Hashes::default(), Some(""));
    assert_eq!(entry.cache_key(), None);
}

#[test]
fn game_round_trips_through_cache_serialization() {
    let game = Game {
        id: "1234".to_string(),
        names: vec![RegionText {
            region: "us".to_string(),
            text: "Some Game".to_string(),
        }],
        synopses: vec![LanguageText {
            language: "en".to_string(),
            text: "A game.".to_string(),
        }],
        dates: vec![],
        media: vec![GameMedia {
            media_type: "ss".to_string(),
            url: "https://example.invalid/ss.png".to_string(),
            region: "us".to_string(),
            format: "png".to_string(),
        }],
        developer: None,
        publisher: None,
        players: None,
        rating: None,
    };

    let bytes = serde_json::to_vec(&game).unwrap();
    let back: Game = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(back.id, "1234");
    assert_eq!(back.names[0].text, "Some Game");
    assert_eq!(back.synopses[0].language, "en");
    assert_eq!(back.media[0].media_type, "ss");
}

#[test]
fn skipped_result_keeps_entry_and_flag() {
    let entry = entry_with(Hashes::default(), None);
    let result = ScrapeResult::skipped(entry);
    assert!(result.skipped);
    assert!(result.game.is_none());
    assert!(result.error.is_none());
    assert_eq!(result.cache_hits, 0);
}
