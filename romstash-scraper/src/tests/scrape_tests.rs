use super::*;

use crate::error::ScrapeError;
use crate::types::{EntrySource, Game, Hashes};

fn entry(name: &str) -> LookupEntry {
    LookupEntry {
        name: name.to_string(),
        filename: format!("{name}.sfc"),
        base_name: name.to_string(),
        hashes: Hashes {
            sha1: Some("abcd".to_string()),
            md5: None,
            crc32: None,
        },
        serial: None,
        file_size: 42,
        regions: vec![],
        source: EntrySource::Scan,
        skip_reason: None,
    }
}

fn game() -> Game {
    serde_json::from_str(r#"{"id":"1"}"#).unwrap()
}

#[test]
fn aggregation_routes_results_to_the_right_counter() {
    let mut results = ScrapeResults::default();

    let mut found = ScrapeResult::new(entry("found"));
    found.game = Some(game());
    found.cache_hits = 2;
    results.push(found);

    results.push(ScrapeResult::new(entry("notfound")));

    let mut errored = ScrapeResult::new(entry("errored"));
    errored.error = Some(ScrapeError::RateLimited);
    // An error wins over a resolved game.
    errored.game = Some(game());
    results.push(errored);

    results.push(ScrapeResult::skipped(entry("bios")));

    assert_eq!(results.found, 1);
    assert_eq!(results.not_found, 1);
    assert_eq!(results.errors, 1);
    assert_eq!(results.skipped, 1);
    assert_eq!(results.cache_hits, 2);
    assert_eq!(results.results.len(), 4);
}

#[test]
fn skipped_flag_wins_regardless_of_other_fields() {
    let mut results = ScrapeResults::default();
    let mut skipped = ScrapeResult::skipped(entry("bios"));
    skipped.game = Some(game());
    skipped.error = Some(ScrapeError::Api("late failure".to_string()));
    results.push(skipped);

    assert_eq!(results.skipped, 1);
    assert_eq!(results.found, 0);
    assert_eq!(results.errors, 0);
}

#[test]
fn media_downloaded_counts_written_paths() {
    let mut results = ScrapeResults::default();
    let mut result = ScrapeResult::new(entry("game"));
    result.game = Some(game());
    result.media_paths.insert(
        crate::media::OutputMediaType::Cover,
        std::path::PathBuf::from("covers/game.png"),
    );
    result.media_paths.insert(
        crate::media::OutputMediaType::Screenshot,
        std::path::PathBuf::from("screenshots/game.png"),
    );
    results.push(result);
    assert_eq!(results.media_downloaded, 2);
}

#[test]
fn default_options_are_sane() {
    let options = ScrapeOptions::new("3");
    assert_eq!(options.system_id, "3");
    assert!(options.max_threads >= 1);
    assert!(options.max_requests_per_min >= 1);
    assert!(!options.overwrite);
    assert!(options.media_dir.is_none());
}
