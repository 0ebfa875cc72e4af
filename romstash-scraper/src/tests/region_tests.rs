use super::*;

use crate::types::{GameMedia, LanguageText, RegionText};

fn regions(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

fn media(media_type: &str, region: &str) -> GameMedia {
    GameMedia {
        media_type: media_type.to_string(),
        url: format!("https://example.invalid/{media_type}/{region}"),
        region: region.to_string(),
        format: "png".to_string(),
    }
}

#[test]
fn search_order_single_rom_region() {
    let order = build_search_order(&regions(&["us"]), &[]);
    assert_eq!(order, vec!["us", "ame", "wor", ""]);
}

#[test]
fn search_order_rom_and_user_regions() {
    let order = build_search_order(&regions(&["jp", "us"]), &regions(&["eu"]));
    assert_eq!(order, vec!["jp", "asi", "wor", "us", "ame", "eu", ""]);
}

#[test]
fn search_order_has_no_duplicates() {
    let order = build_search_order(&regions(&["us", "us", "ca"]), &regions(&["us"]));
    let mut seen = std::collections::HashSet::new();
    for region in &order {
        assert!(seen.insert(region.clone()), "duplicate region {region:?}");
    }
}

#[test]
fn search_order_is_deterministic() {
    let rom = regions(&["jp", "de"]);
    let user = regions(&["us"]);
    assert_eq!(
        build_search_order(&rom, &user),
        build_search_order(&rom, &user)
    );
}

#[test]
fn search_order_empty_inputs_yield_wor_and_sentinel() {
    assert_eq!(build_search_order(&[], &[]), vec!["wor", ""]);
}

#[test]
fn select_media_walks_rom_hierarchy_before_user_regions() {
    // jp -> asi -> wor matches the wor candidate before us is considered.
    let available = vec![media("ss", "wor"), media("ss", "us")];
    let selected = select_media(&available, "ss", &regions(&["jp"]), &regions(&["us"]));
    assert_eq!(selected.map(|m| m.region.as_str()), Some("wor"));
}

#[test]
fn select_media_falls_through_to_user_region() {
    // The jp walk (jp, asi, wor) matches nothing, so the user's us wins.
    let available = vec![media("ss", "eu"), media("ss", "us")];
    let selected = select_media(&available, "ss", &regions(&["jp"]), &regions(&["us"]));
    assert_eq!(selected.map(|m| m.region.as_str()), Some("us"));
}

#[test]
fn select_media_falls_back_to_first_candidate() {
    let available = vec![media("ss", "kr"), media("ss", "br")];
    let selected = select_media(&available, "ss", &regions(&["de"]), &[]);
    assert_eq!(selected.map(|m| m.region.as_str()), Some("kr"));
}

#[test]
fn select_media_filters_by_type() {
    let available = vec![media("box-2D", "us"), media("ss", "eu")];
    let selected = select_media(&available, "ss", &regions(&["us"]), &[]);
    assert_eq!(selected.map(|m| m.region.as_str()), Some("eu"));
    assert!(select_media(&available, "wheel", &regions(&["us"]), &[]).is_none());
}

#[test]
fn select_media_matches_untagged_via_sentinel() {
    let available = vec![media("ss", "")];
    let selected = select_media(&available, "ss", &regions(&["us"]), &[]);
    assert!(selected.is_some());
}

fn text(language: &str, body: &str) -> LanguageText {
    LanguageText {
        language: language.to_string(),
        text: body.to_string(),
    }
}

#[test]
fn select_text_maps_region_to_language() {
    let entries = vec![text("en", "english"), text("ja", "japanese")];
    let picked = select_text(&entries, &regions(&["jp"]), &regions(&["us"]));
    assert_eq!(picked, "japanese");
}

#[test]
fn select_text_falls_back_to_english_then_any() {
    let entries = vec![text("fr", "french"), text("en", "english")];
    let picked = select_text(&entries, &regions(&["jp"]), &[]);
    // jp -> ja misses, asi/wor -> en hits.
    assert_eq!(picked, "english");

    let entries = vec![text("fr", "french")];
    let picked = select_text(&entries, &regions(&["jp"]), &[]);
    assert_eq!(picked, "french");

    assert_eq!(select_text(&[], &regions(&["jp"]), &[]), "");
}

#[test]
fn select_text_ignores_empty_entries() {
    let entries = vec![text("en", ""), text("de", "german")];
    let picked = select_text(&entries, &regions(&["us"]), &[]);
    assert_eq!(picked, "german");
}

#[test]
fn select_region_text_prefers_search_order() {
    let entries = vec![
        RegionText {
            region: "eu".to_string(),
            text: "1993-04-01".to_string(),
        },
        RegionText {
            region: "us".to_string(),
            text: "1993-08-01".to_string(),
        },
    ];
    let picked = select_region_text(&entries, &regions(&["us"]), &regions(&["eu"]));
    assert_eq!(picked, Some("1993-08-01"));
}

#[test]
fn select_region_text_falls_back_to_first_non_empty() {
    let entries = vec![
        RegionText {
            region: "jp".to_string(),
            text: String::new(),
        },
        RegionText {
            region: "kr".to_string(),
            text: "1994-01-01".to_string(),
        },
    ];
    let picked = select_region_text(&entries, &regions(&["us"]), &[]);
    assert_eq!(picked, Some("1994-01-01"));
}
