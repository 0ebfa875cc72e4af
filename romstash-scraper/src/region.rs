//! Region-aware selection of names, descriptions, dates and media.
//!
//! The catalog tags text by region or language and media by region. A ROM's
//! filename region hints plus the user's preferred regions are flattened into
//! one deterministic search order, which every selection walks.

use std::collections::HashMap;

use crate::types::{GameMedia, LanguageText, RegionText};

/// Parent of a region in the closed hierarchy. Edges run child -> parent and
/// terminate at `wor`.
fn region_parent(region: &str) -> Option<&'static str> {
    match region {
        "jp" | "kr" | "tw" | "cn" | "hk" => Some("asi"),
        "de" | "fr" | "it" | "es" | "uk" | "nl" | "se" | "dk" | "fi" | "pt" => Some("eu"),
        "us" | "ca" | "br" | "mex" => Some("ame"),
        "au" | "nz" => Some("oce"),
        "asi" | "eu" | "ame" | "oce" => Some("wor"),
        _ => None,
    }
}

/// Language code a region's text is most likely written in.
pub fn region_language(region: &str) -> Option<&'static str> {
    match region {
        "jp" => Some("ja"),
        "kr" => Some("ko"),
        "tw" | "cn" | "hk" => Some("zh"),
        "de" => Some("de"),
        "fr" => Some("fr"),
        "it" => Some("it"),
        "es" | "mex" => Some("es"),
        "nl" => Some("nl"),
        "se" => Some("sv"),
        "dk" => Some("da"),
        "fi" => Some("fi"),
        "pt" | "br" => Some("pt"),
        "uk" | "us" | "ca" | "au" | "nz" => Some("en"),
        "asi" | "eu" | "ame" | "oce" | "wor" => Some("en"),
        _ => None,
    }
}

/// Flatten ROM region hints and user preferences into one search order.
///
/// Each hint is followed by its ancestors up to `wor`; duplicates keep their
/// first position. `wor` is guaranteed present and the empty region is
/// appended last as the sentinel for untagged catalog entries.
pub fn build_search_order(rom_regions: &[String], user_regions: &[String]) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();

    let append_with_parents = |region: &str, order: &mut Vec<String>| {
        let mut current = region.to_lowercase();
        loop {
            if !order.iter().any(|r| r == &current) {
                order.push(current.clone());
            }
            match region_parent(&current) {
                Some(parent) => current = parent.to_string(),
                None => break,
            }
        }
    };

    for region in rom_regions.iter().chain(user_regions.iter()) {
        if !region.is_empty() {
            append_with_parents(region, &mut order);
        }
    }

    if !order.iter().any(|r| r == "wor") {
        order.push("wor".to_string());
    }
    order.push(String::new());

    order
}

/// Pick the best language-tagged text (synopsis and similar).
///
/// Entries are indexed by lowercased language, first occurrence winning. The
/// search order's regions are mapped to languages and walked in order; when
/// nothing matches, fall back to English, then to any non-empty entry.
pub fn select_text(
    entries: &[LanguageText],
    rom_regions: &[String],
    user_regions: &[String],
) -> String {
    let mut by_language: HashMap<String, &str> = HashMap::new();
    for entry in entries.iter().filter(|e| !e.text.is_empty()) {
        by_language
            .entry(entry.language.to_lowercase())
            .or_insert(entry.text.as_str());
    }

    for region in build_search_order(rom_regions, user_regions) {
        if let Some(language) = region_language(&region) {
            if let Some(text) = by_language.get(language) {
                return text.to_string();
            }
        }
    }

    if let Some(text) = by_language.get("en") {
        return text.to_string();
    }
    entries
        .iter()
        .find(|e| !e.text.is_empty())
        .map(|e| e.text.clone())
        .unwrap_or_default()
}

/// Pick the best region-tagged text (names, release dates).
///
/// Walks the search order matching region codes directly; falls back to the
/// first non-empty entry when no region matches.
pub fn select_region_text<'a>(
    entries: &'a [RegionText],
    rom_regions: &[String],
    user_regions: &[String],
) -> Option<&'a str> {
    for region in build_search_order(rom_regions, user_regions) {
        if let Some(entry) = entries
            .iter()
            .find(|e| e.region.to_lowercase() == region && !e.text.is_empty())
        {
            return Some(entry.text.as_str());
        }
    }
    entries
        .iter()
        .find(|e| !e.text.is_empty())
        .map(|e| e.text.as_str())
}

/// Pick the media descriptor of `media_type` that best matches the regions.
///
/// Walks the search order against the candidates' region tags; when no region
/// matches, the first candidate of the requested type wins.
pub fn select_media<'a>(
    available: &'a [GameMedia],
    media_type: &str,
    rom_regions: &[String],
    user_regions: &[String],
) -> Option<&'a GameMedia> {
    let candidates: Vec<&GameMedia> = available
        .iter()
        .filter(|m| m.media_type == media_type)
        .collect();
    if candidates.is_empty() {
        return None;
    }

    for region in build_search_order(rom_regions, user_regions) {
        if let Some(media) = candidates.iter().find(|m| m.region.to_lowercase() == region) {
            return Some(media);
        }
    }
    candidates.first().copied()
}

#[cfg(test)]
#[path = "tests/region_tests.rs"]
mod tests;
