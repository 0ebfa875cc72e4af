use super::*;

#[test]
fn names_round_trip_through_subdir() {
    for mt in OutputMediaType::ALL {
        assert_eq!(OutputMediaType::from_name(mt.subdir()), Some(mt));
    }
}

#[test]
fn from_names_ignores_unknown() {
    let names = vec![
        "covers".to_string(),
        "nonsense".to_string(),
        "videos".to_string(),
    ];
    let selection = MediaSelection::from_names(&names);
    assert_eq!(
        selection.types,
        vec![OutputMediaType::Cover, OutputMediaType::Video]
    );
}

#[test]
fn marquee_and_video_have_fallback_catalog_types() {
    assert_eq!(
        OutputMediaType::Marquee.catalog_types(),
        &["wheel-hd", "wheel"]
    );
    assert_eq!(
        OutputMediaType::Video.catalog_types(),
        &["video-normalized", "video"]
    );
    assert_eq!(OutputMediaType::Screenshot.catalog_types(), &["ss"]);
}

#[test]
fn video_defaults_to_mp4() {
    assert_eq!(OutputMediaType::Video.default_extension(), "mp4");
    assert_eq!(OutputMediaType::Cover.default_extension(), "png");
}

#[test]
fn all_covers_the_closed_set() {
    let subdirs: Vec<&str> = OutputMediaType::ALL.iter().map(|m| m.subdir()).collect();
    for expected in [
        "screenshots",
        "titlescreens",
        "covers",
        "3dboxes",
        "marquees",
        "fanart",
        "videos",
        "physicalmedia",
        "backcovers",
    ] {
        assert!(subdirs.contains(&expected), "missing {expected}");
    }
    assert_eq!(subdirs.len(), 9);
}
