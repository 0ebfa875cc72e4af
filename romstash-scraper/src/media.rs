//! Output media categories and their catalog mappings.

/// Frontend-facing media categories that can be scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMediaType {
    /// In-game screenshot
    Screenshot,
    /// Title screen capture
    TitleScreen,
    /// Front box art (2D)
    Cover,
    /// Back box art (2D)
    BackCover,
    /// 3D rendered box art
    Cover3D,
    /// Logo / marquee / wheel image
    Marquee,
    /// Fan-created artwork
    Fanart,
    /// Gameplay or promotional video
    Video,
    /// Physical media image (cartridge/disc)
    PhysicalMedia,
}

impl OutputMediaType {
    pub const ALL: [OutputMediaType; 9] = [
        OutputMediaType::Screenshot,
        OutputMediaType::TitleScreen,
        OutputMediaType::Cover,
        OutputMediaType::BackCover,
        OutputMediaType::Cover3D,
        OutputMediaType::Marquee,
        OutputMediaType::Fanart,
        OutputMediaType::Video,
        OutputMediaType::PhysicalMedia,
    ];

    /// Output subdirectory name; also the canonical name in config lists.
    pub fn subdir(&self) -> &'static str {
        match self {
            OutputMediaType::Screenshot => "screenshots",
            OutputMediaType::TitleScreen => "titlescreens",
            OutputMediaType::Cover => "covers",
            OutputMediaType::BackCover => "backcovers",
            OutputMediaType::Cover3D => "3dboxes",
            OutputMediaType::Marquee => "marquees",
            OutputMediaType::Fanart => "fanart",
            OutputMediaType::Video => "videos",
            OutputMediaType::PhysicalMedia => "physicalmedia",
        }
    }

    /// Catalog media types to try, in preference order.
    pub fn catalog_types(&self) -> &'static [&'static str] {
        match self {
            OutputMediaType::Screenshot => &["ss"],
            OutputMediaType::TitleScreen => &["sstitle"],
            OutputMediaType::Cover => &["box-2D"],
            OutputMediaType::BackCover => &["box-2D-back"],
            OutputMediaType::Cover3D => &["box-3D"],
            OutputMediaType::Marquee => &["wheel-hd", "wheel"],
            OutputMediaType::Fanart => &["fanart"],
            OutputMediaType::Video => &["video-normalized", "video"],
            OutputMediaType::PhysicalMedia => &["support-2D"],
        }
    }

    /// Extension used when the catalog does not report a format.
    pub fn default_extension(&self) -> &'static str {
        match self {
            OutputMediaType::Video => "mp4",
            _ => "png",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "screenshots" | "screenshot" => Some(OutputMediaType::Screenshot),
            "titlescreens" | "titlescreen" => Some(OutputMediaType::TitleScreen),
            "covers" | "cover" => Some(OutputMediaType::Cover),
            "backcovers" | "backcover" => Some(OutputMediaType::BackCover),
            "3dboxes" | "3dbox" | "cover3d" => Some(OutputMediaType::Cover3D),
            "marquees" | "marquee" => Some(OutputMediaType::Marquee),
            "fanart" => Some(OutputMediaType::Fanart),
            "videos" | "video" => Some(OutputMediaType::Video),
            "physicalmedia" => Some(OutputMediaType::PhysicalMedia),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputMediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.subdir())
    }
}

/// Configuration for which media types to download, in order.
#[derive(Debug, Clone)]
pub struct MediaSelection {
    pub types: Vec<OutputMediaType>,
}

impl Default for MediaSelection {
    fn default() -> Self {
        Self {
            types: vec![
                OutputMediaType::Cover,
                OutputMediaType::Screenshot,
                OutputMediaType::Marquee,
                OutputMediaType::Video,
            ],
        }
    }
}

impl MediaSelection {
    pub fn all() -> Self {
        Self {
            types: OutputMediaType::ALL.to_vec(),
        }
    }

    pub fn none() -> Self {
        Self { types: Vec::new() }
    }

    /// Parse from a list of names (e.g. "covers,screenshots,videos" split).
    /// Unknown names are ignored.
    pub fn from_names(names: &[String]) -> Self {
        let types = names
            .iter()
            .filter_map(|n| OutputMediaType::from_name(n))
            .collect();
        Self { types }
    }
}

#[cfg(test)]
#[path = "tests/media_tests.rs"]
mod tests;
