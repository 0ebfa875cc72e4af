pub mod cache;
pub mod client;
pub mod credentials;
pub mod dedup;
pub mod error;
pub mod limiter;
pub mod media;
pub mod progress;
pub mod region;
pub mod scrape;
pub mod types;

mod worker;

pub use cache::{CacheMode, CachedMedia, DiskCache, NOMEDIA_EXT};
pub use client::{
    CatalogApi, GameInfoQuery, GameReply, MediaQuery, MediaReply, ReplyStatus, ScreenScraperClient,
    UserInfo,
};
pub use credentials::{Credentials, config_path, save_to_file};
pub use dedup::Deduplicator;
pub use error::ScrapeError;
pub use limiter::{LimiterStats, RateLimitPermit, RateLimiter};
pub use media::{MediaSelection, OutputMediaType};
pub use progress::ProgressEvent;
pub use region::{build_search_order, region_language, select_media, select_region_text, select_text};
pub use scrape::{ScrapeOptions, ScrapeResults, Scraper};
pub use types::{EntrySource, Game, GameMedia, Hashes, LookupEntry, ScrapeResult};
