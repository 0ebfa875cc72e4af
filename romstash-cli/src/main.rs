//! romstash CLI
//!
//! Scrapes game metadata and media artwork for a folder of ROM files.

mod scan;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;
use tokio_util::sync::CancellationToken;

use romstash_scraper::{
    CacheMode, Credentials, DiskCache, LookupEntry, MediaSelection, ProgressEvent, ScrapeError,
    ScrapeOptions, ScrapeResults, Scraper, ScreenScraperClient,
};

/// Cached records are kept for a week.
const CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Debug, Parser)]
#[command(
    name = "romstash",
    version,
    about = "Scrape game metadata and artwork for a ROM folder"
)]
struct Cli {
    /// Folder containing ROM files for one system
    folder: PathBuf,

    /// Catalog system id for the folder's platform (e.g. 3 for NES)
    #[arg(long)]
    system_id: String,

    /// Media types to download (screenshots, titlescreens, covers,
    /// backcovers, 3dboxes, marquees, fanart, videos, physicalmedia)
    #[arg(long, value_delimiter = ',')]
    media: Option<Vec<String>>,

    /// Preferred regions, most preferred first
    #[arg(long, value_delimiter = ',', default_value = "us")]
    regions: Vec<String>,

    /// Media output directory (defaults to `<folder>-media` next to the folder)
    #[arg(long)]
    media_dir: Option<PathBuf>,

    /// Cache directory (defaults to the user cache dir)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Ignore cached data and refetch, still refreshing the cache
    #[arg(long)]
    refresh: bool,

    /// Use the cache but never write to it
    #[arg(long, conflicts_with = "refresh")]
    read_only_cache: bool,

    /// Overwrite media files that already exist
    #[arg(long)]
    overwrite: bool,

    /// Worker threads (clamped to the account's allowance)
    #[arg(long)]
    threads: Option<usize>,

    /// Process at most N entries
    #[arg(long)]
    limit: Option<usize>,

    /// File extensions to scan instead of the built-in list
    #[arg(long, value_delimiter = ',')]
    extensions: Option<Vec<String>>,

    /// ScreenScraper user id (overrides config/env)
    #[arg(long)]
    ss_user: Option<String>,

    /// ScreenScraper user password (overrides config/env)
    #[arg(long)]
    ss_password: Option<String>,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    if let Err(e) = run(cli).await {
        log::error!(
            "{} {}",
            "\u{2718}".if_supports_color(Stdout, |t| t.red()),
            e
        );
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ScrapeError> {
    let creds = Credentials::load()?.with_overrides(None, None, cli.ss_user.clone(), cli.ss_password.clone());
    let client = Arc::new(ScreenScraperClient::new(creds)?);

    // Account allowance bounds both knobs.
    let spinner = connect_spinner(cli.quiet);
    let account = client.user_info().await;
    spinner.finish_and_clear();
    let account = account?;
    let max_threads = cli
        .threads
        .unwrap_or_else(|| account.max_threads())
        .min(account.max_threads())
        .max(1);
    log::info!(
        "{} Connected (requests today: {}/{}, workers: {})",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        account.requests_today(),
        account.max_requests_per_day(),
        max_threads,
    );

    let entries = scan_entries(&cli)?;
    if entries.is_empty() {
        log::info!("No ROM files found in {}", cli.folder.display());
        return Ok(());
    }

    let cache_mode = if cli.refresh {
        CacheMode::NoRead
    } else if cli.read_only_cache {
        CacheMode::ReadOnly
    } else {
        CacheMode::Normal
    };
    let cache_root = cli
        .cache_dir
        .clone()
        .or_else(|| dirs::cache_dir().map(|d| d.join("romstash")))
        .unwrap_or_else(|| PathBuf::from(".romstash-cache"));
    let cache = Arc::new(DiskCache::new(cache_root, CACHE_TTL, cache_mode));

    let media_dir = cli.media_dir.clone().unwrap_or_else(|| {
        let name = cli
            .folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "roms".to_string());
        cli.folder
            .parent()
            .unwrap_or(&cli.folder)
            .join(format!("{name}-media"))
    });

    let mut options = ScrapeOptions::new(cli.system_id.clone());
    options.media = match &cli.media {
        Some(names) => MediaSelection::from_names(names),
        None => MediaSelection::default(),
    };
    options.preferred_regions = cli.regions.clone();
    options.media_dir = Some(media_dir);
    options.overwrite = cli.overwrite;
    options.max_threads = max_threads;
    options.max_requests_per_min = account.max_requests_per_min();

    let scraper = Scraper::new(client, cache, options);

    // Ctrl-C cancels every in-flight wait; workers drain promptly.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, finishing in-flight work...");
                cancel.cancel();
            }
        });
    }

    let results = drive_scrape(&scraper, entries, cancel, cli.quiet).await;

    if log::log_enabled!(log::Level::Debug) {
        for result in &results.results {
            if let Some(game) = &result.game {
                let name = romstash_scraper::select_region_text(
                    &game.names,
                    &result.entry.regions,
                    &cli.regions,
                )
                .unwrap_or(&result.entry.name);
                log::debug!("{} -> \"{name}\"", result.entry.filename);
            }
        }
    }

    print_summary(&results);
    Ok(())
}

/// Scan the folder into lookup entries, hashing files behind a spinner.
fn scan_entries(cli: &Cli) -> Result<Vec<LookupEntry>, ScrapeError> {
    let extensions = scan::extension_set(cli.extensions.as_deref());

    let pb = if cli.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(spinner_style());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    };
    let mut entries = scan::scan_folder(&cli.folder, &extensions, |file| {
        pb.set_message(format!("Hashing {file}"));
    })
    .map_err(|e| ScrapeError::Config(format!("Error reading folder: {e}")))?;
    pb.finish_and_clear();

    if let Some(max) = cli.limit {
        entries.truncate(max);
    }
    log::info!("Found {} ROM files", entries.len());
    Ok(entries)
}

/// Run the scrape while rendering progress events.
async fn drive_scrape(
    scraper: &Scraper,
    entries: Vec<LookupEntry>,
    cancel: CancellationToken,
    quiet: bool,
) -> ScrapeResults {
    let total = entries.len() as u64;
    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::with_template("  {bar:30.cyan/blue} {pos}/{len} {msg}")
                .expect("progress template is valid"),
        );
        pb
    };

    let (events_tx, mut events_rx) = Scraper::progress_channel();
    let scrape = scraper.scrape(entries, 0, cancel, events_tx);
    tokio::pin!(scrape);

    let mut results = None;
    loop {
        tokio::select! {
            r = &mut scrape, if results.is_none() => results = Some(r),
            event = events_rx.recv() => match event {
                Some(event) => render_event(&pb, scraper, event),
                None => break,
            }
        }
    }
    pb.finish_and_clear();

    match results {
        Some(r) => r,
        None => scrape.await,
    }
}

fn render_event(pb: &ProgressBar, scraper: &Scraper, event: ProgressEvent) {
    match event {
        ProgressEvent::Started { name, .. } => {
            let stats = scraper.limiter_stats();
            pb.set_message(format!("{name} ({:.1} req/s)", stats.per_second));
        }
        ProgressEvent::Progress {
            name, downloading, ..
        } => {
            pb.set_message(format!("{name}: {downloading}"));
        }
        ProgressEvent::Found { name, media_done, .. } => {
            pb.inc(1);
            log::debug!("Found {name} ({media_done} media)");
        }
        ProgressEvent::NotFound { name, reason, .. } => {
            pb.inc(1);
            pb.println(format!(
                "{} {} not found{}",
                "?".if_supports_color(Stdout, |t| t.yellow()),
                name,
                reason.map(|r| format!(" ({r})")).unwrap_or_default(),
            ));
        }
        ProgressEvent::Skipped { name, reason } => {
            pb.inc(1);
            log::debug!("Skipped {name}: {reason}");
        }
        ProgressEvent::Error { name, message, .. } => {
            pb.inc(1);
            pb.println(format!(
                "{} {}: {}",
                "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                name,
                message,
            ));
        }
    }
}

fn print_summary(results: &ScrapeResults) {
    log::info!("");
    log::info!(
        "{} Scraped {} entries: {} found, {} not found, {} skipped, {} errors",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        results.total,
        results.found.if_supports_color(Stdout, |t| t.green()),
        results.not_found.if_supports_color(Stdout, |t| t.yellow()),
        results.skipped,
        results.errors.if_supports_color(Stdout, |t| t.red()),
    );
    log::info!(
        "  Media: {}/{} downloaded, cache hits: {}, filtered out: {}",
        results.media_downloaded,
        results.media_requested,
        results.cache_hits,
        results.filtered_out,
    );
}

fn connect_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message("Connecting to ScreenScraper...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("  {spinner:.cyan} {msg}").expect("spinner template is valid")
}
