//! The scrape run: options, worker pool, result aggregation.
//!
//! Workers are persistent tokio tasks pulling entries from a bounded
//! `async-channel` queue (its `Receiver` is `Clone`, so each worker gets its
//! own handle with no mutex around a shared receiver). Closing the work
//! sender drains and stops the pool; the progress channel closes once the
//! orchestrator and every worker have dropped their event senders.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cache::DiskCache;
use crate::client::CatalogApi;
use crate::dedup::Deduplicator;
use crate::limiter::{LimiterStats, RateLimiter};
use crate::media::MediaSelection;
use crate::progress::ProgressEvent;
use crate::types::{LookupEntry, ScrapeResult};
use crate::worker::Worker;

/// Buffered progress events between workers and the observer. Senders block
/// when the observer stalls; events are never dropped.
const PROGRESS_BUFFER: usize = 100;

/// Options for a scraping session.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    /// Catalog system identifier for the platform being scraped.
    pub system_id: String,
    /// Which media types to download, in order.
    pub media: MediaSelection,
    /// User's preferred regions, most preferred first.
    pub preferred_regions: Vec<String>,
    /// Directory for media files; `None` disables writing to disk.
    pub media_dir: Option<PathBuf>,
    /// Overwrite output files that already exist.
    pub overwrite: bool,
    /// Maximum concurrent upstream calls (and pool size).
    pub max_threads: usize,
    /// Maximum upstream calls started per rolling minute.
    pub max_requests_per_min: usize,
}

impl ScrapeOptions {
    pub fn new(system_id: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            media: MediaSelection::default(),
            preferred_regions: vec!["us".to_string()],
            media_dir: None,
            overwrite: false,
            max_threads: 1,
            max_requests_per_min: 60,
        }
    }
}

/// Aggregate outcome of a scrape run.
#[derive(Debug, Default)]
pub struct ScrapeResults {
    /// Per-entry results, in completion order (non-deterministic).
    pub results: Vec<ScrapeResult>,
    pub total: usize,
    pub found: usize,
    pub not_found: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Output media types requested across all dispatched entries.
    pub media_requested: usize,
    /// Media files obtained (downloaded, cached, or already on disk).
    pub media_downloaded: usize,
    /// Catalog API calls avoided across the run.
    pub cache_hits: u64,
    /// Entries removed by the upstream filter before this run.
    pub filtered_out: usize,
}

impl ScrapeResults {
    fn push(&mut self, result: ScrapeResult) {
        if result.skipped {
            self.skipped += 1;
        } else if result.error.is_some() {
            self.errors += 1;
        } else if result.game.is_some() {
            self.found += 1;
        } else {
            self.not_found += 1;
        }
        self.cache_hits += u64::from(result.cache_hits);
        self.media_downloaded += result.media_paths.len();
        self.results.push(result);
    }
}

/// Owns a scrape run: the worker pool, the shared rate limiter, the
/// deduplicators and the progress channel.
pub struct Scraper {
    api: Arc<dyn CatalogApi>,
    cache: Arc<DiskCache>,
    limiter: Arc<RateLimiter>,
    options: Arc<ScrapeOptions>,
}

impl Scraper {
    pub fn new(api: Arc<dyn CatalogApi>, cache: Arc<DiskCache>, options: ScrapeOptions) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            options.max_threads,
            options.max_requests_per_min,
        ));
        Self {
            api,
            cache,
            limiter,
            options: Arc::new(options),
        }
    }

    /// Snapshot of the shared rate limiter's activity.
    pub fn limiter_stats(&self) -> LimiterStats {
        self.limiter.stats()
    }

    /// Subscribe to progress events for runs driven through this scraper.
    ///
    /// Returns the sender to pass to [`scrape`](Self::scrape) and the
    /// receiver for the observer. The channel closes after the terminal
    /// event of the last entry.
    pub fn progress_channel() -> (mpsc::Sender<ProgressEvent>, mpsc::Receiver<ProgressEvent>) {
        mpsc::channel(PROGRESS_BUFFER)
    }

    /// Scrape all entries, distributing them across a bounded worker pool.
    ///
    /// `filtered_out` is the number of entries the upstream filter removed
    /// before this run; it is carried through to the aggregate unchanged.
    pub async fn scrape(
        &self,
        entries: Vec<LookupEntry>,
        filtered_out: usize,
        cancel: CancellationToken,
        events: mpsc::Sender<ProgressEvent>,
    ) -> ScrapeResults {
        let mut results = ScrapeResults {
            total: entries.len(),
            filtered_out,
            ..ScrapeResults::default()
        };

        // Entries the filter marked (BIOS images and the like) never reach
        // a worker; they get their terminal event here.
        let mut work = Vec::new();
        for entry in entries {
            if let Some(reason) = entry.skip_reason.clone() {
                let _ = events
                    .send(ProgressEvent::Skipped {
                        name: entry.name.clone(),
                        reason,
                    })
                    .await;
                results.push(ScrapeResult::skipped(entry));
            } else {
                work.push(entry);
            }
        }

        if work.is_empty() {
            return results;
        }
        results.media_requested = work.len() * self.options.media.types.len();

        let pool_size = self.options.max_threads.min(work.len()).max(1);
        let game_flights = Arc::new(Deduplicator::new());
        let media_flights = Arc::new(Deduplicator::new());

        let (work_tx, work_rx) = async_channel::bounded::<LookupEntry>(pool_size);
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<ScrapeResult>();

        let mut handles = Vec::with_capacity(pool_size);
        for id in 1..=pool_size {
            let worker = Worker {
                id,
                api: Arc::clone(&self.api),
                cache: Arc::clone(&self.cache),
                limiter: Arc::clone(&self.limiter),
                game_flights: Arc::clone(&game_flights),
                media_flights: Arc::clone(&media_flights),
                options: Arc::clone(&self.options),
                events: events.clone(),
                cancel: cancel.clone(),
            };
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            handles.push(tokio::spawn(async move {
                while let Ok(entry) = work_rx.recv().await {
                    let result = worker.process(entry).await;
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            }));
        }
        // Workers hold their own clones; dropping these closes the channels
        // once the pool finishes.
        drop(result_tx);
        drop(events);
        drop(work_rx);

        // Feed the queue from a background task so result collection can
        // start immediately; dropping the sender closes the queue.
        tokio::spawn(async move {
            for entry in work {
                if work_tx.send(entry).await.is_err() {
                    break;
                }
            }
        });

        while let Some(result) = result_rx.recv().await {
            results.push(result);
        }
        for handle in handles {
            let _ = handle.await;
        }

        results
    }
}

#[cfg(test)]
#[path = "tests/scrape_tests.rs"]
mod tests;
