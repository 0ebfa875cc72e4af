//! Per-entry processing: identify the game, fetch its media, emit progress.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cache::{CachedMedia, DiskCache, NOMEDIA_EXT};
use crate::client::{CatalogApi, GameInfoQuery, MediaQuery};
use crate::dedup::Deduplicator;
use crate::error::ScrapeError;
use crate::limiter::RateLimiter;
use crate::media::OutputMediaType;
use crate::progress::ProgressEvent;
use crate::region;
use crate::scrape::ScrapeOptions;
use crate::types::{Game, LookupEntry, ScrapeResult};

/// Shared outcome of one coalesced game lookup.
#[derive(Debug, Clone)]
pub(crate) enum GameFetch {
    Found(Arc<Game>),
    NotFound,
    RateLimited,
    Failed(String),
}

/// Shared outcome of one coalesced media download.
#[derive(Debug, Clone)]
pub(crate) enum MediaFetch {
    Data { bytes: Arc<Vec<u8>>, extension: String },
    /// The item is known to not exist upstream (or an absence was recorded).
    NoData,
    RateLimited,
    Failed(String),
}

/// What happened for one output media type.
enum MediaOutcome {
    Done,
    Missing,
    Failed,
    Cancelled,
}

/// Processes entries end-to-end. One worker per pool slot; all shared state
/// arrives through `Arc`s owned by the orchestrator.
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) api: Arc<dyn CatalogApi>,
    pub(crate) cache: Arc<DiskCache>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) game_flights: Arc<Deduplicator<GameFetch>>,
    pub(crate) media_flights: Arc<Deduplicator<MediaFetch>>,
    pub(crate) options: Arc<ScrapeOptions>,
    pub(crate) events: mpsc::Sender<ProgressEvent>,
    pub(crate) cancel: CancellationToken,
}

impl Worker {
    /// Drive one entry: identify, download media, emit progress.
    pub(crate) async fn process(&self, entry: LookupEntry) -> ScrapeResult {
        let media_total = self.options.media.types.len();
        self.send(ProgressEvent::Started {
            name: entry.name.clone(),
            media_total,
            worker_id: self.id,
        })
        .await;

        let mut result = ScrapeResult::new(entry);

        let Some(key) = result.entry.cache_key() else {
            let reason = "no hashes or serial to identify with".to_string();
            result.not_found_reason = Some(reason.clone());
            self.send(ProgressEvent::NotFound {
                name: result.entry.name.clone(),
                reason: Some(reason),
                worker_id: self.id,
            })
            .await;
            return result;
        };

        // Identify: disk cache first, then one coalesced upstream lookup.
        let mut game: Option<Arc<Game>> = None;
        if let Some(bytes) = self.cache.get_game_info(&self.options.system_id, &key) {
            match serde_json::from_slice::<Game>(&bytes) {
                Ok(g) => {
                    result.cached = true;
                    result.cache_hits += 1;
                    game = Some(Arc::new(g));
                }
                Err(e) => log::debug!("Discarding unparseable cached game info: {e}"),
            }
        }

        let game = if let Some(game) = game {
            game
        } else {
            let flight_key = format!("game:{}:{}", self.options.system_id, key);
            let outcome = self
                .game_flights
                .run(&flight_key, || self.fetch_game(&result.entry, &key))
                .await;
            let (fetch, was_runner) = match outcome {
                Ok(v) => v,
                Err(_) => {
                    result.error = Some(ScrapeError::Cancelled);
                    return result;
                }
            };
            if !was_runner {
                // The lookup was answered by another worker's in-flight call.
                result.cache_hits += 1;
            }
            match fetch {
                GameFetch::Found(game) => game,
                GameFetch::NotFound => {
                    self.send(ProgressEvent::NotFound {
                        name: result.entry.name.clone(),
                        reason: None,
                        worker_id: self.id,
                    })
                    .await;
                    return result;
                }
                GameFetch::RateLimited => {
                    if self.cancel.is_cancelled() {
                        result.error = Some(ScrapeError::Cancelled);
                        return result;
                    }
                    let message = ScrapeError::RateLimited.to_string();
                    self.send(ProgressEvent::Error {
                        name: result.entry.name.clone(),
                        message,
                        worker_id: self.id,
                    })
                    .await;
                    result.error = Some(ScrapeError::RateLimited);
                    return result;
                }
                GameFetch::Failed(message) => {
                    if self.cancel.is_cancelled() {
                        result.error = Some(ScrapeError::Cancelled);
                        return result;
                    }
                    self.send(ProgressEvent::Error {
                        name: result.entry.name.clone(),
                        message: message.clone(),
                        worker_id: self.id,
                    })
                    .await;
                    result.error = Some(ScrapeError::Api(message));
                    return result;
                }
            }
        };

        result.game = Some((*game).clone());

        let mut done = 0usize;
        let mut failed = 0usize;
        let mut missing = 0usize;
        for &media_type in &self.options.media.types {
            if self.cancel.is_cancelled() {
                result.error = Some(ScrapeError::Cancelled);
                return result;
            }
            self.send(ProgressEvent::Progress {
                name: result.entry.name.clone(),
                media_total,
                media_done: done,
                media_failed: failed,
                media_missing: missing,
                downloading: media_type.subdir().to_string(),
                cache_hits: result.cache_hits,
                worker_id: self.id,
            })
            .await;

            match self
                .fetch_one_media(game.as_ref(), media_type, &mut result)
                .await
            {
                MediaOutcome::Done => done += 1,
                MediaOutcome::Missing => missing += 1,
                MediaOutcome::Failed => failed += 1,
                MediaOutcome::Cancelled => {
                    result.error = Some(ScrapeError::Cancelled);
                    return result;
                }
            }
        }

        self.send(ProgressEvent::Found {
            name: result.entry.name.clone(),
            media_total,
            media_done: done,
            media_failed: failed,
            media_missing: missing,
            cache_hits: result.cache_hits,
            worker_id: self.id,
        })
        .await;
        result
    }

    /// One upstream game lookup inside the rate-limit scope. Runs as the
    /// dedup body, so at most once per key across concurrent workers.
    async fn fetch_game(&self, entry: &LookupEntry, hash_key: &str) -> GameFetch {
        let _permit = match self.limiter.acquire(&self.cancel).await {
            Ok(p) => p,
            Err(e) => return GameFetch::Failed(e.to_string()),
        };

        let query = GameInfoQuery {
            system_id: self.options.system_id.clone(),
            crc32: entry.hashes.crc32.clone(),
            md5: entry.hashes.md5.clone(),
            sha1: entry.hashes.sha1.clone(),
            file_size: entry.file_size,
            filename: Some(entry.filename.clone()),
            serial: entry.serial.clone(),
        };
        let reply = match self.api.get_game_info(&query).await {
            Ok(r) => r,
            Err(e) => return GameFetch::Failed(e.to_string()),
        };

        if reply.is_rate_limited() {
            self.limiter.trigger_backoff();
            return GameFetch::RateLimited;
        }
        if reply.is_not_found() {
            return GameFetch::NotFound;
        }
        if !reply.is_success() {
            return GameFetch::Failed(format!("Catalog error: {}", excerpt(&reply.body)));
        }

        self.limiter.reset_backoff();
        match reply.parse_game() {
            Ok(game) if game.id.is_empty() => GameFetch::NotFound,
            Ok(game) => {
                match serde_json::to_vec(&game) {
                    Ok(bytes) => {
                        if let Err(e) =
                            self.cache
                                .set_game_info(&self.options.system_id, hash_key, &bytes)
                        {
                            log::warn!("Failed to cache game info for {}: {e}", entry.name);
                        }
                    }
                    Err(e) => log::debug!("Could not serialize game for cache: {e}"),
                }
                GameFetch::Found(Arc::new(game))
            }
            Err(e) => GameFetch::Failed(e.to_string()),
        }
    }

    /// Resolve one output media type through its catalog-type fallbacks.
    ///
    /// First fetched data wins and skips the remaining fallbacks. An output
    /// type counts `failed` only when an error happened and no fallback
    /// produced data, `missing` when there was simply no data anywhere.
    async fn fetch_one_media(
        &self,
        game: &Game,
        media_type: OutputMediaType,
        result: &mut ScrapeResult,
    ) -> MediaOutcome {
        let mut had_error = false;

        for catalog_type in media_type.catalog_types() {
            if self.cancel.is_cancelled() {
                return MediaOutcome::Cancelled;
            }

            let Some(descriptor) = region::select_media(
                &game.media,
                catalog_type,
                &result.entry.regions,
                &self.options.preferred_regions,
            ) else {
                continue;
            };
            let ext = if descriptor.format.is_empty() {
                media_type.default_extension().to_string()
            } else {
                descriptor.format.clone()
            };
            let region = descriptor.region.clone();

            // A file already on disk counts as a hit and skips the fetch.
            if let Some(media_dir) = &self.options.media_dir {
                let rel = relative_media_path(media_type, &result.entry.base_name, &ext);
                if !self.options.overwrite && media_dir.join(&rel).exists() {
                    result.media_paths.insert(media_type, rel);
                    result.cache_hits += 1;
                    return MediaOutcome::Done;
                }
            }

            match self
                .cache
                .get_media(&self.options.system_id, &game.id, catalog_type, &region)
            {
                Some(CachedMedia::Absent) => {
                    // Known absent upstream; try the next fallback type.
                    continue;
                }
                Some(CachedMedia::Data { bytes, extension }) => {
                    result.cache_hits += 1;
                    match self.write_output(media_type, &result.entry.base_name, &bytes, &extension)
                    {
                        Ok(rel) => {
                            if let Some(rel) = rel {
                                result.media_paths.insert(media_type, rel);
                            }
                            return MediaOutcome::Done;
                        }
                        Err(e) => {
                            log::warn!("Failed to write {media_type} for {}: {e}", result.entry.name);
                            had_error = true;
                            continue;
                        }
                    }
                }
                None => {
                    let flight_key = format!(
                        "media:{}:{}:{}:{}",
                        self.options.system_id, game.id, catalog_type, region
                    );
                    let outcome = self
                        .media_flights
                        .run(&flight_key, || {
                            self.download_media_from_api(&game.id, catalog_type, &region, &ext)
                        })
                        .await;
                    let (fetch, was_runner) = match outcome {
                        Ok(v) => v,
                        Err(_) => return MediaOutcome::Cancelled,
                    };
                    match fetch {
                        MediaFetch::Data { bytes, extension } => {
                            if !was_runner {
                                result.cache_hits += 1;
                            }
                            match self.write_output(
                                media_type,
                                &result.entry.base_name,
                                &bytes,
                                &extension,
                            ) {
                                Ok(rel) => {
                                    if let Some(rel) = rel {
                                        result.media_paths.insert(media_type, rel);
                                    }
                                    return MediaOutcome::Done;
                                }
                                Err(e) => {
                                    log::warn!(
                                        "Failed to write {media_type} for {}: {e}",
                                        result.entry.name
                                    );
                                    had_error = true;
                                    continue;
                                }
                            }
                        }
                        MediaFetch::NoData => continue,
                        MediaFetch::RateLimited => {
                            had_error = true;
                            continue;
                        }
                        MediaFetch::Failed(message) => {
                            if self.cancel.is_cancelled() {
                                return MediaOutcome::Cancelled;
                            }
                            log::debug!(
                                "Media download failed for {} ({catalog_type}): {message}",
                                result.entry.name
                            );
                            had_error = true;
                            continue;
                        }
                    }
                }
            }
        }

        if had_error {
            MediaOutcome::Failed
        } else {
            MediaOutcome::Missing
        }
    }

    /// One upstream media download inside the rate-limit scope. Runs as the
    /// dedup body. Absences (structural or the literal no-data bodies) are
    /// recorded in the cache so they are not refetched while the marker
    /// lives; transport errors record nothing.
    async fn download_media_from_api(
        &self,
        game_id: &str,
        catalog_type: &str,
        region: &str,
        ext: &str,
    ) -> MediaFetch {
        let _permit = match self.limiter.acquire(&self.cancel).await {
            Ok(p) => p,
            Err(e) => return MediaFetch::Failed(e.to_string()),
        };

        let query = MediaQuery::new(&self.options.system_id, game_id, catalog_type, region);
        let reply = match self.api.download_media(&query).await {
            Ok(r) => r,
            Err(e) => return MediaFetch::Failed(e.to_string()),
        };

        if reply.is_rate_limited() {
            self.limiter.trigger_backoff();
            return MediaFetch::RateLimited;
        }
        if reply.is_success() && !reply.is_no_data() {
            self.limiter.reset_backoff();
            if let Err(e) = self.cache.set_media(
                &self.options.system_id,
                game_id,
                catalog_type,
                region,
                &reply.body,
                ext,
            ) {
                log::warn!("Failed to cache media {catalog_type} for game {game_id}: {e}");
            }
            return MediaFetch::Data {
                bytes: Arc::new(reply.body),
                extension: ext.to_string(),
            };
        }

        if let Err(e) = self.cache.set_media(
            &self.options.system_id,
            game_id,
            catalog_type,
            region,
            &[],
            NOMEDIA_EXT,
        ) {
            log::debug!("Failed to write absence marker for game {game_id}: {e}");
        }
        MediaFetch::NoData
    }

    /// Write media bytes to the output directory, returning the relative
    /// path. `None` when no output directory is configured.
    fn write_output(
        &self,
        media_type: OutputMediaType,
        base_name: &str,
        bytes: &[u8],
        ext: &str,
    ) -> Result<Option<PathBuf>, ScrapeError> {
        let Some(media_dir) = &self.options.media_dir else {
            return Ok(None);
        };
        let rel = relative_media_path(media_type, base_name, ext);
        let dest = media_dir.join(&rel);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&dest, bytes)?;
        Ok(Some(rel))
    }

    async fn send(&self, event: ProgressEvent) {
        // The observer dropping its receiver is not a worker problem.
        let _ = self.events.send(event).await;
    }
}

fn relative_media_path(media_type: OutputMediaType, base_name: &str, ext: &str) -> PathBuf {
    PathBuf::from(media_type.subdir()).join(format!("{base_name}.{ext}"))
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
