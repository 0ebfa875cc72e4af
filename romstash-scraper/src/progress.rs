//! Progress events emitted during a scrape run.
//!
//! Events are sent over a bounded channel to one external observer (CLI,
//! GUI). Every entry produces exactly one terminal event; dispatched
//! entries additionally get a `Started` event first and zero or more
//! `Progress` events in between. The channel closing signals that no
//! further events will arrive.

/// Progress events for a scrape run. Workers are numbered from 1; `Skipped`
/// is emitted by the orchestrator before an entry reaches a worker.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// An entry has been picked up for processing.
    Started {
        name: String,
        media_total: usize,
        worker_id: usize,
    },
    /// A media download is being attempted for an entry.
    Progress {
        name: String,
        media_total: usize,
        media_done: usize,
        media_failed: usize,
        media_missing: usize,
        /// Output media type currently being fetched.
        downloading: String,
        cache_hits: u32,
        worker_id: usize,
    },
    /// Terminal: the entry was identified and its media processed.
    Found {
        name: String,
        media_total: usize,
        media_done: usize,
        media_failed: usize,
        media_missing: usize,
        cache_hits: u32,
        worker_id: usize,
    },
    /// Terminal: the catalog has no record of this entry.
    NotFound {
        name: String,
        reason: Option<String>,
        worker_id: usize,
    },
    /// Terminal: the entry was filtered before reaching a worker.
    Skipped { name: String, reason: String },
    /// Terminal: the entry failed.
    Error {
        name: String,
        message: String,
        worker_id: usize,
    },
}

impl ProgressEvent {
    /// Whether this event ends the entry's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Found { .. }
                | ProgressEvent::NotFound { .. }
                | ProgressEvent::Skipped { .. }
                | ProgressEvent::Error { .. }
        )
    }

    /// The entry this event is about.
    pub fn entry_name(&self) -> &str {
        match self {
            ProgressEvent::Started { name, .. }
            | ProgressEvent::Progress { name, .. }
            | ProgressEvent::Found { name, .. }
            | ProgressEvent::NotFound { name, .. }
            | ProgressEvent::Skipped { name, .. }
            | ProgressEvent::Error { name, .. } => name,
        }
    }
}
