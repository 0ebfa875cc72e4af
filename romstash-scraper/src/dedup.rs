//! In-flight request coalescing.
//!
//! For any key, at most one caller (the runner) executes the supplied
//! future; concurrent callers with the same key wait for the runner and
//! receive a clone of its result. Records live only while a call is
//! outstanding; the disk cache provides cross-run deduplication.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::ScrapeError;

type Slot<V> = watch::Receiver<Option<V>>;

/// Coalesces concurrent identical lookups into one upstream call.
#[derive(Debug)]
pub struct Deduplicator<V: Clone> {
    inflight: Mutex<HashMap<String, Slot<V>>>,
}

impl<V: Clone> Default for Deduplicator<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> Deduplicator<V> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys currently in flight.
    pub fn len(&self) -> usize {
        self.inflight.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.lock().is_empty()
    }

    /// Run `f` for `key`, or wait for the call already in flight.
    ///
    /// Returns the shared value and whether this caller was the runner.
    /// Waiters get [`ScrapeError::Cancelled`] when the runner was dropped
    /// before publishing (its own cancellation).
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> Result<(V, bool), ScrapeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        enum Role<V> {
            Runner(watch::Sender<Option<V>>),
            Waiter(Slot<V>),
        }

        let role = {
            let mut map = self.inflight.lock();
            match map.entry(key.to_string()) {
                Entry::Occupied(occupied) => Role::Waiter(occupied.get().clone()),
                Entry::Vacant(vacant) => {
                    let (tx, rx) = watch::channel(None);
                    vacant.insert(rx);
                    Role::Runner(tx)
                }
            }
        };

        match role {
            Role::Runner(tx) => {
                // The guard removes the table entry on every exit path,
                // including this future being dropped mid-run.
                let _guard = RemoveOnDrop {
                    table: &self.inflight,
                    key,
                };
                let value = f().await;
                // Waiters may all be gone; that's fine.
                let _ = tx.send(Some(value.clone()));
                Ok((value, true))
            }
            Role::Waiter(mut rx) => loop {
                if let Some(value) = rx.borrow_and_update().clone() {
                    return Ok((value, false));
                }
                if rx.changed().await.is_err() {
                    // Runner dropped. A final value may still have landed
                    // between our last borrow and the sender drop.
                    return match rx.borrow().clone() {
                        Some(value) => Ok((value, false)),
                        None => Err(ScrapeError::Cancelled),
                    };
                }
            },
        }
    }
}

struct RemoveOnDrop<'a, V: Clone> {
    table: &'a Mutex<HashMap<String, Slot<V>>>,
    key: &'a str,
}

impl<V: Clone> Drop for RemoveOnDrop<'_, V> {
    fn drop(&mut self) {
        self.table.lock().remove(self.key);
    }
}

#[cfg(test)]
#[path = "tests/dedup_tests.rs"]
mod tests;
