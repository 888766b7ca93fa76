//! The channel through which a table learns that a weakly held key has died.
//!
//! Reference counting gives no callback when the last strong pointer goes away, so the queue
//! keeps its own weak pointer to every enrolled key and notices deaths by sweeping those
//! registrations. Sweeps are amortized over polls; callers that need an exact snapshot force
//! one with [`ReferenceQueue::sweep`].

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::traits::WeakElement;

/// Polls between sweeps never drop below this, so tiny tables do not sweep on every call.
const MIN_SWEEP_INTERVAL: usize = 8;

/// Notification that the key of the slot registered under `ticket` has been collected.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Stale {
    pub hash:   u64,
    pub ticket: u64,
}

struct Registration<K> {
    key:  K,
    hash: u64,
}

pub(crate) struct ReferenceQueue<K> {
    watched:     FxHashMap<u64, Registration<K>>,
    pending:     VecDeque<Stale>,
    since_sweep: usize,
}

impl<K: WeakElement> ReferenceQueue<K> {
    pub fn new() -> Self {
        ReferenceQueue {
            watched:     FxHashMap::default(),
            pending:     VecDeque::new(),
            since_sweep: 0,
        }
    }

    /// Starts watching `key`. Its death will be reported as `Stale { hash, ticket }`.
    pub fn enroll(&mut self, key: K, hash: u64, ticket: u64) {
        self.watched.insert(ticket, Registration { key, hash });
    }

    /// Stops watching the slot registered under `ticket`.
    pub fn cancel(&mut self, ticket: u64) {
        self.watched.remove(&ticket);
    }

    /// Returns the next dead registration, if any, without blocking.
    pub fn poll(&mut self) -> Option<Stale> {
        if self.pending.is_empty() {
            self.since_sweep += 1;
            if self.since_sweep >= self.watched.len().max(MIN_SWEEP_INTERVAL) {
                self.sweep();
            }
        }
        self.pending.pop_front()
    }

    /// Moves every registration whose key has died onto the pending list.
    pub fn sweep(&mut self) {
        let pending = &mut self.pending;
        let before = pending.len();
        self.watched.retain(|&ticket, registration| {
            if registration.key.expired() {
                pending.push_back(Stale { hash: registration.hash, ticket });
                false
            } else {
                true
            }
        });
        self.since_sweep = 0;

        let found = self.pending.len() - before;
        if found > 0 {
            trace!(found, watched = self.watched.len(), "reference queue sweep");
        }
    }

    /// Forgets every registration and every undelivered notification.
    pub fn clear(&mut self) {
        self.watched.clear();
        self.pending.clear();
        self.since_sweep = 0;
    }

    #[cfg(test)]
    pub fn watched(&self) -> usize {
        self.watched.len()
    }
}
