//! Access frequency tracker.
//!
//! Counts how often each document is retrieved. Used as the last-resort
//! ranking when lexical search finds nothing. Counters are atomics so that
//! concurrent request handlers only need a shared read lock to bump an
//! existing entry; the write lock is taken once per new ID.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct AccessTracker {
    counts: RwLock<HashMap<String, AtomicU64>>,
}

impl AccessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one retrieval of `id`.
    pub fn record(&self, id: &str) {
        {
            let counts = self.counts.read().unwrap_or_else(|e| e.into_inner());
            if let Some(counter) = counts.get(id) {
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        let mut counts = self.counts.write().unwrap_or_else(|e| e.into_inner());
        counts
            .entry(id.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self, id: &str) -> u64 {
        let counts = self.counts.read().unwrap_or_else(|e| e.into_inner());
        counts
            .get(id)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// The `n` most retrieved IDs with their counts, ties broken by id.
    pub fn most_frequent(&self, n: usize) -> Vec<(String, u64)> {
        let counts = self.counts.read().unwrap_or_else(|e| e.into_inner());
        let mut ranked: Vec<(String, u64)> = counts
            .iter()
            .map(|(id, c)| (id.clone(), c.load(Ordering::Relaxed)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }

    pub fn len(&self) -> usize {
        self.counts.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
