//! Redeemed-token bookkeeping.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Mutex, PoisonError};

/// Remembers redeemed tokens (by hash) until they could no longer pass
/// the expiry check anyway.
pub trait UsedTokenStore: Send + Sync {
    fn contains(&self, token_hash: &str) -> bool;

    /// Record a redemption. Returns `false` when the token was already
    /// recorded; callers treat that as a lost race.
    fn insert(&self, token_hash: String, expires_at_ms: u64) -> bool;

    /// Forget entries that expired before `now_ms`. Returns how many.
    fn sweep(&self, now_ms: u64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct Inner {
    seen: HashSet<String>,
    by_expiry: BinaryHeap<Reverse<(u64, String)>>,
}

impl Inner {
    fn evict_earliest(&mut self) -> bool {
        match self.by_expiry.pop() {
            Some(Reverse((_, hash))) => self.seen.remove(&hash),
            None => false,
        }
    }
}

/// In-process store: a set plus an expiry-ordered heap, bounded by a cap.
pub struct MemoryUsedTokenStore {
    inner: Mutex<Inner>,
    max_entries: usize,
}

impl MemoryUsedTokenStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UsedTokenStore for MemoryUsedTokenStore {
    fn contains(&self, token_hash: &str) -> bool {
        self.lock().seen.contains(token_hash)
    }

    fn insert(&self, token_hash: String, expires_at_ms: u64) -> bool {
        let mut inner = self.lock();
        if inner.seen.contains(&token_hash) {
            return false;
        }

        while inner.seen.len() >= self.max_entries {
            if !inner.evict_earliest() {
                break;
            }
            tracing::warn!(cap = self.max_entries, "Used-token store full, evicted earliest-expiring entry");
        }

        inner.seen.insert(token_hash.clone());
        inner.by_expiry.push(Reverse((expires_at_ms, token_hash)));
        true
    }

    fn sweep(&self, now_ms: u64) -> usize {
        let mut inner = self.lock();
        let mut removed = 0;
        while let Some(expires_at) = inner.by_expiry.peek().map(|Reverse((at, _))| *at) {
            if expires_at >= now_ms {
                break;
            }
            if inner.evict_earliest() {
                removed += 1;
            }
        }
        removed
    }

    fn len(&self) -> usize {
        self.lock().seen.len()
    }
}
