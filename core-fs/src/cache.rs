//! # TTL Cache
//!
//! A map whose entries expire a fixed time after insertion. Expired entries
//! are treated as absent and dropped lazily, either on the next lookup of
//! the same key or by the sweep every insert runs; nothing is refreshed in
//! the background.
//!
//! Expiry uses [`tokio::time::Instant`], so tests can drive it with a paused
//! clock and `tokio::time::advance`.

use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live value for `key`, if any
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert or replace, restarting the entry's lifetime
    ///
    /// Expired entries of other keys are swept first, so keys that are never
    /// looked up again do not accumulate.
    pub fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Live value for `key`, inserting `make()` when there is none
    ///
    /// The check and the insert happen under one lock, so concurrent callers
    /// for the same key get the same value.
    pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> V {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&key) {
            if entry.expires_at > now {
                return entry.value.clone();
            }
        }

        entries.retain(|_, entry| entry.expires_at > now);
        let value = make();
        entries.insert(
            key,
            Entry {
                value: value.clone(),
                expires_at: now + self.ttl,
            },
        );
        value
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.lock().remove(key).map(|entry| entry.value)
    }

    /// Drop every entry whose key matches `predicate`; returns how many went
    pub fn remove_where(&self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !predicate(key));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<V: Clone> TtlCache<String, V> {
    /// Drop the path `root` and every path below it
    ///
    /// Keys are normalized paths, so `/a` covers `/a/b` but not `/ab`.
    pub fn remove_subtree(&self, root: &str) -> usize {
        let below = format!("{}/", root);
        self.remove_where(|key| key == root || key.starts_with(&below))
    }
}
