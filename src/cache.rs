//! Caller-owned memoization for fetch results.
//!
//! Fetch functions are pure `(url, params) -> Table` mappings, so a cache can
//! wrap them from the outside. Entries expire after a fixed time-to-live.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;

use crate::{paginate::PaginationOptions, table::Table};

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl FetchKey {
    /// Params are sorted so equivalent option sets share a key.
    pub fn new(url: impl Into<String>, mut params: Vec<(String, String)>) -> Self {
        params.sort();
        Self {
            url: url.into(),
            params,
        }
    }

    pub fn for_fetch(url: &str, desired: &[String], options: &PaginationOptions) -> Self {
        let mut params = options.key_params();
        if !desired.is_empty() {
            params.push(("columns".to_string(), desired.join(",")));
        }
        Self::new(url, params)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    table: Table,
    stored_at: Instant,
    sequence: u64,
}

#[derive(Debug)]
pub struct FetchCache {
    ttl: Duration,
    max_entries: Option<usize>,
    entries: HashMap<FetchKey, CacheEntry>,
    inserted: u64,
}

impl Default for FetchCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl FetchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_entries: None,
            entries: HashMap::new(),
            inserted: 0,
        }
    }

    /// Caps the entry count; the oldest entry is evicted first.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &FetchKey) -> Option<&Table> {
        self.entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| &entry.table)
    }

    pub fn insert(&mut self, key: FetchKey, table: Table) {
        self.clear_expired();
        let full = self
            .max_entries
            .is_some_and(|max| self.entries.len() >= max && !self.entries.contains_key(&key));
        if full {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.stored_at, entry.sequence))
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        self.inserted += 1;
        self.entries.insert(
            key,
            CacheEntry {
                table,
                stored_at: Instant::now(),
                sequence: self.inserted,
            },
        );
    }

    /// Returns the cached table or runs `fetch` and stores its result.
    /// Failed fetches are not cached.
    pub fn get_or_fetch<F, E>(&mut self, key: FetchKey, fetch: F) -> Result<Table, E>
    where
        F: FnOnce() -> Result<Table, E>,
    {
        if let Some(table) = self.get(&key) {
            debug!("Cache hit for {}", key.url);
            return Ok(table.clone());
        }
        debug!("Cache miss for {}", key.url);
        let table = fetch()?;
        self.insert(key, table.clone());
        Ok(table)
    }

    pub fn invalidate(&mut self, key: &FetchKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear_expired(&mut self) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| entry.stored_at.elapsed() < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn key(url: &str) -> FetchKey {
        FetchKey::new(url, vec![("limit".into(), "10".into())])
    }

    fn table(name: &str) -> Table {
        Table::new(vec![name.to_string()])
    }

    #[test]
    fn get_or_fetch_runs_fetch_once_within_ttl() {
        let mut cache = FetchCache::new(Duration::from_secs(60));
        let calls = Cell::new(0);
        for _ in 0..3 {
            let result: Result<Table, ()> = cache.get_or_fetch(key("u"), || {
                calls.set(calls.get() + 1);
                Ok(table("a"))
            });
            assert_eq!(result.unwrap(), table("a"));
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn zero_ttl_never_serves_cached_entries() {
        let mut cache = FetchCache::new(Duration::ZERO);
        cache.insert(key("u"), table("a"));
        assert!(cache.get(&key("u")).is_none());
    }

    #[test]
    fn failed_fetches_are_not_stored() {
        let mut cache = FetchCache::default();
        let result: Result<Table, &str> = cache.get_or_fetch(key("u"), || Err("boom"));
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn max_entries_evicts_oldest() {
        let mut cache = FetchCache::default().with_max_entries(2);
        cache.insert(key("a"), table("a"));
        cache.insert(key("b"), table("b"));
        cache.insert(key("c"), table("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_none());
        assert!(cache.get(&key("c")).is_some());
    }

    #[test]
    fn invalidate_forces_refetch() {
        let mut cache = FetchCache::default();
        cache.insert(key("u"), table("a"));
        assert!(cache.invalidate(&key("u")));
        assert!(!cache.invalidate(&key("u")));
        let result: Result<Table, ()> = cache.get_or_fetch(key("u"), || Ok(table("b")));
        assert_eq!(result.unwrap(), table("b"));
    }

    #[test]
    fn key_params_are_order_insensitive() {
        let a = FetchKey::new("u", vec![("b".into(), "2".into()), ("a".into(), "1".into())]);
        let b = FetchKey::new("u", vec![("a".into(), "1".into()), ("b".into(), "2".into())]);
        assert_eq!(a, b);
    }
}
