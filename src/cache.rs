//!
//! Result cache
//! ------------
//! Memoizes loaded tables keyed by the exact (store location, table name)
//! pair. Entries live until `invalidate`/`clear` is called or the owning
//! process exits; there is no TTL and no size bound. Failed loads are not
//! cached, so the next call retries the load from scratch.
//!
//! The lock is held across the load: two concurrent first requests for the
//! same key produce one query, not two.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use polars::prelude::DataFrame;
use tracing::debug;

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub store: PathBuf,
    pub table: String,
}

impl TableKey {
    pub fn new(store: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self { store: store.into(), table: table.into() }
    }
}

impl std::fmt::Display for TableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.store.display(), self.table)
    }
}

#[derive(Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<TableKey, Arc<DataFrame>>>,
}

impl ResultCache {
    pub fn new() -> Self { Self::default() }

    /// Return the cached table for `key`, running `load` only on a miss.
    pub fn get_or_load<F>(&self, key: &TableKey, load: F) -> AppResult<Arc<DataFrame>>
    where
        F: FnOnce() -> AppResult<DataFrame>,
    {
        let mut guard = self.entries.lock();
        if let Some(df) = guard.get(key) {
            debug!(target: "token_viewer::cache", "hit: key='{}'", key);
            return Ok(df.clone());
        }
        debug!(target: "token_viewer::cache", "miss: key='{}'", key);
        let df = Arc::new(load()?);
        guard.insert(key.clone(), df.clone());
        Ok(df)
    }

    pub fn get(&self, key: &TableKey) -> Option<Arc<DataFrame>> {
        self.entries.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &TableKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Drop one entry. Returns true if something was cached for `key`.
    pub fn invalidate(&self, key: &TableKey) -> bool {
        let removed = self.entries.lock().remove(key).is_some();
        debug!(target: "token_viewer::cache", "invalidate: key='{}' removed={}", key, removed);
        removed
    }

    /// Drop every entry, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut guard = self.entries.lock();
        let n = guard.len();
        guard.clear();
        debug!(target: "token_viewer::cache", "clear: removed={}", n);
        n
    }

    pub fn len(&self) -> usize { self.entries.lock().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use polars::prelude::*;
    use std::cell::Cell;

    fn frame(v: i64) -> DataFrame {
        DataFrame::new(vec![Series::new("v".into(), &[v]).into_column()]).unwrap()
    }

    #[test]
    fn second_call_with_same_key_does_not_reload() {
        let cache = ResultCache::new();
        let key = TableKey::new("Token_data.duckdb", "token_status");
        let calls = Cell::new(0);
        let a = cache.get_or_load(&key, || { calls.set(calls.get() + 1); Ok(frame(1)) }).unwrap();
        let b = cache.get_or_load(&key, || { calls.set(calls.get() + 1); Ok(frame(2)) }).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.equals(&frame(1)));
    }

    #[test]
    fn keys_differ_by_store_and_table() {
        let cache = ResultCache::new();
        let calls = Cell::new(0);
        for key in [
            TableKey::new("a.duckdb", "t"),
            TableKey::new("b.duckdb", "t"),
            TableKey::new("a.duckdb", "u"),
        ] {
            cache.get_or_load(&key, || { calls.set(calls.get() + 1); Ok(frame(0)) }).unwrap();
        }
        assert_eq!(calls.get(), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn invalidate_forces_reload() {
        let cache = ResultCache::new();
        let key = TableKey::new("a.duckdb", "t");
        cache.get_or_load(&key, || Ok(frame(1))).unwrap();
        assert!(cache.invalidate(&key));
        assert!(!cache.invalidate(&key));
        let df = cache.get_or_load(&key, || Ok(frame(2))).unwrap();
        assert!(df.equals(&frame(2)));
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = ResultCache::new();
        let key = TableKey::new("missing.duckdb", "t");
        let err = cache
            .get_or_load(&key, || Err(AppError::data_source("store_not_found", "gone")))
            .unwrap_err();
        assert!(err.is_data_source());
        assert!(!cache.contains(&key));
        assert!(cache.get_or_load(&key, || Ok(frame(3))).is_ok());
    }

    #[test]
    fn clear_empties_everything() {
        let cache = ResultCache::new();
        cache.get_or_load(&TableKey::new("a", "t"), || Ok(frame(1))).unwrap();
        cache.get_or_load(&TableKey::new("b", "t"), || Ok(frame(1))).unwrap();
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }
}
