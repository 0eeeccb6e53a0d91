//! Request-scoped query store.
//!
//! Holds fetched values for the duration of one orchestration run. Each run
//! creates its own store; tasks of that run are the only writers and the
//! deduplicated keys guarantee one writer per key.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use hydrate_core::QueryKey;

/// A fetched value waiting to be dehydrated.
#[derive(Debug)]
pub(crate) struct StoredQuery<T> {
    pub key: QueryKey,
    pub data: T,
    pub updated_at: i64,
}

#[derive(Debug)]
pub(crate) struct QueryStore<T> {
    entries: Mutex<HashMap<String, StoredQuery<T>>>,
}

impl<T> QueryStore<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record a fetched value, replacing any earlier value for the key.
    pub fn put(&self, key: QueryKey, data: T) {
        let updated_at = chrono::Utc::now().timestamp_millis();
        self.lock().insert(
            key.hash(),
            StoredQuery {
                key,
                data,
                updated_at,
            },
        );
    }

    /// Move a value out of the store.
    pub fn take(&self, key: &QueryKey) -> Option<StoredQuery<T>> {
        self.lock().remove(&key.hash())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Clear the store when the returned guard goes out of scope.
    pub fn release_on_drop(&self) -> StoreRelease<'_, T> {
        StoreRelease { store: self }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredQuery<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears its store on drop, on every exit path of a run.
pub(crate) struct StoreRelease<'a, T> {
    store: &'a QueryStore<T>,
}

impl<T> Drop for StoreRelease<'_, T> {
    fn drop(&mut self) {
        let remaining = self.store.len();
        self.store.clear();
        tracing::trace!(remaining, "Released request-scoped query store");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_take() {
        let store = QueryStore::new();
        let key = QueryKey::new(["posts"]);
        store.put(key.clone(), 1);
        store.put(key.clone(), 2);

        let stored = store.take(&key).unwrap();
        assert_eq!(stored.data, 2);
        assert_eq!(stored.key, key);
        assert!(store.take(&key).is_none());
    }

    #[test]
    fn test_release_guard_clears() {
        let store = QueryStore::new();
        {
            let _release = store.release_on_drop();
            store.put(QueryKey::new(["a"]), "x");
            store.put(QueryKey::new(["b"]), "y");
            assert_eq!(store.len(), 2);
        }
        assert_eq!(store.len(), 0);
    }
}
