//! Client-side query cache and rehydration.
//!
//! The cache is an explicit object: construct one at application start, pass
//! it to whatever renders hydrated subtrees, and call [`QueryCache::reset`] to
//! tear it down between tests.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hydrate_core::{HydrateCoreError, QueryKey, Snapshot};
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

/// Client cache tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryCacheConfig {
    /// Maximum number of entries before LRU eviction kicks in.
    pub max_entries: usize,
    /// Data older than this is considered stale and worth refetching.
    pub stale_time: Duration,
    /// Entries not written for this long are dropped on access.
    pub gc_time: Duration,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            stale_time: Duration::from_secs(30),
            gc_time: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedQuery {
    data: Value,
    data_updated_at: i64,
    written_at: Instant,
}

impl CachedQuery {
    fn is_collectable(&self, gc_time: Duration) -> bool {
        self.written_at.elapsed() > gc_time
    }
}

/// Client-side cache of query data, keyed by query hash.
#[derive(Debug, Clone)]
pub struct QueryCache {
    store: Arc<RwLock<LruCache<String, CachedQuery>>>,
    config: QueryCacheConfig,
}

impl QueryCache {
    pub fn new(config: QueryCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
            config,
        }
    }

    pub fn config(&self) -> &QueryCacheConfig {
        &self.config
    }

    /// Re-establish cached state from a server snapshot.
    ///
    /// An existing entry is only replaced when the snapshot's data is newer.
    /// Returns how many entries were written.
    pub async fn hydrate<T: Serialize>(
        &self,
        snapshot: &Snapshot<T>,
    ) -> hydrate_core::Result<usize> {
        let mut store = self.store.write().await;
        let mut written = 0;

        for query in &snapshot.queries {
            let incoming = query.state.data_updated_at;
            let newer = match store.peek(&query.query_hash) {
                Some(existing) => incoming > existing.data_updated_at,
                None => true,
            };
            if !newer {
                continue;
            }

            let data = serde_json::to_value(&query.state.data)
                .map_err(|e| HydrateCoreError::Serialization(e.to_string()))?;
            store.put(
                query.query_hash.clone(),
                CachedQuery {
                    data,
                    data_updated_at: incoming,
                    written_at: Instant::now(),
                },
            );
            written += 1;
        }

        Ok(written)
    }

    /// Store freshly fetched data for a key.
    pub async fn set<T: Serialize>(&self, key: &QueryKey, data: &T) -> hydrate_core::Result<()> {
        let data = serde_json::to_value(data)
            .map_err(|e| HydrateCoreError::Serialization(e.to_string()))?;
        let mut store = self.store.write().await;
        store.put(
            key.hash(),
            CachedQuery {
                data,
                data_updated_at: chrono::Utc::now().timestamp_millis(),
                written_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Raw cached data for a key.
    pub async fn get_data(&self, key: &QueryKey) -> Option<Value> {
        let hash = key.hash();
        let mut store = self.store.write().await;

        let collectable = store.get(&hash)?.is_collectable(self.config.gc_time);
        if collectable {
            store.pop(&hash);
            return None;
        }
        store.peek(&hash).map(|entry| entry.data.clone())
    }

    /// Cached data for a key, decoded into `D`.
    pub async fn get<D: DeserializeOwned>(
        &self,
        key: &QueryKey,
    ) -> hydrate_core::Result<Option<D>> {
        match self.get_data(key).await {
            Some(data) => serde_json::from_value(data)
                .map(Some)
                .map_err(|e| HydrateCoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Whether a key has no data or data older than the stale time.
    pub async fn is_stale(&self, key: &QueryKey) -> bool {
        let store = self.store.read().await;
        match store.peek(&key.hash()) {
            Some(entry) => {
                let age_ms = chrono::Utc::now().timestamp_millis() - entry.data_updated_at;
                age_ms > self.config.stale_time.as_millis() as i64
            }
            None => true,
        }
    }

    pub async fn remove(&self, key: &QueryKey) -> bool {
        self.store.write().await.pop(&key.hash()).is_some()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    /// Drop every entry.
    pub async fn reset(&self) {
        self.store.write().await.clear();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(QueryCacheConfig::default())
    }
}

/// Rehydrate `cache` from `snapshot`, then render the subtree.
///
/// With no snapshot this is a passthrough: the subtree renders and fetches on
/// the client. A snapshot that cannot be applied is logged and skipped.
pub async fn hydrate_client<T, R, F>(
    cache: &QueryCache,
    snapshot: Option<&Snapshot<T>>,
    render: F,
) -> R
where
    T: Serialize,
    F: FnOnce() -> R,
{
    if let Some(snapshot) = snapshot {
        match cache.hydrate(snapshot).await {
            Ok(written) => tracing::debug!(target: "hydrate", written, "Rehydrated client cache"),
            Err(e) => {
                tracing::warn!(target: "hydrate", error = %e, "Failed to rehydrate client cache")
            }
        }
    }
    render()
}

/// Component props plus the dehydrated state produced on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydratableProps<P, T> {
    #[serde(flatten)]
    pub props: P,
    #[serde(default)]
    pub dehydrated_state: Option<Snapshot<T>>,
}

impl<P, T> HydratableProps<P, T> {
    pub fn new(props: P, dehydrated_state: Option<Snapshot<T>>) -> Self {
        Self {
            props,
            dehydrated_state,
        }
    }
}

/// A component wrapped so that it rehydrates before rendering.
#[derive(Debug, Clone)]
pub struct WithHydration<C> {
    cache: QueryCache,
    component: C,
}

impl<C> WithHydration<C> {
    /// Rehydrate from the props' dehydrated state, then render with the remaining props.
    pub async fn render<P, T, R>(&self, props: HydratableProps<P, T>) -> R
    where
        C: Fn(P) -> R,
        T: Serialize,
    {
        let HydratableProps {
            props,
            dehydrated_state,
        } = props;
        hydrate_client(&self.cache, dehydrated_state.as_ref(), || {
            (self.component)(props)
        })
        .await
    }
}

/// Wrap `component` so it accepts [`HydratableProps`].
pub fn with_hydration<C>(cache: QueryCache, component: C) -> WithHydration<C> {
    WithHydration { cache, component }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrate_core::DehydratedQuery;
    use serde_json::json;

    fn snapshot_at(key: &str, data: Value, updated_at: i64) -> Snapshot<Value> {
        Snapshot {
            queries: vec![DehydratedQuery::new(QueryKey::new([key]), data, updated_at)],
        }
    }

    #[tokio::test]
    async fn test_hydrate_and_get() {
        let cache = QueryCache::default();
        let written = cache
            .hydrate(&snapshot_at("posts", json!([1, 2]), 1_000))
            .await
            .unwrap();

        assert_eq!(written, 1);
        let posts: Option<Vec<u32>> = cache.get(&QueryKey::new(["posts"])).await.unwrap();
        assert_eq!(posts, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_hydrate_keeps_newer_entry() {
        let cache = QueryCache::default();
        cache
            .hydrate(&snapshot_at("posts", json!("new"), 2_000))
            .await
            .unwrap();
        let written = cache
            .hydrate(&snapshot_at("posts", json!("old"), 1_000))
            .await
            .unwrap();

        assert_eq!(written, 0);
        assert_eq!(
            cache.get_data(&QueryKey::new(["posts"])).await,
            Some(json!("new"))
        );
    }

    #[tokio::test]
    async fn test_hydrate_replaces_older_entry() {
        let cache = QueryCache::default();
        cache
            .hydrate(&snapshot_at("posts", json!("old"), 1_000))
            .await
            .unwrap();
        cache
            .hydrate(&snapshot_at("posts", json!("new"), 2_000))
            .await
            .unwrap();

        assert_eq!(
            cache.get_data(&QueryKey::new(["posts"])).await,
            Some(json!("new"))
        );
    }

    #[tokio::test]
    async fn test_get_wrong_type_is_error() {
        let cache = QueryCache::default();
        cache.set(&QueryKey::new(["n"]), &"text").await.unwrap();
        let result: hydrate_core::Result<Option<u32>> = cache.get(&QueryKey::new(["n"])).await;
        assert!(matches!(result, Err(HydrateCoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_gc_drops_old_entries() {
        let cache = QueryCache::new(QueryCacheConfig {
            gc_time: Duration::from_millis(1),
            ..QueryCacheConfig::default()
        });
        cache.set(&QueryKey::new(["a"]), &1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(cache.get_data(&QueryKey::new(["a"])).await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_staleness() {
        let cache = QueryCache::default();
        let key = QueryKey::new(["posts"]);
        assert!(cache.is_stale(&key).await);

        cache.set(&key, &1).await.unwrap();
        assert!(!cache.is_stale(&key).await);

        cache
            .hydrate(&snapshot_at("old", json!(1), 1_000))
            .await
            .unwrap();
        assert!(cache.is_stale(&QueryKey::new(["old"])).await);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = QueryCache::new(QueryCacheConfig {
            max_entries: 2,
            ..QueryCacheConfig::default()
        });
        for key in ["a", "b", "c"] {
            cache.set(&QueryKey::new([key]), &key).await.unwrap();
        }
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get_data(&QueryKey::new(["a"])).await, None);
    }

    #[tokio::test]
    async fn test_reset_and_remove() {
        let cache = QueryCache::default();
        cache.set(&QueryKey::new(["a"]), &1).await.unwrap();
        cache.set(&QueryKey::new(["b"]), &2).await.unwrap();

        assert!(cache.remove(&QueryKey::new(["a"])).await);
        assert!(!cache.remove(&QueryKey::new(["a"])).await);
        cache.reset().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_hydrate_client_passthrough_without_snapshot() {
        let cache = QueryCache::default();
        let html = hydrate_client::<Value, _, _>(&cache, None, || "<ul></ul>".to_string()).await;

        assert_eq!(html, "<ul></ul>");
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_hydrate_client_fills_cache_before_render() {
        let cache = QueryCache::default();
        let snapshot = snapshot_at("posts", json!(["hello"]), 1_000);
        let key = QueryKey::new(["posts"]);

        let rendered = hydrate_client(&cache, Some(&snapshot), || cache.clone()).await;
        assert_eq!(rendered.get_data(&key).await, Some(json!(["hello"])));
    }

    #[tokio::test]
    async fn test_with_hydration_wrapper() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Props {
            title: String,
        }

        let cache = QueryCache::default();
        let component = with_hydration(cache.clone(), |props: Props| {
            format!("<h1>{}</h1>", props.title)
        });

        let props: HydratableProps<Props, Value> = serde_json::from_value(json!({
            "title": "Posts",
            "dehydratedState": {
                "queries": [{
                    "queryKey": ["posts"],
                    "queryHash": "[\"posts\"]",
                    "state": {"data": [1], "status": "success", "dataUpdatedAt": 5}
                }]
            }
        }))
        .unwrap();

        assert_eq!(component.render(props).await, "<h1>Posts</h1>");
        assert_eq!(
            cache.get_data(&QueryKey::new(["posts"])).await,
            Some(json!([1]))
        );

        let bare = HydratableProps::<_, Value>::new(
            Props {
                title: "Empty".to_string(),
            },
            None,
        );
        assert_eq!(component.render(bare).await, "<h1>Empty</h1>");
    }
}
