//! Dehydrated state handed from the server render to the client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::QueryKey;

/// Status of a dehydrated query. Only successful queries are ever dehydrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
}

/// Cached state of one query at dehydration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState<T> {
    pub data: T,
    pub status: QueryStatus,
    /// Milliseconds since the Unix epoch when `data` was fetched.
    pub data_updated_at: i64,
}

/// One query inside a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DehydratedQuery<T> {
    pub query_key: QueryKey,
    pub query_hash: String,
    pub state: QueryState<T>,
}

impl<T> DehydratedQuery<T> {
    pub fn new(query_key: QueryKey, data: T, data_updated_at: i64) -> Self {
        let query_hash = query_key.hash();
        Self {
            query_key,
            query_hash,
            state: QueryState {
                data,
                status: QueryStatus::Success,
                data_updated_at,
            },
        }
    }

    pub fn data(&self) -> &T {
        &self.state.data
    }
}

/// Serializable record of every successfully fetched and included query.
///
/// Entries keep the order in which their descriptors were first seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub queries: Vec<DehydratedQuery<T>>,
}

impl<T> Snapshot<T> {
    pub fn new() -> Self {
        Self {
            queries: Vec::new(),
        }
    }

    /// Add a query, stamped with the current time.
    pub fn push(&mut self, key: QueryKey, data: T) {
        let now = chrono::Utc::now().timestamp_millis();
        self.queries.push(DehydratedQuery::new(key, data, now));
    }

    /// Look up a query's data by key.
    pub fn get(&self, key: &QueryKey) -> Option<&T> {
        let hash = key.hash();
        self.queries
            .iter()
            .find(|q| q.query_hash == hash)
            .map(DehydratedQuery::data)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.queries.iter().map(|q| &q.query_key)
    }
}

impl<T: Serialize> Snapshot<T> {
    /// Convert every entry's data to plain JSON values.
    pub fn to_value_snapshot(&self) -> serde_json::Result<Snapshot<Value>> {
        let queries = self
            .queries
            .iter()
            .map(|q| {
                Ok(DehydratedQuery {
                    query_key: q.query_key.clone(),
                    query_hash: q.query_hash.clone(),
                    state: QueryState {
                        data: serde_json::to_value(&q.state.data)?,
                        status: q.state.status,
                        data_updated_at: q.state.data_updated_at,
                    },
                })
            })
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(Snapshot { queries })
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Pages of a paginated query and the tokens that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfiniteData<P> {
    pub pages: Vec<P>,
    pub page_params: Vec<Value>,
}

impl<P> InfiniteData<P> {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            page_params: Vec::new(),
        }
    }

    pub fn push(&mut self, page: P, param: Value) {
        self.pages.push(page);
        self.page_params.push(param);
    }

    pub fn last_page(&self) -> Option<&P> {
        self.pages.last()
    }
}

impl<P> Default for InfiniteData<P> {
    fn default() -> Self {
        Self::new()
    }
}
