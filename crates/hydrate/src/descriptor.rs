//! Query descriptors: what to fetch on the server and how.
//!
//! A descriptor pairs a [`QueryKey`] with a [`QueryLoader`]. Two loaders ship
//! with the crate:
//!
//! - [`FetchLoader`] invokes a zero-argument fetch `page_count` times in
//!   sequence and keeps the last value. Any page token handling lives inside
//!   the caller's closure.
//! - [`PagedLoader`] threads page tokens itself: the first page is fetched with
//!   the initial token, each following token comes from `next_page_token`, and
//!   loading stops after `page_count` pages or when no next token exists.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use hydrate_core::{InfiniteData, QueryKey};
use serde_json::Value;

use crate::error::{FetchError, Result};

/// Boxed future returned by fetch closures.
pub type FetchFuture<T> = BoxFuture<'static, Result<T>>;

/// Inclusion predicate over a fetched value.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

type FetchFn<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;
type PageFetchFn<P> = Arc<dyn Fn(Value) -> FetchFuture<P> + Send + Sync>;
type NextTokenFn<P> = Arc<dyn Fn(&P, &[P]) -> Option<Value> + Send + Sync>;

/// Per-invocation limits applied to every fetch a loader makes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchPolicy {
    pub timeout: Option<Duration>,
}

impl FetchPolicy {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Await one fetch invocation, bounded by the timeout if there is one.
    pub async fn call<T>(&self, fetch: FetchFuture<T>) -> Result<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| FetchError::Timeout(limit.as_millis() as u64))?,
            None => fetch.await,
        }
    }
}

/// Loads the value for one descriptor.
#[async_trait]
pub trait QueryLoader<T>: Send + Sync {
    /// Load the value, fetching `pages` pages strictly in order.
    ///
    /// `pages` is always at least 1.
    async fn load(&self, pages: usize, policy: FetchPolicy) -> Result<T>;
}

/// Repeats a zero-argument fetch and keeps the last value.
pub struct FetchLoader<T> {
    fetch: FetchFn<T>,
}

impl<T: 'static> FetchLoader<T> {
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            fetch: Arc::new(move || Box::pin(fetch()) as FetchFuture<T>),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> QueryLoader<T> for FetchLoader<T> {
    async fn load(&self, pages: usize, policy: FetchPolicy) -> Result<T> {
        let mut last = None;
        for _ in 0..pages.max(1) {
            last = Some(policy.call((self.fetch)()).await?);
        }
        last.ok_or_else(|| FetchError::msg("no page was fetched"))
    }
}

/// Fetches pages by token, threading each next token from the pages so far.
pub struct PagedLoader<P> {
    fetch_page: PageFetchFn<P>,
    initial_page_token: Value,
    next_page_token: NextTokenFn<P>,
}

impl<P: 'static> PagedLoader<P> {
    pub fn new<F, Fut, N>(fetch_page: F, initial_page_token: Value, next_page_token: N) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<P>> + Send + 'static,
        N: Fn(&P, &[P]) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            fetch_page: Arc::new(move |token| Box::pin(fetch_page(token)) as FetchFuture<P>),
            initial_page_token,
            next_page_token: Arc::new(next_page_token),
        }
    }
}

#[async_trait]
impl<P: Send + 'static> QueryLoader<InfiniteData<P>> for PagedLoader<P> {
    async fn load(&self, pages: usize, policy: FetchPolicy) -> Result<InfiniteData<P>> {
        let wanted = pages.max(1);
        let mut data = InfiniteData::new();
        let mut token = Some(self.initial_page_token.clone());

        while data.pages.len() < wanted {
            let Some(current) = token.take() else {
                break;
            };

            let page = policy.call((self.fetch_page)(current.clone())).await?;
            data.push(page, current);

            if data.pages.len() < wanted {
                token = data
                    .last_page()
                    .and_then(|last| (self.next_page_token)(last, &data.pages));
            }
        }

        Ok(data)
    }
}

/// One unit of server-side data fetching.
pub struct QueryDescriptor<T> {
    key: QueryKey,
    loader: Arc<dyn QueryLoader<T>>,
    include_in_hydration: bool,
    page_count: usize,
    should_include: Option<Predicate<T>>,
}

impl<T: Send + 'static> QueryDescriptor<T> {
    /// Describe a query fetched by a zero-argument async closure.
    ///
    /// ```
    /// use hydrate::{FetchError, QueryDescriptor};
    ///
    /// let posts = QueryDescriptor::new(["posts"], || async {
    ///     Ok::<_, FetchError>(vec!["first post".to_string()])
    /// });
    /// assert_eq!(posts.key().hash(), r#"["posts"]"#);
    /// ```
    pub fn new<K, F, Fut>(key: K, fetch: F) -> Self
    where
        K: Into<QueryKey>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::with_loader(key, FetchLoader::new(fetch))
    }

    /// Describe a query backed by a custom loader.
    pub fn with_loader<K, L>(key: K, loader: L) -> Self
    where
        K: Into<QueryKey>,
        L: QueryLoader<T> + 'static,
    {
        Self {
            key: key.into(),
            loader: Arc::new(loader),
            include_in_hydration: true,
            page_count: 1,
            should_include: None,
        }
    }

    /// Opt this query in or out of server-side prefetching.
    pub fn hydrate(mut self, include: bool) -> Self {
        self.include_in_hydration = include;
        self
    }

    /// Number of pages to fetch; `0` behaves as `1`.
    pub fn pages(mut self, page_count: usize) -> Self {
        self.page_count = page_count;
        self
    }

    /// Only place the fetched value in the snapshot when `predicate` accepts it.
    pub fn should_include<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.should_include = Some(Arc::new(predicate));
        self
    }
}

impl<P: Send + 'static> QueryDescriptor<InfiniteData<P>> {
    /// Describe a paginated query whose page tokens are threaded by the loader.
    pub fn paginated<K, F, Fut, N>(
        key: K,
        fetch_page: F,
        initial_page_token: impl Into<Value>,
        next_page_token: N,
    ) -> Self
    where
        K: Into<QueryKey>,
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<P>> + Send + 'static,
        N: Fn(&P, &[P]) -> Option<Value> + Send + Sync + 'static,
    {
        Self::with_loader(
            key,
            PagedLoader::new(fetch_page, initial_page_token.into(), next_page_token),
        )
    }
}

impl<T> QueryDescriptor<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn include_in_hydration(&self) -> bool {
        self.include_in_hydration
    }

    /// Pages to fetch after clamping to at least one.
    pub fn page_count(&self) -> usize {
        self.page_count.max(1)
    }

    pub(crate) fn loader(&self) -> Arc<dyn QueryLoader<T>> {
        Arc::clone(&self.loader)
    }

    pub(crate) fn predicate(&self) -> Option<&Predicate<T>> {
        self.should_include.as_ref()
    }
}

impl<T> Clone for QueryDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            loader: Arc::clone(&self.loader),
            include_in_hydration: self.include_in_hydration,
            page_count: self.page_count,
            should_include: self.should_include.clone(),
        }
    }
}

impl<T> fmt::Debug for QueryDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDescriptor")
            .field("key", &self.key.hash())
            .field("include_in_hydration", &self.include_in_hydration)
            .field("page_count", &self.page_count)
            .field("should_include", &self.should_include.is_some())
            .finish()
    }
}
