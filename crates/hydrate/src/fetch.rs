//! JSON fetch helper for descriptors backed by HTTP endpoints.

use std::sync::Arc;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use crate::descriptor::FetchFuture;
use crate::error::{FetchError, Result};

/// GET `url` and decode the JSON body.
///
/// Non-2xx responses become [`FetchError::Http`].
pub async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder, url: &str) -> Result<T> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| FetchError::Decode(e.to_string()))
}

/// Build a fetch closure for [`QueryDescriptor::new`](crate::QueryDescriptor::new).
///
/// ```no_run
/// use hydrate::{json_fetch, QueryDescriptor};
///
/// let client = reqwest::Client::new();
/// let posts = QueryDescriptor::<Vec<serde_json::Value>>::new(
///     ["posts"],
///     json_fetch(client, "https://api.example.com/posts"),
/// );
/// ```
pub fn json_fetch<T>(
    client: reqwest::Client,
    url: impl Into<String>,
) -> impl Fn() -> FetchFuture<T> + Clone + Send + Sync + 'static
where
    T: DeserializeOwned + Send + 'static,
{
    json_fetch_with(client, url, |request| request)
}

/// Like [`json_fetch`], with a hook to add headers, auth or query parameters.
pub fn json_fetch_with<T, C>(
    client: reqwest::Client,
    url: impl Into<String>,
    configure: C,
) -> impl Fn() -> FetchFuture<T> + Clone + Send + Sync + 'static
where
    T: DeserializeOwned + Send + 'static,
    C: Fn(RequestBuilder) -> RequestBuilder + Send + Sync + 'static,
{
    let url: Arc<str> = Arc::from(url.into());
    let configure = Arc::new(configure);

    move || {
        let request = configure(client.get(url.as_ref()));
        let url = Arc::clone(&url);
        Box::pin(async move { fetch_json(request, &url).await }) as FetchFuture<T>
    }
}
