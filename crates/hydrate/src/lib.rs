//! Server Prefetch & Hydration - Imperative Shell.
//!
//! This crate runs the I/O side of hydration using the pure types from
//! `hydrate_core`. It prefetches a set of queries on the server under a
//! concurrency cap, packs the successful ones into a [`Snapshot`], and hands
//! that snapshot to the client cache so the first render has data.
//!
//! # Architecture
//!
//! - **Functional Core** (`hydrate_core`): Keys, modes, snapshot types, payload limits, config
//! - **Imperative Shell** (this crate): Fetching, the bounded runner, orchestration, client cache
//!
//! # Example
//!
//! ```ignore
//! use hydrate::{compute_hydration, HydrationOptions, QueryDescriptor, RenderMode};
//!
//! let posts = QueryDescriptor::new(["posts"], || async { load_posts().await });
//!
//! let result = compute_hydration(
//!     HydrationOptions::new(vec![posts])
//!         .mode(RenderMode::ServerDynamic)
//!         .max_payload_kb(200),
//! )
//! .await;
//!
//! // `None` means the client fetches on its own.
//! let props = serde_json::json!({ "dehydratedState": result.snapshot });
//! ```

mod client;
mod descriptor;
mod error;
mod fetch;
mod logging;
mod mode;
mod orchestrator;
mod runner;
mod store;

// Re-export core types for convenience
pub use hydrate_core::{
    detect_mode, format_bytes, DehydratedQuery, HydrateCoreError, HydrationConfig, InfiniteData,
    PayloadGuard, PayloadSize, QueryKey, QueryState, QueryStatus, RenderMode, RequestEnvironment,
    Snapshot, DEFAULT_CONCURRENCY, DEFAULT_MAX_PAYLOAD_KB, DEFAULT_REVALIDATE_SECONDS,
    PREFETCH_HEADER, PRODUCTION_BUILD_PHASE, REVALIDATE_HEADER,
};

// Export shell types
pub use client::{
    hydrate_client, with_hydration, HydratableProps, QueryCache, QueryCacheConfig, WithHydration,
};
pub use descriptor::{
    FetchFuture, FetchLoader, FetchPolicy, PagedLoader, Predicate, QueryDescriptor, QueryLoader,
};
pub use error::{BoxError, FetchError, QueryFailure, Result};
pub use fetch::{fetch_json, json_fetch, json_fetch_with};
pub use logging::{log_hydration, log_query_failure};
pub use mode::{
    environment_from_env, resolver_fn, EnvModeResolver, FnResolver, ModeResolver, PHASE_ENV_VAR,
};
pub use orchestrator::{
    compute_hydration, CsrFallback, HydrationOptions, HydrationReport, HydrationResult,
};
pub use runner::{run_with_concurrency, try_run_with_concurrency};
