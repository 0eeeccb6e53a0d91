//! Pure hydration logic - no I/O, no async, no side effects.
//!
//! This crate provides:
//! - Query keys and their canonical hash
//! - Render modes and the default mode heuristic
//! - Snapshot (dehydrated state) types
//! - Payload measurement and the size ceiling
//! - Run configuration
//!
//! # Example
//!
//! ```
//! use hydrate_core::{PayloadGuard, PayloadSize, QueryKey, Snapshot};
//!
//! let mut snapshot = Snapshot::new();
//! snapshot.push(QueryKey::new(["posts"]), vec!["hello", "world"]);
//!
//! let size = PayloadSize::measure(&snapshot).unwrap();
//! assert!(!PayloadGuard::new(200).exceeds(size));
//! ```

mod config;
mod error;
mod key;
mod mode;
mod payload;
mod snapshot;

pub use config::{HydrationConfig, DEFAULT_CONCURRENCY, DEFAULT_REVALIDATE_SECONDS};
pub use error::{HydrateCoreError, Result};
pub use key::QueryKey;
pub use mode::{
    detect_mode, RenderMode, RequestEnvironment, PREFETCH_HEADER, PRODUCTION_BUILD_PHASE,
    REVALIDATE_HEADER,
};
pub use payload::{format_bytes, PayloadGuard, PayloadSize, DEFAULT_MAX_PAYLOAD_KB};
pub use snapshot::{DehydratedQuery, InfiniteData, QueryState, QueryStatus, Snapshot};
