//! The hydration orchestrator.
//!
//! A run goes `Idle -> ModeResolved -> {ShortCircuited | Fetching} ->
//! Assembling -> SizeChecked -> Done` and always ends with a
//! [`HydrationResult`]. Fetch, predicate and serialization failures degrade to
//! a smaller or absent snapshot; none of them is returned as an error.

use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use hydrate_core::{
    DehydratedQuery, HydrationConfig, PayloadGuard, PayloadSize, RenderMode, Snapshot,
};
use serde::Serialize;

use crate::descriptor::{FetchPolicy, QueryDescriptor};
use crate::error::{FetchError, QueryFailure};
use crate::logging;
use crate::mode::{EnvModeResolver, ModeResolver};
use crate::runner::run_with_concurrency;
use crate::store::QueryStore;

/// Inputs for one orchestration run.
pub struct HydrationOptions<T> {
    queries: Vec<QueryDescriptor<T>>,
    mode_override: Option<RenderMode>,
    revalidate_seconds: Option<u64>,
    config: HydrationConfig,
    resolver: Arc<dyn ModeResolver>,
}

impl<T> HydrationOptions<T> {
    /// Options with configuration from the environment and the environment resolver.
    pub fn new(queries: Vec<QueryDescriptor<T>>) -> Self {
        Self {
            queries,
            mode_override: None,
            revalidate_seconds: None,
            config: HydrationConfig::from_env(),
            resolver: Arc::new(EnvModeResolver),
        }
    }

    /// Add one more query.
    pub fn query(mut self, descriptor: QueryDescriptor<T>) -> Self {
        self.queries.push(descriptor);
        self
    }

    /// Skip the resolver and use this mode.
    pub fn mode(mut self, mode: RenderMode) -> Self {
        self.mode_override = Some(mode);
        self
    }

    /// Revalidate hint, honored in periodic-regeneration mode only.
    pub fn revalidate(mut self, seconds: u64) -> Self {
        self.revalidate_seconds = Some(seconds);
        self
    }

    pub fn config(mut self, config: HydrationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn max_payload_kb(mut self, max_payload_kb: u64) -> Self {
        self.config.max_payload_kb = max_payload_kb;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = Some(timeout);
        self
    }

    pub fn resolver(mut self, resolver: impl ModeResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }
}

impl<T> fmt::Debug for HydrationOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HydrationOptions")
            .field("queries", &self.queries)
            .field("mode_override", &self.mode_override)
            .field("revalidate_seconds", &self.revalidate_seconds)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Why the client has to fetch on its own instead of using a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CsrFallback {
    /// The page renders in the browser.
    ClientOnlyMode,
    /// No descriptor opted in to hydration.
    NoHydratableQueries,
    /// Every query failed or was excluded by its predicate.
    NoIncludedQueries,
    /// The serialized snapshot is over the ceiling.
    PayloadTooLarge { payload_kb: f64, max_kb: u64 },
    /// The snapshot could not be serialized.
    SerializationFailed { message: String },
}

impl fmt::Display for CsrFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientOnlyMode => f.write_str("client-only mode"),
            Self::NoHydratableQueries => f.write_str("no queries opted in to hydration"),
            Self::NoIncludedQueries => f.write_str("no queries to hydrate"),
            Self::PayloadTooLarge { payload_kb, max_kb } => write!(
                f,
                "payload exceeds limit ({}KB > {max_kb}KB)",
                payload_kb.round()
            ),
            Self::SerializationFailed { message } => {
                write!(f, "snapshot serialization failed: {message}")
            }
        }
    }
}

/// What happened during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HydrationReport {
    pub mode: RenderMode,
    /// Distinct queries whose fetch was attempted.
    pub attempted: usize,
    /// Queries whose fetch succeeded.
    pub succeeded: usize,
    /// Keys whose fetch failed.
    pub failed_keys: Vec<String>,
    /// Keys opted out of hydration or dropped as duplicates.
    pub skipped_keys: Vec<String>,
    /// Keys fetched successfully but rejected by their predicate.
    pub excluded_keys: Vec<String>,
    pub payload_bytes: usize,
    pub payload_kb: f64,
    pub fallback: Option<CsrFallback>,
}

impl HydrationReport {
    fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            attempted: 0,
            succeeded: 0,
            failed_keys: Vec::new(),
            skipped_keys: Vec::new(),
            excluded_keys: Vec::new(),
            payload_bytes: 0,
            payload_kb: 0.0,
            fallback: None,
        }
    }

    pub fn csr_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Output of [`compute_hydration`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationResult<T> {
    /// Dehydrated state for the client, or `None` for a CSR fallback.
    pub snapshot: Option<Snapshot<T>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revalidate_seconds: Option<u64>,
    #[serde(skip)]
    pub report: HydrationReport,
}

impl<T> HydrationResult<T> {
    pub fn is_csr_fallback(&self) -> bool {
        self.snapshot.is_none()
    }
}

/// Explicit per-task outcome; the assembly step filters on it.
type QueryOutcome = Result<(), QueryFailure>;

/// Prefetch the given queries on the server and build the client snapshot.
///
/// Queries run through the bounded runner; every failure stays local to its
/// query. The snapshot is dropped (CSR fallback) when it would be empty, when
/// it cannot be serialized, or when it is larger than the configured ceiling.
pub async fn compute_hydration<T>(options: HydrationOptions<T>) -> HydrationResult<T>
where
    T: Serialize + Send + 'static,
{
    let HydrationOptions {
        queries,
        mode_override,
        revalidate_seconds,
        config,
        resolver,
    } = options;

    let mode = mode_override.unwrap_or_else(|| resolver.resolve());
    let mut report = HydrationReport::new(mode);

    let short_circuit = if !mode.prefetches() {
        Some(CsrFallback::ClientOnlyMode)
    } else if !queries.iter().any(QueryDescriptor::include_in_hydration) {
        Some(CsrFallback::NoHydratableQueries)
    } else {
        None
    };

    if let Some(reason) = short_circuit {
        tracing::debug!(target: "hydrate", %mode, %reason, "Skipping server prefetch");
        report.fallback = Some(reason);
        return HydrationResult {
            snapshot: None,
            revalidate_seconds,
            report,
        };
    }

    let unique = dedupe(queries, &mut report.skipped_keys);
    report.attempted = unique.len();

    let store = QueryStore::new();
    let _release = store.release_on_drop();
    let policy = FetchPolicy::new(config.fetch_timeout);

    let tasks: Vec<_> = unique
        .iter()
        .map(|descriptor| {
            let store = &store;
            move || prefetch(descriptor, store, policy)
        })
        .collect();

    let outcomes = run_with_concurrency(tasks, config.effective_concurrency()).await;

    let mut snapshot = Snapshot::new();
    for (descriptor, outcome) in unique.iter().zip(outcomes) {
        if let Err(failure) = outcome {
            if config.verbose {
                logging::log_query_failure(&failure);
            }
            report.failed_keys.push(failure.key.hash());
            continue;
        }
        report.succeeded += 1;

        let Some(stored) = store.take(descriptor.key()) else {
            continue;
        };

        if should_include(descriptor, &stored.data) {
            snapshot.queries.push(DehydratedQuery::new(
                stored.key,
                stored.data,
                stored.updated_at,
            ));
        } else {
            report.excluded_keys.push(stored.key.hash());
        }
    }

    let guard = PayloadGuard::new(config.max_payload_kb);
    let snapshot = match PayloadSize::measure(&snapshot) {
        Ok(size) => {
            report.payload_bytes = size.bytes;
            report.payload_kb = size.kb();

            if snapshot.is_empty() {
                report.fallback = Some(CsrFallback::NoIncludedQueries);
                None
            } else if guard.exceeds(size) {
                report.fallback = Some(CsrFallback::PayloadTooLarge {
                    payload_kb: size.kb(),
                    max_kb: guard.max_kb,
                });
                None
            } else {
                Some(snapshot)
            }
        }
        Err(e) => {
            report.fallback = Some(CsrFallback::SerializationFailed {
                message: e.to_string(),
            });
            None
        }
    };

    if config.verbose {
        logging::log_hydration(&report);
    }

    HydrationResult {
        snapshot,
        revalidate_seconds: (mode == RenderMode::PeriodicRegeneration)
            .then(|| revalidate_seconds.unwrap_or(config.default_revalidate_seconds)),
        report,
    }
}

/// Drop opted-out descriptors and later duplicates, keeping first-seen order.
fn dedupe<T>(
    queries: Vec<QueryDescriptor<T>>,
    skipped: &mut Vec<String>,
) -> Vec<QueryDescriptor<T>> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(queries.len());

    for descriptor in queries {
        let hash = descriptor.key().hash();
        if !descriptor.include_in_hydration() {
            skipped.push(hash);
        } else if seen.insert(hash.clone()) {
            unique.push(descriptor);
        } else {
            tracing::debug!(target: "hydrate", key = %hash, "Skipping duplicate query");
            skipped.push(hash);
        }
    }

    unique
}

/// Load one descriptor into the store. Panics inside the loader count as failures.
async fn prefetch<T>(
    descriptor: &QueryDescriptor<T>,
    store: &QueryStore<T>,
    policy: FetchPolicy,
) -> QueryOutcome
where
    T: Send + 'static,
{
    let loader = descriptor.loader();
    let loaded = AssertUnwindSafe(loader.load(descriptor.page_count(), policy))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(FetchError::Panicked(panic_message(panic.as_ref()))));

    match loaded {
        Ok(data) => {
            store.put(descriptor.key().clone(), data);
            Ok(())
        }
        Err(error) => Err(QueryFailure::new(descriptor.key().clone(), error)),
    }
}

/// Apply the descriptor's predicate; a panicking predicate excludes the value.
fn should_include<T>(descriptor: &QueryDescriptor<T>, data: &T) -> bool {
    match descriptor.predicate() {
        Some(predicate) => catch_unwind(AssertUnwindSafe(|| predicate(data))).unwrap_or(false),
        None => true,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_keeps_first_and_records_skips() {
        let first = QueryDescriptor::new(["a"], || async { Ok(1) });
        let duplicate = QueryDescriptor::new(["a"], || async { Ok(2) }).pages(5);
        let opted_out = QueryDescriptor::new(["b"], || async { Ok(3) }).hydrate(false);
        let other = QueryDescriptor::new(["c"], || async { Ok(4) });

        let mut skipped = Vec::new();
        let unique = dedupe(vec![first, duplicate, opted_out, other], &mut skipped);

        let keys: Vec<String> = unique.iter().map(|d| d.key().hash()).collect();
        assert_eq!(keys, vec![r#"["a"]"#, r#"["c"]"#]);
        assert_eq!(unique[0].page_count(), 1);
        assert_eq!(skipped, vec![r#"["a"]"#, r#"["b"]"#]);
    }

    #[test]
    fn test_panicking_predicate_excludes() {
        let descriptor = QueryDescriptor::new(["a"], || async { Ok(1) })
            .should_include(|_: &i32| panic!("predicate blew up"));
        assert!(!should_include(&descriptor, &1));
    }

    #[test]
    fn test_predicate_result_used() {
        let descriptor =
            QueryDescriptor::new(["a"], || async { Ok(1) }).should_include(|v: &i32| *v > 0);
        assert!(should_include(&descriptor, &1));
        assert!(!should_include(&descriptor, &-1));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");
    }

    #[test]
    fn test_fallback_display() {
        let reason = CsrFallback::PayloadTooLarge {
            payload_kb: 250.4,
            max_kb: 200,
        };
        assert_eq!(reason.to_string(), "payload exceeds limit (250KB > 200KB)");
        assert_eq!(
            CsrFallback::NoIncludedQueries.to_string(),
            "no queries to hydrate"
        );
    }
}
