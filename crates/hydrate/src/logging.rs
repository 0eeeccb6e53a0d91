//! Structured logging for hydration runs.

use hydrate_core::format_bytes;

use crate::error::QueryFailure;
use crate::orchestrator::HydrationReport;

/// Emit the one summary record for a finished run.
pub fn log_hydration(report: &HydrationReport) {
    let fallback = report
        .fallback
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();

    tracing::info!(
        target: "hydrate",
        mode = %report.mode,
        queries = report.attempted,
        succeeded = report.succeeded,
        failed = ?report.failed_keys,
        skipped = ?report.skipped_keys,
        excluded = ?report.excluded_keys,
        payload_kb = report.payload_kb.round() as u64,
        csr_fallback = report.csr_fallback(),
        fallback_reason = %fallback,
        "[hydrate] mode={} queries={} payload={}{}",
        report.mode,
        report.attempted,
        format_bytes(report.payload_bytes),
        if report.csr_fallback() { " (CSR fallback)" } else { "" }
    );

    if let Some(reason) = &report.fallback {
        tracing::warn!(
            target: "hydrate",
            mode = %report.mode,
            reason = %reason,
            "Falling back to client-side fetching"
        );
    }
}

/// Record one query whose prefetch failed.
pub fn log_query_failure(failure: &QueryFailure) {
    tracing::warn!(
        target: "hydrate",
        key = %failure.key,
        error = %failure.error,
        "Query prefetch failed"
    );
}
