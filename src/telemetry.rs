//! Telemetry metric name constants.
//!
//! Centralised metric names for vizgen operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `vizgen_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider name (e.g. "openrouter")
//! - `format`: requested output format, "svg" or "html"
//! - `status`: outcome, "ok" or the error kind (see [`VizgenError::kind`](crate::VizgenError::kind))
//! - `storage`: cache storage, "memory" or "persistent"

/// Total upstream completion attempts (every retry counts).
///
/// Labels: `provider`, `format`, `status`.
pub const REQUESTS_TOTAL: &str = "vizgen_requests_total";

/// Upstream attempt duration in seconds.
///
/// Labels: `provider`, `format`.
pub const REQUEST_DURATION_SECONDS: &str = "vizgen_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`.
pub const RETRIES_TOTAL: &str = "vizgen_retries_total";

/// Total cache hits.
///
/// Labels: `storage`.
pub const CACHE_HITS_TOTAL: &str = "vizgen_cache_hits_total";

/// Total cache misses.
///
/// Labels: `storage`.
pub const CACHE_MISSES_TOTAL: &str = "vizgen_cache_misses_total";

/// Total entries evicted from the memory backend because it was full.
pub const CACHE_EVICTIONS_TOTAL: &str = "vizgen_cache_evictions_total";

/// Total requests that joined an identical in-flight request instead of
/// issuing their own upstream call.
pub const COALESCED_TOTAL: &str = "vizgen_coalesced_requests_total";

/// Total responses where no fenced code block was found and the full text
/// was returned.
///
/// Labels: `format`.
pub const EXTRACTION_FALLBACK_TOTAL: &str = "vizgen_extraction_fallback_total";
