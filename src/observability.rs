// ── Allocation metrics ──────────────────────────────────────────

/// Counter: allocation requests decided. Labels: outcome.
pub const ALLOCATIONS_TOTAL: &str = "allot_allocations_total";

/// Histogram: allocation latency in seconds, collaborator calls included.
pub const ALLOCATION_DURATION_SECONDS: &str = "allot_allocation_duration_seconds";

// ── Utilization cache metrics ───────────────────────────────────

/// Counter: storage fetches issued by the cache. Labels: mode.
pub const CACHE_FETCHES_TOTAL: &str = "allot_cache_fetches_total";

/// Counter: queries answered without any fetch.
pub const CACHE_HITS_TOTAL: &str = "allot_cache_hits_total";

/// Counter: wholesale cache resets (expiry, disjoint window, explicit clear).
pub const CACHE_RESETS_TOTAL: &str = "allot_cache_resets_total";

// ── Label values ────────────────────────────────────────────────

pub const OUTCOME_NEW_VALUE: &str = "new_value";
pub const OUTCOME_REUSE: &str = "reuse";
pub const OUTCOME_INVALID: &str = "invalid";
pub const OUTCOME_ALREADY_ALLOCATED: &str = "already_allocated";
pub const OUTCOME_EXHAUSTED: &str = "exhausted";
pub const OUTCOME_UNAVAILABLE: &str = "unavailable";
pub const OUTCOME_ERROR: &str = "error";

pub const FETCH_FULL: &str = "full";
pub const FETCH_EXTEND_START: &str = "extend_start";
pub const FETCH_EXTEND_END: &str = "extend_end";
pub const FETCH_TRANSIENT: &str = "transient";
