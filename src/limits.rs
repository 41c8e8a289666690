use crate::model::Ms;

/// Earliest accepted timestamp (1970-01-01).
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// Latest accepted timestamp (year 2500).
pub const MAX_VALID_TIMESTAMP_MS: Ms = 16_725_225_600_000;
/// Widest allocation interval accepted (100 years).
pub const MAX_SPAN_DURATION_MS: Ms = 100 * 366 * 24 * 3_600_000;

/// Nesting limit for filtered value-spaces.
pub const MAX_FILTER_DEPTH: usize = 16;

/// `{digit:N}` accepts N in this range.
pub const MIN_DIGIT_WIDTH: u32 = 1;
pub const MAX_DIGIT_WIDTH: u32 = 10;

/// `{hash:N}` accepts N up to this length.
pub const MAX_TOKEN_LEN: usize = 64;
pub const DEFAULT_HASH_LEN: usize = 6;
pub const STRING_TOKEN_LEN: usize = 8;

/// Used candidates a random-token pattern may skip before it counts as spent.
pub const DEFAULT_MAX_GENERATE_ATTEMPTS: usize = 10_000;

/// Sub-windows a single per-period utilization query may produce.
pub const MAX_PERIODS_PER_QUERY: usize = 10_000;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;
