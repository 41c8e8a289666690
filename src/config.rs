use std::time::Duration;

use crate::limits::*;

/// How a requested literal is checked against a multi-component pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestedValuePolicy {
    /// Decompose the literal component by component (exact widths, range bounds).
    #[default]
    Strict,
    /// Accept anything matching the pattern's overall regex.
    Lenient,
}

impl RequestedValuePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "lenient" => Some(Self::Lenient),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Lifetime of the utilization cache between full resets.
    pub cache_ttl: Duration,
    pub requested_value_policy: RequestedValuePolicy,
    /// Used candidates a random-token pattern may skip before the next pattern is tried.
    pub max_generate_attempts: usize,
    /// Fixed seed for random tokens; entropy when unset.
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            requested_value_policy: RequestedValuePolicy::default(),
            max_generate_attempts: DEFAULT_MAX_GENERATE_ATTEMPTS,
            rng_seed: None,
        }
    }
}

impl Config {
    /// Read `ALLOT_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let cache_ttl = lookup("ALLOT_CACHE_TTL_SECS")
            .and_then(|s| s.parse().ok())
            .map_or(defaults.cache_ttl, Duration::from_secs);
        let requested_value_policy = match lookup("ALLOT_REQUESTED_VALUE_POLICY") {
            Some(raw) => RequestedValuePolicy::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("unknown ALLOT_REQUESTED_VALUE_POLICY {raw:?}, using strict");
                RequestedValuePolicy::Strict
            }),
            None => defaults.requested_value_policy,
        };
        let max_generate_attempts = lookup("ALLOT_MAX_GENERATE_ATTEMPTS")
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.max_generate_attempts);
        let rng_seed = lookup("ALLOT_RNG_SEED").and_then(|s| s.parse().ok());

        Self {
            cache_ttl,
            requested_value_policy,
            max_generate_attempts,
            rng_seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.requested_value_policy, RequestedValuePolicy::Strict);
        assert_eq!(config.max_generate_attempts, DEFAULT_MAX_GENERATE_ATTEMPTS);
        assert_eq!(config.rng_seed, None);
    }

    #[test]
    fn reads_all_variables() {
        let config = Config::from_lookup(lookup_from(&[
            ("ALLOT_CACHE_TTL_SECS", "30"),
            ("ALLOT_REQUESTED_VALUE_POLICY", "Lenient"),
            ("ALLOT_MAX_GENERATE_ATTEMPTS", "12"),
            ("ALLOT_RNG_SEED", "42"),
        ]));
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert_eq!(config.requested_value_policy, RequestedValuePolicy::Lenient);
        assert_eq!(config.max_generate_attempts, 12);
        assert_eq!(config.rng_seed, Some(42));
    }

    #[test]
    fn garbage_falls_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("ALLOT_CACHE_TTL_SECS", "soon"),
            ("ALLOT_REQUESTED_VALUE_POLICY", "whatever"),
            ("ALLOT_MAX_GENERATE_ATTEMPTS", "0"),
        ]));
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.requested_value_policy, RequestedValuePolicy::Strict);
        assert_eq!(config.max_generate_attempts, DEFAULT_MAX_GENERATE_ATTEMPTS);
    }
}
