use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};
use ulid::Ulid;

use crate::config::Config;
use crate::index::IntervalIndex;
use crate::limits::MAX_PERIODS_PER_QUERY;
use crate::model::*;
use crate::observability::*;
use crate::store::UtilizationSource;

use super::{CapacityKey, ResourceCapacity, UtilizationError, UtilizationView, validate_window};

/// Views of every tracked capacity in one sub-window; `None` when idle.
pub type Views = BTreeMap<CapacityKey, Option<Arc<UtilizationView>>>;

#[derive(Default)]
struct CacheState {
    /// Window whose reservations are all loaded.
    covering: Option<Span>,
    indices: HashMap<CapacityKey, IntervalIndex<Ms, UtilizationRecord>>,
    views: HashMap<(Span, CapacityKey), Option<Arc<UtilizationView>>>,
    expires_at: Option<Instant>,
}

impl CacheState {
    fn reset(&mut self) {
        self.covering = None;
        self.indices.clear();
        self.views.clear();
        self.expires_at = None;
    }

    fn view(&mut self, key: CapacityKey, window: Span) -> Option<Arc<UtilizationView>> {
        let indices = &self.indices;
        self.views
            .entry((window, key))
            .or_insert_with(|| {
                indices
                    .get(&key)
                    .and_then(|index| UtilizationView::build(index, window))
                    .map(Arc::new)
            })
            .clone()
    }
}

/// Shared, expiring cache of reservation load for a fixed set of capacities.
///
/// The loaded window only grows. A query sticking out on one side fetches
/// just the missing part; anything else (no overlap, both sides missing,
/// expiry) drops everything and loads the query window afresh.
pub struct UtilizationCache<S> {
    source: Arc<S>,
    capacities: Vec<ResourceCapacity>,
    resources: Vec<Ulid>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl<S: UtilizationSource> UtilizationCache<S> {
    pub fn new(source: Arc<S>, capacities: Vec<ResourceCapacity>, config: &Config) -> Self {
        let mut resources: Vec<Ulid> = capacities.iter().map(|c| c.resource_id).collect();
        resources.sort();
        resources.dedup();
        Self {
            source,
            capacities,
            resources,
            ttl: config.cache_ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn capacities(&self) -> &[ResourceCapacity] {
        &self.capacities
    }

    /// Window currently loaded, if any.
    pub async fn covering(&self) -> Option<Span> {
        self.state.lock().await.covering
    }

    /// Drop everything; the next query loads afresh.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        info!("clearing cached reservations");
        metrics::counter!(CACHE_RESETS_TOTAL).increment(1);
        state.reset();
    }

    /// Drop everything if the TTL has run out.
    pub async fn clear_expired(&self) {
        let mut state = self.state.lock().await;
        self.expire(&mut state);
    }

    /// Per-period views of every tracked capacity over `window`.
    ///
    /// `window` is cut into consecutive sub-windows of `period` ms, the last
    /// one truncated at `window.end`. A capacity idle in a sub-window maps
    /// to `None`.
    pub async fn get_utilization(
        &self,
        window: Span,
        period: Ms,
    ) -> Result<BTreeMap<Span, Views>, UtilizationError> {
        let window = validate_window(window)?;
        if period <= 0 {
            return Err(UtilizationError::InvalidPeriod(period));
        }
        let periods = (window.duration_ms() - 1) / period + 1;
        if periods > MAX_PERIODS_PER_QUERY as Ms {
            return Err(UtilizationError::LimitExceeded("too many periods in window"));
        }

        let mut state = self.state.lock().await;
        self.expire(&mut state);
        self.load(&mut state, window).await?;

        let mut out = BTreeMap::new();
        let mut start = window.start;
        while start < window.end {
            let sub = Span::new(start, start.saturating_add(period).min(window.end));
            let views: Views = self
                .capacities
                .iter()
                .map(|c| (c.key(), state.view(c.key(), sub)))
                .collect();
            out.insert(sub, views);
            start = sub.end;
        }
        Ok(out)
    }

    /// View of a single capacity over `window`.
    ///
    /// Served from cache when `window` is already loaded; otherwise only
    /// this resource is fetched, and the cached state is left alone.
    pub async fn get_resource_utilization(
        &self,
        key: CapacityKey,
        window: Span,
    ) -> Result<Option<Arc<UtilizationView>>, UtilizationError> {
        let window = validate_window(window)?;
        {
            let mut state = self.state.lock().await;
            self.expire(&mut state);
            if state.covering.is_some_and(|c| c.contains_span(&window)) {
                metrics::counter!(CACHE_HITS_TOTAL).increment(1);
                return Ok(state.view(key, window));
            }
        }

        metrics::counter!(CACHE_FETCHES_TOTAL, "mode" => FETCH_TRANSIENT).increment(1);
        let records = self
            .source
            .fetch_reservations(&[key.resource_id], window)
            .await?;
        let mut index = IntervalIndex::new();
        for record in records {
            if CapacityKey::of(&record) != key || record.span.start >= record.span.end {
                continue;
            }
            let span = record.span;
            index.insert(record, span.start, span.end);
        }
        Ok(UtilizationView::build(&index, window).map(Arc::new))
    }

    fn expire(&self, state: &mut CacheState) {
        if state.expires_at.is_some_and(|t| Instant::now() >= t) {
            info!("clearing cached reservations");
            metrics::counter!(CACHE_RESETS_TOTAL).increment(1);
            state.reset();
        }
    }

    /// Make sure `window` is loaded, fetching as little as possible.
    async fn load(&self, state: &mut CacheState, window: Span) -> Result<(), UtilizationError> {
        let (fetch, covering, mode) = match state.covering {
            Some(c) if c.contains_span(&window) => {
                metrics::counter!(CACHE_HITS_TOTAL).increment(1);
                return Ok(());
            }
            Some(c) if window.start < c.start && c.start < window.end && window.end <= c.end => (
                Span::new(window.start, c.start),
                Span::new(window.start, c.end),
                FETCH_EXTEND_START,
            ),
            Some(c) if c.start <= window.start && window.start < c.end && c.end < window.end => (
                Span::new(c.end, window.end),
                Span::new(c.start, window.end),
                FETCH_EXTEND_END,
            ),
            _ => (window, window, FETCH_FULL),
        };

        info!(start = fetch.start, end = fetch.end, mode, "fetching reservations");
        metrics::counter!(CACHE_FETCHES_TOTAL, "mode" => mode).increment(1);
        let records = self.source.fetch_reservations(&self.resources, fetch).await?;

        if mode == FETCH_FULL {
            if state.covering.is_some() {
                info!("clearing cached reservations");
                metrics::counter!(CACHE_RESETS_TOTAL).increment(1);
            }
            state.reset();
            state.expires_at = Some(Instant::now() + self.ttl);
            for capacity in &self.capacities {
                state.indices.entry(capacity.key()).or_default();
            }
        }

        for record in records {
            let key = CapacityKey::of(&record);
            let Some(index) = state.indices.get_mut(&key) else {
                debug!(id = %record.id, resource = %record.resource_id, "skipping untracked reservation");
                continue;
            };
            let span = record.span;
            if span.start >= span.end {
                continue;
            }
            // Extension fetches may return records already loaded.
            index.insert(record, span.start, span.end);
        }
        state.covering = Some(covering);
        Ok(())
    }
}
