//! Collaborator contracts consumed by the allocation core, and an in-memory
//! implementation of all of them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;
use crate::value::{AllocationDecision, SecurityToken};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The capability hosting a value-space cannot serve the interval.
    Unavailable { capability: Ulid, reason: String },
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable { capability, reason } => {
                write!(f, "capability {capability} unavailable: {reason}")
            }
            StoreError::Backend(e) => write!(f, "backend error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Raw allocation tuples of a value-space.
#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// Every allocation of `value_space` overlapping `span`, no more, no fewer.
    async fn fetch_allocations(
        &self,
        value_space: Ulid,
        span: Span,
    ) -> Result<Vec<AllocationRecord>, StoreError>;
}

#[async_trait]
pub trait CapabilityChecker: Send + Sync {
    async fn check_available(
        &self,
        capability: Ulid,
        span: Span,
        token: &SecurityToken,
    ) -> Result<(), StoreError>;
}

/// Committed reservations on capacity-limited resources.
#[async_trait]
pub trait UtilizationSource: Send + Sync {
    async fn fetch_reservations(
        &self,
        resources: &[Ulid],
        span: Span,
    ) -> Result<Vec<UtilizationRecord>, StoreError>;
}

/// DashMap-backed store. Every fetch window is logged for inspection.
pub struct InMemoryStore {
    allocations: DashMap<Ulid, Vec<AllocationRecord>>,
    reservations: DashMap<Ulid, Vec<UtilizationRecord>>,
    blackouts: DashMap<Ulid, Vec<(Span, String)>>,
    offline: AtomicBool,
    allocation_fetches: Mutex<Vec<Span>>,
    reservation_fetches: Mutex<Vec<Span>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            allocations: DashMap::new(),
            reservations: DashMap::new(),
            blackouts: DashMap::new(),
            offline: AtomicBool::new(false),
            allocation_fetches: Mutex::new(Vec::new()),
            reservation_fetches: Mutex::new(Vec::new()),
        }
    }

    // ── Allocations ──────────────────────────────────────────

    pub fn insert_allocation(&self, value_space: Ulid, record: AllocationRecord) {
        self.allocations.entry(value_space).or_default().push(record);
    }

    pub fn allocation_count(&self, value_space: &Ulid) -> usize {
        self.allocations.get(value_space).map_or(0, |v| v.len())
    }

    /// Persist a decision. New values get a fresh id; reuse returns the
    /// original allocation's id.
    pub fn commit(&self, decision: &AllocationDecision) -> Ulid {
        match decision {
            AllocationDecision::NewValue {
                value_space,
                value,
                slot,
                ..
            } => {
                let id = Ulid::new();
                self.insert_allocation(
                    *value_space,
                    AllocationRecord {
                        id,
                        value: value.clone(),
                        span: *slot,
                    },
                );
                id
            }
            AllocationDecision::Reuse { original, .. } => original.id,
        }
    }

    // ── Reservations ─────────────────────────────────────────

    pub fn insert_reservation(&self, record: UtilizationRecord) {
        self.reservations.entry(record.resource_id).or_default().push(record);
    }

    // ── Capabilities ─────────────────────────────────────────

    /// Make `capability` unavailable over `span`.
    pub fn block_capability(&self, capability: Ulid, span: Span, reason: impl Into<String>) {
        self.blackouts
            .entry(capability)
            .or_default()
            .push((span, reason.into()));
    }

    /// Fail every fetch with a backend error while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    // ── Fetch log ────────────────────────────────────────────

    pub fn allocation_fetches(&self) -> Vec<Span> {
        self.allocation_fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reservation_fetches(&self) -> Vec<Span> {
        self.reservation_fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reset_fetch_log(&self) {
        self.allocation_fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.reservation_fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AllocationStore for InMemoryStore {
    async fn fetch_allocations(
        &self,
        value_space: Ulid,
        span: Span,
    ) -> Result<Vec<AllocationRecord>, StoreError> {
        self.check_online()?;
        self.allocation_fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span);
        Ok(self
            .allocations
            .get(&value_space)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.span.overlaps(&span))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl CapabilityChecker for InMemoryStore {
    async fn check_available(
        &self,
        capability: Ulid,
        span: Span,
        _token: &SecurityToken,
    ) -> Result<(), StoreError> {
        let Some(blackouts) = self.blackouts.get(&capability) else {
            return Ok(());
        };
        match blackouts.iter().find(|(s, _)| s.overlaps(&span)) {
            Some((_, reason)) => Err(StoreError::Unavailable {
                capability,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UtilizationSource for InMemoryStore {
    async fn fetch_reservations(
        &self,
        resources: &[Ulid],
        span: Span,
    ) -> Result<Vec<UtilizationRecord>, StoreError> {
        self.check_online()?;
        self.reservation_fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span);
        let mut out = Vec::new();
        for resource in resources {
            if let Some(records) = self.reservations.get(resource) {
                out.extend(records.iter().filter(|r| r.span.overlaps(&span)).cloned());
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: &str, start: Ms, end: Ms) -> AllocationRecord {
        AllocationRecord {
            id: Ulid::new(),
            value: value.into(),
            span: Span::new(start, end),
        }
    }

    #[tokio::test]
    async fn fetch_returns_overlapping_only() {
        let store = InMemoryStore::new();
        let space = Ulid::new();
        store.insert_allocation(space, record("a", 0, 10));
        store.insert_allocation(space, record("b", 10, 20));
        store.insert_allocation(space, record("c", 30, 40));

        let got = store.fetch_allocations(space, Span::new(5, 30)).await.unwrap();
        let values: Vec<&str> = got.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["a", "b"]);
        assert_eq!(store.allocation_fetches(), vec![Span::new(5, 30)]);
    }

    #[tokio::test]
    async fn blackout_makes_capability_unavailable() {
        let store = InMemoryStore::new();
        let cap = Ulid::new();
        let token = SecurityToken::new("t");
        store.block_capability(cap, Span::new(100, 200), "maintenance");

        assert!(store.check_available(cap, Span::new(0, 100), &token).await.is_ok());
        let err = store
            .check_available(cap, Span::new(150, 160), &token)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Unavailable {
                capability: cap,
                reason: "maintenance".into()
            }
        );
    }

    #[tokio::test]
    async fn offline_store_fails_fetches() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        let err = store
            .fetch_reservations(&[Ulid::new()], Span::new(0, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(store.reservation_fetches().is_empty());
    }

    #[tokio::test]
    async fn reservations_filtered_by_resource() {
        let store = InMemoryStore::new();
        let (r1, r2) = (Ulid::new(), Ulid::new());
        for resource_id in [r1, r2] {
            store.insert_reservation(UtilizationRecord {
                id: Ulid::new(),
                resource_id,
                kind: ReservationKind::RecordingService,
                span: Span::new(0, 10),
            });
        }
        let got = store.fetch_reservations(&[r1], Span::new(0, 10)).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].resource_id, r1);
    }
}
