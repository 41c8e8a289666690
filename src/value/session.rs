use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::{AllocationRecord, Span};

/// Caller identity handed through to capability checks; never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityToken(String);

impl SecurityToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailableKind {
    /// Existing allocation that may simply be referenced again.
    Reusable,
    /// Existing allocation being replaced; its value may move to the new slot.
    Reallocatable,
}

/// Prior allocation discovered by the session and not yet consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableAllocation {
    pub original: AllocationRecord,
    /// Target value-space the original was allocated from.
    pub value_space: Ulid,
    pub kind: AvailableKind,
}

/// Per-run state of one scheduling session.
///
/// Owned by one caller at a time; allocation takes it by `&mut`.
#[derive(Debug, Clone)]
pub struct SchedulingSession {
    token: SecurityToken,
    available: Vec<AvailableAllocation>,
}

impl SchedulingSession {
    pub fn new(token: SecurityToken) -> Self {
        Self {
            token,
            available: Vec::new(),
        }
    }

    pub fn token(&self) -> &SecurityToken {
        &self.token
    }

    /// Add a candidate to the pool, keeping discovery order.
    pub fn offer(&mut self, candidate: AvailableAllocation) {
        self.available.push(candidate);
    }

    pub fn available(&self) -> &[AvailableAllocation] {
        &self.available
    }

    /// Ids of pooled allocations of `value_space`.
    pub fn pooled_ids(&self, value_space: Ulid) -> HashSet<Ulid> {
        self.available
            .iter()
            .filter(|a| a.value_space == value_space)
            .map(|a| a.original.id)
            .collect()
    }

    /// Remove and return the first candidate able to host `slot`.
    ///
    /// Reusable candidates win over reallocatable ones; within a kind the
    /// discovery order decides.
    pub fn take_available(
        &mut self,
        value_space: Ulid,
        slot: Span,
        requested: Option<&str>,
    ) -> Option<AvailableAllocation> {
        for kind in [AvailableKind::Reusable, AvailableKind::Reallocatable] {
            let found = self.available.iter().position(|a| {
                a.kind == kind
                    && a.value_space == value_space
                    && a.original.span.contains_span(&slot)
                    && requested.is_none_or(|r| r == a.original.value)
            });
            if let Some(pos) = found {
                return Some(self.available.remove(pos));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(value: &str, start: i64, end: i64, space: Ulid, kind: AvailableKind) -> AvailableAllocation {
        AvailableAllocation {
            original: AllocationRecord {
                id: Ulid::new(),
                value: value.into(),
                span: Span::new(start, end),
            },
            value_space: space,
            kind,
        }
    }

    #[test]
    fn reusable_preferred_over_reallocatable() {
        let space = Ulid::new();
        let mut session = SchedulingSession::new(SecurityToken::new("t"));
        session.offer(candidate("a", 0, 100, space, AvailableKind::Reallocatable));
        session.offer(candidate("b", 0, 100, space, AvailableKind::Reusable));

        let taken = session.take_available(space, Span::new(10, 20), None).unwrap();
        assert_eq!(taken.original.value, "b");
        let taken = session.take_available(space, Span::new(10, 20), None).unwrap();
        assert_eq!(taken.original.value, "a");
        assert!(session.take_available(space, Span::new(10, 20), None).is_none());
    }

    #[test]
    fn discovery_order_within_kind() {
        let space = Ulid::new();
        let mut session = SchedulingSession::new(SecurityToken::new("t"));
        session.offer(candidate("first", 0, 100, space, AvailableKind::Reusable));
        session.offer(candidate("second", 0, 100, space, AvailableKind::Reusable));
        let taken = session.take_available(space, Span::new(0, 100), None).unwrap();
        assert_eq!(taken.original.value, "first");
    }

    #[test]
    fn requires_containment_value_and_space() {
        let space = Ulid::new();
        let mut session = SchedulingSession::new(SecurityToken::new("t"));
        session.offer(candidate("a", 0, 100, space, AvailableKind::Reusable));

        assert!(session.take_available(space, Span::new(50, 150), None).is_none());
        assert!(session.take_available(space, Span::new(10, 20), Some("b")).is_none());
        assert!(session.take_available(Ulid::new(), Span::new(10, 20), None).is_none());
        assert_eq!(session.available().len(), 1);
        assert!(session.take_available(space, Span::new(10, 20), Some("a")).is_some());
        assert!(session.available().is_empty());
    }

    #[test]
    fn pooled_ids_filter_by_space() {
        let space = Ulid::new();
        let mut session = SchedulingSession::new(SecurityToken::new("t"));
        let mine = candidate("a", 0, 100, space, AvailableKind::Reusable);
        let id = mine.original.id;
        session.offer(mine);
        session.offer(candidate("b", 0, 100, Ulid::new(), AvailableKind::Reusable));
        let ids = session.pooled_ids(space);
        assert_eq!(ids.len(), 1);
        assert!(ids.contains(&id));
    }
}
