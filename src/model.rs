use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::index::Indexed;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Checked constructor for caller-supplied bounds.
    pub fn try_new(start: Ms, end: Ms) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Intersection of two spans, `None` when they do not overlap.
    pub fn overlap(&self, other: &Span) -> Option<Span> {
        Span::try_new(self.start.max(other.start), self.end.min(other.end))
    }

    /// Clamp `self` to `bounds`. Caller guarantees the two overlap.
    pub fn clamp_to(&self, bounds: &Span) -> Span {
        Span::new(self.start.max(bounds.start), self.end.min(bounds.end))
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Raw allocation tuple of a value-space as returned by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub id: Ulid,
    pub value: String,
    pub span: Span,
}

impl Indexed for AllocationRecord {
    type Id = Ulid;

    fn id(&self) -> Ulid {
        self.id
    }
}

/// What a committed reservation occupies on a capacity-limited resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationKind {
    /// Virtual room consuming `license_count` licenses.
    Room { license_count: u32 },
    /// One recording-service slot.
    RecordingService,
}

impl ReservationKind {
    /// Units of capacity one reservation of this kind consumes.
    pub fn unit_cost(&self) -> i64 {
        match self {
            ReservationKind::Room { license_count } => i64::from(*license_count),
            ReservationKind::RecordingService => 1,
        }
    }

    pub fn capacity_kind(&self) -> CapacityKind {
        match self {
            ReservationKind::Room { .. } => CapacityKind::Room,
            ReservationKind::RecordingService => CapacityKind::Recording,
        }
    }
}

/// Which capability of a resource a capacity tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CapacityKind {
    Room,
    Recording,
}

/// Committed reservation on a resource, as observed by the utilization cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilizationRecord {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub kind: ReservationKind,
    pub span: Span,
}

impl Indexed for UtilizationRecord {
    type Id = Ulid;

    fn id(&self) -> Ulid {
        self.id
    }

    fn weight(&self) -> i64 {
        self.kind.unit_cost()
    }
}
