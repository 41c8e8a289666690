//! Occupancy of capacity-limited resources over time.

mod cache;
mod view;

pub use cache::{UtilizationCache, Views};
pub use view::{BucketSnapshot, UtilizationView};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::{MAX_VALID_TIMESTAMP_MS, MIN_VALID_TIMESTAMP_MS};
use crate::model::{CapacityKind, Ms, Span, UtilizationRecord};
use crate::store::StoreError;

/// One tracked capacity: a resource together with the kind of load counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CapacityKey {
    pub resource_id: Ulid,
    pub kind: CapacityKind,
}

impl CapacityKey {
    pub fn of(record: &UtilizationRecord) -> Self {
        Self {
            resource_id: record.resource_id,
            kind: record.kind.capacity_kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCapacity {
    pub resource_id: Ulid,
    pub name: String,
    pub kind: CapacityKind,
    /// Licenses (rooms) or slots (recording) the resource offers.
    pub license_count: u32,
}

impl ResourceCapacity {
    pub fn key(&self) -> CapacityKey {
        CapacityKey {
            resource_id: self.resource_id,
            kind: self.kind,
        }
    }
}

#[derive(Debug)]
pub enum UtilizationError {
    InvalidWindow { start: Ms, end: Ms },
    InvalidPeriod(Ms),
    LimitExceeded(&'static str),
    Store(StoreError),
}

impl std::fmt::Display for UtilizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UtilizationError::InvalidWindow { start, end } => {
                write!(f, "invalid window: start ({start}) must be before end ({end})")
            }
            UtilizationError::InvalidPeriod(p) => write!(f, "period must be positive, got {p}"),
            UtilizationError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            UtilizationError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for UtilizationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UtilizationError::Store(e) => Some(e),
            _ => None,
        }
    }
}

/// Reject empty, inverted or out-of-range query windows.
pub(crate) fn validate_window(window: Span) -> Result<Span, UtilizationError> {
    if window.start >= window.end {
        return Err(UtilizationError::InvalidWindow {
            start: window.start,
            end: window.end,
        });
    }
    if window.start < MIN_VALID_TIMESTAMP_MS || window.end > MAX_VALID_TIMESTAMP_MS {
        return Err(UtilizationError::LimitExceeded("timestamp out of range"));
    }
    Ok(window)
}

impl From<StoreError> for UtilizationError {
    fn from(e: StoreError) -> Self {
        UtilizationError::Store(e)
    }
}
