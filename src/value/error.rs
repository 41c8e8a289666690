use crate::model::{Ms, Span};
use crate::store::StoreError;

#[derive(Debug)]
pub enum AllocationError {
    InvalidInterval { start: Ms, end: Ms },
    /// Requested literal does not fit the value-space.
    ValueInvalid(String),
    /// Requested literal is taken; `conflict` is the span of the holder.
    ValueAlreadyAllocated { value: String, conflict: Span },
    /// Every candidate is taken; `overlap` is the fold of the request with
    /// the blocking allocations.
    NoAvailableValue { overlap: Span },
    Store(StoreError),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationError::InvalidInterval { start, end } => {
                write!(f, "invalid interval: start {start} must be before end {end}")
            }
            AllocationError::ValueInvalid(value) => write!(f, "value '{value}' is invalid"),
            AllocationError::ValueAlreadyAllocated { value, conflict } => {
                write!(f, "value '{value}' is already allocated in {conflict}")
            }
            AllocationError::NoAvailableValue { overlap } => {
                write!(f, "no value available in {overlap}")
            }
            AllocationError::Store(e) => write!(f, "store error: {e}"),
            AllocationError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for AllocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AllocationError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for AllocationError {
    fn from(e: StoreError) -> Self {
        AllocationError::Store(e)
    }
}
