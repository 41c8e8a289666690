//! Value-spaces and the allocation of unique values within them.

mod error;
pub mod pattern;
pub mod session;
pub mod task;

pub use error::AllocationError;
pub use pattern::{Component, Pattern, PatternError, ValueGenerator};
pub use session::{AvailableAllocation, AvailableKind, SchedulingSession, SecurityToken};
pub use task::{AllocationDecision, ValueAllocationTask};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::MAX_FILTER_DEPTH;

/// String transform applied by a filtered value-space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    /// Lowercase, runs outside `[a-z0-9]` become one `-`, no `-` at the ends.
    ConvertToUrl,
}

impl FilterKind {
    pub fn apply(&self, value: &str) -> String {
        match self {
            FilterKind::ConvertToUrl => {
                let mut out = String::with_capacity(value.len());
                let mut pending_dash = false;
                for c in value.chars().flat_map(char::to_lowercase) {
                    if c.is_ascii_lowercase() || c.is_ascii_digit() {
                        if pending_dash && !out.is_empty() {
                            out.push('-');
                        }
                        pending_dash = false;
                        out.push(c);
                    } else {
                        pending_dash = true;
                    }
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum ValueSpaceKind {
    /// Terminal space generating values from patterns in priority order.
    Pattern {
        patterns: Vec<Pattern>,
        allow_any_requested_value: bool,
    },
    /// Layer over `parent`; allocates from the parent's target and shows the
    /// value through `filter`.
    Filtered {
        parent: Arc<ValueSpace>,
        filter: FilterKind,
    },
}

/// A configured namespace of allocatable values, hosted by `capability`.
#[derive(Debug, Clone)]
pub struct ValueSpace {
    pub id: Ulid,
    pub capability: Ulid,
    pub kind: ValueSpaceKind,
}

impl ValueSpace {
    pub fn with_patterns(id: Ulid, capability: Ulid, patterns: &[&str]) -> Result<Self, PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id,
            capability,
            kind: ValueSpaceKind::Pattern {
                patterns,
                allow_any_requested_value: false,
            },
        })
    }

    pub fn filtered(id: Ulid, capability: Ulid, parent: Arc<ValueSpace>, filter: FilterKind) -> Self {
        Self {
            id,
            capability,
            kind: ValueSpaceKind::Filtered { parent, filter },
        }
    }

    /// Accept any non-empty requested literal. No effect on filtered spaces.
    pub fn allow_any_requested_value(mut self) -> Self {
        if let ValueSpaceKind::Pattern {
            allow_any_requested_value,
            ..
        } = &mut self.kind
        {
            *allow_any_requested_value = true;
        }
        self
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self.kind, ValueSpaceKind::Filtered { .. })
    }

    /// Own patterns; empty for a filtered layer.
    pub fn patterns(&self) -> &[Pattern] {
        match &self.kind {
            ValueSpaceKind::Pattern { patterns, .. } => patterns,
            ValueSpaceKind::Filtered { .. } => &[],
        }
    }

    pub fn accepts_any_requested_value(&self) -> bool {
        matches!(
            self.kind,
            ValueSpaceKind::Pattern {
                allow_any_requested_value: true,
                ..
            }
        )
    }

    /// Layers from `self` down to the target, each hosted by its own capability.
    pub fn layers(&self) -> Result<Vec<&ValueSpace>, AllocationError> {
        let mut layers = vec![self];
        let mut current = self;
        while let ValueSpaceKind::Filtered { parent, .. } = &current.kind {
            if layers.len() > MAX_FILTER_DEPTH {
                return Err(AllocationError::LimitExceeded("value-space filter chain too deep"));
            }
            current = parent;
            layers.push(current);
        }
        Ok(layers)
    }

    /// Terminal pattern space at the bottom of the filter chain, together
    /// with the filters met on the way down (outermost first).
    fn resolve(&self) -> Result<(&ValueSpace, Vec<FilterKind>), AllocationError> {
        let mut current = self;
        let mut filters = Vec::new();
        while let ValueSpaceKind::Filtered { parent, filter } = &current.kind {
            if filters.len() >= MAX_FILTER_DEPTH {
                return Err(AllocationError::LimitExceeded("value-space filter chain too deep"));
            }
            filters.push(*filter);
            current = parent;
        }
        Ok((current, filters))
    }

    /// The value-space actually used for collision checks and persistence.
    pub fn target(&self) -> Result<&ValueSpace, AllocationError> {
        self.resolve().map(|(target, _)| target)
    }

    /// Readable form of a target value as seen through this space's filters.
    pub fn render(&self, value: &str) -> Result<String, AllocationError> {
        let (_, filters) = self.resolve()?;
        Ok(filters
            .iter()
            .rev()
            .fold(value.to_string(), |acc, f| f.apply(&acc)))
    }
}

/// Alias text with `{value}` and `{requested-value}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTemplate(String);

impl AliasTemplate {
    pub const VALUE: &'static str = "{value}";
    pub const REQUESTED_VALUE: &'static str = "{requested-value}";

    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn uses_requested_value(&self) -> bool {
        self.0.contains(Self::REQUESTED_VALUE)
    }

    pub fn render(&self, value: &str, requested: Option<&str>) -> String {
        self.0
            .replace(Self::VALUE, value)
            .replace(Self::REQUESTED_VALUE, requested.unwrap_or(value))
    }
}
