use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;
use ulid::Ulid;

use crate::config::Config;
use crate::index::IntervalIndex;
use crate::model::*;
use crate::observability::*;
use crate::store::{AllocationStore, CapabilityChecker, StoreError};

use super::{
    AliasTemplate, AllocationError, AvailableKind, SchedulingSession, ValueGenerator, ValueSpace,
};

/// Outcome of one allocation request. The caller commits or drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationDecision {
    NewValue {
        /// Target value-space the value belongs to.
        value_space: Ulid,
        /// Value-space the request was made through.
        requested_by: Ulid,
        value: String,
        /// `value` seen through the requesting space's filters.
        rendered_value: String,
        slot: Span,
        requested_value: Option<String>,
    },
    Reuse {
        original: AllocationRecord,
        value_space: Ulid,
        requested_by: Ulid,
        /// The reused value seen through the requesting space's filters.
        rendered_value: String,
        slot: Span,
        kind: AvailableKind,
        requested_value: Option<String>,
    },
}

impl AllocationDecision {
    pub fn slot(&self) -> Span {
        match self {
            AllocationDecision::NewValue { slot, .. } | AllocationDecision::Reuse { slot, .. } => {
                *slot
            }
        }
    }

    /// Value as stored in the target value-space.
    pub fn value(&self) -> &str {
        match self {
            AllocationDecision::NewValue { value, .. } => value,
            AllocationDecision::Reuse { original, .. } => &original.value,
        }
    }

    pub fn is_reuse(&self) -> bool {
        matches!(self, AllocationDecision::Reuse { .. })
    }

    pub fn alias(&self, template: &AliasTemplate) -> String {
        match self {
            AllocationDecision::NewValue {
                rendered_value,
                requested_value,
                ..
            }
            | AllocationDecision::Reuse {
                rendered_value,
                requested_value,
                ..
            } => template.render(rendered_value, requested_value.as_deref()),
        }
    }
}

/// Values taken in the requested slot with the span of their first holder.
struct UsedValues {
    by_value: HashMap<String, Span>,
    spans: Vec<Span>,
}

impl UsedValues {
    fn collect(index: &IntervalIndex<Ms, AllocationRecord>, slot: Span) -> Self {
        let mut by_value = HashMap::new();
        let mut spans = Vec::new();
        for record in index.items_in(slot.start, slot.end) {
            if let Entry::Vacant(e) = by_value.entry(record.value.clone()) {
                e.insert(record.span);
                spans.push(record.span);
            }
        }
        Self { by_value, spans }
    }

    fn holder(&self, value: &str) -> Option<Span> {
        self.by_value.get(value).copied()
    }

    fn contains(&self, value: &str) -> bool {
        self.by_value.contains_key(value)
    }

    /// `slot` narrowed by every used span that still intersects it.
    fn overlap(&self, slot: Span) -> Span {
        self.spans
            .iter()
            .fold(slot, |acc, span| acc.overlap(span).unwrap_or(acc))
    }
}

pub(crate) fn validate_slot(start: Ms, end: Ms) -> Result<Span, AllocationError> {
    use crate::limits::*;
    let slot = Span::try_new(start, end).ok_or(AllocationError::InvalidInterval { start, end })?;
    if slot.start < MIN_VALID_TIMESTAMP_MS || slot.end > MAX_VALID_TIMESTAMP_MS {
        return Err(AllocationError::LimitExceeded("timestamp out of range"));
    }
    if slot.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(AllocationError::LimitExceeded("interval too wide"));
    }
    Ok(slot)
}

/// Decides which value a request gets in a value-space.
///
/// Holds no per-request state: the used-value snapshot is rebuilt on every
/// call and the reuse pool lives in the caller's [`SchedulingSession`].
pub struct ValueAllocationTask<S, C> {
    store: Arc<S>,
    capabilities: Arc<C>,
    config: Config,
    rng: Mutex<StdRng>,
}

impl<S, C> ValueAllocationTask<S, C>
where
    S: AllocationStore,
    C: CapabilityChecker,
{
    pub fn new(store: Arc<S>, capabilities: Arc<C>, config: Config) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            store,
            capabilities,
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Allocate a value of `space` over `[start, end)`, optionally insisting
    /// on the literal `requested`.
    pub async fn allocate(
        &self,
        session: &mut SchedulingSession,
        space: &ValueSpace,
        start: Ms,
        end: Ms,
        requested: Option<&str>,
    ) -> Result<AllocationDecision, AllocationError> {
        let started = Instant::now();
        let result = self.decide(session, space, start, end, requested).await;

        let outcome = match &result {
            Ok(AllocationDecision::NewValue { .. }) => OUTCOME_NEW_VALUE,
            Ok(AllocationDecision::Reuse { .. }) => OUTCOME_REUSE,
            Err(AllocationError::InvalidInterval { .. } | AllocationError::ValueInvalid(_)) => {
                OUTCOME_INVALID
            }
            Err(AllocationError::ValueAlreadyAllocated { .. }) => OUTCOME_ALREADY_ALLOCATED,
            Err(AllocationError::NoAvailableValue { .. }) => OUTCOME_EXHAUSTED,
            Err(AllocationError::Store(StoreError::Unavailable { .. })) => OUTCOME_UNAVAILABLE,
            Err(_) => OUTCOME_ERROR,
        };
        metrics::counter!(ALLOCATIONS_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(ALLOCATION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(value_space = %space.id, start, end, outcome, "allocation decided");

        result
    }

    async fn decide(
        &self,
        session: &mut SchedulingSession,
        space: &ValueSpace,
        start: Ms,
        end: Ms,
        requested: Option<&str>,
    ) -> Result<AllocationDecision, AllocationError> {
        let slot = validate_slot(start, end)?;

        // 1. Every layer down to the target must be able to host the slot.
        let layers = space.layers()?;
        for layer in &layers {
            self.capabilities
                .check_available(layer.capability, slot, session.token())
                .await?;
        }
        let target = space.target()?;

        // 2. Values taken during the slot. Allocations still offered for
        //    reuse by this session do not block their own value.
        let records = self.store.fetch_allocations(target.id, slot).await?;
        let pooled = session.pooled_ids(target.id);
        let mut index = IntervalIndex::new();
        for record in records {
            if pooled.contains(&record.id) {
                continue;
            }
            let span = record.span;
            if span.start >= span.end {
                debug!(id = %record.id, "skipping allocation with empty interval");
                continue;
            }
            index.insert(record, span.start, span.end);
        }
        let used = UsedValues::collect(&index, slot);

        // 3. Reuse beats fresh values.
        if let Some(candidate) = session.take_available(target.id, slot, requested) {
            debug!(
                id = %candidate.original.id,
                value = %candidate.original.value,
                kind = ?candidate.kind,
                "reusing existing allocation"
            );
            let rendered_value = space.render(&candidate.original.value)?;
            return Ok(AllocationDecision::Reuse {
                original: candidate.original,
                value_space: target.id,
                requested_by: space.id,
                rendered_value,
                slot,
                kind: candidate.kind,
                requested_value: requested.map(str::to_string),
            });
        }

        // 4. Requested literal or the first free generated candidate.
        let value = match requested {
            Some(literal) => {
                if !self.accepts(target, literal) {
                    return Err(AllocationError::ValueInvalid(literal.to_string()));
                }
                if let Some(conflict) = used.holder(literal) {
                    return Err(AllocationError::ValueAlreadyAllocated {
                        value: literal.to_string(),
                        conflict,
                    });
                }
                literal.to_string()
            }
            None => self.generate(target, &used).ok_or_else(|| {
                AllocationError::NoAvailableValue {
                    overlap: used.overlap(slot),
                }
            })?,
        };

        let rendered_value = space.render(&value)?;
        Ok(AllocationDecision::NewValue {
            value_space: target.id,
            requested_by: space.id,
            value,
            rendered_value,
            slot,
            requested_value: requested.map(str::to_string),
        })
    }

    fn accepts(&self, target: &ValueSpace, literal: &str) -> bool {
        if literal.is_empty() {
            return false;
        }
        if target.accepts_any_requested_value() {
            return true;
        }
        let policy = self.config.requested_value_policy;
        target.patterns().iter().any(|p| p.accepts(literal, policy))
    }

    fn generate(&self, target: &ValueSpace, used: &UsedValues) -> Option<String> {
        let mut generator =
            ValueGenerator::new(target.patterns().to_vec(), self.config.max_generate_attempts);
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        generator.next_free(&mut *rng, |candidate| used.contains(candidate))
    }
}
