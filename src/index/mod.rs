//! Bucketed interval index.
//!
//! Every inserted interval contributes its two endpoints as boundary points.
//! Consecutive boundaries delimit elementary sub-intervals; each one owns a
//! [`Bucket`] holding the items that cover it. Boundaries are never merged
//! back after removal, so indices are meant to be short-lived or reset.

pub mod bucket;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

pub use bucket::{by_weight_desc, Bucket};

/// Anything that can live in an [`IntervalIndex`].
pub trait Indexed {
    type Id: Copy + Ord + Hash + Debug;

    fn id(&self) -> Self::Id;

    /// Units this item adds to every bucket it covers.
    fn weight(&self) -> i64 {
        1
    }
}

struct Entry<K, T> {
    start: K,
    end: K,
    item: T,
}

/// A bucket as seen by a query: its boundary start, the next boundary (if
/// any) and the bucket itself.
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a, K, Id> {
    pub start: K,
    pub end: Option<K>,
    pub bucket: &'a Bucket<K, Id>,
}

pub struct IntervalIndex<K, T: Indexed> {
    buckets: BTreeMap<K, Bucket<K, T::Id>>,
    entries: HashMap<T::Id, Entry<K, T>>,
}

impl<K, T: Indexed> Default for IntervalIndex<K, T> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            entries: HashMap::new(),
        }
    }
}

impl<K, T> IntervalIndex<K, T>
where
    K: Ord + Copy + Debug,
    T: Indexed,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of boundary points (and therefore buckets) held.
    pub fn boundary_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.entries.get(id).map(|e| &e.item)
    }

    pub fn range_of(&self, id: &T::Id) -> Option<(K, K)> {
        self.entries.get(id).map(|e| (e.start, e.end))
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.entries.contains_key(id)
    }

    /// All items, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(|e| &e.item)
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.entries.clear();
    }

    /// Insert `item` over `[start, end)`.
    ///
    /// Returns `false` without touching the index when an item with the same
    /// id is already present.
    ///
    /// # Panics
    ///
    /// Panics if `start >= end`.
    pub fn insert(&mut self, item: T, start: K, end: K) -> bool {
        assert!(start < end, "interval start {start:?} must be before end {end:?}");
        let id = item.id();
        if self.entries.contains_key(&id) {
            return false;
        }

        self.ensure_boundary(start);
        self.ensure_boundary(end);

        let weight = item.weight();
        for bucket in self.buckets.range_mut(start..end).map(|(_, b)| b) {
            bucket.add(id, weight);
        }

        self.entries.insert(id, Entry { start, end, item });
        true
    }

    /// Remove the item with `id` from every bucket it covers.
    pub fn remove(&mut self, id: &T::Id) -> Option<T> {
        let entry = self.entries.remove(id)?;
        let weight = entry.item.weight();
        for bucket in self.buckets.range_mut(entry.start..entry.end).map(|(_, b)| b) {
            bucket.remove(id, weight);
        }
        Some(entry.item)
    }

    /// Buckets whose sub-interval intersects `[start, end)`, in axis order.
    ///
    /// Empty buckets are included; callers wanting occupancy skip them.
    pub fn query_buckets(&self, start: K, end: K) -> Vec<Segment<'_, K, T::Id>> {
        if start >= end || self.buckets.is_empty() {
            return Vec::new();
        }
        // The bucket covering `start` begins at the last boundary <= start.
        let from = self
            .buckets
            .range(..=start)
            .next_back()
            .map_or(start, |(k, _)| *k);

        let mut segments: Vec<Segment<'_, K, T::Id>> = Vec::new();
        for (key, bucket) in self.buckets.range(from..end) {
            if let Some(prev) = segments.last_mut() {
                prev.end = Some(*key);
            }
            segments.push(Segment {
                start: *key,
                end: None,
                bucket,
            });
        }
        if let Some(last) = segments.last_mut() {
            last.end = self.buckets.range(end..).next().map(|(k, _)| *k);
        }
        segments
    }

    /// Distinct items overlapping `[start, end)`, ordered by their interval
    /// start, then end.
    pub fn items_in(&self, start: K, end: K) -> Vec<&T> {
        let ids: BTreeSet<T::Id> = self
            .query_buckets(start, end)
            .iter()
            .flat_map(|s| s.bucket.members().copied())
            .collect();
        let mut entries: Vec<&Entry<K, T>> =
            ids.iter().filter_map(|id| self.entries.get(id)).collect();
        entries.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
        entries.into_iter().map(|e| &e.item).collect()
    }

    /// Register a boundary, splitting the bucket that currently spans it.
    fn ensure_boundary(&mut self, at: K) {
        if self.buckets.contains_key(&at) {
            return;
        }
        let bucket = match self.buckets.range(..at).next_back() {
            Some((_, covering)) => covering.split_at(at),
            None => Bucket::empty(at),
        };
        self.buckets.insert(at, bucket);
    }
}
