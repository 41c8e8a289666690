use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Items active over one elementary sub-interval of an [`IntervalIndex`].
///
/// A bucket starts at its boundary point and runs to the next boundary of the
/// index. `weight` is the sum of the members' unit costs and is kept in step
/// with every membership change.
///
/// [`IntervalIndex`]: super::IntervalIndex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket<K, Id> {
    start: K,
    members: BTreeSet<Id>,
    weight: i64,
}

impl<K: Copy, Id: Ord + Copy> Bucket<K, Id> {
    pub(super) fn empty(start: K) -> Self {
        Self {
            start,
            members: BTreeSet::new(),
            weight: 0,
        }
    }

    /// New bucket at `start` carrying the same members as `self`.
    pub(super) fn split_at(&self, start: K) -> Self {
        Self {
            start,
            members: self.members.clone(),
            weight: self.weight,
        }
    }

    pub(super) fn add(&mut self, id: Id, weight: i64) -> bool {
        let added = self.members.insert(id);
        if added {
            self.weight += weight;
        }
        added
    }

    pub(super) fn remove(&mut self, id: &Id, weight: i64) -> bool {
        let removed = self.members.remove(id);
        if removed {
            self.weight -= weight;
        }
        removed
    }

    pub fn start(&self) -> K {
        self.start
    }

    pub fn weight(&self) -> i64 {
        self.weight
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.members.contains(id)
    }

    pub fn members(&self) -> impl Iterator<Item = &Id> {
        self.members.iter()
    }
}

/// Highest weight first; equal weights keep the earlier bucket first.
pub fn by_weight_desc<K: Ord + Copy, Id: Ord + Copy>(
    a: &Bucket<K, Id>,
    b: &Bucket<K, Id>,
) -> Ordering {
    b.weight.cmp(&a.weight).then(a.start.cmp(&b.start))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_tracks_membership() {
        let mut b: Bucket<i64, u32> = Bucket::empty(0);
        assert!(b.add(1, 4));
        assert!(b.add(2, 6));
        assert!(!b.add(2, 6)); // duplicate ignored
        assert_eq!(b.weight(), 10);
        assert!(b.remove(&1, 4));
        assert!(!b.remove(&1, 4));
        assert_eq!(b.weight(), 6);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn split_copies_members() {
        let mut b: Bucket<i64, u32> = Bucket::empty(0);
        b.add(7, 3);
        let c = b.split_at(50);
        assert_eq!(c.start(), 50);
        assert!(c.contains(&7));
        assert_eq!(c.weight(), 3);
    }

    #[test]
    fn sort_puts_peak_first() {
        let mut low: Bucket<i64, u32> = Bucket::empty(0);
        low.add(1, 2);
        let mut high = Bucket::empty(10);
        high.add(2, 9);
        let mut tie = Bucket::empty(20);
        tie.add(3, 9);
        let mut all = vec![low, tie, high];
        all.sort_by(by_weight_desc);
        let starts: Vec<i64> = all.iter().map(|b| b.start()).collect();
        assert_eq!(starts, vec![10, 20, 0]);
    }
}
