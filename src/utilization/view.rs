use ulid::Ulid;

use crate::index::{by_weight_desc, IntervalIndex};
use crate::model::{Ms, Span, UtilizationRecord};

/// A bucket clipped to the window of the view it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub span: Span,
    pub weight: i64,
    pub members: Vec<Ulid>,
}

impl BucketSnapshot {
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Occupancy of one capacity during one window.
#[derive(Debug, Clone, PartialEq)]
pub struct UtilizationView {
    window: Span,
    buckets: Vec<BucketSnapshot>,
    peak: Option<usize>,
    records: Vec<UtilizationRecord>,
}

impl UtilizationView {
    /// `None` when nothing occupies the capacity during `window`.
    pub(crate) fn build(index: &IntervalIndex<Ms, UtilizationRecord>, window: Span) -> Option<Self> {
        let segments = index.query_buckets(window.start, window.end);
        let peak_bucket = segments
            .iter()
            .filter(|s| !s.bucket.is_empty())
            .min_by(|a, b| by_weight_desc(a.bucket, b.bucket))?
            .start;

        let mut peak = None;
        let mut buckets = Vec::with_capacity(segments.len());
        for segment in &segments {
            let start = segment.start.max(window.start);
            let end = segment.end.map_or(window.end, |e| e.min(window.end));
            let Some(span) = Span::try_new(start, end) else {
                continue;
            };
            if segment.start == peak_bucket {
                peak = Some(buckets.len());
            }
            buckets.push(BucketSnapshot {
                span,
                weight: segment.bucket.weight(),
                members: segment.bucket.members().copied().collect(),
            });
        }

        let records = index
            .items_in(window.start, window.end)
            .into_iter()
            .cloned()
            .collect();
        Some(Self {
            window,
            buckets,
            peak,
            records,
        })
    }

    pub fn window(&self) -> Span {
        self.window
    }

    /// Buckets in axis order, empty ones included.
    pub fn buckets(&self) -> &[BucketSnapshot] {
        &self.buckets
    }

    /// Distinct reservations active in the window, by start then end.
    pub fn records(&self) -> &[UtilizationRecord] {
        &self.records
    }

    /// Heaviest occupied bucket; the earliest one on ties.
    pub fn peak(&self) -> Option<&BucketSnapshot> {
        self.peak.map(|i| &self.buckets[i])
    }

    pub fn peak_weight(&self) -> i64 {
        self.peak().map_or(0, |b| b.weight)
    }

    /// Mean weight over occupied buckets only.
    pub fn average_weight(&self) -> f64 {
        let (sum, count) = self
            .buckets
            .iter()
            .filter(|b| !b.is_empty())
            .fold((0i64, 0u32), |(sum, n), b| (sum + b.weight, n + 1));
        if count == 0 {
            return 0.0;
        }
        sum as f64 / f64::from(count)
    }

    pub fn format_peak(&self, license_count: u32) -> String {
        format!("{}/{}", self.peak_weight(), license_count)
    }

    pub fn format_average(&self, license_count: u32) -> String {
        format!("{:.1}/{}", self.average_weight(), license_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReservationKind;

    fn room(licenses: u32, start: Ms, end: Ms) -> UtilizationRecord {
        UtilizationRecord {
            id: Ulid::new(),
            resource_id: Ulid::nil(),
            kind: ReservationKind::Room {
                license_count: licenses,
            },
            span: Span::new(start, end),
        }
    }

    fn index_of(records: &[UtilizationRecord]) -> IntervalIndex<Ms, UtilizationRecord> {
        let mut index = IntervalIndex::new();
        for r in records {
            index.insert(r.clone(), r.span.start, r.span.end);
        }
        index
    }

    #[test]
    fn average_skips_empty_buckets() {
        let mut index = index_of(&[room(4, 20, 30), room(6, 30, 40), room(1, 0, 5)]);
        // Leaves [0, 5) and [5, 20) as empty buckets.
        let first = index.items_in(0, 5)[0].id;
        index.remove(&first);

        let view = UtilizationView::build(&index, Span::new(0, 40)).unwrap();
        let weights: Vec<i64> = view.buckets().iter().map(|b| b.weight).collect();
        assert_eq!(weights, vec![0, 0, 4, 6]);
        assert_eq!(view.average_weight(), 5.0);
        assert_eq!(view.format_average(10), "5.0/10");
    }

    #[test]
    fn peak_is_heaviest_occupied_bucket() {
        let index = index_of(&[room(2, 0, 100), room(3, 10, 20), room(3, 50, 60)]);
        let view = UtilizationView::build(&index, Span::new(0, 100)).unwrap();
        let peak = view.peak().unwrap();
        assert_eq!(peak.weight, 5);
        assert_eq!(peak.span, Span::new(10, 20)); // earliest of the two ties
        assert_eq!(view.format_peak(8), "5/8");
    }

    #[test]
    fn buckets_clipped_to_window() {
        let index = index_of(&[room(2, 0, 100)]);
        let view = UtilizationView::build(&index, Span::new(40, 60)).unwrap();
        assert_eq!(view.buckets().len(), 1);
        assert_eq!(view.buckets()[0].span, Span::new(40, 60));
        assert_eq!(view.peak_weight(), 2);
    }

    #[test]
    fn records_ordered_and_distinct() {
        let c = room(1, 30, 40);
        let a = room(1, 0, 50);
        let b = room(1, 0, 20);
        let index = index_of(&[c.clone(), a.clone(), b.clone()]);
        let view = UtilizationView::build(&index, Span::new(0, 50)).unwrap();
        assert_eq!(view.records(), &[b, a, c]);
    }

    #[test]
    fn no_view_without_occupancy() {
        let index = index_of(&[room(2, 0, 10)]);
        assert!(UtilizationView::build(&index, Span::new(20, 30)).is_none());
        assert!(UtilizationView::build(&IntervalIndex::new(), Span::new(0, 10)).is_none());
    }
}
