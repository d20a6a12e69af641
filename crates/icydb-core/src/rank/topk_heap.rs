//! Module: rank::topk_heap
//! Responsibility: bounded min-heap top-K, used as the simple-rank
//! maintainer's structure and as the skip list's fallback before its
//! invariants are established (spec.md §4.5).
//! Does not own: skip-list span-counter algebra.
//! Boundary: `TopKHeap::drain_desc` is the only way out; callers never see
//! heap internals.

use icydb_primitives::FieldValue;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Tie-break for equal scores: ascending primary-key byte order (Open
/// Question — spec.md §9 leaves this unspecified; this repository commits
/// to ascending and holds it across the skip list and this heap).
#[derive(Clone, Debug)]
pub struct ScoredPk {
    pub score: FieldValue,
    pub pk: Vec<u8>,
}

impl ScoredPk {
    #[must_use]
    pub fn new(score: FieldValue, pk: Vec<u8>) -> Self {
        Self { score, pk }
    }
}

impl PartialEq for ScoredPk {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredPk {}

impl Ord for ScoredPk {
    fn cmp(&self, other: &Self) -> Ordering {
        // Ascending pk tie-break: a *lower* pk should rank as the
        // "smaller" entry so that, scanned in ascending overall order, it
        // comes out ahead of an equal-score higher pk.
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.pk.cmp(&self.pk))
    }
}

impl PartialOrd for ScoredPk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

///
/// TopKHeap
///
/// Bounded min-heap keyed by `(score, pk)`: accepts while under capacity;
/// once full, a new entry replaces the current minimum only if it sorts
/// strictly greater.
///

pub struct TopKHeap {
    capacity: usize,
    heap: BinaryHeap<std::cmp::Reverse<ScoredPk>>,
}

impl TopKHeap {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn offer(&mut self, entry: ScoredPk) {
        if self.capacity == 0 {
            return;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(std::cmp::Reverse(entry));
            return;
        }
        if let Some(std::cmp::Reverse(min)) = self.heap.peek() {
            if entry > *min {
                self.heap.pop();
                self.heap.push(std::cmp::Reverse(entry));
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain in descending `(score, pk)` order.
    #[must_use]
    pub fn drain_desc(self) -> Vec<ScoredPk> {
        let mut items: Vec<ScoredPk> = self.heap.into_iter().map(|r| r.0).collect();
        items.sort_by(|a, b| b.cmp(a));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(score: i64, pk: &str) -> ScoredPk {
        ScoredPk::new(FieldValue::Int64(score), pk.as_bytes().to_vec())
    }

    #[test]
    fn keeps_only_the_k_highest_scores() {
        let mut heap = TopKHeap::new(3);
        for (score, pk) in [(50, "p1"), (90, "p2"), (70, "p3"), (90, "p4"), (10, "p5")] {
            heap.offer(entry(score, pk));
        }
        let top = heap.drain_desc();
        let scores: Vec<i64> = top
            .iter()
            .map(|e| match e.score {
                FieldValue::Int64(v) => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(scores, vec![90, 90, 70]);
    }

    #[test]
    fn ties_break_by_ascending_primary_key() {
        let mut heap = TopKHeap::new(2);
        heap.offer(entry(90, "p4"));
        heap.offer(entry(90, "p2"));
        let top = heap.drain_desc();
        assert_eq!(top[0].pk, b"p2");
        assert_eq!(top[1].pk, b"p4");
    }
}
