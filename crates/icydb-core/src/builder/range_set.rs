//! Module: builder::range_set
//! Responsibility: the online builder's progress tracker — a sorted
//! collection of disjoint unprocessed `[begin, end)` sub-ranges, each with
//! a "last processed key" cursor (spec.md §4.4 step 3).
//! Does not own: how batches are sized or throttled (`builder::throttler`)
//! or how progress gets persisted to the store (`builder::online`).
//! Boundary: pure in-memory bookkeeping; every mutating method here is
//! also mirrored into a KV write by the caller within the same
//! transaction, per spec.md §4.4's "persist the RangeSet" step.

use serde::{Deserialize, Serialize};

/// One still-to-process sub-range. `cursor` is the last key processed in
/// this range so far, exclusive of a fresh resume point; `None` means the
/// range hasn't been touched yet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingRange {
    pub begin: Vec<u8>,
    pub end: Vec<u8>,
    pub cursor: Option<Vec<u8>>,
}

///
/// RangeSet
///
/// Ranges are processed in order; `next_batch_bounds` always reports the
/// first range's resume point. A range is removed once
/// `mark_range_complete` fires for it, so `is_empty` becoming `true` is the
/// builder's "done" signal (spec.md §4.4 step 4's loop condition).
///

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RangeSet {
    ranges: Vec<PendingRange>,
}

impl RangeSet {
    #[must_use]
    pub fn covering(begin: Vec<u8>, end: Vec<u8>) -> Self {
        Self {
            ranges: vec![PendingRange {
                begin,
                end,
                cursor: None,
            }],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// `[begin, end)` for the next batch to scan, drawn from range index 0.
    #[must_use]
    pub fn next_batch_bounds(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        let range = self.ranges.first()?;
        let begin = range.cursor.clone().unwrap_or_else(|| range.begin.clone());
        Some((begin, range.end.clone()))
    }

    /// Record a batch's outcome against range index 0 — the only range
    /// index the sequential (non-parallel) builder driver ever touches.
    pub fn record_progress(&mut self, last_key: Vec<u8>, is_complete: bool) {
        if is_complete {
            self.mark_range_complete();
            return;
        }
        if let Some(range) = self.ranges.first_mut() {
            range.cursor = Some(successor(&last_key));
        }
    }

    pub fn mark_range_complete(&mut self) {
        if !self.ranges.is_empty() {
            self.ranges.remove(0);
        }
    }
}

/// Smallest byte string strictly greater than `key`, used to make a
/// resume cursor exclusive of the last-seen key.
fn successor(key: &[u8]) -> Vec<u8> {
    let mut out = key.to_vec();
    out.push(0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_progress_advances_cursor_without_completing() {
        let mut set = RangeSet::covering(b"a".to_vec(), b"z".to_vec());
        set.record_progress(b"m".to_vec(), false);
        assert!(!set.is_empty());
        let (begin, end) = set.next_batch_bounds().unwrap();
        assert_eq!(begin, successor(b"m"));
        assert_eq!(end, b"z".to_vec());
    }

    #[test]
    fn record_progress_complete_empties_the_set() {
        let mut set = RangeSet::covering(b"a".to_vec(), b"z".to_vec());
        set.record_progress(b"y".to_vec(), true);
        assert!(set.is_empty());
        assert_eq!(set.next_batch_bounds(), None);
    }

    #[test]
    fn round_trips_through_cbor() {
        let mut set = RangeSet::covering(b"a".to_vec(), b"z".to_vec());
        set.record_progress(b"m".to_vec(), false);
        let bytes = serde_cbor::to_vec(&set).unwrap();
        let back: RangeSet = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(back.next_batch_bounds(), set.next_batch_bounds());
    }
}
