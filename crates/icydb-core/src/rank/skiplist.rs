//! Module: rank::skiplist
//! Responsibility: persistent skip list with span counters over the KV
//! transaction abstraction (spec.md §4.5) — `insert`/`delete`/`rank`/
//! `topK`/`percentile`/`validateSpanIntegrity`.
//! Does not own: the rank maintainer that calls these from item writes,
//! or the `TopKHeap` fallback used before a skip list has any entries.
//! Boundary: every method takes the transaction explicitly; this type
//! holds no connection of its own.

use crate::kv::{KeySelector, RangeOptions, Transaction};
use crate::rank::ScoredPk;
use crate::subspace::Subspace;
use icydb_error::{ErrorOrigin, InternalError};
use icydb_primitives::FieldValue;
use rand::Rng;
use std::cmp::Ordering;

const DEFAULT_MAX_LEVELS: usize = 16;
const SPAN_TAG: u8 = 0;

fn encode_span(count: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    out.push(SPAN_TAG);
    out.extend_from_slice(&count.to_le_bytes());
    out
}

fn decode_span(bytes: &[u8]) -> Result<u64, InternalError> {
    if bytes.len() != 9 || bytes[0] != SPAN_TAG {
        return Err(InternalError::new(
            icydb_error::ErrorClass::Corruption,
            ErrorOrigin::Rank,
            "malformed skip-list span value",
        ));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[1..9]);
    Ok(u64::from_le_bytes(buf))
}

fn ascending_cmp(a: &ScoredPk, b: &ScoredPk) -> Ordering {
    a.score.total_cmp(&b.score).then_with(|| a.pk.cmp(&b.pk))
}

fn tuple_to_scored(mut tuple: Vec<FieldValue>) -> Result<ScoredPk, InternalError> {
    if tuple.len() != 2 {
        return Err(InternalError::invariant(
            ErrorOrigin::Rank,
            "skip-list node key did not unpack to (score, pk)",
        ));
    }
    let pk = match tuple.pop().expect("checked len above") {
        FieldValue::Data(d) => d,
        _ => {
            return Err(InternalError::invariant(
                ErrorOrigin::Rank,
                "skip-list node key's second component was not a primary key",
            ));
        }
    };
    let score = tuple.pop().expect("checked len above");
    Ok(ScoredPk::new(score, pk))
}

/// One level's outcome of a top-down predecessor search: the node (or
/// `None` for the virtual head) immediately before the search target at
/// that level, its current outgoing span, and its absolute ascending
/// rank (0 for head).
struct LevelStep {
    level: usize,
    predecessor: Option<ScoredPk>,
    predecessor_span: u64,
    distance: u64,
}

///
/// SkipList
///
/// Span convention: `level[L][node]` (or `headSpan[L]` for the virtual
/// head) stores the width — in level-0 node count — of that node's
/// forward link at level `L`, inclusive of its destination. This is the
/// classic "node owns the span of its own forward pointer" convention
/// (as in a Redis-style skiplist), which makes `headSpan[L] + Σ
/// span[L][n]` telescope exactly to the total element count — the
/// invariant `validate_span_integrity` checks.
///

pub struct SkipList {
    subspace: Subspace,
    max_levels: usize,
}

impl SkipList {
    #[must_use]
    pub fn new(subspace: Subspace) -> Self {
        Self {
            subspace,
            max_levels: DEFAULT_MAX_LEVELS,
        }
    }

    #[must_use]
    pub const fn with_max_levels(mut self, max_levels: usize) -> Self {
        self.max_levels = max_levels;
        self
    }

    fn leaf_subspace(&self) -> Subspace {
        self.subspace.subspace(b"leaf")
    }

    fn level_subspace(&self, level: usize) -> Subspace {
        if level == 0 {
            self.leaf_subspace()
        } else {
            self.subspace
                .subspace(b"level")
                .subspace(&(level as u32).to_be_bytes())
        }
    }

    fn node_key(&self, level: usize, node: &ScoredPk) -> Result<Vec<u8>, InternalError> {
        self.level_subspace(level)
            .pack(&[node.score.clone(), FieldValue::Data(node.pk.clone())])
    }

    fn head_span_key(&self, level: usize) -> Result<Vec<u8>, InternalError> {
        self.subspace
            .subspace(b"head_span")
            .pack(&[FieldValue::Int64(level as i64)])
    }

    fn count_key(&self) -> Result<Vec<u8>, InternalError> {
        self.subspace
            .pack(&[FieldValue::String("_count".to_string())])
    }

    fn num_levels_key(&self) -> Result<Vec<u8>, InternalError> {
        self.subspace
            .pack(&[FieldValue::String("_num_levels".to_string())])
    }

    fn read_span(
        &self,
        txn: &mut dyn Transaction,
        level: usize,
        node: Option<&ScoredPk>,
    ) -> Result<u64, InternalError> {
        let key = match node {
            None => self.head_span_key(level)?,
            Some(n) => self.node_key(level, n)?,
        };
        match txn.get(&key)? {
            None => Ok(0),
            Some(bytes) => decode_span(&bytes),
        }
    }

    fn write_span(
        &self,
        txn: &mut dyn Transaction,
        level: usize,
        node: Option<&ScoredPk>,
        value: u64,
    ) -> Result<(), InternalError> {
        let key = match node {
            None => self.head_span_key(level)?,
            Some(n) => self.node_key(level, n)?,
        };
        txn.set(key, encode_span(value));
        Ok(())
    }

    fn next_after(
        &self,
        txn: &mut dyn Transaction,
        level: usize,
        node: Option<&ScoredPk>,
    ) -> Result<Option<ScoredPk>, InternalError> {
        let sub = self.level_subspace(level);
        let (sub_begin, sub_end) = sub.range();
        let begin = match node {
            None => KeySelector::first_greater_or_equal(sub_begin),
            Some(n) => KeySelector::first_greater_than(self.node_key(level, n)?),
        };
        let rows = txn.get_range(
            begin,
            KeySelector::first_greater_or_equal(sub_end),
            RangeOptions {
                limit: Some(1),
                ..RangeOptions::default()
            },
        )?;
        match rows.into_iter().next() {
            None => Ok(None),
            Some((key, _)) => Ok(Some(tuple_to_scored(sub.unpack(&key)?)?)),
        }
    }

    fn read_count(&self, txn: &mut dyn Transaction) -> Result<u64, InternalError> {
        Ok(txn.get_counter(&self.count_key()?)?.max(0) as u64)
    }

    fn read_num_levels(&self, txn: &mut dyn Transaction) -> Result<usize, InternalError> {
        match txn.get(&self.num_levels_key()?)? {
            None => Ok(0),
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(u64::from_le_bytes(buf) as usize)
            }
            Some(_) => Err(InternalError::invariant(
                ErrorOrigin::Rank,
                "malformed _num_levels record",
            )),
        }
    }

    fn write_num_levels(&self, txn: &mut dyn Transaction, n: usize) -> Result<(), InternalError> {
        txn.set(self.num_levels_key()?, (n as u64).to_le_bytes().to_vec());
        Ok(())
    }

    fn random_level(&self) -> usize {
        let mut level = 0;
        let mut rng = rand::thread_rng();
        while level + 1 < self.max_levels && rng.gen_bool(0.5) {
            level += 1;
        }
        level
    }

    /// Top-down predecessor search for `target`, one `LevelStep` per
    /// level from `num_levels - 1` down to `0`.
    fn descend(
        &self,
        txn: &mut dyn Transaction,
        num_levels: usize,
        target: &ScoredPk,
    ) -> Result<Vec<LevelStep>, InternalError> {
        let mut current: Option<ScoredPk> = None;
        let mut distance: u64 = 0;
        let mut steps = Vec::with_capacity(num_levels);
        for level in (0..num_levels).rev() {
            let mut span_here = self.read_span(txn, level, current.as_ref())?;
            loop {
                let Some(next) = self.next_after(txn, level, current.as_ref())? else {
                    break;
                };
                if ascending_cmp(&next, target) != Ordering::Less {
                    break;
                }
                distance += span_here;
                current = Some(next);
                span_here = self.read_span(txn, level, current.as_ref())?;
            }
            steps.push(LevelStep {
                level,
                predecessor: current.clone(),
                predecessor_span: span_here,
                distance,
            });
        }
        Ok(steps)
    }

    pub fn insert(
        &self,
        txn: &mut dyn Transaction,
        score: FieldValue,
        pk: Vec<u8>,
    ) -> Result<(), InternalError> {
        let target = ScoredPk::new(score, pk);
        let mut num_levels = self.read_num_levels(txn)?;
        let new_level = self.random_level();
        if new_level + 1 > num_levels {
            num_levels = new_level + 1;
            self.write_num_levels(txn, num_levels)?;
        }

        let steps = self.descend(txn, num_levels, &target)?;
        let level0_rank = steps.last().map_or(0, |s| s.distance);
        let new_rank = level0_rank
            .checked_add(1)
            .ok_or_else(|| InternalError::invariant(ErrorOrigin::Rank, "rank overflow"))?;

        for step in &steps {
            let level = step.level;
            if level <= new_level {
                let new_hop = new_rank.checked_sub(step.distance).ok_or_else(|| {
                    InternalError::invariant(ErrorOrigin::Rank, "negative hop distance")
                })?;
                let new_node_span = (step.predecessor_span + 1)
                    .checked_sub(new_hop)
                    .ok_or_else(|| {
                        InternalError::invariant(ErrorOrigin::Rank, "span split underflow")
                    })?;
                self.write_span(txn, level, step.predecessor.as_ref(), new_hop)?;
                self.write_span(txn, level, Some(&target), new_node_span)?;
            } else {
                self.write_span(
                    txn,
                    level,
                    step.predecessor.as_ref(),
                    step.predecessor_span + 1,
                )?;
            }
        }

        txn.atomic_add(&self.count_key()?, 1)?;
        Ok(())
    }

    pub fn delete(
        &self,
        txn: &mut dyn Transaction,
        score: FieldValue,
        pk: Vec<u8>,
    ) -> Result<bool, InternalError> {
        let target = ScoredPk::new(score, pk);
        let num_levels = self.read_num_levels(txn)?;
        if num_levels == 0 {
            return Ok(false);
        }

        let mut top_level = None;
        for level in (0..num_levels).rev() {
            if txn.get(&self.node_key(level, &target)?)?.is_some() {
                top_level = Some(level);
                break;
            }
        }
        let Some(top_level) = top_level else {
            return Ok(false);
        };

        let steps = self.descend(txn, num_levels, &target)?;
        for step in &steps {
            let level = step.level;
            if level <= top_level {
                let span_x = self.read_span(txn, level, Some(&target))?;
                let merged = (step.predecessor_span + span_x)
                    .checked_sub(1)
                    .ok_or_else(|| {
                        InternalError::invariant(ErrorOrigin::Rank, "span merge underflow")
                    })?;
                self.write_span(txn, level, step.predecessor.as_ref(), merged)?;
                txn.clear(&self.node_key(level, &target)?);
            } else {
                let decremented = step.predecessor_span.checked_sub(1).ok_or_else(|| {
                    InternalError::invariant(ErrorOrigin::Rank, "span decrement underflow")
                })?;
                self.write_span(txn, level, step.predecessor.as_ref(), decremented)?;
            }
        }

        txn.atomic_add(&self.count_key()?, -1)?;
        Ok(true)
    }

    /// Count of members satisfying `pred`, walking top-down the same way
    /// `descend` does but without tracking predecessor/span detail —
    /// used to answer pure counting queries (e.g. "how many members have
    /// a strictly lower score").
    fn count_matching(
        &self,
        txn: &mut dyn Transaction,
        num_levels: usize,
        pred: impl Fn(&ScoredPk) -> bool,
    ) -> Result<u64, InternalError> {
        let mut current: Option<ScoredPk> = None;
        let mut distance: u64 = 0;
        for level in (0..num_levels).rev() {
            loop {
                let Some(next) = self.next_after(txn, level, current.as_ref())? else {
                    break;
                };
                if !pred(&next) {
                    break;
                }
                let span_here = self.read_span(txn, level, current.as_ref())?;
                distance += span_here;
                current = Some(next);
            }
        }
        Ok(distance)
    }

    /// 0-based rank, descending by score (0 = highest), ties broken by
    /// ascending primary key. `None` if the pair is not a member.
    ///
    /// The skip list's own storage order is ascending `(score, pk)` —
    /// required so physical key order matches the span-counter
    /// traversal. That order's tie-break (ascending pk) happens to
    /// invert to *descending* pk if the whole order is naively flipped,
    /// so the descending rank is computed directly from two counts
    /// instead of `count - 1 - ascending_rank`.
    pub fn rank(
        &self,
        txn: &mut dyn Transaction,
        score: FieldValue,
        pk: Vec<u8>,
    ) -> Result<Option<u64>, InternalError> {
        let count = self.read_count(txn)?;
        if count == 0 {
            return Ok(None);
        }
        let target = ScoredPk::new(score.clone(), pk.clone());
        if txn.get(&self.node_key(0, &target)?)?.is_none() {
            return Ok(None);
        }
        let num_levels = self.read_num_levels(txn)?;

        let ascending_rank = self
            .descend(txn, num_levels, &target)?
            .last()
            .map_or(0, |s| s.distance);
        let lower_score_count = self.count_matching(txn, num_levels, |n| {
            n.score.total_cmp(&score) == Ordering::Less
        })?;
        let same_score_lower_pk = ascending_rank - lower_score_count;
        let le_score_count = self.count_matching(txn, num_levels, |n| {
            n.score.total_cmp(&score) != Ordering::Greater
        })?;
        let higher_score_count = count - le_score_count;

        Ok(Some(higher_score_count + same_score_lower_pk))
    }

    /// The member whose 1-based ascending rank is exactly `r`, or `None`
    /// if `r` is out of range.
    fn select_at_rank(
        &self,
        txn: &mut dyn Transaction,
        r: u64,
    ) -> Result<Option<ScoredPk>, InternalError> {
        let num_levels = self.read_num_levels(txn)?;
        if num_levels == 0 || r == 0 {
            return Ok(None);
        }
        let mut current: Option<ScoredPk> = None;
        let mut distance: u64 = 0;
        for level in (0..num_levels).rev() {
            loop {
                let Some(next) = self.next_after(txn, level, current.as_ref())? else {
                    break;
                };
                let span_here = self.read_span(txn, level, current.as_ref())?;
                let candidate_rank = distance + span_here;
                if candidate_rank > r {
                    break;
                }
                distance = candidate_rank;
                current = Some(next);
                if distance == r {
                    return Ok(current);
                }
            }
        }
        Ok(None)
    }

    /// The `k` highest-scored members, in descending order.
    pub fn top_k(
        &self,
        txn: &mut dyn Transaction,
        k: usize,
    ) -> Result<Vec<ScoredPk>, InternalError> {
        let count = self.read_count(txn)?;
        if count == 0 || k == 0 {
            return Ok(Vec::new());
        }
        let k = (k as u64).min(count);
        let start_rank = count - k + 1;
        let Some(start_node) = self.select_at_rank(txn, start_rank)? else {
            return Err(InternalError::invariant(
                ErrorOrigin::Rank,
                "top-k start rank not found",
            ));
        };

        let leaf = self.leaf_subspace();
        let (_, leaf_end) = leaf.range();
        let begin_key = self.node_key(0, &start_node)?;
        let rows = txn.get_range(
            KeySelector::first_greater_or_equal(begin_key),
            KeySelector::first_greater_or_equal(leaf_end),
            RangeOptions {
                limit: Some(k as usize),
                ..RangeOptions::default()
            },
        )?;

        let mut out = Vec::with_capacity(rows.len());
        for (key, _) in rows {
            out.push(tuple_to_scored(leaf.unpack(&key)?)?);
        }
        // The physical slice is ascending `(score, pk)`, i.e. descending
        // score would reverse pk order within a tie too; sort explicitly
        // for descending score / ascending pk instead of reversing.
        out.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.pk.cmp(&b.pk)));
        Ok(out)
    }

    /// The score at percentile `p` (`0.0..=1.0`, `1.0` is the single
    /// highest score).
    pub fn percentile(
        &self,
        txn: &mut dyn Transaction,
        p: f64,
    ) -> Result<Option<FieldValue>, InternalError> {
        let count = self.read_count(txn)?;
        if count == 0 {
            return Ok(None);
        }
        let target_rank = ((count as f64) * (1.0 - p)).floor() as u64;
        let top = self.top_k(txn, (target_rank + 1) as usize)?;
        Ok(top.last().map(|s| s.score.clone()))
    }

    pub fn validate_span_integrity(&self, txn: &mut dyn Transaction) -> Result<(), InternalError> {
        let count = self.read_count(txn)?;
        let num_levels = self.read_num_levels(txn)?;
        for level in 0..num_levels {
            let head = self.read_span(txn, level, None)?;
            let sub = self.level_subspace(level);
            let (b, e) = sub.range();
            let rows = txn.get_range(
                KeySelector::first_greater_or_equal(b),
                KeySelector::first_greater_or_equal(e),
                RangeOptions::default(),
            )?;
            let mut total = head;
            for (_, value) in &rows {
                total += decode_span(value)?;
            }
            if total != count {
                return Err(InternalError::invariant(
                    ErrorOrigin::Rank,
                    format!("level {level} span sum {total} does not match element count {count}"),
                ));
            }
        }
        Ok(())
    }
}
