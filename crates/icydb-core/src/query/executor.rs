//! Module: query::executor
//! Responsibility: execute a `query::plan::PlanNode` against the KV store
//! (spec.md §4.6 "Execution order"): index-assisted or full-table
//! candidate rows, then filter, sort, distinct, offset, limit in the order
//! the SPARQL 1.1 §15 pipeline specifies.
//! Does not own: planning (`query::plan`) or predicate evaluation
//! (`query::predicate`, reused here for the filter stage).
//! Boundary: `Executor::run` is the only entry point; `row_source` is the
//! caller-supplied adapter between a query's entity and its storage.

use crate::index::contracts::Item;
use crate::kv::{KeySelector, RangeOptions, Transaction};
use crate::query::plan::PlanNode;
use crate::subspace::Subspace;
use icydb_error::{ErrorClass, ErrorOrigin, InternalError};
use icydb_primitives::FieldValue;

/// Storage adapter a `Query`'s entity supplies: one CBOR-encoded `Item`
/// per key under `items`, keyed by a single `FieldValue::Data(pk)`
/// component (the same convention `builder::online` uses), plus the
/// `entries` subspace of every scalar/composite index available to the
/// planner, keyed by index name.
pub struct RowSource<'a> {
    pub items: &'a Subspace,
    pub index_entries: &'a dyn Fn(&str) -> Option<&'a Subspace>,
}

impl RowSource<'_> {
    fn decode_item(&self, value: &[u8]) -> Result<Item, InternalError> {
        serde_cbor::from_slice(value).map_err(|e| {
            InternalError::new(
                ErrorClass::Corruption,
                ErrorOrigin::Query,
                format!("failed to decode row: {e}"),
            )
        })
    }

    fn full_scan(&self, txn: &mut dyn Transaction) -> Result<Vec<Item>, InternalError> {
        let (begin, end) = self.items.range();
        let rows = txn.get_range(
            KeySelector::first_greater_or_equal(begin),
            KeySelector::first_greater_or_equal(end),
            RangeOptions::default(),
        )?;
        rows.iter().map(|(_, value)| self.decode_item(value)).collect()
    }

    fn index_scan(
        &self,
        index: &str,
        bound_values: &[FieldValue],
        txn: &mut dyn Transaction,
    ) -> Result<Vec<Item>, InternalError> {
        let entries = (self.index_entries)(index).ok_or_else(|| {
            InternalError::invariant(ErrorOrigin::Query, format!("unknown index {index}"))
        })?;
        let prefix = entries.pack(bound_values)?;
        let (begin, end) = Subspace::root(prefix).range();
        let rows = txn.get_range(
            KeySelector::first_greater_or_equal(begin),
            KeySelector::first_greater_or_equal(end),
            RangeOptions::default(),
        )?;

        let mut out = Vec::with_capacity(rows.len());
        for (key, _) in &rows {
            let mut tuple = entries.unpack(key)?;
            let pk = match tuple.pop() {
                Some(FieldValue::Data(pk)) => pk,
                _ => {
                    return Err(InternalError::invariant(
                        ErrorOrigin::Query,
                        "index entry key missing its primary-key component",
                    ));
                }
            };
            let item_key = self.items.pack(&[FieldValue::Data(pk)])?;
            if let Some(value) = txn.get(&item_key)? {
                out.push(self.decode_item(&value)?);
            }
        }
        Ok(out)
    }
}

///
/// Executor
///

pub struct Executor<'a> {
    pub rows: RowSource<'a>,
}

impl<'a> Executor<'a> {
    #[must_use]
    pub fn new(rows: RowSource<'a>) -> Self {
        Self { rows }
    }

    pub fn run(&self, plan: &PlanNode, txn: &mut dyn Transaction) -> Result<Vec<Item>, InternalError> {
        let materialized = self.materialize(plan, txn)?;
        Ok(apply_post_processing(plan, materialized))
    }

    /// Pattern-evaluation phase only (spec.md §4.6 step 1): candidate rows
    /// plus the filter stage, without sort/distinct/offset/limit.
    fn materialize(&self, plan: &PlanNode, txn: &mut dyn Transaction) -> Result<Vec<Item>, InternalError> {
        match plan {
            PlanNode::FullScan { .. } => self.rows.full_scan(txn),
            PlanNode::IndexScan {
                index, bound_values, ..
            } => self.rows.index_scan(index, bound_values, txn),
            PlanNode::Union(children) => {
                let mut out = Vec::new();
                for child in children {
                    out.extend(self.materialize(child, txn)?);
                }
                Ok(dedupe_by_encoding(out))
            }
            PlanNode::PrimaryFetch(input)
            | PlanNode::Sort { input, .. }
            | PlanNode::Distinct(input)
            | PlanNode::Limit { input, .. }
            | PlanNode::Offset { input, .. } => self.materialize(input, txn),
            PlanNode::Filter { input, predicate } => {
                let rows = self.materialize(input, txn)?;
                Ok(rows.into_iter().filter(|item| predicate.eval(item)).collect())
            }
        }
    }
}

/// Sort / distinct / offset / limit, applied in execution order (spec.md
/// §4.6: ORDER BY, then projection, then DISTINCT, then OFFSET/LIMIT). A
/// plan tree only carries these nodes when the builder actually asked for
/// them, so this walks the tree looking for them rather than assuming a
/// fixed shape.
fn apply_post_processing(plan: &PlanNode, mut rows: Vec<Item>) -> Vec<Item> {
    if let Some((field, descending)) = find_sort(plan) {
        rows.sort_by(|a, b| {
            let ordering = a
                .get(field)
                .unwrap_or(&FieldValue::Null)
                .total_cmp(b.get(field).unwrap_or(&FieldValue::Null));
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
    if find_distinct(plan) {
        rows = dedupe_by_encoding(rows);
    }
    if let Some(n) = find_offset(plan) {
        rows = rows.into_iter().skip(n).collect();
    }
    if let Some(n) = find_limit(plan) {
        rows.truncate(n);
    }
    rows
}

fn find_sort(plan: &PlanNode) -> Option<(&str, bool)> {
    match plan {
        PlanNode::Sort { field, descending, .. } => Some((field.as_str(), *descending)),
        PlanNode::PrimaryFetch(input)
        | PlanNode::Filter { input, .. }
        | PlanNode::Distinct(input)
        | PlanNode::Limit { input, .. }
        | PlanNode::Offset { input, .. } => find_sort(input),
        _ => None,
    }
}

fn find_distinct(plan: &PlanNode) -> bool {
    match plan {
        PlanNode::Distinct(_) => true,
        PlanNode::PrimaryFetch(input)
        | PlanNode::Filter { input, .. }
        | PlanNode::Sort { input, .. }
        | PlanNode::Limit { input, .. }
        | PlanNode::Offset { input, .. } => find_distinct(input),
        _ => false,
    }
}

fn find_offset(plan: &PlanNode) -> Option<usize> {
    match plan {
        PlanNode::Offset { n, .. } => Some(*n),
        PlanNode::PrimaryFetch(input)
        | PlanNode::Filter { input, .. }
        | PlanNode::Sort { input, .. }
        | PlanNode::Distinct(input)
        | PlanNode::Limit { input, .. } => find_offset(input),
        _ => None,
    }
}

fn find_limit(plan: &PlanNode) -> Option<usize> {
    match plan {
        PlanNode::Limit { n, .. } => Some(*n),
        PlanNode::PrimaryFetch(input)
        | PlanNode::Filter { input, .. }
        | PlanNode::Sort { input, .. }
        | PlanNode::Distinct(input)
        | PlanNode::Offset { input, .. } => find_limit(input),
        _ => None,
    }
}

/// `Item`/`FieldValue` have no derived `Eq`/`Hash` (`FieldValue::eq_value`
/// is the only equality this codebase defines, see
/// `index::maintainers::version`'s ledger entry); CBOR-encoding each row
/// gives a cheap, deterministic dedupe key without needing one.
fn dedupe_by_encoding(rows: Vec<Item>) -> Vec<Item> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter()
        .filter(|item| seen.insert(serde_cbor::to_vec(item).unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemStore, Store};
    use crate::query::plan::PlanNode;

    fn item(name: &str, age: i64) -> Item {
        let mut item = Item::new();
        item.insert("name".to_string(), FieldValue::String(name.to_string()));
        item.insert("age".to_string(), FieldValue::Int64(age));
        item
    }

    fn seed(store: &MemStore, items_subspace: &Subspace, rows: &[(&str, &str, i64)]) {
        store
            .run(|txn| {
                for (pk, name, age) in rows {
                    let key = items_subspace.pack(&[FieldValue::Data(pk.as_bytes().to_vec())])?;
                    txn.set(key, serde_cbor::to_vec(&item(name, *age)).unwrap());
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn full_scan_then_filter_sort_limit() {
        let store = MemStore::new();
        let items = Subspace::root(b"items".to_vec());
        seed(
            &store,
            &items,
            &[("p1", "alice", 30), ("p2", "bob", 25), ("p3", "carol", 40)],
        );

        let no_index = |_: &str| None;
        let executor = Executor::new(RowSource {
            items: &items,
            index_entries: &no_index,
        });

        let plan = PlanNode::Limit {
            n: 2,
            input: Box::new(PlanNode::Sort {
                field: "age".to_string(),
                descending: true,
                input: Box::new(PlanNode::Filter {
                    predicate: crate::query::predicate::Predicate::compare(
                        "age",
                        crate::query::predicate::CompareOp::Gte,
                        FieldValue::Int64(0),
                    ),
                    input: Box::new(PlanNode::FullScan { estimated_rows: 3 }),
                }),
            }),
        };

        let rows = store.run(|txn| executor.run(&plan, txn)).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].get("name").unwrap().eq_value(&FieldValue::String("carol".into())));
        assert!(rows[1].get("name").unwrap().eq_value(&FieldValue::String("alice".into())));
    }

    #[test]
    fn index_scan_fetches_matching_primary_rows() {
        let store = MemStore::new();
        let items = Subspace::root(b"items".to_vec());
        seed(&store, &items, &[("p1", "alice", 30), ("p2", "bob", 25)]);

        let maintainer = crate::index::maintainers::ScalarMaintainer::new(
            "by_name",
            &Subspace::root(b"idx".to_vec()),
            vec!["name".to_string()],
        );
        store
            .run(|txn| {
                use crate::index::contracts::IndexMaintainer;
                maintainer.update_index(None, Some(&item("alice", 30)), b"p1", txn)?;
                maintainer.update_index(None, Some(&item("bob", 25)), b"p2", txn)
            })
            .unwrap();

        let entries = maintainer.entries.clone();
        let lookup = move |name: &str| if name == "by_name" { Some(&entries) } else { None };
        let executor = Executor::new(RowSource {
            items: &items,
            index_entries: &lookup,
        });

        let plan = PlanNode::PrimaryFetch(Box::new(PlanNode::IndexScan {
            index: "by_name".to_string(),
            bound_fields: vec!["name".to_string()],
            bound_values: vec![FieldValue::String("alice".to_string())],
            estimated_rows: 1,
        }));

        let rows = store.run(|txn| executor.run(&plan, txn)).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].get("name").unwrap().eq_value(&FieldValue::String("alice".into())));
    }
}
