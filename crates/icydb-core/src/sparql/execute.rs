//! Module: sparql::execute
//! Responsibility: walk an `ExecutionNode` against the KV store (spec.md
//! §4.6) — BGP resolution picks whichever hexastore permutation best
//! matches a triple's bound/free pattern, joins thread bindings through
//! nested evaluation, property paths run a bounded-hop search reusing
//! `graph::traversal::EdgeIndex`, and `groupBy` runs a sort-then-aggregate
//! pass over its input.
//! Does not own: the AST (`sparql::ast`) or the AST→algebra conversion
//! (`sparql::convert`).
//! Boundary: `execute` is the only entry point; `TripleIndex` is the only
//! way a BGP touches storage.
//!
//! Joins (`Join`, `Lateral`) are both executed by re-evaluating the right
//! side once per left binding rather than hash-joining two independently
//! materialized sides. That's a correlated nested-loop join: more general
//! than a textbook SPARQL hash join (it also handles `Lateral`'s
//! correlation) at the cost of repeating work a hash join would share
//! across identical left bindings.

use crate::graph::traversal::EdgeIndex;
use crate::index::contracts::Item;
use crate::kv::{KeySelector, RangeOptions, Transaction};
use crate::query::predicate::Predicate;
use crate::sparql::algebra::ExecutionNode;
use crate::sparql::ast::{Aggregate, Term};
use crate::sparql::path::PropertyPath;
use crate::subspace::Subspace;
use icydb_error::InternalError;
use icydb_primitives::FieldValue;
use std::collections::HashSet;

/// A partial solution: variable name → bound value. This is the same
/// shape as an `Item`, which lets `Filter` reuse `Predicate::eval`
/// directly.
pub type Binding = Item;

/// The six `[s, p, o]` permutations a `Hexastore`-strategy graph index
/// maintains (mirrors `index::maintainers::graph::HEXASTORE_PERMS`). BGP
/// resolution needs arbitrary bound/free patterns on all three positions,
/// which only a hexastore layout covers; `Adjacency`/`TripleStore` graph
/// indexes serve traversal (`graph::traversal`) and partial patterns
/// respectively, not general BGP joins.
const HEXASTORE_PERMS: [([usize; 3], &[u8]); 6] = [
    ([0, 1, 2], b"p0"),
    ([0, 2, 1], b"p1"),
    ([1, 0, 2], b"p2"),
    ([1, 2, 0], b"p3"),
    ([2, 0, 1], b"p4"),
    ([2, 1, 0], b"p5"),
];

///
/// TripleIndex
///

pub struct TripleIndex {
    base: Subspace,
}

impl TripleIndex {
    #[must_use]
    pub fn new(base: Subspace) -> Self {
        Self { base }
    }

    fn term_value(term: &Term, bindings: &Binding) -> Option<FieldValue> {
        match term {
            Term::Iri(s) => Some(FieldValue::String(s.clone())),
            Term::Literal(v) => Some(v.clone()),
            Term::Var(name) => bindings.get(name).cloned(),
            // No storage layer indexes a quoted triple as a scalar value;
            // it can only be matched structurally, not via a prefix scan.
            Term::QuotedTriple(_) => None,
        }
    }

    /// Resolve one triple pattern against `bindings`, returning one
    /// extended binding per matching edge. Picks the hexastore permutation
    /// whose leading columns cover the longest run of already-bound roles,
    /// so a fully-bound triple becomes a point lookup and a fully-free one
    /// falls back to a single full-subspace scan.
    pub fn match_triple(
        &self,
        triple: &crate::sparql::ast::Triple,
        bindings: &Binding,
        txn: &mut dyn Transaction,
    ) -> Result<Vec<Binding>, InternalError> {
        let slots = [
            Self::term_value(&triple.subject, bindings),
            Self::term_value(&triple.predicate, bindings),
            Self::term_value(&triple.object, bindings),
        ];

        let (prefix_len, order, name) = HEXASTORE_PERMS
            .iter()
            .map(|&(order, name)| {
                let prefix_len = order.iter().take_while(|&&role| slots[role].is_some()).count();
                (prefix_len, order, name)
            })
            .max_by_key(|&(prefix_len, _, _)| prefix_len)
            .expect("HEXASTORE_PERMS is non-empty");

        let subspace = self.base.subspace(name);
        let prefix_values: Vec<FieldValue> = order[..prefix_len]
            .iter()
            .map(|&role| slots[role].clone().expect("role within prefix_len is bound"))
            .collect();
        let prefix = subspace.pack(&prefix_values)?;
        let (begin, end) = Subspace::root(prefix).range();
        let rows = txn.get_range(
            KeySelector::first_greater_or_equal(begin),
            KeySelector::first_greater_or_equal(end),
            RangeOptions::default(),
        )?;

        let mut out = Vec::with_capacity(rows.len());
        'rows: for (key, _) in &rows {
            let tuple = subspace.unpack(key)?;
            let mut triple_values = [FieldValue::Null, FieldValue::Null, FieldValue::Null];
            for (slot_idx, &role) in order.iter().enumerate() {
                triple_values[role] = tuple[slot_idx].clone();
            }
            for (role, bound) in slots.iter().enumerate() {
                if let Some(bound_value) = bound {
                    if !triple_values[role].eq_value(bound_value) {
                        continue 'rows;
                    }
                }
            }

            let mut binding = bindings.clone();
            bind_term(&mut binding, &triple.subject, &triple_values[0]);
            bind_term(&mut binding, &triple.predicate, &triple_values[1]);
            bind_term(&mut binding, &triple.object, &triple_values[2]);
            out.push(binding);
        }
        Ok(out)
    }
}

fn bind_term(binding: &mut Binding, term: &Term, value: &FieldValue) {
    if let Term::Var(name) = term {
        binding.insert(name.clone(), value.clone());
    }
}

fn execute_bgp(
    index: &TripleIndex,
    triples: &[crate::sparql::ast::Triple],
    context: Binding,
    txn: &mut dyn Transaction,
) -> Result<Vec<Binding>, InternalError> {
    let mut current = vec![context];
    for triple in triples {
        let mut next = Vec::new();
        for binding in &current {
            next.extend(index.match_triple(triple, binding, txn)?);
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    Ok(current)
}

/// Two bindings are compatible when every variable they share carries the
/// same value (SPARQL's join-compatibility rule).
fn compatible(a: &Binding, b: &Binding) -> bool {
    a.iter().all(|(k, v)| b.get(k).is_none_or(|other| other.eq_value(v)))
}

/// Walk an `ExecutionNode`, threading `context` as the starting binding
/// (pre-bound variables from an enclosing `Join`/`Lateral`).
pub fn execute(
    index: &TripleIndex,
    node: &ExecutionNode,
    context: Binding,
    txn: &mut dyn Transaction,
) -> Result<Vec<Binding>, InternalError> {
    match node {
        ExecutionNode::Bgp(triples) => execute_bgp(index, triples, context, txn),
        ExecutionNode::Join(l, r) | ExecutionNode::Lateral(l, r) => {
            let lefts = execute(index, l, context, txn)?;
            let mut out = Vec::new();
            for lb in lefts {
                out.extend(execute(index, r, lb, txn)?);
            }
            Ok(out)
        }
        ExecutionNode::Optional(l, r) => {
            let lefts = execute(index, l, context, txn)?;
            let mut out = Vec::new();
            for lb in lefts {
                let matches = execute(index, r, lb.clone(), txn)?;
                if matches.is_empty() {
                    out.push(lb);
                } else {
                    out.extend(matches);
                }
            }
            Ok(out)
        }
        ExecutionNode::Union(l, r) => {
            let mut out = execute(index, l, context.clone(), txn)?;
            out.extend(execute(index, r, context, txn)?);
            Ok(out)
        }
        ExecutionNode::Filter(inner, predicate) => {
            let rows = execute(index, inner, context, txn)?;
            Ok(rows.into_iter().filter(|b| predicate.eval(b)).collect())
        }
        ExecutionNode::Minus(l, r) => {
            let lefts = execute(index, l, context.clone(), txn)?;
            let rights = execute(index, r, context, txn)?;
            Ok(lefts.into_iter().filter(|lb| !rights.iter().any(|rb| compatible(lb, rb))).collect())
        }
        ExecutionNode::WithGraph(_term, inner) => execute(index, inner, context, txn),
        ExecutionNode::PropertyPath { subject, path, object } => {
            execute_property_path(index, subject, path, object, &context, txn)
        }
        ExecutionNode::GroupBy {
            input,
            group_vars,
            aggregates,
            having,
        } => {
            let rows = execute(index, input, context, txn)?;
            Ok(group_by(rows, group_vars, aggregates, having.as_ref()))
        }
        ExecutionNode::BestEffort(inner) => execute(index, inner, context, txn),
        ExecutionNode::EmptyBgp => Ok(Vec::new()),
    }
}

/// Property-path evaluation: repeatedly expand `path` via the underlying
/// adjacency index, stopping at `PathLength::effective_max` hops. Only the
/// `iri`/`inverse`/`sequence`/`alternative`/`zero-or-more`/`one-or-more`/
/// `zero-or-one`/`negated-property-set` shapes reach here (spec.md §4.6);
/// a bound subject starts the expansion, an unbound one expands from
/// every node reachable via the backward index from a bound object, and a
/// fully-unbound path isn't attempted (there's no node enumeration to
/// seed a full-graph search from — see `graph::pagerank`'s equivalent
/// caller-supplied-node-set note).
fn execute_property_path(
    index: &TripleIndex,
    subject: &Term,
    path: &PropertyPath,
    object: &Term,
    context: &Binding,
    txn: &mut dyn Transaction,
) -> Result<Vec<Binding>, InternalError> {
    let base = index.base.clone();
    let edges = EdgeIndex::new(&base);
    let length = path_length(path);

    let starts: Vec<FieldValue> = match TripleIndex::term_value(subject, context) {
        Some(v) => vec![v],
        None => Vec::new(),
    };
    if starts.is_empty() {
        // Unbound subject with no seed: nothing to expand from.
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for start in starts {
        let reached = expand_path(&edges, path, &start, length.effective_max(), txn)?;
        for end in reached {
            if let Some(object_value) = TripleIndex::term_value(object, context) {
                if !end.eq_value(&object_value) {
                    continue;
                }
            }
            let mut binding = context.clone();
            bind_term(&mut binding, subject, &start);
            bind_term(&mut binding, object, &end);
            out.push(binding);
        }
    }
    Ok(out)
}

fn path_length(path: &PropertyPath) -> crate::sparql::path::PathLength {
    use crate::sparql::path::PathLength;
    match path {
        PropertyPath::ZeroOrMore(_) => PathLength::unbounded(0),
        PropertyPath::OneOrMore(_) => PathLength::unbounded(1),
        PropertyPath::ZeroOrOne(_) => PathLength::bounded(0, 1),
        _ => PathLength::bounded(1, 1),
    }
}

/// Breadth-first expansion of `path` from `start`, bounded to `max_hops`.
fn expand_path(
    edges: &EdgeIndex,
    path: &PropertyPath,
    start: &FieldValue,
    max_hops: u32,
    txn: &mut dyn Transaction,
) -> Result<Vec<FieldValue>, InternalError> {
    match path {
        PropertyPath::Iri(label) => step(edges, start, label, false, txn),
        PropertyPath::Inverse(inner) => expand_inverse(edges, inner, start, max_hops, txn),
        PropertyPath::Sequence(first, second) => {
            let mid = expand_path(edges, first, start, max_hops, txn)?;
            let mut out = Vec::new();
            for m in mid {
                out.extend(expand_path(edges, second, &m, max_hops, txn)?);
            }
            Ok(dedupe(out))
        }
        PropertyPath::Alternative(a, b) => {
            let mut out = expand_path(edges, a, start, max_hops, txn)?;
            out.extend(expand_path(edges, b, start, max_hops, txn)?);
            Ok(dedupe(out))
        }
        PropertyPath::NegatedPropertySet(excluded) => negated_step(edges, start, excluded, txn),
        PropertyPath::ZeroOrMore(inner) => bounded_closure(edges, inner, start, 0, max_hops, txn),
        PropertyPath::OneOrMore(inner) => bounded_closure(edges, inner, start, 1, max_hops, txn),
        PropertyPath::ZeroOrOne(inner) => {
            let mut out = vec![start.clone()];
            out.extend(expand_path(edges, inner, start, max_hops, txn)?);
            Ok(dedupe(out))
        }
    }
}

/// `inverse` only flips direction on a plain edge label; an inverse of a
/// compound path (`inverse(sequence(...))` and similar) isn't produced by
/// the conversion table this crate builds paths through, so it resolves
/// to no matches rather than guessing a direction to flip.
fn expand_inverse(
    edges: &EdgeIndex,
    inner: &PropertyPath,
    start: &FieldValue,
    _max_hops: u32,
    txn: &mut dyn Transaction,
) -> Result<Vec<FieldValue>, InternalError> {
    match inner {
        PropertyPath::Iri(label) => step(edges, start, label, true, txn),
        _ => Ok(Vec::new()),
    }
}

fn step(
    edges: &EdgeIndex,
    node: &FieldValue,
    label: &str,
    inverse: bool,
    txn: &mut dyn Transaction,
) -> Result<Vec<FieldValue>, InternalError> {
    let hops = if inverse {
        edges.backward(node, txn)?
    } else {
        edges.forward(node, txn)?
    };
    Ok(hops
        .into_iter()
        .filter(|(edge_label, _)| matches!(edge_label, FieldValue::String(s) if s == label))
        .map(|(_, other)| other)
        .collect())
}

fn negated_step(
    edges: &EdgeIndex,
    node: &FieldValue,
    excluded: &[String],
    txn: &mut dyn Transaction,
) -> Result<Vec<FieldValue>, InternalError> {
    let hops = edges.forward(node, txn)?;
    Ok(hops
        .into_iter()
        .filter(|(edge_label, _)| !matches!(edge_label, FieldValue::String(s) if excluded.iter().any(|e| e == s)))
        .map(|(_, other)| other)
        .collect())
}

fn bounded_closure(
    edges: &EdgeIndex,
    inner: &PropertyPath,
    start: &FieldValue,
    min_hops: u32,
    max_hops: u32,
    txn: &mut dyn Transaction,
) -> Result<Vec<FieldValue>, InternalError> {
    let mut frontier = vec![start.clone()];
    let mut seen: HashSet<Vec<u8>> = [crate::graph::traversal::node_key(start)].into_iter().collect();
    let mut reached = Vec::new();
    if min_hops == 0 {
        reached.push(start.clone());
    }

    for hop in 1..=max_hops {
        let mut next = Vec::new();
        for node in &frontier {
            next.extend(expand_path(edges, inner, node, max_hops, txn)?);
        }
        frontier = next
            .into_iter()
            .filter(|n| seen.insert(crate::graph::traversal::node_key(n)))
            .collect();
        if frontier.is_empty() {
            break;
        }
        if hop >= min_hops {
            reached.extend(frontier.clone());
        }
    }
    Ok(dedupe(reached))
}

fn dedupe(values: Vec<FieldValue>) -> Vec<FieldValue> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(crate::graph::traversal::node_key(v)))
        .collect()
}

/// Streaming-by-sort group-by: sort rows by the group key, then fold each
/// contiguous run into one output binding carrying the group-key fields
/// plus the aggregate results, applying `having` as a post-filter.
fn group_by(
    mut rows: Vec<Binding>,
    group_vars: &[String],
    aggregates: &[(String, Aggregate)],
    having: Option<&Predicate>,
) -> Vec<Binding> {
    rows.sort_by(|a, b| {
        for key in group_vars {
            let ordering = a
                .get(key)
                .unwrap_or(&FieldValue::Null)
                .total_cmp(b.get(key).unwrap_or(&FieldValue::Null));
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });

    let mut out = Vec::new();
    let mut i = 0;
    while i < rows.len() {
        let mut j = i + 1;
        while j < rows.len() && same_group(&rows[i], &rows[j], group_vars) {
            j += 1;
        }
        let group = &rows[i..j];
        let mut result = Binding::new();
        for key in group_vars {
            if let Some(value) = group[0].get(key) {
                result.insert(key.clone(), value.clone());
            }
        }
        for (name, agg) in aggregates {
            result.insert(name.clone(), aggregate(agg, group));
        }
        if having.is_none_or(|p| p.eval(&result)) {
            out.push(result);
        }
        i = j;
    }
    out
}

fn same_group(a: &Binding, b: &Binding, group_vars: &[String]) -> bool {
    group_vars.iter().all(|key| {
        a.get(key)
            .unwrap_or(&FieldValue::Null)
            .eq_value(b.get(key).unwrap_or(&FieldValue::Null))
    })
}

fn aggregate(agg: &Aggregate, group: &[Binding]) -> FieldValue {
    match agg {
        Aggregate::Count(field) => FieldValue::Int64(group.iter().filter(|b| b.contains_key(field)).count() as i64),
        Aggregate::Sum(field) => FieldValue::Double(group.iter().filter_map(|b| as_f64(b, field)).sum()),
        Aggregate::Avg(field) => {
            let values: Vec<f64> = group.iter().filter_map(|b| as_f64(b, field)).collect();
            if values.is_empty() {
                FieldValue::Null
            } else {
                FieldValue::Double(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        Aggregate::Min(field) => group
            .iter()
            .filter_map(|b| b.get(field))
            .min_by(|a, b| a.total_cmp(b))
            .cloned()
            .unwrap_or(FieldValue::Null),
        Aggregate::Max(field) => group
            .iter()
            .filter_map(|b| b.get(field))
            .max_by(|a, b| a.total_cmp(b))
            .cloned()
            .unwrap_or(FieldValue::Null),
    }
}

fn as_f64(binding: &Binding, field: &str) -> Option<f64> {
    match binding.get(field)? {
        FieldValue::Int64(v) => Some(*v as f64),
        FieldValue::Double(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::contracts::IndexMaintainer;
    use crate::index::maintainers::{GraphMaintainer, GraphStrategy};
    use crate::kv::{MemStore, Store};
    use crate::sparql::ast::Triple;

    fn edge_item(from: &str, label: &str, to: &str) -> Item {
        let mut item = Item::new();
        item.insert("from".into(), FieldValue::String(from.into()));
        item.insert("edge".into(), FieldValue::String(label.into()));
        item.insert("to".into(), FieldValue::String(to.into()));
        item
    }

    fn seed_hexastore(store: &MemStore, base: &Subspace, edges: &[(&str, &str, &str)]) {
        let maintainer = GraphMaintainer::new(GraphStrategy::Hexastore, base.clone(), [
            "from".into(),
            "edge".into(),
            "to".into(),
        ]);
        store
            .run(|txn| {
                for (i, (from, label, to)) in edges.iter().enumerate() {
                    maintainer.update_index(
                        None,
                        Some(&edge_item(from, label, to)),
                        format!("e{i}").as_bytes(),
                        txn,
                    )?;
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn single_triple_with_bound_predicate_resolves_both_free_ends() {
        let store = MemStore::new();
        let base = Subspace::root(b"g".to_vec());
        seed_hexastore(&store, &base, &[("alice", "knows", "bob"), ("alice", "knows", "carol")]);

        let index = TripleIndex::new(base);
        let triple = Triple {
            subject: Term::Var("s".into()),
            predicate: Term::Iri("knows".into()),
            object: Term::Var("o".into()),
        };
        let bindings = store.run(|txn| index.match_triple(&triple, &Binding::new(), txn)).unwrap();
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn bgp_join_across_two_triples_shares_the_middle_variable() {
        let store = MemStore::new();
        let base = Subspace::root(b"g".to_vec());
        seed_hexastore(
            &store,
            &base,
            &[("alice", "knows", "bob"), ("bob", "knows", "carol"), ("bob", "knows", "dave")],
        );

        let index = TripleIndex::new(base);
        let triples = vec![
            Triple {
                subject: Term::Iri("alice".into()),
                predicate: Term::Iri("knows".into()),
                object: Term::Var("mid".into()),
            },
            Triple {
                subject: Term::Var("mid".into()),
                predicate: Term::Iri("knows".into()),
                object: Term::Var("end".into()),
            },
        ];
        let results = store.run(|txn| execute_bgp(&index, &triples, Binding::new(), txn)).unwrap();
        assert_eq!(results.len(), 2);
        for binding in &results {
            assert!(matches!(binding.get("mid"), Some(FieldValue::String(s)) if s == "bob"));
        }
    }

    #[test]
    fn optional_keeps_left_binding_when_right_finds_nothing() {
        let store = MemStore::new();
        let base = Subspace::root(b"g".to_vec());
        seed_hexastore(&store, &base, &[("alice", "knows", "bob")]);
        let index = TripleIndex::new(base);

        let left = ExecutionNode::Bgp(vec![Triple {
            subject: Term::Iri("alice".into()),
            predicate: Term::Iri("knows".into()),
            object: Term::Var("friend".into()),
        }]);
        let right = ExecutionNode::Bgp(vec![Triple {
            subject: Term::Var("friend".into()),
            predicate: Term::Iri("likes".into()),
            object: Term::Var("thing".into()),
        }]);
        let node = ExecutionNode::Optional(Box::new(left), Box::new(right));
        let results = store.run(|txn| execute(&index, &node, Binding::new(), txn)).unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].contains_key("thing"));
    }

    #[test]
    fn bounded_property_path_follows_two_hops() {
        let store = MemStore::new();
        let base = Subspace::root(b"g".to_vec());
        seed_hexastore(&store, &base, &[("alice", "knows", "bob"), ("bob", "knows", "carol")]);
        let index = TripleIndex::new(base);

        let node = ExecutionNode::PropertyPath {
            subject: Term::Iri("alice".into()),
            path: PropertyPath::OneOrMore(Box::new(PropertyPath::Iri("knows".into()))),
            object: Term::Var("reached".into()),
        };
        let results = store.run(|txn| execute(&index, &node, Binding::new(), txn)).unwrap();
        let reached: HashSet<String> = results
            .into_iter()
            .filter_map(|b| match b.get("reached") {
                Some(FieldValue::String(s)) => Some(s.clone()),
                _ => None,
            })
            .collect();
        assert!(reached.contains("bob"));
        assert!(reached.contains("carol"));
    }

    #[test]
    fn group_by_sums_a_field_per_group() {
        let mut a = Binding::new();
        a.insert("category".into(), FieldValue::String("fruit".into()));
        a.insert("count".into(), FieldValue::Int64(3));
        let mut b = Binding::new();
        b.insert("category".into(), FieldValue::String("fruit".into()));
        b.insert("count".into(), FieldValue::Int64(4));
        let mut c = Binding::new();
        c.insert("category".into(), FieldValue::String("veg".into()));
        c.insert("count".into(), FieldValue::Int64(1));

        let grouped = group_by(
            vec![a, b, c],
            &["category".to_string()],
            &[("total".to_string(), Aggregate::Sum("count".to_string()))],
            None,
        );
        assert_eq!(grouped.len(), 2);
        let fruit = grouped
            .iter()
            .find(|b| matches!(b.get("category"), Some(FieldValue::String(s)) if s == "fruit"))
            .unwrap();
        assert!(matches!(fruit.get("total"), Some(FieldValue::Double(v)) if (*v - 7.0).abs() < 1e-9));
    }
}
