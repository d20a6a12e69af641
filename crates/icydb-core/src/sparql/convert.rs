//! Module: sparql::convert
//! Responsibility: `GraphPatternConverter` (spec.md §4.6) — the
//! `GraphPattern` → `ExecutionNode` table. Every algebraic combinator maps
//! straight across; the surface-only forms fold to a documented
//! best-effort shape.
//! Does not own: execution (`sparql::execute`).
//! Boundary: `GraphPatternConverter::convert` is the only entry point.

use crate::sparql::algebra::ExecutionNode;
use crate::sparql::ast::GraphPattern;

///
/// GraphPatternConverter
///
/// Conversion table (spec.md §4.6):
/// * `basic` → `bgp`
/// * `join`/`optional`/`union`/`minus` → themselves, recursing
/// * `filter(p, e)` → `filter(p', e)` — the predicate itself needs no
///   conversion, it's already the execution-side expression
/// * `graph(g, p)` → `withGraph(g, p')` — the graph term is preserved
///   structurally rather than discarded, so a future named-graph index
///   layout has something to scope against
/// * `propertyPath` → itself; the path expression is already the
///   execution-side representation, the length bound is applied at
///   execution time
/// * `groupBy` → itself, recursing on its input
/// * `lateral` → itself, recursing on both sides
/// * `service`/`values` → `emptyBgp` (no remote service or literal-row
///   source exists to resolve against)
/// * `subquery`/`bind` → pass-through to the inner pattern (the subquery
///   boundary and the bind assignment aren't enforced)
///

pub struct GraphPatternConverter;

impl GraphPatternConverter {
    #[must_use]
    pub fn convert(pattern: &GraphPattern) -> ExecutionNode {
        match pattern {
            GraphPattern::Basic(triples) => ExecutionNode::Bgp(triples.clone()),
            GraphPattern::Join(l, r) => ExecutionNode::Join(
                Box::new(Self::convert(l)),
                Box::new(Self::convert(r)),
            ),
            GraphPattern::Optional(l, r) => ExecutionNode::Optional(
                Box::new(Self::convert(l)),
                Box::new(Self::convert(r)),
            ),
            GraphPattern::Union(l, r) => ExecutionNode::Union(
                Box::new(Self::convert(l)),
                Box::new(Self::convert(r)),
            ),
            GraphPattern::Filter(inner, predicate) => {
                ExecutionNode::Filter(Box::new(Self::convert(inner)), predicate.clone())
            }
            GraphPattern::Minus(l, r) => ExecutionNode::Minus(
                Box::new(Self::convert(l)),
                Box::new(Self::convert(r)),
            ),
            GraphPattern::Graph(term, inner) => {
                ExecutionNode::WithGraph(term.clone(), Box::new(Self::convert(inner)))
            }
            GraphPattern::PropertyPath { subject, path, object } => ExecutionNode::PropertyPath {
                subject: subject.clone(),
                path: path.clone(),
                object: object.clone(),
            },
            GraphPattern::GroupBy {
                input,
                group_vars,
                aggregates,
                having,
            } => ExecutionNode::GroupBy {
                input: Box::new(Self::convert(input)),
                group_vars: group_vars.clone(),
                aggregates: aggregates.clone(),
                having: having.clone(),
            },
            GraphPattern::Lateral(l, r) => ExecutionNode::Lateral(
                Box::new(Self::convert(l)),
                Box::new(Self::convert(r)),
            ),
            GraphPattern::Service(_) | GraphPattern::Values(_, _) => ExecutionNode::EmptyBgp,
            GraphPattern::Subquery(inner) => ExecutionNode::BestEffort(Box::new(Self::convert(inner))),
            GraphPattern::Bind { input, .. } => ExecutionNode::BestEffort(Box::new(Self::convert(input))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparql::ast::{Term, Triple};

    fn triple() -> Triple {
        Triple {
            subject: Term::Var("s".into()),
            predicate: Term::Iri("knows".into()),
            object: Term::Var("o".into()),
        }
    }

    #[test]
    fn basic_converts_to_bgp() {
        let pattern = GraphPattern::Basic(vec![triple()]);
        assert!(matches!(GraphPatternConverter::convert(&pattern), ExecutionNode::Bgp(t) if t.len() == 1));
    }

    #[test]
    fn graph_preserves_its_term() {
        let pattern = GraphPattern::Graph(
            Term::Iri("g1".into()),
            Box::new(GraphPattern::Basic(vec![triple()])),
        );
        match GraphPatternConverter::convert(&pattern) {
            ExecutionNode::WithGraph(Term::Iri(name), inner) => {
                assert_eq!(name, "g1");
                assert!(matches!(*inner, ExecutionNode::Bgp(_)));
            }
            other => panic!("expected WithGraph, got {other:?}"),
        }
    }

    #[test]
    fn service_and_values_fold_to_empty_bgp() {
        let service = GraphPattern::Service(Box::new(GraphPattern::Basic(vec![triple()])));
        assert!(matches!(GraphPatternConverter::convert(&service), ExecutionNode::EmptyBgp));

        let values = GraphPattern::Values(vec!["x".into()], vec![]);
        assert!(matches!(GraphPatternConverter::convert(&values), ExecutionNode::EmptyBgp));
    }

    #[test]
    fn subquery_and_bind_pass_through_to_their_inner_pattern() {
        let subquery = GraphPattern::Subquery(Box::new(GraphPattern::Basic(vec![triple()])));
        match GraphPatternConverter::convert(&subquery) {
            ExecutionNode::BestEffort(inner) => assert!(matches!(*inner, ExecutionNode::Bgp(_))),
            other => panic!("expected BestEffort, got {other:?}"),
        }

        let bind = GraphPattern::Bind {
            input: Box::new(GraphPattern::Basic(vec![triple()])),
            var: "x".into(),
            value: icydb_primitives::FieldValue::Int64(1),
        };
        match GraphPatternConverter::convert(&bind) {
            ExecutionNode::BestEffort(inner) => assert!(matches!(*inner, ExecutionNode::Bgp(_))),
            other => panic!("expected BestEffort, got {other:?}"),
        }
    }
}
