//! Module: query::predicate
//! Responsibility: the schema-agnostic predicate algebra (spec.md §4.6) —
//! comparisons, string predicates, nil checks, `in`, and the Boolean
//! combinators, plus evaluation against an `Item` and DNF normalization.
//! Does not own: index selection (see `query::plan`) or query-chain
//! construction (see `query::builder`).
//! Boundary: `Predicate::eval` is the only place predicates touch item
//! data; `Predicate::to_dnf` is the only place they touch planning.

use crate::index::contracts::Item;
use icydb_primitives::FieldValue;
use std::collections::BTreeSet;

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Clone, Debug)]
pub struct ComparePredicate {
    pub field: String,
    pub op: CompareOp,
    pub value: FieldValue,
}

///
/// Predicate
///
/// A conjunction/disjunction tree over comparisons, string predicates
/// (`contains`/`hasPrefix`/`hasSuffix`), nil checks, `in`, and the
/// Boolean combinators `{and, or, not}` (spec.md §4.6).
///

#[derive(Clone, Debug)]
pub enum Predicate {
    True,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare(ComparePredicate),
    Contains { field: String, value: String },
    HasPrefix { field: String, value: String },
    HasSuffix { field: String, value: String },
    IsNull { field: String },
    In { field: String, values: Vec<FieldValue> },
}

impl Predicate {
    #[must_use]
    pub fn compare(field: impl Into<String>, op: CompareOp, value: FieldValue) -> Self {
        Self::Compare(ComparePredicate {
            field: field.into(),
            op,
            value,
        })
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::And(mut a), Self::And(b)) => {
                a.extend(b);
                Self::And(a)
            }
            (Self::And(mut a), b) => {
                a.push(b);
                Self::And(a)
            }
            (a, b) => Self::And(vec![a, b]),
        }
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Or(mut a), Self::Or(b)) => {
                a.extend(b);
                Self::Or(a)
            }
            (Self::Or(mut a), b) => {
                a.push(b);
                Self::Or(a)
            }
            (a, b) => Self::Or(vec![a, b]),
        }
    }

    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluate against a concrete item. A field absent from `item` reads
    /// as `FieldValue::Null`.
    #[must_use]
    pub fn eval(&self, item: &Item) -> bool {
        match self {
            Self::True => true,
            Self::And(children) => children.iter().all(|c| c.eval(item)),
            Self::Or(children) => children.iter().any(|c| c.eval(item)),
            Self::Not(inner) => !inner.eval(item),
            Self::Compare(cmp) => eval_compare(cmp, item),
            Self::Contains { field, value } => text_field(item, field).is_some_and(|s| s.contains(value.as_str())),
            Self::HasPrefix { field, value } => {
                text_field(item, field).is_some_and(|s| s.starts_with(value.as_str()))
            }
            Self::HasSuffix { field, value } => {
                text_field(item, field).is_some_and(|s| s.ends_with(value.as_str()))
            }
            Self::IsNull { field } => item.get(field).is_none_or(FieldValue::is_null),
            Self::In { field, values } => {
                let actual = item.get(field).unwrap_or(&FieldValue::Null);
                values.iter().any(|v| v.eq_value(actual))
            }
        }
    }

    /// Field names this predicate reads, for push-down analysis.
    #[must_use]
    pub fn referenced_fields(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::True => {}
            Self::And(children) | Self::Or(children) => {
                for c in children {
                    c.collect_fields(out);
                }
            }
            Self::Not(inner) => inner.collect_fields(out),
            Self::Compare(cmp) => {
                out.insert(&cmp.field);
            }
            Self::Contains { field, .. }
            | Self::HasPrefix { field, .. }
            | Self::HasSuffix { field, .. }
            | Self::IsNull { field }
            | Self::In { field, .. } => {
                out.insert(field);
            }
        }
    }

    /// Normalize to disjunctive normal form: a list of conjunctions, each a
    /// flat list of non-`And`/`Or` literals (negation is pushed to the
    /// leaves). The planner picks a single-index plan per disjunct
    /// (spec.md §4.6 "Planner").
    #[must_use]
    pub fn to_dnf(&self) -> Vec<Vec<Predicate>> {
        push_not(self, false)
            .into_iter()
            .map(|conjunction| conjunction.into_iter().collect())
            .collect()
    }
}

fn text_field<'a>(item: &'a Item, field: &str) -> Option<&'a str> {
    match item.get(field) {
        Some(FieldValue::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

fn eval_compare(cmp: &ComparePredicate, item: &Item) -> bool {
    let actual = item.get(&cmp.field).unwrap_or(&FieldValue::Null);
    match cmp.op {
        CompareOp::Eq => actual.eq_value(&cmp.value),
        CompareOp::Ne => !actual.eq_value(&cmp.value),
        CompareOp::Lt => actual.total_cmp(&cmp.value).is_lt(),
        CompareOp::Lte => actual.total_cmp(&cmp.value).is_le(),
        CompareOp::Gt => actual.total_cmp(&cmp.value).is_gt(),
        CompareOp::Gte => actual.total_cmp(&cmp.value).is_ge(),
    }
}

/// DNF conversion by structural recursion, pushing `Not` to the leaves via
/// De Morgan and then distributing `And` over `Or`. Each returned disjunct
/// is a conjunction (`Vec<Predicate>`) of non-combinator predicates.
fn push_not(predicate: &Predicate, negate: bool) -> Vec<Vec<Predicate>> {
    match predicate {
        Predicate::True => {
            if negate {
                Vec::new()
            } else {
                vec![vec![Predicate::True]]
            }
        }
        Predicate::Not(inner) => push_not(inner, !negate),
        Predicate::And(children) if !negate => distribute_and(children),
        Predicate::And(children) => {
            // De Morgan: not(and(a,b,..)) = or(not a, not b, ..)
            children.iter().flat_map(|c| push_not(c, true)).collect()
        }
        Predicate::Or(children) if !negate => children.iter().flat_map(|c| push_not(c, false)).collect(),
        Predicate::Or(children) => {
            // not(or(a,b,..)) = and(not a, not b, ..)
            distribute_and_dnf(children.iter().map(|c| push_not(c, true)).collect())
        }
        leaf => vec![vec![negate_leaf(leaf, negate)]],
    }
}

fn negate_leaf(leaf: &Predicate, negate: bool) -> Predicate {
    if !negate {
        return leaf.clone();
    }
    Predicate::Not(Box::new(leaf.clone()))
}

fn distribute_and(children: &[Predicate]) -> Vec<Vec<Predicate>> {
    distribute_and_dnf(children.iter().map(|c| push_not(c, false)).collect())
}

/// Cartesian product of each child's disjunct list, concatenating the
/// conjunctions — the standard AND-over-OR distribution step of DNF
/// conversion.
fn distribute_and_dnf(per_child: Vec<Vec<Vec<Predicate>>>) -> Vec<Vec<Predicate>> {
    per_child.into_iter().fold(vec![Vec::new()], |acc, child_disjuncts| {
        let mut out = Vec::with_capacity(acc.len() * child_disjuncts.len().max(1));
        for prefix in &acc {
            for disjunct in &child_disjuncts {
                let mut combined = prefix.clone();
                combined.extend(disjunct.clone());
                out.push(combined);
            }
        }
        out
    })
}
