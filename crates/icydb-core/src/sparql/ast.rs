//! Module: sparql::ast
//! Responsibility: the graph-pattern AST (spec.md §4.6) — basic graph
//! patterns, the Boolean/algebraic combinators (`join`, `optional`,
//! `union`, `filter`, `minus`), named-graph scoping, property paths,
//! `groupBy`, and the best-effort surface forms (`lateral`, `service`,
//! `values`, `subquery`, `bind`).
//! Does not own: conversion to an executable form (`sparql::convert`) or
//! execution itself (`sparql::execute`).
//! Boundary: this tree is produced by a caller (a parsed query, or one
//! built programmatically); nothing in this module touches storage.

use crate::query::predicate::Predicate;
use crate::sparql::path::PropertyPath;
use icydb_primitives::FieldValue;

/// One position of a triple pattern: bound to a concrete term or free as a
/// variable.
#[derive(Clone, Debug)]
pub enum Term {
    Var(String),
    Iri(String),
    Literal(FieldValue),
    /// An RDF-star quoted triple used as a subject or object. Kept as a
    /// structured three-place term rather than flattened into a
    /// `FieldValue`, so it stays queryable as a triple; no storage layer
    /// in this crate indexes a quoted triple as a value, so it can only
    /// appear already-bound (constructed by the caller), never resolved
    /// from a scan — `sparql::execute::TripleIndex::term_value` returns
    /// `None` for a `Var` bound to one.
    QuotedTriple(Box<Triple>),
}

impl Term {
    #[must_use]
    pub fn is_bound(&self) -> bool {
        !matches!(self, Self::Var(_))
    }
}

#[derive(Clone, Debug)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

/// A `groupBy` aggregate, each naming the field it reads.
#[derive(Clone, Debug)]
pub enum Aggregate {
    Count(String),
    Sum(String),
    Min(String),
    Max(String),
    Avg(String),
}

///
/// GraphPattern
///

#[derive(Clone, Debug)]
pub enum GraphPattern {
    Basic(Vec<Triple>),
    Join(Box<GraphPattern>, Box<GraphPattern>),
    Optional(Box<GraphPattern>, Box<GraphPattern>),
    Union(Box<GraphPattern>, Box<GraphPattern>),
    Filter(Box<GraphPattern>, Predicate),
    Minus(Box<GraphPattern>, Box<GraphPattern>),
    Graph(Term, Box<GraphPattern>),
    PropertyPath {
        subject: Term,
        path: PropertyPath,
        object: Term,
    },
    GroupBy {
        input: Box<GraphPattern>,
        group_vars: Vec<String>,
        aggregates: Vec<(String, Aggregate)>,
        having: Option<Predicate>,
    },
    /// Correlated join: the right pattern is re-evaluated once per left
    /// binding, seeded with that binding.
    Lateral(Box<GraphPattern>, Box<GraphPattern>),
    /// No remote service exists in this crate; converts to an empty BGP.
    Service(Box<GraphPattern>),
    /// An inline binding table; converts to an empty BGP (no literal-row
    /// source exists to join against).
    Values(Vec<String>, Vec<Vec<FieldValue>>),
    /// Converts to its inner pattern; the subquery boundary isn't enforced
    /// (no separate projection/scoping step exists to enforce it against).
    Subquery(Box<GraphPattern>),
    /// Converts to its inner pattern; the assignment itself is dropped.
    Bind {
        input: Box<GraphPattern>,
        var: String,
        value: FieldValue,
    },
}
