//! Module: query::builder
//! Responsibility: the fluent query chain spec.md §4.6 describes —
//! `.where_(p).order_by(...).limit(n).offset(n).partition(...).cache_policy(...)`.
//! Does not own: planning (`query::plan`) or execution (`query::executor`).
//! Boundary: `QueryBuilder::build` is the only way a `Query` is produced.

use crate::query::predicate::Predicate;
use icydb_primitives::FieldValue;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CachePolicy {
    Bypass,
    ReadThrough,
    ReadOnly,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::Bypass
    }
}

///
/// Query
///
/// The finalized, immutable description a `Planner` consumes. Bound to an
/// entity by name rather than compile-time generics: this workspace has no
/// per-entity codegen crate, so the type-safety spec.md §4.6 describes is
/// enforced at `QueryBuilder` construction time by callers, not by the
/// compiler.
///

#[derive(Clone, Debug)]
pub struct Query {
    pub entity: String,
    pub predicate: Option<Predicate>,
    pub order_by: Option<(String, SortDirection)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub partition: Option<(String, FieldValue)>,
    pub cache_policy: CachePolicy,
}

///
/// QueryBuilder
///

pub struct QueryBuilder {
    entity: String,
    predicate: Option<Predicate>,
    order_by: Option<(String, SortDirection)>,
    limit: Option<usize>,
    offset: Option<usize>,
    partition: Option<(String, FieldValue)>,
    cache_policy: CachePolicy,
}

impl QueryBuilder {
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicate: None,
            order_by: None,
            limit: None,
            offset: None,
            partition: None,
            cache_policy: CachePolicy::default(),
        }
    }

    #[must_use]
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    #[must_use]
    pub const fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    #[must_use]
    pub fn partition(mut self, field: impl Into<String>, equals: FieldValue) -> Self {
        self.partition = Some((field.into(), equals));
        self
    }

    #[must_use]
    pub const fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    #[must_use]
    pub fn build(self) -> Query {
        Query {
            entity: self.entity,
            predicate: self.predicate,
            order_by: self.order_by,
            limit: self.limit,
            offset: self.offset,
            partition: self.partition,
            cache_policy: self.cache_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::predicate::CompareOp;

    #[test]
    fn where_calls_combine_with_and() {
        let query = QueryBuilder::new("user")
            .where_(Predicate::compare("age", CompareOp::Gte, FieldValue::Int64(18)))
            .where_(Predicate::compare("active", CompareOp::Eq, FieldValue::Bool(true)))
            .build();
        assert!(matches!(query.predicate, Some(Predicate::And(children)) if children.len() == 2));
    }

    #[test]
    fn chain_sets_every_field() {
        let query = QueryBuilder::new("user")
            .order_by("name", SortDirection::Descending)
            .limit(10)
            .offset(5)
            .partition("region", FieldValue::String("eu".into()))
            .cache_policy(CachePolicy::ReadThrough)
            .build();
        assert_eq!(query.entity, "user");
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
        assert_eq!(query.cache_policy, CachePolicy::ReadThrough);
        assert_eq!(query.order_by.unwrap().1, SortDirection::Descending);
    }
}
