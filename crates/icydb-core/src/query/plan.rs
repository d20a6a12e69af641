//! Module: query::plan
//! Responsibility: the planner — DNF-normalized predicate → plan tree by
//! cost model, plus `explain()` (spec.md §4.6 "Planner").
//! Does not own: predicate evaluation (`query::predicate`) or plan
//! execution (`query::executor`).
//! Boundary: `Planner::plan` is the only entry point; `PlanNode` is the
//! tree the executor walks.

use crate::query::predicate::Predicate;
use icydb_primitives::FieldValue;
use icydb_schema::{IndexDescriptor, IndexKind};

/// Per-row cost charged by the estimator for scanning a row once it has
/// been located; kept as a named constant rather than a magic `1.0` so the
/// formula in [`IndexCandidate::estimated_cost`] reads as a cost model, not
/// an arbitrary number.
const PER_ROW_COST: f64 = 1.0;

/// Estimated cost credit for a sparse index: scanning it skips rows the
/// indexed expression evaluated to null for, so it is modeled as cheaper
/// than a non-sparse index with the same row estimate.
const SPARSE_CREDIT: f64 = 0.1;

///
/// PlanNode
///
/// The operator tree spec.md §4.6 names: `indexScan`, `primaryFetch`,
/// `filter`, `sort`, `distinct`, `limit`, `offset`, plus `union` for a
/// DNF predicate with more than one disjunct and `fullScan` as the
/// fallback when no index candidate matches.
///

#[derive(Clone, Debug)]
pub enum PlanNode {
    FullScan {
        estimated_rows: u64,
    },
    IndexScan {
        index: String,
        bound_fields: Vec<String>,
        bound_values: Vec<FieldValue>,
        estimated_rows: u64,
    },
    Union(Vec<PlanNode>),
    PrimaryFetch(Box<PlanNode>),
    Filter {
        input: Box<PlanNode>,
        predicate: Predicate,
    },
    Sort {
        input: Box<PlanNode>,
        field: String,
        descending: bool,
    },
    Distinct(Box<PlanNode>),
    Limit {
        input: Box<PlanNode>,
        n: usize,
    },
    Offset {
        input: Box<PlanNode>,
        n: usize,
    },
}

impl PlanNode {
    #[must_use]
    pub fn estimated_cardinality(&self) -> u64 {
        match self {
            Self::FullScan { estimated_rows } | Self::IndexScan { estimated_rows, .. } => *estimated_rows,
            Self::Union(children) => children.iter().map(Self::estimated_cardinality).sum(),
            Self::PrimaryFetch(input)
            | Self::Filter { input, .. }
            | Self::Sort { input, .. }
            | Self::Distinct(input) => input.estimated_cardinality(),
            Self::Limit { input, n } => (*n as u64).min(input.estimated_cardinality()),
            Self::Offset { input, n } => input.estimated_cardinality().saturating_sub(*n as u64),
        }
    }

    /// Human-readable indented tree including estimated cardinalities
    /// (spec.md §4.6 `explain()`).
    #[must_use]
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let line = match self {
            Self::FullScan { estimated_rows } => format!("fullScan (~{estimated_rows} rows)"),
            Self::IndexScan {
                index,
                bound_fields,
                estimated_rows,
                ..
            } => format!(
                "indexScan({index}, bound=[{}]) (~{estimated_rows} rows)",
                bound_fields.join(", ")
            ),
            Self::Union(_) => "union".to_string(),
            Self::PrimaryFetch(_) => "primaryFetch".to_string(),
            Self::Filter { .. } => "filter".to_string(),
            Self::Sort { field, descending, .. } => {
                format!("sort({field}, {})", if *descending { "desc" } else { "asc" })
            }
            Self::Distinct(_) => "distinct".to_string(),
            Self::Limit { n, .. } => format!("limit({n})"),
            Self::Offset { n, .. } => format!("offset({n})"),
        };
        out.push_str(&indent);
        out.push_str(&line);
        out.push('\n');
        for child in self.children() {
            child.explain_into(out, depth + 1);
        }
    }

    fn children(&self) -> Vec<&PlanNode> {
        match self {
            Self::FullScan { .. } | Self::IndexScan { .. } => Vec::new(),
            Self::Union(children) => children.iter().collect(),
            Self::PrimaryFetch(input)
            | Self::Filter { input, .. }
            | Self::Sort { input, .. }
            | Self::Distinct(input)
            | Self::Limit { input, .. }
            | Self::Offset { input, .. } => vec![input.as_ref()],
        }
    }
}

struct IndexCandidate<'a> {
    descriptor: &'a IndexDescriptor,
    bound: Vec<String>,
    bound_values: Vec<FieldValue>,
}

impl IndexCandidate<'_> {
    fn estimated_rows(&self, total_rows: u64) -> u64 {
        let selectivity = 10u64.saturating_pow(u32::try_from(self.bound.len()).unwrap_or(u32::MAX));
        (total_rows / selectivity.max(1)).max(1)
    }

    fn estimated_cost(&self, total_rows: u64) -> f64 {
        let rows = self.estimated_rows(total_rows) as f64;
        let mut cost = rows * PER_ROW_COST;
        if self.descriptor.sparse {
            cost -= SPARSE_CREDIT * rows;
        }
        cost
    }
}

///
/// Planner
///
/// Normalizes the predicate to DNF and, for each disjunct, picks the
/// scalar/composite index whose leading fields are bound by `Eq`
/// comparisons the cost model ranks cheapest; falls back to `fullScan`
/// when no index's leading field is bound at all (spec.md §4.6).
///

pub struct Planner<'a> {
    pub indexes: &'a [IndexDescriptor],
    pub total_rows_estimate: u64,
}

impl<'a> Planner<'a> {
    #[must_use]
    pub fn new(indexes: &'a [IndexDescriptor], total_rows_estimate: u64) -> Self {
        Self {
            indexes,
            total_rows_estimate,
        }
    }

    #[must_use]
    pub fn plan(&self, predicate: Option<&Predicate>) -> PlanNode {
        let Some(predicate) = predicate else {
            return PlanNode::FullScan {
                estimated_rows: self.total_rows_estimate,
            };
        };

        let disjuncts = predicate.to_dnf();
        let mut branches: Vec<PlanNode> = disjuncts
            .iter()
            .map(|conjunction| self.plan_conjunction(conjunction))
            .collect();

        if branches.len() == 1 {
            branches.remove(0)
        } else {
            PlanNode::Union(branches)
        }
    }

    fn plan_conjunction(&self, conjunction: &[Predicate]) -> PlanNode {
        let eq_fields = bound_eq_fields(conjunction);
        let best = self
            .indexes
            .iter()
            .filter_map(|descriptor| candidate_for(descriptor, &eq_fields))
            .min_by(|a, b| a.estimated_cost(self.total_rows_estimate).total_cmp(&b.estimated_cost(self.total_rows_estimate)));

        let scan = match best {
            Some(candidate) => PlanNode::IndexScan {
                index: candidate.descriptor.name.clone(),
                estimated_rows: candidate.estimated_rows(self.total_rows_estimate),
                bound_fields: candidate.bound,
                bound_values: candidate.bound_values,
            },
            None => PlanNode::FullScan {
                estimated_rows: self.total_rows_estimate,
            },
        };
        let fetch = PlanNode::PrimaryFetch(Box::new(scan));
        PlanNode::Filter {
            input: Box::new(fetch),
            predicate: Predicate::And(conjunction.to_vec()),
        }
    }
}

fn bound_eq_fields(conjunction: &[Predicate]) -> Vec<(&str, &FieldValue)> {
    conjunction
        .iter()
        .filter_map(|p| match p {
            Predicate::Compare(cmp) if cmp.op == crate::query::predicate::CompareOp::Eq => {
                Some((cmp.field.as_str(), &cmp.value))
            }
            _ => None,
        })
        .collect()
}

/// Longest leading prefix of `descriptor.fields` fully covered by
/// `eq_fields`, as an index-selection candidate — `None` if the index's
/// first field isn't bound at all.
fn candidate_for<'a>(
    descriptor: &'a IndexDescriptor,
    eq_fields: &[(&str, &FieldValue)],
) -> Option<IndexCandidate<'a>> {
    if !matches!(descriptor.kind, IndexKind::Scalar | IndexKind::Composite) {
        return None;
    }
    let mut bound = Vec::new();
    let mut bound_values = Vec::new();
    for field in &descriptor.fields {
        match eq_fields.iter().find(|(name, _)| name == field) {
            Some((_, value)) => {
                bound.push(field.clone());
                bound_values.push((*value).clone());
            }
            None => break,
        }
    }
    if bound.is_empty() {
        None
    } else {
        Some(IndexCandidate {
            descriptor,
            bound,
            bound_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::predicate::CompareOp;
    use icydb_primitives::FieldValue;

    fn scalar_index(name: &str, fields: &[&str]) -> IndexDescriptor {
        IndexDescriptor {
            name: name.to_string(),
            kind: IndexKind::Scalar,
            fields: fields.iter().map(|s| s.to_string()).collect(),
            unique: false,
            sparse: false,
            metadata: Default::default(),
        }
    }

    #[test]
    fn no_predicate_is_a_full_scan() {
        let planner = Planner::new(&[], 1000);
        let plan = planner.plan(None);
        assert!(matches!(plan, PlanNode::FullScan { estimated_rows: 1000 }));
    }

    #[test]
    fn eq_predicate_with_matching_index_picks_index_scan() {
        let indexes = vec![scalar_index("by_email", &["email"])];
        let planner = Planner::new(&indexes, 1000);
        let predicate = Predicate::compare("email", CompareOp::Eq, FieldValue::String("a@x".into()));
        let plan = planner.plan(Some(&predicate));
        let PlanNode::Filter { input, .. } = plan else {
            panic!("expected filter at the root");
        };
        let PlanNode::PrimaryFetch(scan) = *input else {
            panic!("expected primary fetch under filter");
        };
        assert!(matches!(*scan, PlanNode::IndexScan { .. }));
    }

    #[test]
    fn unmatched_predicate_falls_back_to_full_scan() {
        let indexes = vec![scalar_index("by_email", &["email"])];
        let planner = Planner::new(&indexes, 1000);
        let predicate = Predicate::compare("age", CompareOp::Eq, FieldValue::Int64(30));
        let plan = planner.plan(Some(&predicate));
        let PlanNode::Filter { input, .. } = plan else {
            panic!("expected filter at the root");
        };
        let PlanNode::PrimaryFetch(scan) = *input else {
            panic!("expected primary fetch under filter");
        };
        assert!(matches!(*scan, PlanNode::FullScan { .. }));
    }

    #[test]
    fn or_predicate_produces_a_union_of_branches() {
        let indexes = vec![scalar_index("by_email", &["email"]), scalar_index("by_name", &["name"])];
        let planner = Planner::new(&indexes, 1000);
        let predicate = Predicate::compare("email", CompareOp::Eq, FieldValue::String("a@x".into()))
            .or(Predicate::compare("name", CompareOp::Eq, FieldValue::String("alice".into())));
        let plan = planner.plan(Some(&predicate));
        assert!(matches!(plan, PlanNode::Union(branches) if branches.len() == 2));
    }

    #[test]
    fn explain_renders_an_indented_tree() {
        let indexes = vec![scalar_index("by_email", &["email"])];
        let planner = Planner::new(&indexes, 1000);
        let predicate = Predicate::compare("email", CompareOp::Eq, FieldValue::String("a@x".into()));
        let plan = planner.plan(Some(&predicate));
        let explained = plan.explain();
        assert!(explained.contains("filter"));
        assert!(explained.contains("indexScan(by_email"));
    }
}
