use crate::validate::{ErrorTree, ValidateNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};

///
/// IndexKind
///
/// One identifier per maintainer kind, spec.md §3 "Index descriptor".
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    Scalar,
    Composite,
    Vector,
    FullText,
    Spatial,
    Rank,
    Permuted,
    Graph,
    Aggregation,
    Version,
    Bitmap,
    Leaderboard,
    Relationship,
}

impl IndexKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Composite => "composite",
            Self::Vector => "vector",
            Self::FullText => "fulltext",
            Self::Spatial => "spatial",
            Self::Rank => "rank",
            Self::Permuted => "permuted",
            Self::Graph => "graph",
            Self::Aggregation => "aggregation",
            Self::Version => "version",
            Self::Bitmap => "bitmap",
            Self::Leaderboard => "leaderboard",
            Self::Relationship => "relationship",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "scalar" => Self::Scalar,
            "composite" => Self::Composite,
            "vector" => Self::Vector,
            "fulltext" => Self::FullText,
            "spatial" => Self::Spatial,
            "rank" => Self::Rank,
            "permuted" => Self::Permuted,
            "graph" => Self::Graph,
            "aggregation" => Self::Aggregation,
            "version" => Self::Version,
            "bitmap" => Self::Bitmap,
            "leaderboard" => Self::Leaderboard,
            "relationship" => Self::Relationship,
            _ => return None,
        })
    }
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

///
/// MetaValue
///
/// Opaque kind-specific metadata value (vector dimensions, graph strategy,
/// …) — a small closed value algebra so it round-trips through YAML and
/// CBOR without needing a full dynamic-typing dependency.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

pub type MetaMap = BTreeMap<String, MetaValue>;

///
/// IndexDescriptor
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub kind: IndexKind,
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub sparse: bool,
    #[serde(default)]
    pub metadata: MetaMap,
}

impl IndexDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: IndexKind, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            fields,
            unique: false,
            sparse: false,
            metadata: MetaMap::new(),
        }
    }

    #[must_use]
    pub const fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    #[must_use]
    pub const fn with_sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: MetaValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        match self.metadata.get(key) {
            Some(MetaValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn meta_int(&self, key: &str) -> Option<i64> {
        match self.metadata.get(key) {
            Some(MetaValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Whether `self`'s field prefix is a strict prefix of `other`'s —
    /// used by the permuted maintainer and the planner to decide whether a
    /// narrower index can serve a broader equality pattern.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.fields.len() < other.fields.len() && other.fields.starts_with(&self.fields)
    }
}

impl Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields.join(", ");
        if self.unique {
            write!(f, "{} UNIQUE {} ({fields})", self.kind, self.name)
        } else {
            write!(f, "{} {} ({fields})", self.kind, self.name)
        }
    }
}

impl ValidateNode for IndexDescriptor {
    fn validate(&self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();
        if self.fields.is_empty() {
            errs.add_message(format!("index {} declares no fields", self.name));
        }
        if self.kind == IndexKind::Graph && self.fields.len() < 2 {
            errs.add_message(format!(
                "graph index {} requires at least from/to fields",
                self.name
            ));
        }
        errs.result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_relationship_requires_strict_prefix() {
        let a = IndexDescriptor::new("a", IndexKind::Composite, vec!["x".into()]);
        let b = IndexDescriptor::new("b", IndexKind::Composite, vec!["x".into(), "y".into()]);
        assert!(a.is_prefix_of(&b));
        assert!(!b.is_prefix_of(&a));
        assert!(!a.is_prefix_of(&a));
    }

    #[test]
    fn kind_round_trips_through_name() {
        for kind in [
            IndexKind::Scalar,
            IndexKind::Composite,
            IndexKind::Vector,
            IndexKind::FullText,
            IndexKind::Spatial,
            IndexKind::Rank,
            IndexKind::Permuted,
            IndexKind::Graph,
            IndexKind::Aggregation,
            IndexKind::Version,
            IndexKind::Bitmap,
            IndexKind::Leaderboard,
            IndexKind::Relationship,
        ] {
            assert_eq!(IndexKind::parse(kind.name()), Some(kind));
        }
    }
}
