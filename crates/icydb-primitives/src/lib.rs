//! Primitive value representation shared by the schema, predicate, and
//! index layers.
//!
//! Binary tuple encoding of keys is an external collaborator (spec.md §1);
//! this crate only defines the *logical* tagged value the rest of the core
//! reasons about before/after that encoding step.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

///
/// PrimitiveType
///
/// The seven scalar tags an entity field may carry, per spec.md §3.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    String,
    Int64,
    Double,
    Bool,
    Data,
    Date,
    Uuid,
}

impl PrimitiveType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int64 => "int64",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::Data => "data",
            Self::Date => "date",
            Self::Uuid => "uuid",
        }
    }

    /// Parse the YAML primitive spellings, including the `int`/`float`
    /// aliases the catalog's inline field syntax accepts (spec.md §6).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "int" | "int64" => Some(Self::Int64),
            "double" | "float" => Some(Self::Double),
            "bool" => Some(Self::Bool),
            "data" => Some(Self::Data),
            "date" => Some(Self::Date),
            "uuid" => Some(Self::Uuid),
            _ => None,
        }
    }

    /// Whether this scalar participates in numeric ordering (used by rank
    /// score validation, §4.5 / §7 `invalid-score`).
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int64 | Self::Double)
    }
}

///
/// FieldValue
///
/// A tagged runtime value. `Null` represents a missing/optional field
/// (drives the sparse-index convention, spec.md §4.3); `Array` represents
/// an `isArray` field's contents.
///

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    String(String),
    Int64(i64),
    Double(f64),
    Bool(bool),
    Data(Vec<u8>),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    Uuid([u8; 16]),
    Array(Vec<FieldValue>),
}

impl FieldValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn type_tag(&self) -> Option<PrimitiveType> {
        match self {
            Self::Null | Self::Array(_) => None,
            Self::String(_) => Some(PrimitiveType::String),
            Self::Int64(_) => Some(PrimitiveType::Int64),
            Self::Double(_) => Some(PrimitiveType::Double),
            Self::Bool(_) => Some(PrimitiveType::Bool),
            Self::Data(_) => Some(PrimitiveType::Data),
            Self::Date(_) => Some(PrimitiveType::Date),
            Self::Uuid(_) => Some(PrimitiveType::Uuid),
        }
    }

    /// Narrow a wider numeric value to `i64`, for maintainers (the simple
    /// rank maintainer in particular, spec.md §9 open question) that need a
    /// score as `i64`.
    ///
    /// Policy decision (spec.md §9, open question 1): **reject-on-overflow**.
    /// A double that does not fit losslessly into an `i64`, or one with a
    /// fractional part, is an `invalid-score` error rather than a silent
    /// truncation — truncating or wrapping would make `rank`/`topK` silently
    /// disagree with the value the caller inserted.
    pub fn narrow_to_i64(&self) -> Result<i64, NarrowError> {
        match self {
            Self::Int64(v) => Ok(*v),
            Self::Double(v) => {
                if v.fract() != 0.0 || !v.is_finite() {
                    return Err(NarrowError::NotIntegral);
                }
                #[allow(clippy::cast_possible_truncation)]
                let truncated = *v as i64;
                if (truncated as f64) == *v {
                    Ok(truncated)
                } else {
                    Err(NarrowError::Overflow)
                }
            }
            Self::Null => Err(NarrowError::Null),
            _ => Err(NarrowError::NotNumeric),
        }
    }

    /// Total ordering over field values of the *same* logical type,
    /// breaking ties the way the skip list and scalar index need: by
    /// underlying byte/numeric order. Cross-type comparisons order by
    /// type-tag discriminant first so a mixed-type collection still has a
    /// deterministic order (used only by defensive fallbacks; within one
    /// index all values share a field's declared type).
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &FieldValue) -> u8 {
            match v {
                FieldValue::Null => 0,
                FieldValue::Bool(_) => 1,
                FieldValue::Int64(_) => 2,
                FieldValue::Double(_) => 3,
                FieldValue::String(_) => 4,
                FieldValue::Data(_) => 5,
                FieldValue::Date(_) => 6,
                FieldValue::Uuid(_) => 7,
                FieldValue::Array(_) => 8,
            }
        }

        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int64(a), Self::Int64(b)) => a.cmp(b),
            (Self::Double(a), Self::Double(b)) => a.total_cmp(b),
            (Self::Int64(a), Self::Double(b)) => (*a as f64).total_cmp(b),
            (Self::Double(a), Self::Int64(b)) => a.total_cmp(&(*b as f64)),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Data(a), Self::Data(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Uuid(a), Self::Uuid(b)) => a.cmp(b),
            (Self::Array(a), Self::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.total_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => rank(self).cmp(&rank(other)),
        }
    }

    #[must_use]
    pub fn eq_value(&self, other: &Self) -> bool {
        self.total_cmp(other) == Ordering::Equal
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum NarrowError {
    #[error("value is null")]
    Null,
    #[error("value is not numeric")]
    NotNumeric,
    #[error("value has a fractional part")]
    NotIntegral,
    #[error("value overflows i64")]
    Overflow,
}
