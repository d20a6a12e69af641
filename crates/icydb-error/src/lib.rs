//! Stable error taxonomy shared by every crate in the workspace.
//!
//! `InternalError` is the one error type the core ever constructs by hand;
//! every fallible path converts into it. It is not part of the public API
//! contract (the `icydb` facade re-exports its own `Error` built on top of
//! it) but its `(class, origin)` pair is stable enough to assert on in
//! tests.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
///

#[derive(Debug, ThisError)]
#[error("{origin}:{class}: {message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    #[must_use]
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, origin, message)
    }

    #[must_use]
    pub fn conflict(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Conflict, origin, message)
    }

    #[must_use]
    pub fn invariant(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, origin, message)
    }

    #[must_use]
    pub fn unsupported(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, origin, message)
    }

    #[must_use]
    pub fn transient(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Transient, origin, message)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.class, ErrorClass::Transient)
    }
}

///
/// ErrorClass
///
/// Stable error classification, named directly after spec.md §7's
/// taxonomy table. Two extra classes exist only to carry detail that the
/// public taxonomy collapses into `Unsupported` / `NotFound`:
/// `LimitExceeded` (a bounded algorithm hit its budget) and `Transient`
/// (a retryable KV error the throttler/transaction runner can recover from).
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorClass {
    NotFound,
    UniqueViolation,
    MissingDirectoryFields,
    UnknownEntity,
    UnknownIndex,
    IncompatibleSource,
    LockNotAcquired,
    LockLost,
    LimitExceeded,
    InvalidScore,
    InvariantViolation,
    ParseError,
    Transient,
    Conflict,
    Corruption,
    Internal,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not_found",
            Self::UniqueViolation => "unique_violation",
            Self::MissingDirectoryFields => "missing_directory_fields",
            Self::UnknownEntity => "unknown_entity",
            Self::UnknownIndex => "unknown_index",
            Self::IncompatibleSource => "incompatible_source",
            Self::LockNotAcquired => "lock_not_acquired",
            Self::LockLost => "lock_lost",
            Self::LimitExceeded => "limit_exceeded",
            Self::InvalidScore => "invalid_score",
            Self::InvariantViolation => "invariant_violation",
            Self::ParseError => "parse_error",
            Self::Transient => "transient",
            Self::Conflict => "conflict",
            Self::Corruption => "corruption",
            Self::Internal => "internal",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///
/// The subsystem that raised the error, used to route/triage without
/// parsing the message.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Serialize,
    Store,
    Directory,
    Catalog,
    Index,
    Rank,
    Builder,
    Query,
    Sparql,
    Graph,
    Session,
    Cache,
    Fetch,
    Executor,
    Interface,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Serialize => "serialize",
            Self::Store => "store",
            Self::Directory => "directory",
            Self::Catalog => "catalog",
            Self::Index => "index",
            Self::Rank => "rank",
            Self::Builder => "builder",
            Self::Query => "query",
            Self::Sparql => "sparql",
            Self::Graph => "graph",
            Self::Session => "session",
            Self::Cache => "cache",
            Self::Fetch => "fetch",
            Self::Executor => "executor",
            Self::Interface => "interface",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_origin_and_class() {
        let err = InternalError::not_found(ErrorOrigin::Store, "missing key");
        let rendered = err.to_string();
        assert!(rendered.contains("store"));
        assert!(rendered.contains("not_found"));
        assert!(rendered.contains("missing key"));
    }

    #[test]
    fn is_not_found_only_matches_not_found_class() {
        assert!(InternalError::not_found(ErrorOrigin::Store, "x").is_not_found());
        assert!(!InternalError::conflict(ErrorOrigin::Store, "x").is_not_found());
    }
}
