//! Module: error
//! Responsibility: the public error surface (spec.md §7) — wraps
//! `icydb_core::error::InternalError` without inventing a second
//! taxonomy, since `ErrorClass`/`ErrorOrigin` already name exactly the
//! stable external kinds spec.md §7's table lists.
//! Does not own: error construction (every crate below this one builds
//! `InternalError`s directly); this module only converts.
//! Boundary: `Error::from(InternalError)` is the one conversion path.

use icydb_error::{ErrorClass, ErrorOrigin, InternalError};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// Error
///
/// Public error type. Carries the same `(class, origin, message)` shape
/// `InternalError` does — there's no information the public surface
/// drops, so the conversion is lossless rather than collapsing into a
/// smaller enum.
///

#[derive(Clone, Debug, Deserialize, Serialize, ThisError)]
#[error("{origin}:{class}: {message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    #[must_use]
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        Self {
            class: err.class,
            origin: err.origin,
            message: err.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_from_internal_error_preserves_class_origin_and_message() {
        let internal = InternalError::not_found(ErrorOrigin::Store, "missing key");
        let public = Error::from(internal);
        assert_eq!(public.class, ErrorClass::NotFound);
        assert_eq!(public.origin, ErrorOrigin::Store);
        assert_eq!(public.message, "missing key");
    }
}
