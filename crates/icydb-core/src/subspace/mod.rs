//! Module: subspace
//! Responsibility: subspace byte-prefix algebra and the directory-path
//! resolver that maps an entity's dynamic partition bindings onto a
//! concrete subspace (spec.md §4.1).
//! Does not own: index key layout within a resolved subspace (see
//! `index::contracts`).
//! Boundary: every persisted key in this crate is built by packing a tuple
//! into a `Subspace` returned from here.

mod directory;
mod tuple;

pub use directory::{DirectoryPath, DirectoryResolver};
pub use tuple::{decode_component, encode_component};

use icydb_error::InternalError;
use icydb_primitives::FieldValue;

///
/// Subspace
///
/// An immutable ordered-byte prefix. Child subspaces are formed by
/// appending a length-prefixed segment to the parent's prefix, so two
/// subspaces whose component sequences differ only in a common trailing
/// suffix never alias.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    #[must_use]
    pub fn root(prefix: impl Into<Vec<u8>>) -> Self {
        Self { prefix: prefix.into() }
    }

    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Derive a child subspace by appending a length-prefixed component.
    #[must_use]
    pub fn subspace(&self, component: &[u8]) -> Self {
        let mut prefix = self.prefix.clone();
        let len = u32::try_from(component.len()).unwrap_or(u32::MAX);
        prefix.extend_from_slice(&len.to_be_bytes());
        prefix.extend_from_slice(component);
        Self { prefix }
    }

    /// Pack a tuple of values into a key under this subspace.
    pub fn pack(&self, tuple: &[FieldValue]) -> Result<Vec<u8>, InternalError> {
        let mut key = self.prefix.clone();
        for value in tuple {
            key.extend_from_slice(&encode_component(value)?);
        }
        Ok(key)
    }

    /// Unpack a key previously produced by [`Subspace::pack`] back into its
    /// tuple of values.
    pub fn unpack(&self, key: &[u8]) -> Result<Vec<FieldValue>, InternalError> {
        if !self.contains(key) {
            return Err(InternalError::invariant(
                icydb_error::ErrorOrigin::Directory,
                "key does not belong to this subspace",
            ));
        }
        let mut offset = self.prefix.len();
        let mut values = Vec::new();
        while offset < key.len() {
            values.push(decode_component(key, &mut offset)?);
        }
        Ok(values)
    }

    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }

    /// `[begin, end)` covering every key in this subspace, via the
    /// standard "increment the last non-0xFF byte, drop the rest"
    /// successor trick.
    #[must_use]
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        (self.prefix.clone(), strinc(&self.prefix))
    }
}

/// Smallest byte string greater than every string with `prefix` as a
/// prefix. Returns a string of `0xFF` bytes one byte longer than `prefix`
/// when `prefix` is all `0xFF` (or empty).
fn strinc(prefix: &[u8]) -> Vec<u8> {
    let mut out = prefix.to_vec();
    while let Some(&last) = out.last() {
        if last != 0xFF {
            *out.last_mut().unwrap() += 1;
            return out;
        }
        out.pop();
    }
    let mut fallback = prefix.to_vec();
    fallback.push(0xFF);
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trips() {
        let sub = Subspace::root(b"entities".to_vec());
        let tuple = vec![FieldValue::String("alice".into()), FieldValue::Int64(7)];
        let key = sub.pack(&tuple).unwrap();
        let back = sub.unpack(&key).unwrap();
        assert_eq!(back.len(), tuple.len());
        for (a, b) in back.iter().zip(tuple.iter()) {
            assert!(a.eq_value(b));
        }
    }

    #[test]
    fn child_subspaces_do_not_alias_on_shared_suffix() {
        let root = Subspace::root(b"r".to_vec());
        let a = root.subspace(b"ab").subspace(b"c");
        let b = root.subspace(b"a").subspace(b"bc");
        assert_ne!(a.prefix(), b.prefix());
    }

    #[test]
    fn range_covers_all_packed_keys_and_nothing_else() {
        let sub = Subspace::root(b"r".to_vec());
        let (begin, end) = sub.range();
        let key = sub.pack(&[FieldValue::Int64(1)]).unwrap();
        assert!(key.as_slice() >= begin.as_slice());
        assert!(key.as_slice() < end.as_slice());

        let other = Subspace::root(b"s".to_vec());
        let other_key = other.pack(&[FieldValue::Int64(1)]).unwrap();
        assert!(!(other_key.as_slice() >= begin.as_slice() && other_key.as_slice() < end.as_slice()));
    }

    #[test]
    fn contains_checks_prefix() {
        let sub = Subspace::root(b"r".to_vec());
        let key = sub.pack(&[FieldValue::Bool(true)]).unwrap();
        assert!(sub.contains(&key));
        assert!(!Subspace::root(b"other".to_vec()).contains(&key));
    }
}
