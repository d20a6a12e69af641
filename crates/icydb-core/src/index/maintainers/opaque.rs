//! Module: index::maintainers::opaque
//! Responsibility: the shared marker-key maintainer for index kinds
//! spec.md §4.3 leaves opaque beyond the general contract — bitmap,
//! leaderboard, vector, fulltext, spatial, relationship. Only their tests
//! and query entry points are specified, not a key layout, so this
//! maintainer stores one marker key per `(extractor output, pk)` pair and
//! lets the query layer interpret the payload.
//! Does not own: vector similarity search, fulltext tokenization, spatial
//! indexing, or relationship traversal algorithms — those live in the
//! query-execution modules and read this maintainer's keys as their raw
//! index, not the other way around.
//! Boundary: one `OpaqueMaintainer` per opaque-kind index descriptor;
//! `extract` is supplied by the caller per kind (e.g. a vector kind
//! supplies an embedding quantizer, a fulltext kind a tokenizer).

use crate::index::contracts::{IndexMaintainer, Item};
use icydb_error::InternalError;
use icydb_primitives::FieldValue;

/// Given an item, produce zero or more raw key-component tuples this
/// maintainer should index it under. Kind-specific (vector quantization,
/// fulltext tokenization, spatial cell covering, ...).
pub type Extractor = dyn Fn(&Item) -> Result<Vec<Vec<FieldValue>>, InternalError> + Send + Sync;

pub struct OpaqueMaintainer {
    pub name: String,
    pub index: crate::subspace::Subspace,
    extract: Box<Extractor>,
}

impl OpaqueMaintainer {
    pub fn new(
        name: impl Into<String>,
        index: crate::subspace::Subspace,
        extract: Box<Extractor>,
    ) -> Self {
        Self {
            name: name.into(),
            index,
            extract,
        }
    }
}

impl IndexMaintainer for OpaqueMaintainer {
    fn compute_index_keys(&self, item: &Item, pk: &[u8]) -> Result<Vec<Vec<u8>>, InternalError> {
        let mut keys = Vec::new();
        for mut tuple in (self.extract)(item)? {
            tuple.push(FieldValue::Data(pk.to_vec()));
            keys.push(self.index.pack(&tuple)?);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemStore, Store};
    use crate::subspace::Subspace;

    fn tag_extractor(item: &Item) -> Result<Vec<Vec<FieldValue>>, InternalError> {
        match item.get("tag") {
            Some(FieldValue::String(s)) => Ok(vec![vec![FieldValue::String(s.clone())]]),
            _ => Ok(Vec::new()),
        }
    }

    #[test]
    fn marker_keys_follow_extractor_output() {
        let store = MemStore::new();
        let maintainer = OpaqueMaintainer::new(
            "tags",
            Subspace::root(b"idx".to_vec()),
            Box::new(tag_extractor),
        );

        let mut item = Item::new();
        item.insert("tag".to_string(), FieldValue::String("rust".to_string()));

        store
            .run(|txn| maintainer.update_index(None, Some(&item), b"p1", txn))
            .unwrap();

        let (begin, end) = maintainer.index.range();
        let rows = store
            .run(|txn| {
                txn.get_range(
                    crate::kv::KeySelector::first_greater_or_equal(begin.clone()),
                    crate::kv::KeySelector::first_greater_or_equal(end.clone()),
                    crate::kv::RangeOptions::default(),
                )
            })
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
