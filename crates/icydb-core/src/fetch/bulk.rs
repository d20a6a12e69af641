//! Module: fetch::bulk
//! Responsibility: the bulk primary-key → item fetcher (spec.md §4.11) —
//! locality reordering, batched transactional fetch, and a streaming
//! low-latency variant.
//! Does not own: the item key convention (`[items-subspace][pk]`, the
//! same one `query::executor` uses) or the parallel coordinator
//! (`fetch::parallel`).
//! Boundary: `BulkFetcher::fetch`/`fetch_streaming` are the only entry
//! points; both reassemble results in request order regardless of the
//! order keys were actually read in.

use crate::index::contracts::Item;
use crate::kv::Transaction;
use crate::subspace::Subspace;
use icydb_error::{ErrorClass, ErrorOrigin, InternalError};
use icydb_primitives::FieldValue;

#[derive(Clone, Copy, Debug)]
pub struct FetchOptions {
    pub batch_size: usize,
    pub use_locality_hints: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            use_locality_hints: true,
        }
    }
}

pub struct BulkFetcher<'a> {
    pub items: &'a Subspace,
}

impl<'a> BulkFetcher<'a> {
    #[must_use]
    pub fn new(items: &'a Subspace) -> Self {
        Self { items }
    }

    /// Fetch every key, batched within `txn`, reassembled in request
    /// order. `options.use_locality_hints` reads storage-adjacent keys
    /// back-to-back (byte-order sort) before restoring caller order.
    pub fn fetch(
        &self,
        keys: &[Vec<u8>],
        options: FetchOptions,
        txn: &mut dyn Transaction,
    ) -> Result<Vec<Option<Item>>, InternalError> {
        let mut out = vec![None; keys.len()];
        self.fetch_streaming(keys, options, txn, |index, item| out[index] = item)?;
        Ok(out)
    }

    /// Low-latency variant: invokes `on_item(request_index, item)` as each
    /// key resolves rather than collecting into a `Vec` first.
    pub fn fetch_streaming(
        &self,
        keys: &[Vec<u8>],
        options: FetchOptions,
        txn: &mut dyn Transaction,
        mut on_item: impl FnMut(usize, Option<Item>),
    ) -> Result<(), InternalError> {
        let order = fetch_order(keys, options.use_locality_hints);

        for chunk in order.chunks(options.batch_size.max(1)) {
            for &request_index in chunk {
                let pk = &keys[request_index];
                let item_key = self.items.pack(&[FieldValue::Data(pk.clone())])?;
                let item = match txn.get(&item_key)? {
                    Some(bytes) => Some(decode_item(&bytes)?),
                    None => None,
                };
                on_item(request_index, item);
            }
        }
        Ok(())
    }
}

/// Request indices in the order keys should actually be read: sorted by
/// key byte order when locality hints are enabled (adjacent keys tend to
/// live on the same storage server page), original request order
/// otherwise.
fn fetch_order(keys: &[Vec<u8>], use_locality_hints: bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    if use_locality_hints {
        order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    }
    order
}

fn decode_item(bytes: &[u8]) -> Result<Item, InternalError> {
    serde_cbor::from_slice(bytes)
        .map_err(|e| InternalError::new(ErrorClass::Corruption, ErrorOrigin::Fetch, format!("decode item: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemStore, Store};

    fn seed(store: &MemStore, items: &Subspace, rows: &[(&str, i64)]) {
        store
            .run(|txn| {
                for (pk, value) in rows {
                    let mut item = Item::new();
                    item.insert("value".to_string(), FieldValue::Int64(*value));
                    let key = items.pack(&[FieldValue::Data(pk.as_bytes().to_vec())])?;
                    txn.set(key, serde_cbor::to_vec(&item).unwrap());
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn fetch_preserves_request_order_regardless_of_locality_sort() {
        let store = MemStore::new();
        let items = Subspace::root(b"items".to_vec());
        seed(&store, &items, &[("c", 3), ("a", 1), ("b", 2)]);

        let fetcher = BulkFetcher::new(&items);
        let keys = vec![b"c".to_vec(), b"a".to_vec(), b"b".to_vec()];
        let results = store
            .run(|txn| fetcher.fetch(&keys, FetchOptions::default(), txn))
            .unwrap();

        let values: Vec<i64> = results
            .into_iter()
            .map(|item| match item.unwrap().get("value").unwrap() {
                FieldValue::Int64(v) => *v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec![3, 1, 2]);
    }

    #[test]
    fn missing_key_resolves_to_none() {
        let store = MemStore::new();
        let items = Subspace::root(b"items".to_vec());
        seed(&store, &items, &[("a", 1)]);

        let fetcher = BulkFetcher::new(&items);
        let keys = vec![b"a".to_vec(), b"missing".to_vec()];
        let results = store
            .run(|txn| fetcher.fetch(&keys, FetchOptions::default(), txn))
            .unwrap();
        assert!(results[0].is_some());
        assert!(results[1].is_none());
    }

    #[test]
    fn streaming_variant_visits_every_index_exactly_once() {
        let store = MemStore::new();
        let items = Subspace::root(b"items".to_vec());
        seed(&store, &items, &[("a", 1), ("b", 2)]);

        let fetcher = BulkFetcher::new(&items);
        let keys = vec![b"a".to_vec(), b"b".to_vec()];
        let mut seen = vec![false; keys.len()];
        store
            .run(|txn| {
                fetcher.fetch_streaming(&keys, FetchOptions::default(), txn, |i, _| seen[i] = true)
            })
            .unwrap();
        assert!(seen.iter().all(|&v| v));
    }
}
