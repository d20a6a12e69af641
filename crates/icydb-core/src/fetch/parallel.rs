//! Module: fetch::parallel
//! Responsibility: the parallel fetch coordinator (spec.md §4.11) — splits
//! keys into N chunks, each read inside its own transaction on its own
//! thread, for read-only workloads that don't need cross-chunk
//! consistency.
//! Does not own: per-chunk fetch mechanics (`fetch::bulk`).
//! Boundary: `fetch_parallel` is the only entry point; it is not
//! transactional across chunks — see the module doc on `ParallelFetcher`.

use crate::fetch::bulk::{BulkFetcher, FetchOptions};
use crate::index::contracts::Item;
use crate::kv::{Store, TransactionConfig};
use crate::subspace::Subspace;
use icydb_error::InternalError;
use std::sync::Arc;

///
/// ParallelFetcher
///
/// Each chunk commits (or fails) independently: a caller sees a mix of
/// per-chunk snapshots, not one consistent point-in-time view across the
/// whole key set. Appropriate for bulk read paths — preload warmup,
/// analytics scans — that tolerate that, not for anything that needs
/// read-your-writes across the full key set (use `BulkFetcher::fetch`
/// inside a single transaction for that).
///

pub fn fetch_parallel<S: Store + Send + Sync + 'static>(
    store: &Arc<S>,
    items: &Subspace,
    keys: &[Vec<u8>],
    max_parallelism: usize,
    options: FetchOptions,
) -> Result<Vec<Option<Item>>, InternalError> {
    let chunk_count = max_parallelism.max(1).min(keys.len().max(1));
    let chunk_size = keys.len().div_ceil(chunk_count).max(1);

    let handles: Vec<_> = keys
        .chunks(chunk_size)
        .map(|chunk| {
            let store = Arc::clone(store);
            let items = items.clone();
            let chunk = chunk.to_vec();
            std::thread::spawn(move || {
                store.with_transaction(&TransactionConfig::default(), |txn| {
                    BulkFetcher::new(&items).fetch(&chunk, options, txn)
                })
            })
        })
        .collect();

    let mut out = Vec::with_capacity(keys.len());
    for handle in handles {
        let chunk_result = handle.join().map_err(|_| {
            InternalError::new(
                icydb_error::ErrorClass::Internal,
                icydb_error::ErrorOrigin::Fetch,
                "parallel fetch worker panicked",
            )
        })??;
        out.extend(chunk_result);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemStore, Store};
    use icydb_primitives::FieldValue;

    #[test]
    fn splits_across_chunks_and_preserves_order() {
        let store = Arc::new(MemStore::new());
        let items = Subspace::root(b"items".to_vec());
        store
            .run(|txn| {
                for (pk, value) in [("a", 1i64), ("b", 2), ("c", 3), ("d", 4)] {
                    let mut item = Item::new();
                    item.insert("value".to_string(), FieldValue::Int64(value));
                    let key = items.pack(&[FieldValue::Data(pk.as_bytes().to_vec())])?;
                    txn.set(key, serde_cbor::to_vec(&item).unwrap());
                }
                Ok(())
            })
            .unwrap();

        let keys: Vec<Vec<u8>> = ["a", "b", "c", "d"].iter().map(|s| s.as_bytes().to_vec()).collect();
        let results = fetch_parallel(&store, &items, &keys, 2, FetchOptions::default()).unwrap();

        let values: Vec<i64> = results
            .into_iter()
            .map(|item| match item.unwrap().get("value").unwrap() {
                FieldValue::Int64(v) => *v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec![1, 2, 3, 4]);
    }
}
