use super::{selector::resolve_selector, KeySelector, RangeOptions, Store, Transaction, TransactionConfig};
use icydb_error::{ErrorOrigin, InternalError};
use std::collections::BTreeMap;
use std::sync::Mutex;

///
/// MemStore
///
/// In-memory reference implementation of [`Store`], backed by a single
/// mutex-guarded ordered map. Every `with_transaction` call holds the
/// mutex for the full body-plus-commit duration, which trivially satisfies
/// "across concurrent transactions, the underlying store provides strict
/// serializability" (spec.md §5) by serializing everything — a real store
/// would provide the same guarantee with far more concurrency.
///

#[derive(Default)]
pub struct MemStore {
    data: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot read outside of any transaction, for test assertions.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.data.lock().expect("mem store mutex poisoned").clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.lock().expect("mem store mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemStore {
    fn with_transaction<F, R>(&self, config: &TransactionConfig, mut body: F) -> Result<R, InternalError>
    where
        F: FnMut(&mut dyn Transaction) -> Result<R, InternalError>,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let mut guard = self.data.lock().expect("mem store mutex poisoned");
            let mut txn = MemTransaction {
                base: &guard,
                overlay: BTreeMap::new(),
            };
            let result = body(&mut txn);
            let overlay = txn.overlay;

            match result {
                Ok(value) => {
                    for (key, write) in overlay {
                        match write {
                            Some(value) => {
                                guard.insert(key, value);
                            }
                            None => {
                                guard.remove(&key);
                            }
                        }
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempts < config.max_attempts => {
                    drop(guard);
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

///
/// MemTransaction
///
/// Snapshot-plus-overlay view used while a [`MemStore`] transaction body
/// runs: reads check the overlay first (read-your-writes) and fall back to
/// the locked base map; writes only ever touch the overlay until commit.
///

pub struct MemTransaction<'a> {
    base: &'a BTreeMap<Vec<u8>, Vec<u8>>,
    overlay: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl MemTransaction<'_> {
    /// Keys in `[lo, hi)` across base and overlay, overlay deletions
    /// removed, overlay inserts merged in. `hi == None` means unbounded.
    fn merged_keys_in_range(&self, lo: &[u8], hi: Option<&[u8]>) -> Vec<Vec<u8>> {
        let base_iter = self.base.range(lo.to_vec()..);
        let mut keys: Vec<Vec<u8>> = base_iter
            .map(|(k, _)| k.clone())
            .filter(|k| hi.is_none_or(|hi| k.as_slice() < hi))
            .filter(|k| !matches!(self.overlay.get(k), Some(None)))
            .collect();
        for (k, write) in &self.overlay {
            let in_range = k.as_slice() >= lo && hi.is_none_or(|hi| k.as_slice() < hi);
            if write.is_some() && in_range && !keys.contains(k) {
                keys.push(k.clone());
            }
        }
        keys.sort();
        keys
    }

    fn read(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.overlay.get(key) {
            Some(Some(v)) => Some(v.clone()),
            Some(None) => None,
            None => self.base.get(key).cloned(),
        }
    }
}

impl Transaction for MemTransaction<'_> {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, InternalError> {
        Ok(self.read(key))
    }

    fn get_range(
        &mut self,
        begin: KeySelector,
        end: KeySelector,
        opts: RangeOptions,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, InternalError> {
        // Resolve selectors against the union of base and overlay keys so a
        // selector landing on a key this same transaction just wrote still
        // resolves correctly.
        let mut universe: Vec<Vec<u8>> = self.base.keys().cloned().collect();
        for (k, write) in &self.overlay {
            if write.is_some() && !universe.contains(k) {
                universe.push(k.clone());
            }
        }
        universe.sort();
        universe.dedup();

        let begin_idx = resolve_selector(&universe, &begin);
        let end_idx = resolve_selector(&universe, &end);
        if begin_idx >= end_idx || begin_idx >= universe.len() {
            return Ok(Vec::new());
        }
        let lo = &universe[begin_idx];
        let hi_exclusive_bound = universe.get(end_idx).cloned();

        let mut keys = self.merged_keys_in_range(lo, hi_exclusive_bound.as_deref());

        if opts.reverse {
            keys.reverse();
        }
        if let Some(limit) = opts.limit {
            keys.truncate(limit);
        }

        Ok(keys
            .into_iter()
            .filter_map(|k| self.read(&k).map(|v| (k, v)))
            .collect())
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.overlay.insert(key, Some(value));
    }

    fn clear(&mut self, key: &[u8]) {
        self.overlay.insert(key.to_vec(), None);
    }

    fn clear_range(&mut self, begin: &[u8], end: &[u8]) {
        for key in self.merged_keys_in_range(begin, Some(end)) {
            self.overlay.insert(key, None);
        }
    }

    fn atomic_add(&mut self, key: &[u8], delta: i64) -> Result<(), InternalError> {
        let current = self.get_counter(key)?;
        let updated = current.checked_add(delta).ok_or_else(|| {
            InternalError::invariant(ErrorOrigin::Store, "atomic_add overflowed i64")
        })?;
        self.overlay
            .insert(key.to_vec(), Some(updated.to_le_bytes().to_vec()));
        Ok(())
    }
}
