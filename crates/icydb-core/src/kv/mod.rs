//! KV store contract (spec.md §4.0, §6). The underlying transactional
//! ordered key-value store is an external collaborator; this module
//! defines the trait boundary the rest of the core is written against,
//! plus `mem` — an in-memory reference implementation used by every test
//! in this repository.

mod mem;
mod selector;

pub use mem::{MemStore, MemTransaction};
pub use selector::resolve_selector;

use icydb_error::InternalError;

///
/// KeySelector
///
/// The four selector forms spec.md §6 requires.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KeySelector {
    FirstGreaterOrEqual(Vec<u8>),
    FirstGreaterThan(Vec<u8>),
    LastLessOrEqual(Vec<u8>),
    LastLessThan(Vec<u8>),
}

impl KeySelector {
    #[must_use]
    pub fn first_greater_or_equal(key: impl Into<Vec<u8>>) -> Self {
        Self::FirstGreaterOrEqual(key.into())
    }

    #[must_use]
    pub fn first_greater_than(key: impl Into<Vec<u8>>) -> Self {
        Self::FirstGreaterThan(key.into())
    }
}

///
/// StreamingMode
///
/// Hints to the store about how a range read will be consumed; the
/// in-memory reference store ignores the hint functionally but threads it
/// through so the online builder (§4.4) can exercise "adaptive streaming
/// mode" selection in tests.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamingMode {
    WantAll,
    Iterator,
    Exact,
    Small,
    Medium,
    Large,
}

///
/// RangeOptions
///

#[derive(Clone, Debug)]
pub struct RangeOptions {
    pub snapshot: bool,
    pub mode: StreamingMode,
    pub limit: Option<usize>,
    pub reverse: bool,
}

impl Default for RangeOptions {
    fn default() -> Self {
        Self {
            snapshot: false,
            mode: StreamingMode::Iterator,
            limit: None,
            reverse: false,
        }
    }
}

///
/// Transaction
///
/// Object-safe KV transaction contract: point get/set/clear, range scan
/// via key selectors, and atomic little-endian signed add (spec.md §6).
///

pub trait Transaction {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, InternalError>;

    fn get_range(
        &mut self,
        begin: KeySelector,
        end: KeySelector,
        opts: RangeOptions,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, InternalError>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    fn clear(&mut self, key: &[u8]);

    fn clear_range(&mut self, begin: &[u8], end: &[u8]);

    /// Little-endian signed add, applied at commit time. Reading a key
    /// that has a pending atomic-add within the same transaction observes
    /// the post-add value (read-your-writes).
    fn atomic_add(&mut self, key: &[u8], delta: i64) -> Result<(), InternalError>;

    /// Convenience: read an 8-byte little-endian signed counter, `0` when
    /// absent.
    fn get_counter(&mut self, key: &[u8]) -> Result<i64, InternalError> {
        match self.get(key)? {
            None => Ok(0),
            Some(bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(i64::from_le_bytes(buf))
            }
            Some(bytes) => Err(InternalError::invariant(
                icydb_error::ErrorOrigin::Store,
                format!("counter key has unexpected width {}", bytes.len()),
            )),
        }
    }
}

///
/// TransactionConfig
///

#[derive(Clone, Debug)]
pub struct TransactionConfig {
    pub max_attempts: u32,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

///
/// Store
///
/// `with_transaction` retries the body on a `Transient`-classified error up
/// to `config.max_attempts` times, committing on `Ok` return (spec.md §6
/// `withTransaction`).
///

pub trait Store {
    fn with_transaction<F, R>(&self, config: &TransactionConfig, body: F) -> Result<R, InternalError>
    where
        F: FnMut(&mut dyn Transaction) -> Result<R, InternalError>;

    /// Convenience wrapper using the default transaction config.
    fn run<F, R>(&self, body: F) -> Result<R, InternalError>
    where
        F: FnMut(&mut dyn Transaction) -> Result<R, InternalError>,
    {
        self.with_transaction(&TransactionConfig::default(), body)
    }
}
