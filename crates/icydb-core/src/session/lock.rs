//! Module: session::lock
//! Responsibility: the single-holder distributed lock stored at
//! `[lock-subspace][lock][name]` (spec.md §4.9) — acquire/steal semantics,
//! background heartbeat renewal, release, `execute`, and the
//! leader-election wrapper over the same state.
//! Does not own: the KV transaction boundary (`kv::Transaction`) or clock
//! source (`std::time::SystemTime`, injected nowhere — callers run in real
//! time, tests control staleness via `acquired_at`/`last_heartbeat` directly).
//! Boundary: `Session::acquire`/`release`/`execute` are the only ways a
//! caller touches lock state; the renewal thread only ever calls `acquire`.

use crate::kv::{Store, TransactionConfig};
use crate::subspace::Subspace;
use icydb_error::{ErrorClass, ErrorOrigin, InternalError};
use icydb_primitives::FieldValue;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

///
/// LockHolder
///
/// Serialized via CBOR at `[lock-subspace][lock][name]` (spec.md §4.9).
///

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockHolder {
    pub session_id: String,
    pub session_name: String,
    pub acquired_at: u64,
    pub last_heartbeat: u64,
    pub expires_at: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct LockOptions {
    pub lock_timeout: Duration,
    pub renewal_interval: Duration,
    pub allow_lock_stealing: bool,
    pub stale_threshold: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(30),
            renewal_interval: Duration::from_secs(10),
            allow_lock_stealing: true,
            stale_threshold: Duration::from_secs(15),
        }
    }
}

/// Shared "do we still believe we hold the lock" flag the renewal thread
/// clears on a failed renewal and `acquire`/`release` read and set.
struct Held(Mutex<bool>);

///
/// Session
///
/// One instance per (store, lock name, session id). Renewal threads are
/// spawned by `acquire` and stopped by `release`/`drop` via the
/// cancellation channel, never by cancelling a KV suspension point mid-flight.
///

pub struct Session<S: Store + Send + Sync + 'static> {
    store: Arc<S>,
    subspace: Subspace,
    session_id: String,
    session_name: String,
    options: LockOptions,
    held: Arc<Held>,
    renewal: Mutex<Option<(Sender<()>, std::thread::JoinHandle<()>)>>,
}

impl<S: Store + Send + Sync + 'static> Session<S> {
    #[must_use]
    pub fn new(
        store: Arc<S>,
        lock_subspace: Subspace,
        session_name: impl Into<String>,
        session_id: impl Into<String>,
        options: LockOptions,
    ) -> Self {
        Self {
            store,
            subspace: lock_subspace,
            session_id: session_id.into(),
            session_name: session_name.into(),
            options,
            held: Arc::new(Held(Mutex::new(false))),
            renewal: Mutex::new(None),
        }
    }

    fn key(&self) -> Result<Vec<u8>, InternalError> {
        self.subspace
            .subspace(b"lock")
            .pack(&[FieldValue::String(self.session_name.clone())])
    }

    /// Reads the current holder; absent when nothing has ever been written
    /// or the last writer released it.
    pub fn current_holder(&self) -> Result<Option<LockHolder>, InternalError> {
        let key = self.key()?;
        self.store.run(|txn| {
            let Some(bytes) = txn.get(&key)? else {
                return Ok(None);
            };
            decode_holder(&bytes).map(Some)
        })
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        *self.held.0.lock().unwrap()
    }

    /// Acquire semantics (spec.md §4.9 `acquire()`): absent → write self;
    /// same session → refresh heartbeat; stale + `allowLockStealing` →
    /// steal; else `false`. On success, spawns (or keeps) the background
    /// renewal thread.
    pub fn acquire(&self) -> Result<bool, InternalError> {
        let key = self.key()?;
        let acquired = self.store.run(|txn| {
            let now = now_millis();
            let existing = txn.get(&key)?.map(|bytes| decode_holder(&bytes)).transpose()?;

            let should_write = match &existing {
                None => true,
                Some(holder) if holder.session_id == self.session_id => true,
                Some(holder) => {
                    let stale = now.saturating_sub(holder.last_heartbeat)
                        > self.options.stale_threshold.as_millis() as u64;
                    self.options.allow_lock_stealing && stale
                }
            };

            if !should_write {
                return Ok(false);
            }

            let acquired_at = match &existing {
                Some(holder) if holder.session_id == self.session_id => holder.acquired_at,
                _ => now,
            };
            let holder = LockHolder {
                session_id: self.session_id.clone(),
                session_name: self.session_name.clone(),
                acquired_at,
                last_heartbeat: now,
                expires_at: now + self.options.lock_timeout.as_millis() as u64,
            };
            txn.set(key.clone(), encode_holder(&holder)?);
            Ok(true)
        })?;

        if acquired {
            *self.held.0.lock().unwrap() = true;
            self.ensure_renewal_thread();
        }
        Ok(acquired)
    }

    fn ensure_renewal_thread(&self) {
        let mut guard = self.renewal.lock().unwrap();
        if guard.is_some() {
            return;
        }
        let (tx, rx): (Sender<()>, Receiver<()>) = channel();
        let store = Arc::clone(&self.store);
        let subspace = self.subspace.clone();
        let session_id = self.session_id.clone();
        let session_name = self.session_name.clone();
        let options = self.options;
        let held = Arc::clone(&self.held);

        let handle = std::thread::spawn(move || {
            loop {
                match rx.recv_timeout(options.renewal_interval) {
                    Ok(()) | Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                }
                if matches!(rx.try_recv(), Err(TryRecvError::Disconnected)) {
                    break;
                }
                let renewed = renew(store.as_ref(), &subspace, &session_name, &session_id, options);
                if !matches!(renewed, Ok(true)) {
                    *held.0.lock().unwrap() = false;
                    break;
                }
            }
        });
        *guard = Some((tx, handle));
    }

    /// Release semantics (spec.md §4.9 `release()`): atomically clears the
    /// key iff this session is still the holder, then stops the renewal
    /// thread unconditionally.
    pub fn release(&self) -> Result<(), InternalError> {
        let key = self.key()?;
        self.store.run(|txn| {
            if let Some(bytes) = txn.get(&key)? {
                let holder = decode_holder(&bytes)?;
                if holder.session_id == self.session_id {
                    txn.clear(&key);
                }
            }
            Ok(())
        })?;
        *self.held.0.lock().unwrap() = false;
        if let Some((tx, handle)) = self.renewal.lock().unwrap().take() {
            let _ = tx.send(());
            let _ = handle.join();
        }
        Ok(())
    }

    /// Acquires, runs `work`, releases on every path including an error or
    /// a failure to acquire (spec.md §4.9 `execute()`).
    pub fn execute<R>(&self, work: impl FnOnce() -> Result<R, InternalError>) -> Result<R, InternalError> {
        if !self.acquire()? {
            return Err(InternalError::new(
                ErrorClass::LockNotAcquired,
                ErrorOrigin::Session,
                format!("could not acquire lock {}", self.session_name),
            ));
        }
        let result = work();
        self.release()?;
        result
    }

    ///
    /// Leader election: a trivial wrapper over the same lock state
    /// (spec.md §4.9 "Leader election").
    ///

    pub fn try_become_leader(&self) -> Result<bool, InternalError> {
        self.acquire()
    }

    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.is_held()
    }

    pub fn current_leader(&self) -> Result<Option<LockHolder>, InternalError> {
        self.current_holder()
    }
}

impl<S: Store + Send + Sync + 'static> Drop for Session<S> {
    /// Best-effort cleanup for a session dropped without an explicit
    /// `release()` — stops the renewal thread so it doesn't keep renewing
    /// a lock nothing references anymore.
    fn drop(&mut self) {
        if let Some((tx, handle)) = self.renewal.lock().unwrap().take() {
            let _ = tx.send(());
            let _ = handle.join();
        }
    }
}

fn renew<S: Store>(
    store: &S,
    subspace: &Subspace,
    session_name: &str,
    session_id: &str,
    options: LockOptions,
) -> Result<bool, InternalError> {
    let key = subspace
        .subspace(b"lock")
        .pack(&[FieldValue::String(session_name.to_string())])?;
    store.run(|txn| {
        let Some(bytes) = txn.get(&key)? else {
            return Ok(false);
        };
        let mut holder = decode_holder(&bytes)?;
        if holder.session_id != session_id {
            return Ok(false);
        }
        let now = now_millis();
        holder.last_heartbeat = now;
        holder.expires_at = now + options.lock_timeout.as_millis() as u64;
        txn.set(key.clone(), encode_holder(&holder)?);
        Ok(true)
    })
}

fn encode_holder(holder: &LockHolder) -> Result<Vec<u8>, InternalError> {
    serde_cbor::to_vec(holder)
        .map_err(|e| InternalError::new(ErrorClass::Corruption, ErrorOrigin::Session, format!("encode lock holder: {e}")))
}

fn decode_holder(bytes: &[u8]) -> Result<LockHolder, InternalError> {
    serde_cbor::from_slice(bytes)
        .map_err(|e| InternalError::new(ErrorClass::Corruption, ErrorOrigin::Session, format!("decode lock holder: {e}")))
}
