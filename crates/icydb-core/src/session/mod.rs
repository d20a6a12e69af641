//! Module: session
//! Responsibility: the synchronized session / distributed lock and its
//! leader-election wrapper (spec.md §4.9).
//! Does not own: the KV store it locks over (`kv`) or any particular
//! caller's critical section.
//! Boundary: `lock::Session` is the only type in this module; everything
//! else is implementation detail behind it.

pub mod lock;

pub use lock::{LockHolder, LockOptions, Session};
