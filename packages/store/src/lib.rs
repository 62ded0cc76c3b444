#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Storage plumbing shared by every radar store implementation.
//!
//! The catalog, subscription registry, and report service each talk to
//! their persistence through an `async_trait` store. Those traits all
//! report failures as [`StoreError`] so callers can tell a unique
//! constraint violation apart from an opaque backend failure.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint was violated.
    #[error("Duplicate record: {message}")]
    Duplicate {
        /// Which constraint was hit.
        message: String,
    },

    /// The backend failed (connectivity, I/O, malformed row, ...).
    #[error("Storage backend error: {message}")]
    Backend {
        /// Description of what went wrong.
        message: String,
    },
}

impl StoreError {
    /// Builds a [`StoreError::Backend`] from anything displayable.
    pub fn backend(e: impl std::fmt::Display) -> Self {
        Self::Backend {
            message: e.to_string(),
        }
    }
}

/// Generates a fresh record identifier (UUID v4, hyphenated).
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Acquires a read guard, recovering the data if a writer panicked.
pub fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Acquires a write guard, recovering the data if a writer panicked.
pub fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_uuids() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let lock = std::sync::Arc::new(RwLock::new(1));
        let cloned = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = cloned.write().unwrap();
            panic!("poison");
        })
        .join();

        assert!(lock.is_poisoned());
        *write_lock(&lock) += 1;
        assert_eq!(*read_lock(&lock), 2);
    }
}
