// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Transactional object store for the packet-radio BBS (§3/§4.C).
//!
//! [`Store`] serialises every reader and writer through a single mutex:
//! [`Store::transaction`] hands the closure a scratch copy of the
//! [`StoreRoot`], commits it to the live state and the configured
//! [`StoreBackend`] only if the closure returns `Ok`, and discards it
//! otherwise. There is no partial commit and no nested transaction support,
//! matching §4.C's "single writer, abort-on-error" contract.

mod backend;
mod root;

pub use backend::{FileBackend, StoreBackend, ZeoBackend};
pub use root::StoreRoot;

use bbs_error::{BbsError, ErrorCode};
use std::sync::Mutex;

/// Lifecycle state of a [`Store`], per §4.C's `db.open()`/`db.close()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Closed,
    Open,
}

/// The transactional object store.
///
/// Construct with [`Store::new`], then call [`Store::open`] before issuing
/// any [`Store::transaction`]. Both `open` and [`Store::close`] are
/// idempotent — a second call is a no-op.
pub struct Store {
    backend: Box<dyn StoreBackend>,
    root: Mutex<StoreRoot>,
    state: Mutex<LifecycleState>,
}

impl Store {
    /// Build a closed store over `backend`. Call [`open`](Store::open)
    /// before using it.
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            root: Mutex::new(StoreRoot::new()),
            state: Mutex::new(LifecycleState::Closed),
        }
    }

    /// Load the backend's last-committed root (or seed a fresh one if none
    /// exists). Calling `open` again while already open is a no-op.
    pub fn open(&self) -> Result<(), BbsError> {
        let mut state = self.state.lock().expect("store state lock poisoned");
        if *state == LifecycleState::Open {
            return Ok(());
        }
        if let Some(loaded) = self.backend.load()? {
            *self.root.lock().expect("store root lock poisoned") = loaded;
        }
        *state = LifecycleState::Open;
        tracing::info!("store opened");
        Ok(())
    }

    /// Mark the store closed. Calling `close` again, or before ever
    /// opening, is a no-op.
    pub fn close(&self) -> Result<(), BbsError> {
        let mut state = self.state.lock().expect("store state lock poisoned");
        if *state == LifecycleState::Closed {
            return Ok(());
        }
        *state = LifecycleState::Closed;
        tracing::info!("store closed");
        Ok(())
    }

    /// Run `f` against a scratch copy of the root. On `Ok`, the scratch copy
    /// becomes the new live root and is persisted through the backend
    /// before this call returns. On `Err`, the scratch copy is discarded and
    /// the live root is untouched — the transaction aborts.
    ///
    /// Transactions are not reentrant: calling `transaction` from inside
    /// `f` would deadlock on `self.root`'s mutex rather than nest, which is
    /// the enforcement mechanism for §4.C's "nested transactions are not
    /// supported".
    pub fn transaction<F, R>(&self, f: F) -> Result<R, BbsError>
    where
        F: FnOnce(&mut StoreRoot) -> Result<R, BbsError>,
    {
        {
            let state = self.state.lock().expect("store state lock poisoned");
            if *state != LifecycleState::Open {
                return Err(BbsError::new(ErrorCode::Fatal, "store is not open"));
            }
        }
        let mut guard = self.root.lock().expect("store root lock poisoned");
        let mut scratch = guard.clone();
        let result = f(&mut scratch);
        match result {
            Ok(value) => {
                self.backend.persist(&scratch)?;
                *guard = scratch;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(error = %err, "transaction aborted");
                Err(err)
            }
        }
    }

    /// Read-only snapshot of the current root, for callers (e.g. the HTTP
    /// façade's health check) that don't need transactional semantics.
    pub fn snapshot(&self) -> StoreRoot {
        self.root.lock().expect("store root lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::FileBackend;

    fn opened_store(dir: &std::path::Path) -> Store {
        let store = Store::new(FileBackend::new(dir.join("store.json")));
        store.open().unwrap();
        store
    }

    #[test]
    fn transaction_commits_on_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        let id = store.transaction(|root| Ok(root.allocate_bulletin_id())).unwrap();
        assert_eq!(id, 0);
        assert_eq!(store.snapshot().bulletin_counter, 1);
    }

    #[test]
    fn transaction_aborts_on_err_and_leaves_root_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        let before = store.snapshot().bulletin_counter;
        let result: Result<(), BbsError> = store.transaction(|root| {
            root.allocate_bulletin_id();
            Err(BbsError::new(ErrorCode::Validation, "pretend this failed"))
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot().bulletin_counter, before);
    }

    #[test]
    fn transaction_fails_when_store_not_open() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(FileBackend::new(tmp.path().join("store.json")));
        let result: Result<(), BbsError> = store.transaction(|_| Ok(()));
        assert!(matches!(result, Err(e) if e.code == ErrorCode::Fatal));
    }

    #[test]
    fn open_and_close_are_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = opened_store(tmp.path());
        store.open().unwrap();
        store.close().unwrap();
        store.close().unwrap();
    }

    #[test]
    fn reopening_loads_committed_state_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("store.json");
        {
            let store = Store::new(FileBackend::new(&path));
            store.open().unwrap();
            store.transaction(|root| Ok(root.allocate_job_id())).unwrap();
        }
        let store = Store::new(FileBackend::new(&path));
        store.open().unwrap();
        assert_eq!(store.snapshot().job_counter, 1);
    }
}
