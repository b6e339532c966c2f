//! # Mock Store & Testing Guide
//!
//! [`MockStore`] implements [`Store`] entirely in memory from a queue of
//! expectations. It lets a test drive an actor that persists records without a
//! real backend, and inject failures that a real backend rarely produces.
//!
//! ## When to use the mock vs a real store
//!
//! | | MockStore | real store |
//! |---|---|---|
//! | **Determinism** | scripted ids | backend-assigned |
//! | **Error injection** | `return_err` | hard |
//! | **Use case** | testing the actor around the store | end-to-end runs |
//!
//! ## Example
//!
//! ```rust
//! use silo_bus::mock::MockStore;
//! use silo_bus::store::Store;
//! use silo_bus::StoreError;
//!
//! let mock = MockStore::new();
//! mock.expect_save().return_ok(42);
//! mock.expect_save().return_err(StoreError::Unavailable("disk full".into()));
//!
//! assert_eq!(mock.save(b"first"), Ok(42));
//! assert!(mock.save(b"second").is_err());
//!
//! assert_eq!(mock.saved(), vec![b"first".to_vec(), b"second".to_vec()]);
//! mock.verify();
//! ```
//!
//! A call with no expectation left panics, like any unexpected call on a mock.

use crate::error::StoreError;
use crate::store::Store;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockState {
    expectations: VecDeque<Result<i64, StoreError>>,
    saved: Vec<Vec<u8>>,
}

/// A scripted [`Store`]. Clones share the same expectations.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<MockState>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects one more `save` call.
    pub fn expect_save(&self) -> SaveExpectationBuilder {
        SaveExpectationBuilder {
            state: Arc::clone(&self.state),
        }
    }

    /// Every payload passed to `save`, in call order.
    pub fn saved(&self) -> Vec<Vec<u8>> {
        self.state.lock().saved.clone()
    }

    /// Panics if expectations are left over.
    pub fn verify(&self) {
        let remaining = self.state.lock().expectations.len();
        if remaining != 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }
}

impl Store for MockStore {
    fn save(&self, raw: &[u8]) -> Result<i64, StoreError> {
        let mut state = self.state.lock();
        state.saved.push(raw.to_vec());
        match state.expectations.pop_front() {
            Some(response) => response,
            None => panic!("Unexpected save call ({} bytes)", raw.len()),
        }
    }
}

/// Builder for `save` expectations.
pub struct SaveExpectationBuilder {
    state: Arc<Mutex<MockState>>,
}

impl SaveExpectationBuilder {
    pub fn return_ok(self, id: i64) {
        self.state.lock().expectations.push_back(Ok(id));
    }

    pub fn return_err(self, error: StoreError) {
        self.state.lock().expectations.push_back(Err(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expectations_in_order() {
        let mock = MockStore::new();
        mock.expect_save().return_ok(1);
        mock.expect_save().return_ok(2);

        let shared = mock.clone();
        assert_eq!(shared.save(b"a"), Ok(1));
        assert_eq!(shared.save(b"b"), Ok(2));
        mock.verify();
    }

    #[test]
    #[should_panic(expected = "Not all expectations were met")]
    fn test_verify_reports_leftovers() {
        let mock = MockStore::new();
        mock.expect_save().return_ok(1);
        mock.verify();
    }

    #[test]
    #[should_panic(expected = "Unexpected save call")]
    fn test_unexpected_call_panics() {
        let _ = MockStore::new().save(b"x");
    }
}
