//! Storage boundary.
//!
//! Actors that persist records go through [`Store`]; the silo never assumes a
//! particular backend. [`crate::mock::MockStore`] stands in for it in tests.

use crate::error::StoreError;

pub trait Store: Send + Sync {
    /// Saves an already-serialized record and returns its new id.
    fn save(&self, raw: &[u8]) -> Result<i64, StoreError>;
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn save(&self, raw: &[u8]) -> Result<i64, StoreError> {
        (**self).save(raw)
    }
}
