//! In-memory [`Store`] backing the customer actor in the sample silo.

use parking_lot::Mutex;
use silo_bus::{Store, StoreError};
use tracing::debug;

/// Keeps serialized records in insertion order; ids start at 1.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// The raw record saved under `id`.
    pub fn get(&self, id: i64) -> Option<Vec<u8>> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.records.lock().get(index).cloned()
    }
}

impl Store for MemoryStore {
    fn save(&self, raw: &[u8]) -> Result<i64, StoreError> {
        if raw.is_empty() {
            return Err(StoreError::Rejected("empty record".to_string()));
        }
        let mut records = self.records.lock();
        records.push(raw.to_vec());
        let id = records.len() as i64;
        debug!(id, size = raw.len(), "Saved record");
        Ok(id)
    }
}
