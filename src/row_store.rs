//! Reference in-memory [`RowStore`] so [`crate::entry::CacheEntry`] can be
//! exercised without a real off-heap page allocator.

use std::collections::HashMap;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::interfaces::RowStore;
use crate::version::Version;

/// A `HashMap`-backed row store behind a single lock, standing in for the
/// teacher's off-heap page allocator in tests and simple deployments.
#[derive(Default)]
pub struct InMemoryRowStore {
    rows: Mutex<FxHashMap<Vec<u8>, (Vec<u8>, Version)>>,
}

impl InMemoryRowStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::default()),
        }
    }

    /// Number of rows currently stored, for test assertions.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// `true` iff the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

impl RowStore for InMemoryRowStore {
    fn load(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Version)>> {
        Ok(self.rows.lock().get(key).cloned())
    }

    fn store(&self, key: &[u8], value: &[u8], version: Version) -> Result<()> {
        self.rows
            .lock()
            .insert(key.to_vec(), (value.to_vec(), version));
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        self.rows.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_load_round_trips() {
        let store = InMemoryRowStore::new();
        let version = Version::new(1, 1, 1, 0, 0);
        store.store(b"k", b"v", version).unwrap();
        let (value, loaded_version) = store.load(b"k").unwrap().unwrap();
        assert_eq!(value, b"v".to_vec());
        assert_eq!(loaded_version, version);
    }

    #[test]
    fn remove_clears_the_row() {
        let store = InMemoryRowStore::new();
        store.store(b"k", b"v", Version::zero()).unwrap();
        store.remove(b"k").unwrap();
        assert!(store.load(b"k").unwrap().is_none());
        assert!(store.is_empty());
    }
}
