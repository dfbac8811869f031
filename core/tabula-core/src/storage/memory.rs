//! In-memory Store using one `BTreeMap` per keyspace
//!
//! Volatile; used by `Table::open_in_memory` and in tests.

use crate::error::TabulaResult;
use crate::storage::{Entries, Keyspace, StorageBackend, range_is_empty};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// In-memory Store
#[derive(Default)]
pub struct MemoryBackend {
    spaces: DashMap<String, Arc<MemoryKeyspace>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn keyspace(&self, name: &str) -> TabulaResult<Arc<dyn Keyspace>> {
        let space: Arc<dyn Keyspace> = self
            .spaces
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryKeyspace::default()))
            .clone();
        Ok(space)
    }

    fn drop_keyspace(&self, name: &str) -> TabulaResult<bool> {
        match self.spaces.remove(name) {
            Some((_, space)) => {
                // handles still held elsewhere must not see stale entries
                space.map.write().clear();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn keyspace_names(&self) -> TabulaResult<Vec<String>> {
        Ok(self.spaces.iter().map(|e| e.key().clone()).collect())
    }

    fn flush(&self) -> TabulaResult<()> {
        // No-op for in-memory backend
        Ok(())
    }
}

/// A single in-memory keyspace.
#[derive(Default)]
pub struct MemoryKeyspace {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl Keyspace for MemoryKeyspace {
    fn get(&self, key: &[u8]) -> TabulaResult<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> TabulaResult<Option<Vec<u8>>> {
        Ok(self.map.write().insert(key.to_vec(), value.to_vec()))
    }

    fn remove(&self, key: &[u8]) -> TabulaResult<Option<Vec<u8>>> {
        Ok(self.map.write().remove(key))
    }

    fn contains(&self, key: &[u8]) -> TabulaResult<bool> {
        Ok(self.map.read().contains_key(key))
    }

    fn range(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> TabulaResult<Entries> {
        // BTreeMap::range panics on reversed bounds
        if range_is_empty(lower, upper) {
            return Ok(Vec::new());
        }
        Ok(self
            .map
            .read()
            .range::<[u8], _>((lower, upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn scan_after(&self, after: Option<&[u8]>, limit: usize) -> TabulaResult<Entries> {
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        Ok(self
            .map
            .read()
            .range::<[u8], _>((lower, Bound::Unbounded))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn last(&self) -> TabulaResult<Option<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .map
            .read()
            .last_key_value()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn len(&self) -> TabulaResult<usize> {
        Ok(self.map.read().len())
    }

    fn clear(&self) -> TabulaResult<()> {
        self.map.write().clear();
        Ok(())
    }
}
