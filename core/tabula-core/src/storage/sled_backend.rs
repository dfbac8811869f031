//! Durable Store backed by sled.
//!
//! One sled database directory holds one table; every keyspace maps to a
//! separate sled `Tree`.
//!
//! sled fixes page compression when the database is created and refuses to
//! open it with a different setting. The setting the files were written with
//! is kept in a small JSON file next to them (`store.json`) and wins over the
//! caller's options on every later open.

use crate::error::{TabulaError, TabulaResult};
use crate::storage::options::{Compression, TableOptions};
use crate::storage::{Entries, Keyspace, StorageBackend, range_is_empty};
use serde::{Deserialize, Serialize};
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

/// sled always carries this tree; it is never a table keyspace.
const SLED_DEFAULT_TREE: &str = "__sled__default";

/// Settings file written beside the sled files.
pub(crate) const STORE_SETTINGS: &str = "store.json";

/// Settings sled cannot change once the database exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct StoreSettings {
    compression: Compression,
}

impl StoreSettings {
    fn load(dir: &Path) -> TabulaResult<Option<Self>> {
        match std::fs::read(dir.join(STORE_SETTINGS)) {
            Ok(json) => Ok(Some(serde_json::from_slice(&json)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, dir: &Path) -> TabulaResult<()> {
        std::fs::write(dir.join(STORE_SETTINGS), serde_json::to_vec(self)?)?;
        Ok(())
    }
}

/// sled-backed persistent Store.
pub struct SledBackend {
    db: sled::Db,
    compressed: bool,
}

impl SledBackend {
    /// Open (or create) the sled database at `path`, tuned by `options`.
    ///
    /// For an existing database the compression recorded at creation is used
    /// instead of `options.compression`.
    pub fn open(path: &Path, options: &TableOptions) -> TabulaResult<Self> {
        let stored = StoreSettings::load(path)?;
        let settings = stored.unwrap_or(StoreSettings {
            compression: options.compression,
        });

        let compressed = settings.compression.is_compressed();
        let mut config = sled::Config::new()
            .path(path)
            .cache_capacity(options.page_cache_capacity())
            .use_compression(compressed);
        if options.large {
            config = config.mode(sled::Mode::HighThroughput);
        }
        let db = config.open()?;
        if stored.is_none() {
            settings.save(path)?;
        }
        Ok(Self { db, compressed })
    }

    /// Open a temporary database (for testing). Data is deleted on drop.
    pub fn open_temporary() -> TabulaResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self {
            db,
            compressed: false,
        })
    }
}

impl StorageBackend for SledBackend {
    fn check_options(&self, options: &TableOptions) -> TabulaResult<()> {
        if options.compression.is_compressed() != self.compressed {
            return Err(TabulaError::Storage(format!(
                "sled cannot switch page compression of an existing table to '{}'",
                options.compression
            )));
        }
        Ok(())
    }

    fn keyspace(&self, name: &str) -> TabulaResult<Arc<dyn Keyspace>> {
        let tree = self.db.open_tree(name)?;
        let space: Arc<dyn Keyspace> = Arc::new(SledKeyspace { tree });
        Ok(space)
    }

    fn drop_keyspace(&self, name: &str) -> TabulaResult<bool> {
        Ok(self.db.drop_tree(name)?)
    }

    fn keyspace_names(&self) -> TabulaResult<Vec<String>> {
        Ok(self
            .db
            .tree_names()
            .into_iter()
            .filter_map(|name| String::from_utf8(name.to_vec()).ok())
            .filter(|name| name != SLED_DEFAULT_TREE)
            .collect())
    }

    fn flush(&self) -> TabulaResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// A single sled tree.
pub struct SledKeyspace {
    tree: sled::Tree,
}

impl Keyspace for SledKeyspace {
    fn get(&self, key: &[u8]) -> TabulaResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|ivec| ivec.to_vec()))
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> TabulaResult<Option<Vec<u8>>> {
        Ok(self.tree.insert(key, value)?.map(|ivec| ivec.to_vec()))
    }

    fn remove(&self, key: &[u8]) -> TabulaResult<Option<Vec<u8>>> {
        Ok(self.tree.remove(key)?.map(|ivec| ivec.to_vec()))
    }

    fn contains(&self, key: &[u8]) -> TabulaResult<bool> {
        Ok(self.tree.contains_key(key)?)
    }

    fn range(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> TabulaResult<Entries> {
        if range_is_empty(lower, upper) {
            return Ok(Vec::new());
        }

        // sled is driven with an inclusive start; an excluded start key is
        // skipped while iterating.
        let (start, skip) = match lower {
            Bound::Excluded(key) => (Bound::Included(key), Some(key)),
            other => (other, None),
        };

        let mut result = Vec::new();
        for item in self.tree.range::<&[u8], _>((start, upper)) {
            let (k, v) = item?;
            if let Some(skip) = skip
                && &k[..] == skip
            {
                continue;
            }
            result.push((k.to_vec(), v.to_vec()));
        }
        Ok(result)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> TabulaResult<Entries> {
        let mut result = Vec::new();
        for item in self.tree.scan_prefix(prefix) {
            let (k, v) = item?;
            result.push((k.to_vec(), v.to_vec()));
        }
        Ok(result)
    }

    fn scan_after(&self, after: Option<&[u8]>, limit: usize) -> TabulaResult<Entries> {
        let iter = match after {
            Some(key) => self.tree.range::<&[u8], _>(key..),
            None => self.tree.iter(),
        };

        let mut result = Vec::with_capacity(limit.min(1024));
        for item in iter {
            if result.len() >= limit {
                break;
            }
            let (k, v) = item?;
            if let Some(after) = after
                && &k[..] == after
            {
                continue;
            }
            result.push((k.to_vec(), v.to_vec()));
        }
        Ok(result)
    }

    fn last(&self) -> TabulaResult<Option<(Vec<u8>, Vec<u8>)>> {
        Ok(self.tree.last()?.map(|(k, v)| (k.to_vec(), v.to_vec())))
    }

    fn len(&self) -> TabulaResult<usize> {
        Ok(self.tree.len())
    }

    fn is_empty(&self) -> TabulaResult<bool> {
        Ok(self.tree.is_empty())
    }

    fn clear(&self) -> TabulaResult<()> {
        self.tree.clear()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_space(name: &str) -> (SledBackend, Arc<dyn Keyspace>) {
        let backend = SledBackend::open_temporary().unwrap();
        let space = backend.keyspace(name).unwrap();
        (backend, space)
    }

    #[test]
    fn insert_returns_previous_value() {
        let (_backend, space) = temp_space("rows");
        assert_eq!(space.insert(b"k", b"v1").unwrap(), None);
        assert_eq!(space.insert(b"k", b"v2").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(space.get(b"k").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(space.remove(b"k").unwrap(), Some(b"v2".to_vec()));
        assert!(!space.contains(b"k").unwrap());
    }

    #[test]
    fn range_with_excluded_start() {
        let (_backend, space) = temp_space("rows");
        for key in [b"a", b"b", b"c", b"d"] {
            space.insert(key, b"").unwrap();
        }
        let keys: Vec<Vec<u8>> = space
            .range(Bound::Excluded(&b"a"[..]), Bound::Included(&b"c"[..]))
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
        assert!(space
            .range(Bound::Included(&b"d"[..]), Bound::Included(&b"a"[..]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn scan_after_pages_through_keys() {
        let (_backend, space) = temp_space("rows");
        for i in 0u8..5 {
            space.insert(&[i], b"").unwrap();
        }
        let first = space.scan_after(None, 2).unwrap();
        assert_eq!(first.len(), 2);
        let rest = space.scan_after(Some(&first[1].0), 10).unwrap();
        let keys: Vec<Vec<u8>> = rest.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![vec![2], vec![3], vec![4]]);
    }

    #[test]
    fn keyspaces_are_isolated_and_droppable() {
        let backend = SledBackend::open_temporary().unwrap();
        let a = backend.keyspace("a").unwrap();
        let b = backend.keyspace("b").unwrap();
        a.insert(b"k", b"1").unwrap();
        assert_eq!(b.get(b"k").unwrap(), None);

        let mut names = backend.keyspace_names().unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);

        assert!(backend.drop_keyspace("a").unwrap());
        assert!(!backend.drop_keyspace("missing").unwrap());
    }

    #[test]
    fn reopen_persists_entries() {
        let dir = tempfile::tempdir().unwrap();
        let options = TableOptions::default();
        {
            let backend = SledBackend::open(dir.path(), &options).unwrap();
            backend.keyspace("rows").unwrap().insert(b"k", b"v").unwrap();
            backend.flush().unwrap();
        }
        let backend = SledBackend::open(dir.path(), &options).unwrap();
        let space = backend.keyspace("rows").unwrap();
        assert_eq!(space.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(space.last().unwrap(), Some((b"k".to_vec(), b"v".to_vec())));
    }

    #[test]
    fn compression_is_fixed_at_creation() {
        let dir = tempfile::tempdir().unwrap();
        let compressed = TableOptions::default().with_compression(Compression::Deflate);
        {
            let backend = SledBackend::open(dir.path(), &compressed).unwrap();
            backend.keyspace("rows").unwrap().insert(b"k", b"v").unwrap();
            backend.flush().unwrap();
        }

        // the recorded setting wins over the caller's
        let backend = SledBackend::open(dir.path(), &TableOptions::default()).unwrap();
        let space = backend.keyspace("rows").unwrap();
        assert_eq!(space.get(b"k").unwrap(), Some(b"v".to_vec()));

        assert!(backend.check_options(&compressed).is_ok());
        let bzip = TableOptions::default().with_compression(Compression::Bzip);
        assert!(backend.check_options(&bzip).is_ok());
        assert!(matches!(
            backend.check_options(&TableOptions::default()),
            Err(TabulaError::Storage(_))
        ));
    }
}
