//! Index Manager — declared indices, their keyspaces and their maintenance.

use crate::engine::metadata;
use crate::error::{TabulaError, TabulaResult};
use crate::index::keys::{entry_key, keyspace_name, value_prefixes};
use crate::index::{IndexDescriptor, IndexProbe, IndexType};
use crate::row::Row;
use crate::storage::{Keyspace, StorageBackend};
use ahash::AHashSet;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
struct ColumnIndex {
    kind: IndexType,
    space: Arc<dyn Keyspace>,
}

/// Column → index map for one table.
pub(crate) struct IndexManager {
    backend: Arc<dyn StorageBackend>,
    meta: Arc<dyn Keyspace>,
    indexes: RwLock<BTreeMap<Vec<u8>, ColumnIndex>>,
}

impl IndexManager {
    /// Restore the declared indices from the metadata keyspace.
    pub(crate) fn load(
        backend: Arc<dyn StorageBackend>,
        meta: Arc<dyn Keyspace>,
    ) -> TabulaResult<Self> {
        let mut indexes = BTreeMap::new();
        for descriptor in metadata::load_indexes(meta.as_ref())? {
            let space = backend.keyspace(&keyspace_name(&descriptor.column))?;
            indexes.insert(
                descriptor.column,
                ColumnIndex {
                    kind: descriptor.kind,
                    space,
                },
            );
        }
        Ok(Self {
            backend,
            meta,
            indexes: RwLock::new(indexes),
        })
    }

    pub(crate) fn descriptors(&self) -> Vec<IndexDescriptor> {
        self.indexes
            .read()
            .iter()
            .map(|(column, idx)| IndexDescriptor::new(column.clone(), idx.kind))
            .collect()
    }

    pub(crate) fn kind_of(&self, column: &[u8]) -> Option<IndexType> {
        self.indexes.read().get(column).map(|idx| idx.kind)
    }

    /// Declare an index. `Ok(false)` when the same index already exists.
    pub(crate) fn register(&self, column: &[u8], kind: IndexType) -> TabulaResult<bool> {
        let mut indexes = self.indexes.write();
        if let Some(existing) = indexes.get(column) {
            if existing.kind == kind {
                return Ok(false);
            }
            return Err(TabulaError::IndexConflict {
                column: String::from_utf8_lossy(column).into_owned(),
                existing: existing.kind,
                requested: kind,
            });
        }

        let space = self.backend.keyspace(&keyspace_name(column))?;
        // leftovers of an index dropped without a clean close
        space.clear()?;
        metadata::save_index(self.meta.as_ref(), &IndexDescriptor::new(column, kind))?;
        indexes.insert(column.to_vec(), ColumnIndex { kind, space });
        debug!(column = %String::from_utf8_lossy(column), %kind, "index registered");
        Ok(true)
    }

    /// Rebuild one index from scratch. Returns the number of entries written.
    pub(crate) fn rebuild<I>(&self, column: &[u8], rows: I) -> TabulaResult<usize>
    where
        I: IntoIterator<Item = (Vec<u8>, Row)>,
    {
        let idx = self.get(column)?;
        idx.space.clear()?;
        let mut entries = 0;
        for (key, row) in rows {
            if let Some(value) = row.get(column) {
                for prefix in value_prefixes(idx.kind, value) {
                    idx.space.insert(&entry_key(&prefix, &key), &key)?;
                    entries += 1;
                }
            }
        }
        debug!(column = %String::from_utf8_lossy(column), entries, "index rebuilt");
        Ok(entries)
    }

    /// Drop an index and its keyspace. Row data is untouched.
    pub(crate) fn remove(&self, column: &[u8]) -> TabulaResult<()> {
        let removed = self.indexes.write().remove(column);
        if removed.is_none() {
            return Err(not_found(column));
        }
        self.backend.drop_keyspace(&keyspace_name(column))?;
        metadata::remove_index(self.meta.as_ref(), column)?;
        debug!(column = %String::from_utf8_lossy(column), "index dropped");
        Ok(())
    }

    pub(crate) fn index_row(&self, key: &[u8], row: &Row) -> TabulaResult<()> {
        for (column, idx) in self.indexes.read().iter() {
            if let Some(value) = row.get(column) {
                for prefix in value_prefixes(idx.kind, value) {
                    idx.space.insert(&entry_key(&prefix, key), key)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn unindex_row(&self, key: &[u8], row: &Row) -> TabulaResult<()> {
        for (column, idx) in self.indexes.read().iter() {
            if let Some(value) = row.get(column) {
                for prefix in value_prefixes(idx.kind, value) {
                    idx.space.remove(&entry_key(&prefix, key))?;
                }
            }
        }
        Ok(())
    }

    /// Remove every entry of every index, keeping the declarations.
    pub(crate) fn clear_entries(&self) -> TabulaResult<()> {
        for idx in self.indexes.read().values() {
            idx.space.clear()?;
        }
        Ok(())
    }

    /// Row keys produced by a probe on `column`'s index.
    pub(crate) fn probe(
        &self,
        column: &[u8],
        probe: &IndexProbe,
    ) -> TabulaResult<AHashSet<Vec<u8>>> {
        let idx = self.get(column)?;
        let space = idx.space.as_ref();
        match probe {
            IndexProbe::Range { lower, upper } => {
                let entries = space.range(as_ref_bound(lower), as_ref_bound(upper))?;
                Ok(entries.into_iter().map(|(_, key)| key).collect())
            }
            IndexProbe::Prefix(prefix) => prefix_keys(space, prefix),
            IndexProbe::AnyOf(prefixes) => {
                let mut keys = AHashSet::new();
                for prefix in prefixes {
                    keys.extend(prefix_keys(space, prefix)?);
                }
                Ok(keys)
            }
            IndexProbe::AllOf(prefixes) => {
                let mut iter = prefixes.iter();
                let Some(first) = iter.next() else {
                    return Ok(AHashSet::new());
                };
                let mut keys = prefix_keys(space, first)?;
                for prefix in iter {
                    if keys.is_empty() {
                        break;
                    }
                    let hits = prefix_keys(space, prefix)?;
                    keys.retain(|key| hits.contains(key));
                }
                Ok(keys)
            }
        }
    }

    fn get(&self, column: &[u8]) -> TabulaResult<ColumnIndex> {
        self.indexes
            .read()
            .get(column)
            .cloned()
            .ok_or_else(|| not_found(column))
    }
}

fn prefix_keys(space: &dyn Keyspace, prefix: &[u8]) -> TabulaResult<AHashSet<Vec<u8>>> {
    Ok(space
        .scan_prefix(prefix)?
        .into_iter()
        .map(|(_, key)| key)
        .collect())
}

fn as_ref_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_slice()),
        Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn not_found(column: &[u8]) -> TabulaError {
    TabulaError::IndexNotFound {
        column: String::from_utf8_lossy(column).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::keys::{encode_decimal, encode_text};
    use crate::storage::memory::MemoryBackend;

    fn manager() -> IndexManager {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let meta = backend.keyspace("meta").unwrap();
        IndexManager::load(backend, meta).unwrap()
    }

    fn rows() -> Vec<(Vec<u8>, Row)> {
        vec![
            (b"a".to_vec(), Row::new().with("age", "180").with("tags", "x y")),
            (b"b".to_vec(), Row::new().with("age", "220").with("tags", "y")),
            (b"c".to_vec(), Row::new().with("name", "no age")),
        ]
    }

    #[test]
    fn register_is_idempotent_per_type() {
        let indexes = manager();
        assert!(indexes.register(b"age", IndexType::Decimal).unwrap());
        assert!(!indexes.register(b"age", IndexType::Decimal).unwrap());
        let err = indexes.register(b"age", IndexType::Lexical).unwrap_err();
        assert!(matches!(err, TabulaError::IndexConflict { .. }));
        assert_eq!(indexes.kind_of(b"age"), Some(IndexType::Decimal));
    }

    #[test]
    fn descriptors_survive_reload() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let meta = backend.keyspace("meta").unwrap();
        {
            let indexes = IndexManager::load(backend.clone(), meta.clone()).unwrap();
            indexes.register(b"age", IndexType::Decimal).unwrap();
            indexes.register(b"tags", IndexType::Token).unwrap();
        }
        let indexes = IndexManager::load(backend, meta).unwrap();
        assert_eq!(
            indexes.descriptors(),
            vec![
                IndexDescriptor::new("age", IndexType::Decimal),
                IndexDescriptor::new("tags", IndexType::Token),
            ]
        );
    }

    #[test]
    fn decimal_range_probe() {
        let indexes = manager();
        indexes.register(b"age", IndexType::Decimal).unwrap();
        assert_eq!(indexes.rebuild(b"age", rows()).unwrap(), 2);

        let probe = IndexProbe::Range {
            lower: Bound::Included(encode_decimal(200.0).to_vec()),
            upper: Bound::Unbounded,
        };
        let keys = indexes.probe(b"age", &probe).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&b"b".to_vec()));
    }

    #[test]
    fn token_all_of_intersects() {
        let indexes = manager();
        indexes.register(b"tags", IndexType::Token).unwrap();
        indexes.rebuild(b"tags", rows()).unwrap();

        let both = IndexProbe::AllOf(vec![encode_text(b"x"), encode_text(b"y")]);
        assert_eq!(indexes.probe(b"tags", &both).unwrap().len(), 1);
        let any = IndexProbe::AnyOf(vec![encode_text(b"x"), encode_text(b"y")]);
        assert_eq!(indexes.probe(b"tags", &any).unwrap().len(), 2);
    }

    #[test]
    fn unindex_removes_entries() {
        let indexes = manager();
        indexes.register(b"age", IndexType::Decimal).unwrap();
        let (key, row) = rows().remove(0);
        indexes.index_row(&key, &row).unwrap();
        let probe = IndexProbe::Prefix(encode_decimal(180.0).to_vec());
        assert_eq!(indexes.probe(b"age", &probe).unwrap().len(), 1);
        indexes.unindex_row(&key, &row).unwrap();
        assert!(indexes.probe(b"age", &probe).unwrap().is_empty());
    }

    #[test]
    fn remove_missing_index_fails() {
        let indexes = manager();
        assert!(matches!(
            indexes.remove(b"age"),
            Err(TabulaError::IndexNotFound { .. })
        ));
        indexes.register(b"age", IndexType::Lexical).unwrap();
        indexes.remove(b"age").unwrap();
        assert_eq!(indexes.kind_of(b"age"), None);
    }
}
