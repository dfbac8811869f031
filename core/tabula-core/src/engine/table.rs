//! Table — the facade owning one Store and everything built on it.
//!
//! # Keyspaces
//!
//! | name | key | value |
//! |------|-----|-------|
//! | `rows` | row key | scan sequence (8 bytes, big-endian) + encoded row |
//! | `scan` | scan sequence | row key |
//! | `meta` | `options`, `index/<column>` | JSON |
//! | `journal` | undo sequence | bincode [`UndoRecord`] |
//! | `index/<hex column>` | encoded value + row key | row key |
//!
//! The `scan` keyspace fixes the iteration order: rows come back in the
//! order they were first inserted, and overwriting a row keeps its place.

use crate::engine::types::UndoRecord;
use crate::error::{TabulaError, TabulaResult};
use crate::index::manager::IndexManager;
use crate::row::Row;
use crate::row::codec::{decode_row, encode_row, frame, unframe};
use crate::storage::options::{OpenMode, TableOptions};
use crate::storage::{Keyspace, StorageBackend};
use lru::LruCache;
use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub(crate) const ROWS: &str = "rows";
pub(crate) const SCAN: &str = "scan";
pub(crate) const META: &str = "meta";
pub(crate) const JOURNAL: &str = "journal";

/// Rows fetched per batch by scans and iterators.
pub(crate) const SCAN_BATCH: usize = 256;

/// A schemaless key-addressed table.
///
/// `Table` is `Send + Sync`. Concurrent readers are safe; each mutation is
/// applied atomically with respect to other mutations, but a sequence of
/// mutations from several threads needs external coordination.
pub struct Table {
    pub(crate) path: Option<PathBuf>,
    pub(crate) mode: OpenMode,
    pub(crate) state: RwLock<Option<TableState>>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("open", &self.state.read_recursive().is_some())
            .finish()
    }
}

impl Table {
    /// Open state, or `ClosedHandle` once `close` has run.
    pub(crate) fn state(&self) -> TabulaResult<MappedRwLockReadGuard<'_, TableState>> {
        RwLockReadGuard::try_map(self.state.read_recursive(), |state| state.as_ref())
            .map_err(|_| TabulaError::ClosedHandle)
    }

    /// Open state of a handle allowed to mutate.
    pub(crate) fn writable(&self) -> TabulaResult<MappedRwLockReadGuard<'_, TableState>> {
        let state = self.state()?;
        if self.mode == OpenMode::Read {
            return Err(TabulaError::ReadOnly);
        }
        Ok(state)
    }

    /// Directory of the table, `None` for in-memory tables.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.state.read_recursive().is_none()
    }
}

// ════════════════════════════════════════════
// Open state
// ════════════════════════════════════════════

pub(crate) struct TableState {
    pub backend: Arc<dyn StorageBackend>,
    pub rows: Arc<dyn Keyspace>,
    pub scan: Arc<dyn Keyspace>,
    pub meta: Arc<dyn Keyspace>,
    pub journal: Arc<dyn Keyspace>,
    pub indexes: IndexManager,
    pub options: RwLock<TableOptions>,
    cache: Mutex<Option<LruCache<Vec<u8>, (u64, Row)>>>,
    /// Bumped under the cache lock by every write; a read fills the cache
    /// only if no write happened since it started.
    cache_generation: AtomicU64,
    next_seq: AtomicU64,
    next_undo: AtomicU64,
    tx_active: AtomicBool,
    /// Serializes mutations; readers never take it.
    pub write_lock: Mutex<()>,
}

impl TableState {
    pub(crate) fn new(backend: Arc<dyn StorageBackend>, options: TableOptions) -> TabulaResult<Self> {
        let rows = backend.keyspace(ROWS)?;
        let scan = backend.keyspace(SCAN)?;
        let meta = backend.keyspace(META)?;
        let journal = backend.keyspace(JOURNAL)?;
        let indexes = IndexManager::load(backend.clone(), meta.clone())?;

        let next_seq = match scan.last()? {
            Some((seq, _)) => decode_seq(&seq)? + 1,
            None => 0,
        };
        let next_undo = match journal.last()? {
            Some((seq, _)) => decode_seq(&seq)? + 1,
            None => 0,
        };

        Ok(Self {
            backend,
            rows,
            scan,
            meta,
            journal,
            indexes,
            cache: Mutex::new(new_cache(options.record_cache)),
            cache_generation: AtomicU64::new(0),
            options: RwLock::new(options),
            next_seq: AtomicU64::new(next_seq),
            next_undo: AtomicU64::new(next_undo),
            tx_active: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        })
    }

    // ── reads ─────────────────────────────────

    /// Current row under `key` with its scan sequence.
    pub(crate) fn load(&self, key: &[u8]) -> TabulaResult<Option<(u64, Row)>> {
        if let Some(cache) = self.cache.lock().as_mut()
            && let Some(hit) = cache.get(key)
        {
            return Ok(Some(hit.clone()));
        }
        let generation = self.cache_generation.load(Ordering::SeqCst);
        let Some(entry) = self.read_row(key)? else {
            return Ok(None);
        };
        self.fill_cache(key, &entry, generation);
        Ok(Some(entry))
    }

    fn read_row(&self, key: &[u8]) -> TabulaResult<Option<(u64, Row)>> {
        let Some(raw) = self.rows.get(key)? else {
            return Ok(None);
        };
        let (seq, body) = unframe(&raw)?;
        Ok(Some((seq, decode_row(body)?)))
    }

    /// Cache a row read while the cache was at `generation`.
    fn fill_cache(&self, key: &[u8], entry: &(u64, Row), generation: u64) {
        let mut cache = self.cache.lock();
        if self.cache_generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if let Some(cache) = cache.as_mut() {
            cache.put(key.to_vec(), entry.clone());
        }
    }

    /// Replace or drop the cached entry for `key` after a write.
    fn update_cache(&self, key: &[u8], entry: Option<(u64, Row)>) {
        let mut cache = self.cache.lock();
        self.cache_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(cache) = cache.as_mut() {
            match entry {
                Some(entry) => {
                    cache.put(key.to_vec(), entry);
                }
                None => {
                    cache.pop(key);
                }
            }
        }
    }

    /// Up to `limit` `(seq, key)` pairs after `after` in scan order.
    pub(crate) fn scan_keys(&self, after: Option<u64>, limit: usize) -> TabulaResult<Vec<(u64, Vec<u8>)>> {
        let after = after.map(u64::to_be_bytes);
        self.scan
            .scan_after(after.as_ref().map(|a| a.as_slice()), limit)?
            .into_iter()
            .map(|(seq, key)| Ok((decode_seq(&seq)?, key)))
            .collect()
    }

    /// Every row in scan order.
    pub(crate) fn all_rows(&self) -> TabulaResult<Vec<(Vec<u8>, Row)>> {
        let mut out = Vec::new();
        let mut after = None;
        loop {
            let batch = self.scan_keys(after, SCAN_BATCH)?;
            let Some((last, _)) = batch.last() else { break };
            after = Some(*last);
            for (_, key) in batch {
                if let Some((_, row)) = self.load(&key)? {
                    out.push((key, row));
                }
            }
        }
        Ok(out)
    }

    // ── mutations (caller holds `write_lock`) ─

    /// Write `row` under `key`, keeping the scan position of an existing row.
    pub(crate) fn store(&self, key: &[u8], row: &Row) -> TabulaResult<()> {
        let before = self.rows.get(key)?;
        self.record_undo(key, before.as_deref())?;

        let seq = match &before {
            Some(raw) => {
                let (seq, body) = unframe(raw)?;
                self.indexes.unindex_row(key, &decode_row(body)?)?;
                seq
            }
            None => {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                self.scan.insert(&seq.to_be_bytes(), key)?;
                seq
            }
        };

        self.rows.insert(key, &frame(seq, &encode_row(row)))?;
        self.indexes.index_row(key, row)?;
        self.update_cache(key, Some((seq, row.clone())));
        Ok(())
    }

    /// Remove the row under `key`. `Ok(false)` when there was none.
    pub(crate) fn erase(&self, key: &[u8]) -> TabulaResult<bool> {
        let Some(raw) = self.rows.get(key)? else {
            return Ok(false);
        };
        self.record_undo(key, Some(&raw))?;
        self.unlink(key, &raw)?;
        Ok(true)
    }

    /// Remove every row and every index entry.
    pub(crate) fn clear_rows(&self) -> TabulaResult<()> {
        if self.in_transaction() {
            let mut after: Option<Vec<u8>> = None;
            loop {
                let batch = self.rows.scan_after(after.as_deref(), SCAN_BATCH)?;
                let Some((last, _)) = batch.last() else { break };
                after = Some(last.clone());
                for (key, raw) in &batch {
                    self.record_undo(key, Some(raw))?;
                }
            }
        }
        self.rows.clear()?;
        self.scan.clear()?;
        self.indexes.clear_entries()?;
        let mut cache = self.cache.lock();
        self.cache_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(cache) = cache.as_mut() {
            cache.clear();
        }
        Ok(())
    }

    /// Put back a raw before-image without journaling it.
    fn restore(&self, key: &[u8], before: Option<&[u8]>) -> TabulaResult<()> {
        if let Some(current) = self.rows.get(key)? {
            self.unlink(key, &current)?;
        }
        if let Some(raw) = before {
            let (seq, body) = unframe(raw)?;
            let row = decode_row(body)?;
            self.rows.insert(key, raw)?;
            self.scan.insert(&seq.to_be_bytes(), key)?;
            self.indexes.index_row(key, &row)?;
        }
        self.update_cache(key, None);
        Ok(())
    }

    fn unlink(&self, key: &[u8], raw: &[u8]) -> TabulaResult<()> {
        let (seq, body) = unframe(raw)?;
        self.indexes.unindex_row(key, &decode_row(body)?)?;
        self.rows.remove(key)?;
        self.scan.remove(&seq.to_be_bytes())?;
        self.update_cache(key, None);
        Ok(())
    }

    /// Renumber scan sequences densely from zero, keeping their order.
    pub(crate) fn compact_scan(&self) -> TabulaResult<usize> {
        let mut entries = Vec::new();
        let mut after = None;
        loop {
            let batch = self.scan_keys(after, SCAN_BATCH)?;
            let Some((last, _)) = batch.last() else { break };
            after = Some(*last);
            entries.extend(batch);
        }

        self.scan.clear()?;
        for (new_seq, (_, key)) in entries.iter().enumerate() {
            let new_seq = new_seq as u64;
            if let Some(raw) = self.rows.get(key)? {
                let (_, body) = unframe(&raw)?;
                self.rows.insert(key, &frame(new_seq, body))?;
                self.scan.insert(&new_seq.to_be_bytes(), key)?;
            }
        }
        self.next_seq.store(entries.len() as u64, Ordering::SeqCst);
        self.reset_cache();
        Ok(entries.len())
    }

    pub(crate) fn reset_cache(&self) {
        let capacity = self.options.read().record_cache;
        let mut cache = self.cache.lock();
        self.cache_generation.fetch_add(1, Ordering::SeqCst);
        *cache = new_cache(capacity);
    }

    // ── undo journal ──────────────────────────

    pub(crate) fn in_transaction(&self) -> bool {
        self.tx_active.load(Ordering::SeqCst)
    }

    /// Mark a transaction active. `false` if one already was.
    pub(crate) fn start_transaction(&self) -> bool {
        !self.tx_active.swap(true, Ordering::SeqCst)
    }

    fn record_undo(&self, key: &[u8], before: Option<&[u8]>) -> TabulaResult<()> {
        if !self.in_transaction() {
            return Ok(());
        }
        let record = UndoRecord {
            key: key.to_vec(),
            before: before.map(<[u8]>::to_vec),
        };
        let seq = self.next_undo.fetch_add(1, Ordering::SeqCst);
        self.journal.insert(&seq.to_be_bytes(), &bincode::serialize(&record)?)?;
        Ok(())
    }

    pub(crate) fn pending_undo(&self) -> TabulaResult<usize> {
        self.journal.len()
    }

    /// Forget the journal, making every journaled mutation permanent.
    pub(crate) fn commit_journal(&self) -> TabulaResult<()> {
        self.journal.clear()?;
        self.backend.flush()?;
        self.next_undo.store(0, Ordering::SeqCst);
        self.tx_active.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Replay the journal backwards. Returns the number of undone mutations.
    pub(crate) fn rollback_journal(&self) -> TabulaResult<usize> {
        let entries = self
            .journal
            .range(std::ops::Bound::Unbounded, std::ops::Bound::Unbounded)?;
        for (_, bytes) in entries.iter().rev() {
            let record: UndoRecord = bincode::deserialize(bytes)?;
            self.restore(&record.key, record.before.as_deref())?;
        }
        self.journal.clear()?;
        self.backend.flush()?;
        self.next_undo.store(0, Ordering::SeqCst);
        self.tx_active.store(false, Ordering::SeqCst);
        Ok(entries.len())
    }
}

fn new_cache(capacity: usize) -> Option<LruCache<Vec<u8>, (u64, Row)>> {
    NonZeroUsize::new(capacity).map(LruCache::new)
}

fn decode_seq(bytes: &[u8]) -> TabulaResult<u64> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| TabulaError::Corrupted(format!("sequence key of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(array))
}
