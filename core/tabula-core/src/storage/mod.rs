//! Storage module — the keyspace-level Store underneath every table.
//!
//! A table never talks to sled or to a `BTreeMap` directly: it asks a
//! [`StorageBackend`] for named [`Keyspace`]s (rows, scan order, index
//! entries, metadata, undo journal) and works through those.

pub mod memory;
pub mod options;
pub mod sled_backend;

use crate::error::TabulaResult;
use crate::storage::options::TableOptions;
use std::ops::Bound;
use std::sync::Arc;

/// Key/value pairs returned by range scans.
pub type Entries = Vec<(Vec<u8>, Vec<u8>)>;

/// One ordered, byte-exact key/value namespace.
///
/// # Contract
///
/// - `insert` / `remove` return the previous value, if any.
/// - `get` returns `None` for missing keys, never errors for absence.
/// - `range`, `scan_prefix` and `scan_after` yield entries in key order.
/// - A reversed or empty range yields no entries, never panics.
pub trait Keyspace: Send + Sync {
    fn get(&self, key: &[u8]) -> TabulaResult<Option<Vec<u8>>>;

    fn insert(&self, key: &[u8], value: &[u8]) -> TabulaResult<Option<Vec<u8>>>;

    fn remove(&self, key: &[u8]) -> TabulaResult<Option<Vec<u8>>>;

    fn contains(&self, key: &[u8]) -> TabulaResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Scan all entries between two bounds.
    fn range(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> TabulaResult<Entries>;

    /// Scan all entries whose key starts with `prefix`.
    fn scan_prefix(&self, prefix: &[u8]) -> TabulaResult<Entries> {
        match prefix_upper_bound(prefix) {
            Some(upper) => self.range(Bound::Included(prefix), Bound::Excluded(&upper)),
            None => self.range(Bound::Included(prefix), Bound::Unbounded),
        }
    }

    /// Up to `limit` entries strictly after `after` (from the start when `None`).
    fn scan_after(&self, after: Option<&[u8]>, limit: usize) -> TabulaResult<Entries>;

    /// Entry with the greatest key.
    fn last(&self) -> TabulaResult<Option<(Vec<u8>, Vec<u8>)>>;

    fn len(&self) -> TabulaResult<usize>;

    fn is_empty(&self) -> TabulaResult<bool> {
        Ok(self.len()? == 0)
    }

    fn clear(&self) -> TabulaResult<()>;
}

/// The Store: a set of named keyspaces sharing one durability domain.
///
/// Implementations:
/// - [`sled_backend::SledBackend`] — durable, one sled database per table
/// - [`memory::MemoryBackend`] — volatile, `BTreeMap` per keyspace
pub trait StorageBackend: Send + Sync {
    /// Open (creating if needed) the keyspace called `name`.
    fn keyspace(&self, name: &str) -> TabulaResult<Arc<dyn Keyspace>>;

    /// Remove a keyspace and all its entries. Returns `true` if it existed.
    fn drop_keyspace(&self, name: &str) -> TabulaResult<bool>;

    fn keyspace_names(&self) -> TabulaResult<Vec<String>>;

    /// Persist buffered writes.
    fn flush(&self) -> TabulaResult<()>;

    /// Reject tuning the Store cannot apply to data it already holds.
    fn check_options(&self, _options: &TableOptions) -> TabulaResult<()> {
        Ok(())
    }
}

/// Smallest key greater than every key starting with `prefix`.
///
/// `None` when no such key exists (empty prefix or all `0xFF`).
pub(crate) fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < u8::MAX {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}

/// `true` when no key can lie between the bounds.
pub(crate) fn range_is_empty(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    match (lower, upper) {
        (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
        (Bound::Included(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi))
        | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_bound_increments_last_byte() {
        assert_eq!(prefix_upper_bound(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_upper_bound(b"a\xff"), Some(b"b".to_vec()));
        assert_eq!(prefix_upper_bound(b"\xff\xff"), None);
        assert_eq!(prefix_upper_bound(b""), None);
    }

    #[test]
    fn reversed_ranges_are_empty() {
        assert!(range_is_empty(Bound::Included(&b"b"[..]), Bound::Included(&b"a"[..])));
        assert!(range_is_empty(Bound::Excluded(&b"a"[..]), Bound::Excluded(&b"a"[..])));
        assert!(!range_is_empty(Bound::Included(&b"a"[..]), Bound::Included(&b"a"[..])));
        assert!(!range_is_empty(Bound::Unbounded, Bound::Excluded(&b"a"[..])));
    }
}
