//! Metadata Persistence — table options and index descriptors
//!
//! Stored as JSON documents in the table's `meta` keyspace so they are
//! restored automatically when the table is reopened.

use crate::error::TabulaResult;
use crate::index::IndexDescriptor;
use crate::storage::Keyspace;
use crate::storage::options::TableOptions;

// ════════════════════════════════════════════
// Keys
// ════════════════════════════════════════════

const OPTIONS_KEY: &[u8] = b"options";
const INDEX_PREFIX: &[u8] = b"index/";

fn index_key(column: &[u8]) -> Vec<u8> {
    let mut key = INDEX_PREFIX.to_vec();
    key.extend_from_slice(column);
    key
}

// ════════════════════════════════════════════
// Options
// ════════════════════════════════════════════

pub(crate) fn save_options(meta: &dyn Keyspace, options: &TableOptions) -> TabulaResult<()> {
    let json = serde_json::to_vec(options)?;
    meta.insert(OPTIONS_KEY, &json)?;
    Ok(())
}

pub(crate) fn load_options(meta: &dyn Keyspace) -> TabulaResult<Option<TableOptions>> {
    match meta.get(OPTIONS_KEY)? {
        Some(json) => Ok(Some(serde_json::from_slice(&json)?)),
        None => Ok(None),
    }
}

// ════════════════════════════════════════════
// Index descriptors
// ════════════════════════════════════════════

pub(crate) fn save_index(meta: &dyn Keyspace, descriptor: &IndexDescriptor) -> TabulaResult<()> {
    let json = serde_json::to_vec(descriptor)?;
    meta.insert(&index_key(&descriptor.column), &json)?;
    Ok(())
}

pub(crate) fn remove_index(meta: &dyn Keyspace, column: &[u8]) -> TabulaResult<bool> {
    Ok(meta.remove(&index_key(column))?.is_some())
}

pub(crate) fn load_indexes(meta: &dyn Keyspace) -> TabulaResult<Vec<IndexDescriptor>> {
    meta.scan_prefix(INDEX_PREFIX)?
        .into_iter()
        .map(|(_, json)| Ok(serde_json::from_slice(&json)?))
        .collect()
}
