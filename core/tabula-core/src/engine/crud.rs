//! Table CRUD Operations — get / put / delete / iterate

use crate::engine::table::{SCAN_BATCH, Table};
use crate::engine::types::{PutMode, PutOutcome};
use crate::error::{TabulaError, TabulaResult};
use crate::row::codec::FRAME_HEADER_LEN;
use crate::row::{IntoRow, Row};
use std::collections::VecDeque;

impl Table {
    // ════════════════════════════════════════════
    // READ Operations
    // ════════════════════════════════════════════

    /// 키에 해당하는 행을 조회합니다.
    ///
    /// 키가 없으면 `KeyNotFound`를 반환합니다.
    pub fn get(&self, key: impl AsRef<[u8]>) -> TabulaResult<Row> {
        self.try_get(key)?.ok_or(TabulaError::KeyNotFound)
    }

    /// Like [`get`](Self::get), with `None` for an absent key.
    pub fn try_get(&self, key: impl AsRef<[u8]>) -> TabulaResult<Option<Row>> {
        Ok(self.state()?.load(key.as_ref())?.map(|(_, row)| row))
    }

    /// Row under `key`, or `default` when the key is absent.
    pub fn get_or_default(&self, key: impl AsRef<[u8]>, default: Row) -> TabulaResult<Row> {
        Ok(self.try_get(key)?.unwrap_or(default))
    }

    pub fn contains(&self, key: impl AsRef<[u8]>) -> TabulaResult<bool> {
        self.state()?.rows.contains(key.as_ref())
    }

    /// 인코딩된 행의 바이트 길이. 키가 없으면 `-1`.
    pub fn size_of(&self, key: impl AsRef<[u8]>) -> TabulaResult<i64> {
        let state = self.state()?;
        Ok(match state.rows.get(key.as_ref())? {
            Some(raw) => raw.len().saturating_sub(FRAME_HEADER_LEN) as i64,
            None => -1,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> TabulaResult<usize> {
        self.state()?.rows.len()
    }

    pub fn is_empty(&self) -> TabulaResult<bool> {
        self.state()?.rows.is_empty()
    }

    /// Lazy `(key, row)` iterator in insertion order.
    ///
    /// Rows are fetched in batches. Mutating the table while iterating is
    /// allowed; rows written behind the cursor are not revisited.
    pub fn iter(&self) -> RowIter<'_> {
        RowIter {
            table: self,
            after: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Every key in insertion order.
    pub fn keys(&self) -> TabulaResult<Vec<Vec<u8>>> {
        let state = self.state()?;
        let mut keys = Vec::new();
        let mut after = None;
        loop {
            let batch = state.scan_keys(after, SCAN_BATCH)?;
            let Some((last, _)) = batch.last() else { break };
            after = Some(*last);
            keys.extend(batch.into_iter().map(|(_, key)| key));
        }
        Ok(keys)
    }

    // ════════════════════════════════════════════
    // WRITE Operations
    // ════════════════════════════════════════════

    /// 행을 저장합니다 (덮어쓰기).
    ///
    /// 행 변환과 검증은 저장소를 건드리기 전에 수행됩니다. 컬럼 매핑이
    /// 아닌 값은 `MalformedRow`로 실패하며 아무것도 기록되지 않습니다.
    pub fn put(&self, key: impl AsRef<[u8]>, row: impl IntoRow) -> TabulaResult<()> {
        self.put_with(key, row, PutMode::Overwrite).map(|_| ())
    }

    /// `put` with an explicit reconciliation mode. Every mode creates a
    /// missing row.
    ///
    /// ```rust
    /// use tabula_core::{PutMode, PutOutcome, Row, Table};
    ///
    /// # fn main() -> tabula_core::TabulaResult<()> {
    /// let table = Table::open_in_memory()?;
    /// table.put("k", [("a", "1")])?;
    ///
    /// let outcome = table.put_with("k", [("a", "2")], PutMode::Keep)?;
    /// assert_eq!(outcome, PutOutcome::Kept);
    ///
    /// let outcome = table.put_with("k", [("b", "2")], PutMode::Concat)?;
    /// assert_eq!(outcome, PutOutcome::Merged);
    /// assert_eq!(table.get("k")?, Row::new().with("a", "1").with("b", "2"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn put_with(
        &self,
        key: impl AsRef<[u8]>,
        row: impl IntoRow,
        mode: PutMode,
    ) -> TabulaResult<PutOutcome> {
        let row = row.into_row()?;
        row.validate()?;

        let key = key.as_ref();
        let state = self.writable()?;
        let _guard = state.write_lock.lock();

        let existing = match mode {
            PutMode::Overwrite => None,
            PutMode::Keep | PutMode::Concat => state.load(key)?.map(|(_, row)| row),
        };
        match (mode, existing) {
            (PutMode::Keep, Some(_)) => Ok(PutOutcome::Kept),
            (PutMode::Concat, Some(mut current)) => {
                current.merge(row);
                state.store(key, &current)?;
                Ok(PutOutcome::Merged)
            }
            _ => {
                state.store(key, &row)?;
                Ok(PutOutcome::Put)
            }
        }
    }

    /// Store `row` unless `key` already exists. `true` when written.
    pub fn keep_or_put(&self, key: impl AsRef<[u8]>, row: impl IntoRow) -> TabulaResult<bool> {
        Ok(self.put_with(key, row, PutMode::Keep)? == PutOutcome::Put)
    }

    /// 행을 삭제합니다. 키가 없으면 `KeyNotFound`.
    pub fn delete(&self, key: impl AsRef<[u8]>) -> TabulaResult<()> {
        let state = self.writable()?;
        let _guard = state.write_lock.lock();
        if state.erase(key.as_ref())? {
            Ok(())
        } else {
            Err(TabulaError::KeyNotFound)
        }
    }

    /// Remove every row and all index content. Index declarations stay.
    pub fn clear(&self) -> TabulaResult<()> {
        let state = self.writable()?;
        let _guard = state.write_lock.lock();
        state.clear_rows()
    }
}

/// Iterator returned by [`Table::iter`].
pub struct RowIter<'a> {
    table: &'a Table,
    after: Option<u64>,
    buffer: VecDeque<(Vec<u8>, Row)>,
    done: bool,
}

impl RowIter<'_> {
    fn refill(&mut self) -> TabulaResult<()> {
        let table = self.table;
        let state = table.state()?;
        while self.buffer.is_empty() {
            let batch = state.scan_keys(self.after, SCAN_BATCH)?;
            let Some((last, _)) = batch.last() else {
                self.done = true;
                break;
            };
            self.after = Some(*last);
            for (_, key) in batch {
                // deleted between the scan and the load
                if let Some((_, row)) = state.load(&key)? {
                    self.buffer.push_back((key, row));
                }
            }
        }
        Ok(())
    }
}

impl Iterator for RowIter<'_> {
    type Item = TabulaResult<(Vec<u8>, Row)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            if let Err(e) = self.refill() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::options::{OpenMode, TableOptions};

    fn table() -> Table {
        Table::open_in_memory().unwrap()
    }

    #[test]
    fn get_missing_is_key_not_found() {
        let table = table();
        assert!(matches!(table.get("nope"), Err(TabulaError::KeyNotFound)));
        assert_eq!(table.try_get("nope").unwrap(), None);
        let fallback = Row::new().with("x", "y");
        assert_eq!(table.get_or_default("nope", fallback.clone()).unwrap(), fallback);
    }

    #[test]
    fn keep_never_alters_existing_row() {
        let table = table();
        table.put("k", [("a", "1")]).unwrap();
        assert_eq!(table.put_with("k", [("a", "2")], PutMode::Keep).unwrap(), PutOutcome::Kept);
        assert_eq!(table.get("k").unwrap(), Row::new().with("a", "1"));
        assert!(table.keep_or_put("fresh", [("a", "3")]).unwrap());
        assert!(!table.keep_or_put("fresh", [("a", "4")]).unwrap());
    }

    #[test]
    fn concat_merges_and_new_values_win() {
        let table = table();
        table.put("k", [("a", "1"), ("b", "1")]).unwrap();
        table.put_with("k", [("b", "2"), ("c", "3")], PutMode::Concat).unwrap();
        assert_eq!(
            table.get("k").unwrap(),
            Row::new().with("a", "1").with("b", "2").with("c", "3")
        );
        assert_eq!(
            table.put_with("new", [("z", "0")], PutMode::Concat).unwrap(),
            PutOutcome::Put
        );
    }

    #[test]
    fn size_of_uses_sentinel() {
        let table = table();
        table.put("k", [("ab", "cde")]).unwrap();
        // one varint byte per length prefix
        assert_eq!(table.size_of("k").unwrap(), 7);
        assert_eq!(table.size_of("missing").unwrap(), -1);
    }

    #[test]
    fn delete_missing_is_key_not_found() {
        let table = table();
        assert!(matches!(table.delete("k"), Err(TabulaError::KeyNotFound)));
        table.put("k", [("a", "1")]).unwrap();
        table.delete("k").unwrap();
        assert!(!table.contains("k").unwrap());
    }

    #[test]
    fn malformed_row_writes_nothing() {
        let table = table();
        let err = table.put("k", serde_json::json!(42)).unwrap_err();
        assert!(matches!(err, TabulaError::MalformedRow(_)));
        assert!(table.is_empty().unwrap());
        assert!(table.put("k", [("", "v")]).is_err());
        assert!(table.is_empty().unwrap());
    }

    #[test]
    fn iter_spans_batches_in_insertion_order() {
        let table = table();
        let keys: Vec<String> = (0..600).rev().map(|i| format!("k{i:04}")).collect();
        for key in &keys {
            table.put(key, [("v", key.as_str())]).unwrap();
        }
        let seen: Vec<Vec<u8>> = table.iter().map(|r| r.unwrap().0).collect();
        let expected: Vec<Vec<u8>> = keys.iter().map(|k| k.as_bytes().to_vec()).collect();
        assert_eq!(seen, expected);
        assert_eq!(table.keys().unwrap(), expected);
    }

    #[test]
    fn clear_keeps_table_usable() {
        let table = table();
        table.put("a", [("x", "1")]).unwrap();
        table.put("b", [("x", "2")]).unwrap();
        table.clear().unwrap();
        assert_eq!(table.len().unwrap(), 0);
        table.put("c", [("x", "3")]).unwrap();
        assert_eq!(table.keys().unwrap(), vec![b"c".to_vec()]);
    }

    #[test]
    fn read_only_rejects_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro");
        {
            let table = Table::create(&path).unwrap();
            table.put("k", [("a", "1")]).unwrap();
            table.close().unwrap();
        }
        let table = Table::open(&path, OpenMode::Read, TableOptions::default()).unwrap();
        assert_eq!(table.get("k").unwrap().get_str("a"), Some("1"));
        assert!(matches!(table.put("k", [("a", "2")]), Err(TabulaError::ReadOnly)));
        assert!(matches!(table.delete("k"), Err(TabulaError::ReadOnly)));
        assert!(matches!(table.clear(), Err(TabulaError::ReadOnly)));
    }
}
