//! Typestate Transaction — 타입 안전 트랜잭션
//!
//! Typestate 패턴으로 커밋/롤백 이후의 사용을 컴파일 타임에 막습니다.
//! 트랜잭션 안의 쓰기는 테이블에 즉시 반영되고, 변경 직전의 행 이미지가
//! 영속 undo 저널에 기록됩니다. `rollback()`은 저널을 역순으로 재생하고,
//! `commit()`은 저널을 비운 뒤 flush합니다.
//!
//! Active 상태의 트랜잭션이 커밋되지 않고 drop되면 (에러 전파, 조기 반환,
//! 패닉) 자동으로 롤백됩니다.

use crate::engine::table::Table;
use crate::error::{TabulaError, TabulaResult};
use std::marker::PhantomData;
use std::ops::Deref;
use tracing::{debug, warn};

/// 트랜잭션 상태 트레이트
pub trait TxState {}

/// Active 상태 — 트랜잭션 진행 중
pub struct Active;

/// Committed 상태 — 커밋 완료
pub struct Committed;

/// RolledBack 상태 — 롤백 완료
pub struct RolledBack;

impl TxState for Active {}
impl TxState for Committed {}
impl TxState for RolledBack {}

/// Typestate Transaction
///
/// Active 상태에서는 `Deref`로 테이블의 모든 연산을 그대로 사용할 수 있으며,
/// commit/rollback 후에는 컴파일 타임에 사용 불가.
pub struct Transaction<'a, S: TxState> {
    table: &'a Table,
    finished: bool,
    _state: PhantomData<S>,
}

impl Table {
    /// 트랜잭션 시작
    ///
    /// 핸들당 하나의 트랜잭션만 활성화될 수 있습니다.
    /// 이미 진행 중이면 `InvalidOperation`.
    pub fn begin(&self) -> TabulaResult<Transaction<'_, Active>> {
        let state = self.writable()?;
        let _guard = state.write_lock.lock();
        if !state.start_transaction() {
            return Err(TabulaError::InvalidOperation {
                message: "a transaction is already active on this handle".to_string(),
                context: "begin".to_string(),
            });
        }
        debug!("Transaction started");
        Ok(Transaction {
            table: self,
            finished: false,
            _state: PhantomData,
        })
    }

    /// 스코프 트랜잭션
    ///
    /// 클로저가 `Ok`를 반환하면 커밋하고, `Err`를 반환하면 롤백한 뒤
    /// 원래 에러를 그대로 돌려줍니다. 패닉 시에도 롤백됩니다.
    ///
    /// ```rust
    /// use tabula_core::{Table, TabulaError};
    ///
    /// # fn main() -> tabula_core::TabulaResult<()> {
    /// let table = Table::open_in_memory()?;
    /// let result: Result<(), TabulaError> = table.transaction(|t| {
    ///     t.put("a", [("v", "1")])?;
    ///     t.put("b", serde_json::json!("not a row"))?;
    ///     Ok(())
    /// });
    /// assert!(result.is_err());
    /// assert!(table.is_empty()?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Table) -> Result<T, E>,
        E: From<TabulaError>,
    {
        let tx = self.begin()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "Rollback after failed transaction body failed");
                }
                Err(err)
            }
        }
    }

    /// 활성 트랜잭션 여부
    pub fn in_transaction(&self) -> TabulaResult<bool> {
        Ok(self.state()?.in_transaction())
    }
}

impl<'a> Transaction<'a, Active> {
    /// 현재 트랜잭션에서 저널에 기록된 변경 개수
    pub fn pending_ops(&self) -> TabulaResult<usize> {
        self.table.state()?.pending_undo()
    }

    // ════════════════════════════════════════════
    // Commit / Rollback
    // ════════════════════════════════════════════

    /// 트랜잭션 커밋 — undo 저널을 비우고 flush
    pub fn commit(mut self) -> TabulaResult<Transaction<'a, Committed>> {
        {
            let state = self.table.state()?;
            let _guard = state.write_lock.lock();
            state.commit_journal()?;
        }
        self.finished = true;
        debug!("Transaction committed");
        Ok(Transaction {
            table: self.table,
            finished: true,
            _state: PhantomData,
        })
    }

    /// 트랜잭션 롤백 — 저널의 이전 이미지를 역순으로 복원
    pub fn rollback(mut self) -> TabulaResult<Transaction<'a, RolledBack>> {
        let undone = {
            let state = self.table.state()?;
            let _guard = state.write_lock.lock();
            state.rollback_journal()?
        };
        self.finished = true;
        debug!(undone, "Transaction rolled back");
        Ok(Transaction {
            table: self.table,
            finished: true,
            _state: PhantomData,
        })
    }
}

impl Deref for Transaction<'_, Active> {
    type Target = Table;

    fn deref(&self) -> &Table {
        self.table
    }
}

impl<S: TxState> Drop for Transaction<'_, S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // closed handles were rolled back by `close`
        let Ok(state) = self.table.state() else { return };
        if !state.in_transaction() {
            return;
        }
        warn!("Transaction dropped without commit, rolling back");
        let _guard = state.write_lock.lock();
        if let Err(e) = state.rollback_journal() {
            warn!(error = %e, "Rollback on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;

    #[test]
    fn typestate_transitions() {
        let table = Table::open_in_memory().unwrap();
        let tx = table.begin().unwrap();
        tx.put("a", [("v", "1")]).unwrap();
        assert_eq!(tx.pending_ops().unwrap(), 1);
        let _committed: Transaction<'_, Committed> = tx.commit().unwrap();
        assert!(!table.in_transaction().unwrap());
        assert_eq!(table.get("a").unwrap(), Row::new().with("v", "1"));
    }

    #[test]
    fn rollback_restores_previous_state() {
        let table = Table::open_in_memory().unwrap();
        table.put("a", [("v", "old")]).unwrap();

        let tx = table.begin().unwrap();
        tx.put("a", [("v", "new")]).unwrap();
        tx.put("b", [("v", "added")]).unwrap();
        tx.delete("a").unwrap();
        let _rolled: Transaction<'_, RolledBack> = tx.rollback().unwrap();

        assert_eq!(table.keys().unwrap(), vec![b"a".to_vec()]);
        assert_eq!(table.get("a").unwrap(), Row::new().with("v", "old"));
    }

    #[test]
    fn only_one_active_transaction() {
        let table = Table::open_in_memory().unwrap();
        let _tx = table.begin().unwrap();
        assert!(matches!(
            table.begin(),
            Err(TabulaError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn drop_rolls_back() {
        let table = Table::open_in_memory().unwrap();
        {
            let tx = table.begin().unwrap();
            tx.put("a", [("v", "1")]).unwrap();
        }
        assert!(table.is_empty().unwrap());
        assert!(!table.in_transaction().unwrap());
        // the handle accepts a new transaction afterwards
        table.begin().unwrap().commit().unwrap();
    }

    #[test]
    fn scoped_helper_returns_original_error() {
        #[derive(Debug)]
        enum AppError {
            Store(TabulaError),
            Business(&'static str),
        }
        impl From<TabulaError> for AppError {
            fn from(e: TabulaError) -> Self {
                AppError::Store(e)
            }
        }

        let table = Table::open_in_memory().unwrap();
        let result: Result<(), AppError> = table.transaction(|t| {
            t.put("a", [("v", "1")])?;
            Err(AppError::Business("insufficient funds"))
        });
        assert!(matches!(result, Err(AppError::Business("insufficient funds"))));
        assert!(table.is_empty().unwrap());

        let value: Result<u32, AppError> = table.transaction(|t| {
            t.put("a", [("v", "1")])?;
            Ok(7)
        });
        assert_eq!(value.unwrap(), 7);
        assert!(table.contains("a").unwrap());
        let _ = AppError::Store(TabulaError::KeyNotFound);
    }

    #[test]
    fn clear_inside_transaction_is_undone() {
        let table = Table::open_in_memory().unwrap();
        table.put("a", [("v", "1")]).unwrap();
        table.put("b", [("v", "2")]).unwrap();
        let tx = table.begin().unwrap();
        tx.clear().unwrap();
        assert!(tx.is_empty().unwrap());
        tx.rollback().unwrap();
        assert_eq!(table.keys().unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
