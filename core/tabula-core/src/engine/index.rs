//! Index DDL and optimization on the table facade.

use crate::engine::metadata;
use crate::engine::table::Table;
use crate::error::{TabulaError, TabulaResult};
use crate::index::{IndexDescriptor, IndexType};
use crate::storage::options::TableOptions;
use tracing::{info, instrument};

impl Table {
    /// 컬럼에 보조 인덱스를 생성합니다.
    ///
    /// 이미 저장된 행으로부터 인덱스를 즉시 구축합니다.
    ///
    /// # 반환값
    ///
    /// * `Ok(true)` - 새 인덱스가 생성됨
    /// * `Ok(false)` - 같은 타입의 인덱스가 이미 존재 (아무 일도 없음)
    /// * `Err(IndexConflict)` - 다른 타입의 인덱스가 이미 존재
    #[instrument(skip(self, column))]
    pub fn create_index(&self, column: impl AsRef<[u8]>, kind: IndexType) -> TabulaResult<bool> {
        let column = column.as_ref();
        let state = self.writable()?;
        let _guard = state.write_lock.lock();

        if !state.indexes.register(column, kind)? {
            return Ok(false);
        }
        let entries = state.indexes.rebuild(column, state.all_rows()?)?;
        info!(
            column = %String::from_utf8_lossy(column),
            %kind,
            entries,
            "Index created"
        );
        Ok(true)
    }

    /// 인덱스를 삭제합니다. 행 데이터는 그대로 유지됩니다.
    ///
    /// 인덱스가 없으면 `IndexNotFound`.
    pub fn delete_index(&self, column: impl AsRef<[u8]>) -> TabulaResult<()> {
        let state = self.writable()?;
        let _guard = state.write_lock.lock();
        state.indexes.remove(column.as_ref())
    }

    /// Rebuild one index from the stored rows. Query results never change.
    pub fn optimize_index(&self, column: impl AsRef<[u8]>) -> TabulaResult<()> {
        let column = column.as_ref();
        let state = self.writable()?;
        let _guard = state.write_lock.lock();
        if state.indexes.kind_of(column).is_none() {
            return Err(TabulaError::IndexNotFound {
                column: String::from_utf8_lossy(column).into_owned(),
            });
        }
        state.indexes.rebuild(column, state.all_rows()?)?;
        Ok(())
    }

    /// Rebuild every declared index.
    pub fn optimize_all_indexes(&self) -> TabulaResult<()> {
        let state = self.writable()?;
        let _guard = state.write_lock.lock();
        let rows = state.all_rows()?;
        for descriptor in state.indexes.descriptors() {
            state.indexes.rebuild(&descriptor.column, rows.iter().cloned())?;
        }
        Ok(())
    }

    /// Declared indexes, ordered by column name.
    pub fn indexes(&self) -> TabulaResult<Vec<IndexDescriptor>> {
        Ok(self.state()?.indexes.descriptors())
    }

    /// 테이블 전체를 최적화합니다.
    ///
    /// 새 튜닝 옵션이 주어지면 메타데이터에 기록하고 행 캐시 크기를 갱신합니다.
    /// 스캔 순서를 0부터 다시 번호 매기고 모든 인덱스를 재구축한 뒤 flush합니다.
    /// 트랜잭션 중에는 `InvalidOperation`.
    ///
    /// 디스크 테이블의 페이지 압축은 생성 시점에 고정됩니다. 압축 여부를
    /// 바꾸는 옵션은 아무것도 기록하기 전에 `Storage` 에러로 거부됩니다.
    #[instrument(skip(self, options))]
    pub fn optimize(&self, options: Option<TableOptions>) -> TabulaResult<()> {
        let state = self.writable()?;
        let _guard = state.write_lock.lock();
        if state.in_transaction() {
            return Err(TabulaError::InvalidOperation {
                message: "cannot optimize inside a transaction".to_string(),
                context: "optimize".to_string(),
            });
        }

        if let Some(options) = options {
            state.backend.check_options(&options)?;
            metadata::save_options(state.meta.as_ref(), &options)?;
            *state.options.write() = options;
        }
        let rows = state.compact_scan()?;

        let all = state.all_rows()?;
        for descriptor in state.indexes.descriptors() {
            state.indexes.rebuild(&descriptor.column, all.iter().cloned())?;
        }
        state.backend.flush()?;
        info!(rows, "Table optimized");
        Ok(())
    }
}
