//! Table Constructors — open, create and close

use crate::engine::metadata;
use crate::engine::table::{Table, TableState};
use crate::error::{TabulaError, TabulaResult};
use crate::storage::StorageBackend;
use crate::storage::memory::MemoryBackend;
use crate::storage::options::{OpenMode, TableOptions};
use crate::storage::sled_backend::SledBackend;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

impl Table {
    /// 테이블을 열거나 생성합니다.
    ///
    /// `OpenMode::Write`는 경로에 테이블이 없으면 새로 만들고,
    /// `OpenMode::Read`는 기존 테이블만 열며 모든 변경을 `ReadOnly`로 거부합니다.
    ///
    /// 기존 테이블의 튜닝 옵션은 저장된 값을 따릅니다. 런타임 캐시 크기
    /// (`record_cache`, `leaf_cache`, `node_cache`, `mmap_size`)만 호출자의
    /// 값이 적용됩니다. 저장된 옵션은 [`Table::optimize`]로 바꿉니다.
    ///
    /// 이전 세션이 트랜잭션 도중 종료되어 undo 저널이 남아 있으면,
    /// 테이블을 사용하기 전에 롤백합니다.
    ///
    /// # 예제
    ///
    /// ```rust
    /// use tabula_core::{OpenMode, Table, TableOptions};
    ///
    /// # fn main() -> tabula_core::TabulaResult<()> {
    /// let dir = tempfile::tempdir()?;
    /// let table = Table::open(dir.path().join("people"), OpenMode::Write, TableOptions::default())?;
    /// table.put("ludwig", [("name", "Ludwig"), ("age", "180")])?;
    /// assert_eq!(table.len()?, 1);
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(path, options))]
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, options: TableOptions) -> TabulaResult<Self> {
        let path = path.as_ref();
        info!("Opening table at {:?}", path);

        let exists = path.exists();
        if mode == OpenMode::Read && !exists {
            return Err(TabulaError::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no table at {}", path.display()),
                ),
            });
        }
        if !exists {
            std::fs::create_dir_all(path)?;
        }

        let backend: Arc<dyn StorageBackend> = Arc::new(SledBackend::open(path, &options)?);
        let table = Self::from_backend(backend, mode, options)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..table
        })
    }

    /// `Table::open(path, OpenMode::Write, TableOptions::default())`
    pub fn create(path: impl AsRef<Path>) -> TabulaResult<Self> {
        Self::open(path, OpenMode::Write, TableOptions::default())
    }

    /// 디스크 없이 메모리에만 존재하는 테이블 (테스트, 임시 테이블용)
    pub fn open_in_memory() -> TabulaResult<Self> {
        Self::open_in_memory_with(TableOptions::default())
    }

    pub fn open_in_memory_with(options: TableOptions) -> TabulaResult<Self> {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        Self::from_backend(backend, OpenMode::Write, options)
    }

    fn from_backend(
        backend: Arc<dyn StorageBackend>,
        mode: OpenMode,
        requested: TableOptions,
    ) -> TabulaResult<Self> {
        let meta = backend.keyspace(crate::engine::table::META)?;
        let options = match metadata::load_options(meta.as_ref())? {
            Some(stored) => TableOptions {
                record_cache: requested.record_cache,
                leaf_cache: requested.leaf_cache,
                node_cache: requested.node_cache,
                mmap_size: requested.mmap_size,
                ..stored
            },
            None => {
                if mode == OpenMode::Write {
                    metadata::save_options(meta.as_ref(), &requested)?;
                }
                requested
            }
        };

        let state = TableState::new(backend, options)?;
        let pending = state.pending_undo()?;
        if pending > 0 {
            warn!(pending, "Unfinished transaction found, rolling back");
            state.rollback_journal()?;
        }
        let rows = state.rows.len()?;
        let indexes = state.indexes.descriptors().len();
        info!(rows, indexes, "Table ready");

        Ok(Self {
            path: None,
            mode,
            state: RwLock::new(Some(state)),
        })
    }

    /// Persist buffered writes.
    pub fn flush(&self) -> TabulaResult<()> {
        self.state()?.backend.flush()
    }

    /// Tuning options in effect.
    pub fn options(&self) -> TabulaResult<TableOptions> {
        Ok(self.state()?.options.read().clone())
    }

    /// 테이블을 닫습니다.
    ///
    /// 진행 중인 트랜잭션은 롤백되고, 버퍼는 디스크에 기록됩니다.
    /// 이후의 모든 호출(두 번째 `close` 포함)은 `ClosedHandle`을 반환합니다.
    #[instrument(skip(self))]
    pub fn close(&self) -> TabulaResult<()> {
        let state = self.state.write().take().ok_or(TabulaError::ClosedHandle)?;
        if state.in_transaction() {
            warn!("Closing with an active transaction, rolling back");
            state.rollback_journal()?;
        }
        state.backend.flush()?;
        info!("Table closed at {:?}", self.path);
        Ok(())
    }
}
