//! # Tabula — Schemaless Table Store
//!
//! Tabula은 키로 주소 지정되는 스키마 없는 테이블 저장소입니다.
//! 각 행은 바이트 문자열 키와, 컬럼 이름 → 컬럼 값의 순서 있는 매핑으로
//! 이루어집니다. 키, 컬럼 이름, 값 모두 NUL을 포함한 임의의 바이트를 담을 수 있습니다.
//!
//! ## 주요 특징
//!
//! - **Predicate Algebra**: `Col` 빌더로 조건을 만들고 AND로 결합
//! - **보조 인덱스**: lexical / decimal / token / q-gram
//! - **Put 모드**: 덮어쓰기, 유지(keep), 병합(concat)
//! - **트랜잭션**: Typestate 패턴 + 영속 undo 저널
//! - **저장소**: sled (디스크) 또는 BTreeMap (메모리)
//!
//! ## 빠른 시작
//!
//! ```rust
//! use tabula_core::{Col, IndexType, Table};
//!
//! # fn main() -> tabula_core::TabulaResult<()> {
//! let table = Table::open_in_memory()?;
//! table.put("ludwig", [("name", "Ludwig"), ("age", "180")])?;
//! table.put("robert", [("name", "Robert"), ("age", "200")])?;
//! table.put("frederic", [("name", "Frederic"), ("age", "200")])?;
//!
//! table.create_index("age", IndexType::Decimal)?;
//! let young = table.select([Col::new("age").lt(190)])?;
//! assert_eq!(young.len(), 1);
//! assert_eq!(young[0].1.get_str("name"), Some("Ludwig"));
//!
//! // NOT (age <= 180)
//! assert_eq!(table.count([(!Col::new("age")).le(180)])?, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ### 트랜잭션
//!
//! ```rust
//! use tabula_core::Table;
//!
//! # fn main() -> tabula_core::TabulaResult<()> {
//! let table = Table::open_in_memory()?;
//! let tx = table.begin()?;
//! tx.put("user:1", [("name", "Alice")])?;
//! tx.commit()?;
//! assert!(table.contains("user:1")?);
//! # Ok(())
//! # }
//! ```
//!
//! ## 모듈 구조
//!
//! - [`engine`] — 테이블 파사드 ([`Table`]), CRUD, 인덱스 DDL, 트랜잭션
//! - [`query`] — 조건 빌더, 플래너, 실행기
//! - [`index`] — 인덱스 타입과 키 인코딩
//! - [`row`] — 행 타입과 바이트 코덱
//! - [`storage`] — keyspace 추상화와 sled / 메모리 백엔드

pub mod engine;
pub mod error;
pub mod index;
pub mod query;
pub mod row;
pub mod storage;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use engine::{Active, Committed, PutMode, PutOutcome, RolledBack, Table, Transaction, TxState};
pub use engine::crud::RowIter;
pub use error::{TabulaError, TabulaResult};
pub use index::{IndexDescriptor, IndexType};
pub use query::{Col, Condition, Direction, Literal, Mode, Operand, Operator, Order, Query, QueryOutput};
pub use row::{IntoRow, Row};
pub use storage::options::{Compression, OpenMode, TableOptions};
