//! Table Engine Types — enums shared by the table facade

use serde::{Deserialize, Serialize};

/// `put` 시 기존 행과의 조정 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutMode {
    /// 항상 교체
    #[default]
    Overwrite,
    /// 키가 이미 있으면 아무것도 하지 않음
    Keep,
    /// 기존 행에 새 컬럼 병합 (충돌 시 새 값 우선)
    Concat,
}

/// `put` 결과 — 실제로 일어난 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// 새로 쓰거나 교체됨
    Put,
    /// 기존 행 유지 (Keep 모드)
    Kept,
    /// 기존 행에 병합됨 (Concat 모드)
    Merged,
}

/// Undo journal entry: the raw record under `key` before the mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct UndoRecord {
    pub key: Vec<u8>,
    pub before: Option<Vec<u8>>,
}
