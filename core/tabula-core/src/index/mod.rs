//! Secondary indices on named columns.
//!
//! Every index lives in its own keyspace. An entry key is the column value
//! in an order-preserving encoding followed by the row key; the entry value
//! is the row key. Probes are therefore plain range and prefix scans.

pub mod keys;
pub(crate) mod manager;

use crate::error::TabulaError;
use serde::{Deserialize, Serialize};
use std::ops::Bound;
use std::str::FromStr;

/// Value type of a column index; decides which operators it accelerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    /// Byte-wise ordered text.
    Lexical,
    /// Values read as decimal numbers.
    Decimal,
    /// Whitespace/comma separated token set.
    Token,
    /// Overlapping 3-byte substrings (full-text candidate lookup).
    QGram,
}

impl IndexType {
    pub const ALL: &'static [IndexType] = &[
        IndexType::Lexical,
        IndexType::Decimal,
        IndexType::Token,
        IndexType::QGram,
    ];

    /// Single-letter code: `s`, `d`, `t`, `q`.
    pub fn code(&self) -> char {
        match self {
            Self::Lexical => 's',
            Self::Decimal => 'd',
            Self::Token => 't',
            Self::QGram => 'q',
        }
    }

    /// Whether a probe yields exactly the matching rows.
    ///
    /// Q-gram probes return a superset that must be re-verified.
    pub fn is_exact(&self) -> bool {
        !matches!(self, Self::QGram)
    }
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexical => write!(f, "lexical"),
            Self::Decimal => write!(f, "decimal"),
            Self::Token => write!(f, "token"),
            Self::QGram => write!(f, "qgram"),
        }
    }
}

impl FromStr for IndexType {
    type Err = TabulaError;

    /// Accepts the single-letter code or the full name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s" | "lexical" | "string" => Ok(Self::Lexical),
            "d" | "decimal" => Ok(Self::Decimal),
            "t" | "token" => Ok(Self::Token),
            "q" | "qgram" => Ok(Self::QGram),
            _ => Err(TabulaError::InvalidOperation {
                message: format!("unknown index type '{s}'"),
                context: "expected one of s, d, t, q".to_string(),
            }),
        }
    }
}

/// Declared index on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub column: Vec<u8>,
    pub kind: IndexType,
}

impl IndexDescriptor {
    pub fn new(column: impl Into<Vec<u8>>, kind: IndexType) -> Self {
        Self {
            column: column.into(),
            kind,
        }
    }

    /// Column name as text (lossy for non-UTF-8 names).
    pub fn column_name(&self) -> String {
        String::from_utf8_lossy(&self.column).into_owned()
    }
}

/// A scan over one column's index keyspace, in encoded-entry terms.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IndexProbe {
    Range {
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
    },
    Prefix(Vec<u8>),
    /// Union of prefix scans.
    AnyOf(Vec<Vec<u8>>),
    /// Intersection of prefix scans.
    AllOf(Vec<Vec<u8>>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_codes_and_names() {
        assert_eq!("d".parse::<IndexType>().unwrap(), IndexType::Decimal);
        assert_eq!("s".parse::<IndexType>().unwrap(), IndexType::Lexical);
        assert_eq!("QGram".parse::<IndexType>().unwrap(), IndexType::QGram);
        assert!("x".parse::<IndexType>().is_err());
    }

    #[test]
    fn codes_roundtrip() {
        for kind in IndexType::ALL {
            let parsed: IndexType = kind.code().to_string().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
    }

    #[test]
    fn only_qgram_is_inexact() {
        assert!(IndexType::Lexical.is_exact());
        assert!(!IndexType::QGram.is_exact());
    }
}
