//! Row model — schemaless column-name → column-value mapping.
//!
//! Column names and values are raw byte strings; both may contain NUL.
//! Columns keep their insertion order, and setting an existing column
//! replaces its value in place.

pub mod codec;
pub mod numeric;

use crate::error::{TabulaError, TabulaResult};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// A single table row.
///
/// Equality is mapping equality: two rows are equal when they hold the same
/// columns with the same values, regardless of column order.
///
/// ```rust
/// use tabula_core::Row;
///
/// let row = Row::new().with("name", "Chopin").with("age", "180");
/// assert_eq!(row.get_str("name"), Some("Chopin"));
/// assert_eq!(row, Row::new().with("age", "180").with("name", "Chopin"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Builder form of [`Row::set`].
    pub fn with(mut self, name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a column, returning the previous value if the column existed.
    pub fn set(&mut self, name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => Some(std::mem::replace(&mut self.columns[idx].1, value)),
            None => {
                self.columns.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: impl AsRef<[u8]>) -> Option<&[u8]> {
        let name = name.as_ref();
        self.columns
            .iter()
            .find(|(n, _)| n.as_slice() == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Column value as UTF-8 text, `None` if absent or not valid UTF-8.
    pub fn get_str(&self, name: impl AsRef<[u8]>) -> Option<&str> {
        self.get(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn remove(&mut self, name: impl AsRef<[u8]>) -> Option<Vec<u8>> {
        let idx = self.position(name.as_ref())?;
        Some(self.columns.remove(idx).1)
    }

    pub fn contains_column(&self, name: impl AsRef<[u8]>) -> bool {
        self.position(name.as_ref()).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate `(name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.columns
            .iter()
            .map(|(n, v)| (n.as_slice(), v.as_slice()))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &[u8]> {
        self.columns.iter().map(|(n, _)| n.as_slice())
    }

    /// Merge `other` into this row; values from `other` win on collision.
    pub fn merge(&mut self, other: Row) {
        for (name, value) in other.columns {
            self.set(name, value);
        }
    }

    /// Reject rows the codec cannot represent faithfully.
    pub(crate) fn validate(&self) -> TabulaResult<()> {
        if self.columns.iter().any(|(n, _)| n.is_empty()) {
            return Err(TabulaError::MalformedRow(
                "column names must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    fn position(&self, name: &[u8]) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n.as_slice() == name)
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(n, v)| other.get(n) == Some(v))
    }
}

impl Eq for Row {}

impl<K: Into<Vec<u8>>, V: Into<Vec<u8>>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (Vec<u8>, Vec<u8>);
    type IntoIter = std::vec::IntoIter<(Vec<u8>, Vec<u8>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

/// Conversion into a [`Row`] at the `put` boundary.
///
/// Typed inputs (maps, pair lists) always convert; dynamic inputs such as a
/// `serde_json::Value` fail with [`TabulaError::MalformedRow`] when they are
/// not a column mapping.
pub trait IntoRow {
    fn into_row(self) -> TabulaResult<Row>;
}

impl IntoRow for Row {
    fn into_row(self) -> TabulaResult<Row> {
        Ok(self)
    }
}

impl IntoRow for &Row {
    fn into_row(self) -> TabulaResult<Row> {
        Ok(self.clone())
    }
}

impl<K: Into<Vec<u8>>, V: Into<Vec<u8>>> IntoRow for Vec<(K, V)> {
    fn into_row(self) -> TabulaResult<Row> {
        Ok(self.into_iter().collect())
    }
}

impl<K: Into<Vec<u8>>, V: Into<Vec<u8>>, const N: usize> IntoRow for [(K, V); N] {
    fn into_row(self) -> TabulaResult<Row> {
        Ok(self.into_iter().collect())
    }
}

impl<K: Into<Vec<u8>>, V: Into<Vec<u8>>> IntoRow for BTreeMap<K, V> {
    fn into_row(self) -> TabulaResult<Row> {
        Ok(self.into_iter().collect())
    }
}

impl<K: Into<Vec<u8>>, V: Into<Vec<u8>>, S: BuildHasher> IntoRow for HashMap<K, V, S> {
    fn into_row(self) -> TabulaResult<Row> {
        Ok(self.into_iter().collect())
    }
}

impl IntoRow for serde_json::Value {
    fn into_row(self) -> TabulaResult<Row> {
        use serde_json::Value;

        let object = match self {
            Value::Object(object) => object,
            other => {
                return Err(TabulaError::MalformedRow(format!(
                    "expected a column mapping, got {}",
                    json_kind(&other)
                )));
            }
        };

        let mut row = Row::with_capacity(object.len());
        for (name, value) in object {
            let bytes = match value {
                Value::String(s) => s.into_bytes(),
                Value::Number(n) => n.to_string().into_bytes(),
                Value::Bool(b) => b.to_string().into_bytes(),
                other => {
                    return Err(TabulaError::MalformedRow(format!(
                        "column '{name}' holds {}, expected a scalar",
                        json_kind(&other)
                    )));
                }
            };
            row.set(name, bytes);
        }
        Ok(row)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_replaces_in_place() {
        let mut row = Row::new().with("a", "1").with("b", "2");
        assert_eq!(row.set("a", "3"), Some(b"1".to_vec()));
        let names: Vec<&[u8]> = row.column_names().collect();
        assert_eq!(names, vec![b"a".as_slice(), b"b".as_slice()]);
        assert_eq!(row.get("a"), Some(b"3".as_slice()));
    }

    #[test]
    fn equality_ignores_column_order() {
        let a = Row::new().with("x", "1").with("y", "2");
        let b = Row::new().with("y", "2").with("x", "1");
        assert_eq!(a, b);
        assert_ne!(a, Row::new().with("x", "1"));
    }

    #[test]
    fn merge_new_values_win() {
        let mut row = Row::new().with("a", "1").with("b", "old");
        row.merge(Row::new().with("b", "new").with("c", "3"));
        assert_eq!(row, Row::new().with("a", "1").with("b", "new").with("c", "3"));
    }

    #[test]
    fn nul_bytes_are_plain_data() {
        let row = Row::new().with(b"\0a".to_vec(), b"a\0".to_vec());
        assert_eq!(row.get(b"\0a"), Some(b"a\0".as_slice()));
        assert!(row.validate().is_ok());
    }

    #[test]
    fn empty_column_name_rejected() {
        let row = Row::new().with("", "x");
        assert!(matches!(row.validate(), Err(TabulaError::MalformedRow(_))));
    }

    #[test]
    fn json_object_converts() {
        let row = json!({"name": "Chopin", "age": 180, "alive": false})
            .into_row()
            .unwrap();
        assert_eq!(row.get_str("name"), Some("Chopin"));
        assert_eq!(row.get_str("age"), Some("180"));
        assert_eq!(row.get_str("alive"), Some("false"));
    }

    #[test]
    fn json_scalar_is_malformed() {
        let err = json!(2).into_row().unwrap_err();
        assert!(matches!(err, TabulaError::MalformedRow(_)));
        assert!(err.to_string().contains("a number"));
    }

    #[test]
    fn json_nested_value_is_malformed() {
        let err = json!({"tags": ["a", "b"]}).into_row().unwrap_err();
        assert!(matches!(err, TabulaError::MalformedRow(_)));
    }
}
