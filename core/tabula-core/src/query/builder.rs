//! Query Builder — fluent query construction on a table.
//!
//! ```rust
//! use tabula_core::{Col, Table};
//!
//! # fn main() -> tabula_core::TabulaResult<()> {
//! let table = Table::open_in_memory()?;
//! table.put("ludwig", [("name", "Ludwig"), ("age", "180")])?;
//! table.put("robert", [("name", "Robert"), ("age", "200")])?;
//! table.put("frederic", [("name", "Frederic"), ("age", "200")])?;
//!
//! let names: Vec<Vec<u8>> = table
//!     .query()
//!     .filter(Col::new("age").gt(180))
//!     .order_by("-name")
//!     .keys()?;
//! assert_eq!(names, vec![b"robert".to_vec(), b"frederic".to_vec()]);
//! # Ok(())
//! # }
//! ```

use crate::engine::table::Table;
use crate::error::{TabulaError, TabulaResult};
use crate::query::executor::{self, Request};
use crate::query::predicate::{Col, Condition, Literal};
use crate::row::Row;
use crate::row::numeric::parse_exact_number;
use std::fmt;
use std::str::FromStr;
use tracing::instrument;

// ════════════════════════════════════════════
// Ordering directives
// ════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Result ordering on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: Vec<u8>,
    pub direction: Direction,
}

impl Order {
    pub fn asc(column: impl Into<Vec<u8>>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<Vec<u8>>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// `+col` ascending, `-col` descending, bare `col` ascending.
impl FromStr for Order {
    type Err = TabulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (direction, column) = match s.as_bytes().first() {
            Some(b'+') => (Direction::Asc, &s[1..]),
            Some(b'-') => (Direction::Desc, &s[1..]),
            _ => (Direction::Asc, s),
        };
        if column.is_empty() {
            return Err(TabulaError::InvalidOrder(s.to_string()));
        }
        Ok(Self {
            column: column.as_bytes().to_vec(),
            direction,
        })
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.direction {
            Direction::Asc => '+',
            Direction::Desc => '-',
        };
        write!(f, "{sign}{}", String::from_utf8_lossy(&self.column))
    }
}

// ════════════════════════════════════════════
// Query
// ════════════════════════════════════════════

/// Output shape of [`Query::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Pairs,
    Values,
    Keys,
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Pairs(Vec<(Vec<u8>, Row)>),
    Values(Vec<Row>),
    Keys(Vec<Vec<u8>>),
    Count(usize),
}

impl QueryOutput {
    /// Number of results (the count itself for `Count`).
    pub fn len(&self) -> usize {
        match self {
            Self::Pairs(p) => p.len(),
            Self::Values(v) => v.len(),
            Self::Keys(k) => k.len(),
            Self::Count(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A conjunction of conditions plus ordering and paging, bound to a table.
///
/// Nothing runs until a terminal method (`fetch`, `values`, `keys`,
/// `count`, `first`, `delete`, `run`) is called. Invalid regular
/// expressions and order directives surface there.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    table: &'a Table,
    conditions: Vec<Condition>,
    order: Option<Result<Order, String>>,
    limit: Option<usize>,
    offset: usize,
}

impl<'a> Query<'a> {
    pub(crate) fn new(table: &'a Table) -> Self {
        Self {
            table,
            conditions: Vec::new(),
            order: None,
            limit: None,
            offset: 0,
        }
    }

    /// Add a condition; conditions combine by conjunction.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn filters(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    /// Equality shorthand. Numeric-looking text compares numerically.
    pub fn with(self, column: impl Into<Vec<u8>>, value: impl Into<Literal>) -> Self {
        let value = match value.into() {
            Literal::Text(text) => match parse_exact_number(&text) {
                Some(n) => Literal::Number(n),
                None => Literal::Text(text),
            },
            number => number,
        };
        self.filter(Col::new(column).eq(value))
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(Ok(order));
        self
    }

    /// Order by a `+col` / `-col` / `col` directive.
    pub fn order_by(mut self, directive: &str) -> Self {
        self.order = Some(directive.parse::<Order>().map_err(|_| directive.to_string()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    // ── terminals ─────────────────────────────

    #[instrument(skip(self), fields(conditions = self.conditions.len()))]
    pub fn run(&self, mode: Mode) -> TabulaResult<QueryOutput> {
        Ok(match mode {
            Mode::Pairs => QueryOutput::Pairs(self.fetch()?),
            Mode::Values => QueryOutput::Values(self.values()?),
            Mode::Keys => QueryOutput::Keys(self.keys()?),
            Mode::Count => QueryOutput::Count(self.count()?),
        })
    }

    /// Matching `(key, row)` pairs.
    pub fn fetch(&self) -> TabulaResult<Vec<(Vec<u8>, Row)>> {
        let order = self.resolved_order()?;
        let state = self.table.state()?;
        executor::execute(&state, self.request(order.as_ref()))
    }

    pub fn values(&self) -> TabulaResult<Vec<Row>> {
        Ok(self.fetch()?.into_iter().map(|(_, row)| row).collect())
    }

    pub fn keys(&self) -> TabulaResult<Vec<Vec<u8>>> {
        Ok(self.fetch()?.into_iter().map(|(key, _)| key).collect())
    }

    /// Number of matches; limit and offset are ignored.
    pub fn count(&self) -> TabulaResult<usize> {
        self.resolved_order()?;
        let state = self.table.state()?;
        executor::count(&state, &self.conditions)
    }

    pub fn first(&self) -> TabulaResult<Option<(Vec<u8>, Row)>> {
        let mut first = self.clone().limit(1).fetch()?;
        Ok(first.pop())
    }

    /// Delete every match (ordering and paging apply). Returns the number of
    /// removed rows.
    #[instrument(skip(self), fields(conditions = self.conditions.len()))]
    pub fn delete(&self) -> TabulaResult<usize> {
        let order = self.resolved_order()?;
        let state = self.table.writable()?;
        let _guard = state.write_lock.lock();
        let hits = executor::execute(&state, self.request(order.as_ref()))?;
        let mut removed = 0;
        for (key, _) in hits {
            if state.erase(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn resolved_order(&self) -> TabulaResult<Option<Order>> {
        match &self.order {
            None => Ok(None),
            Some(Ok(order)) => Ok(Some(order.clone())),
            Some(Err(directive)) => Err(TabulaError::InvalidOrder(directive.clone())),
        }
    }

    fn request<'q>(&'q self, order: Option<&'q Order>) -> Request<'q> {
        Request {
            conditions: &self.conditions,
            order,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

impl Table {
    /// Start a query on this table.
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    /// Pairs matching every condition, in insertion order.
    pub fn select(
        &self,
        conditions: impl IntoIterator<Item = Condition>,
    ) -> TabulaResult<Vec<(Vec<u8>, Row)>> {
        self.query().filters(conditions).fetch()
    }

    /// Number of rows matching every condition.
    pub fn count(&self, conditions: impl IntoIterator<Item = Condition>) -> TabulaResult<usize> {
        self.query().filters(conditions).count()
    }

    /// Delete the rows matching every condition.
    pub fn delete_where(
        &self,
        conditions: impl IntoIterator<Item = Condition>,
    ) -> TabulaResult<usize> {
        self.query().filters(conditions).delete()
    }
}
