//! Query Executor — candidate selection, post-filtering, ordering and paging.

use crate::engine::table::{SCAN_BATCH, TableState};
use crate::error::TabulaResult;
use crate::query::builder::{Direction, Order};
use crate::query::planner::{QueryPlan, plan};
use crate::query::predicate::Condition;
use crate::row::Row;
use crate::row::numeric::parse_exact_number;
use ahash::AHashSet;
use std::cmp::Ordering;
use tracing::debug;

/// What to fetch: conditions plus ordering and paging.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Request<'q> {
    pub conditions: &'q [Condition],
    pub order: Option<&'q Order>,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Matching `(key, row)` pairs, ordered and paged.
pub(crate) fn execute(state: &TableState, request: Request<'_>) -> TabulaResult<Vec<(Vec<u8>, Row)>> {
    let plan = plan(request.conditions, &state.indexes)?;

    // without an ordering the scan order is final, so the scan can stop early
    let stop = match (request.order, request.limit) {
        (None, Some(limit)) => Some(request.offset.saturating_add(limit)),
        _ => None,
    };
    let mut hits = collect(state, &plan, stop)?;

    if let Some(order) = request.order {
        sort_rows(&mut hits, order);
    }
    Ok(hits
        .into_iter()
        .skip(request.offset)
        .take(request.limit.unwrap_or(usize::MAX))
        .collect())
}

/// Number of matching rows. Ordering and paging do not apply.
pub(crate) fn count(state: &TableState, conditions: &[Condition]) -> TabulaResult<usize> {
    let plan = plan(conditions, &state.indexes)?;
    Ok(collect(state, &plan, None)?.len())
}

/// Matches in scan order, at most `stop` of them.
fn collect(
    state: &TableState,
    plan: &QueryPlan,
    stop: Option<usize>,
) -> TabulaResult<Vec<(Vec<u8>, Row)>> {
    let stop = stop.unwrap_or(usize::MAX);
    if stop == 0 {
        return Ok(Vec::new());
    }
    let passes = |row: &Row| plan.filters.iter().all(|f| f.matches(row));

    if plan.is_full_scan() {
        let mut hits = Vec::new();
        let mut after = None;
        let mut scanned = 0usize;
        'scan: loop {
            let batch = state.scan_keys(after, SCAN_BATCH)?;
            let Some((last, _)) = batch.last() else { break };
            after = Some(*last);
            for (_, key) in batch {
                scanned += 1;
                if let Some((_, row)) = state.load(&key)?
                    && passes(&row)
                {
                    hits.push((key, row));
                    if hits.len() >= stop {
                        break 'scan;
                    }
                }
            }
        }
        debug!(scanned, hits = hits.len(), "full scan");
        return Ok(hits);
    }

    let candidates = candidates(state, plan)?;
    let probed = candidates.len();
    let mut hits = Vec::with_capacity(probed);
    for key in candidates {
        if let Some((seq, row)) = state.load(&key)?
            && passes(&row)
        {
            hits.push((seq, key, row));
        }
    }
    hits.sort_unstable_by_key(|(seq, _, _)| *seq);
    hits.truncate(stop);
    debug!(probed, hits = hits.len(), "index probe");
    Ok(hits.into_iter().map(|(_, key, row)| (key, row)).collect())
}

/// Intersection of every native clause's probe.
fn candidates(state: &TableState, plan: &QueryPlan) -> TabulaResult<AHashSet<Vec<u8>>> {
    let mut result: Option<AHashSet<Vec<u8>>> = None;
    for clause in &plan.native {
        let keys = state.indexes.probe(&clause.column, &clause.probe)?;
        let merged = match result {
            None => keys,
            Some(mut acc) => {
                acc.retain(|key| keys.contains(key));
                acc
            }
        };
        let empty = merged.is_empty();
        result = Some(merged);
        if empty {
            break;
        }
    }
    Ok(result.unwrap_or_default())
}

// ════════════════════════════════════════════
// Ordering
// ════════════════════════════════════════════

enum SortKey {
    Missing,
    Number(f64),
    Text(Vec<u8>),
}

impl SortKey {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Missing, Self::Missing) => Ordering::Equal,
            (Self::Missing, _) => Ordering::Less,
            (_, Self::Missing) => Ordering::Greater,
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            // a column sorts either all-numeric or all-text
            _ => Ordering::Equal,
        }
    }
}

/// Stable sort on `order.column`. Numeric when every present value is a
/// number, lexical otherwise; rows lacking the column sort lowest.
/// Descending is the exact reverse of ascending.
pub(crate) fn sort_rows(rows: &mut Vec<(Vec<u8>, Row)>, order: &Order) {
    let column = order.column.as_slice();
    let numeric = rows
        .iter()
        .filter_map(|(_, row)| row.get(column))
        .all(|value| parse_exact_number(value).is_some());

    let mut keyed: Vec<(SortKey, (Vec<u8>, Row))> = rows
        .drain(..)
        .map(|(key, row)| {
            let sort_key = match row.get(column) {
                None => SortKey::Missing,
                Some(value) if numeric => {
                    let n = parse_exact_number(value).unwrap_or(0.0);
                    // -0 and 0 tie
                    SortKey::Number(if n == 0.0 { 0.0 } else { n })
                }
                Some(value) => SortKey::Text(value.to_vec()),
            };
            (sort_key, (key, row))
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| a.compare(b));
    if order.direction == Direction::Desc {
        keyed.reverse();
    }
    rows.extend(keyed.into_iter().map(|(_, pair)| pair));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[(&str, Option<&str>)]) -> Vec<(Vec<u8>, Row)> {
        values
            .iter()
            .map(|(key, value)| {
                let row = match value {
                    Some(v) => Row::new().with("n", *v),
                    None => Row::new().with("other", "x"),
                };
                (key.as_bytes().to_vec(), row)
            })
            .collect()
    }

    fn keys(rows: &[(Vec<u8>, Row)]) -> Vec<&str> {
        rows.iter().map(|(k, _)| std::str::from_utf8(k).unwrap()).collect()
    }

    #[test]
    fn numeric_column_sorts_numerically() {
        let mut r = rows(&[("a", Some("100")), ("b", Some("9")), ("c", Some("20"))]);
        sort_rows(&mut r, &Order::asc("n"));
        assert_eq!(keys(&r), vec!["b", "c", "a"]);
    }

    #[test]
    fn mixed_column_sorts_lexically() {
        let mut r = rows(&[("a", Some("100")), ("b", Some("9")), ("c", Some("x"))]);
        sort_rows(&mut r, &Order::asc("n"));
        assert_eq!(keys(&r), vec!["a", "b", "c"]);
    }

    #[test]
    fn missing_sorts_lowest_and_desc_reverses() {
        let mut r = rows(&[("a", Some("2")), ("b", None), ("c", Some("1")), ("d", Some("1"))]);
        sort_rows(&mut r, &Order::asc("n"));
        assert_eq!(keys(&r), vec!["b", "c", "d", "a"]);

        let mut r = rows(&[("a", Some("2")), ("b", None), ("c", Some("1")), ("d", Some("1"))]);
        sort_rows(&mut r, &Order::desc("n"));
        assert_eq!(keys(&r), vec!["a", "d", "c", "b"]);
    }
}
