//! Query planning — split conditions into index probes and post-filters.
//!
//! | index type | accelerates |
//! |-----------|-------------|
//! | lexical | text `==`, text in-list, text `<` `<=` `>` `>=` between, starts-with |
//! | decimal | numeric `==`, numeric in-list, numeric `<` `<=` `>` `>=` between |
//! | token | all-tokens, any-token |
//! | q-gram | contains, starts-with, ends-with, text `==` with ≥ 3 bytes (re-verified) |
//!
//! Negated conditions and regular expressions are always post-filtered.

use crate::error::TabulaResult;
use crate::index::keys::{GRAM, encode_decimal, encode_text, escape_text, qgrams};
use crate::index::manager::IndexManager;
use crate::index::{IndexProbe, IndexType};
use crate::query::eval::Filter;
use crate::query::predicate::{Condition, Literal, Operator};
use crate::storage::prefix_upper_bound;
use std::ops::Bound;
use tracing::debug;

/// One index-accelerated clause.
#[derive(Debug)]
pub(crate) struct NativeClause {
    pub column: Vec<u8>,
    pub probe: IndexProbe,
}

#[derive(Debug, Default)]
pub(crate) struct QueryPlan {
    pub native: Vec<NativeClause>,
    pub filters: Vec<Filter>,
}

impl QueryPlan {
    pub(crate) fn is_full_scan(&self) -> bool {
        self.native.is_empty()
    }
}

/// Build the plan for a conjunction of conditions.
///
/// Every condition is compiled as a filter first, so invalid patterns fail
/// even when an index would have answered the clause.
pub(crate) fn plan(conditions: &[Condition], indexes: &IndexManager) -> TabulaResult<QueryPlan> {
    let mut plan = QueryPlan::default();
    for condition in conditions {
        let filter = Filter::compile(condition)?;
        let native = match indexes.kind_of(condition.column()) {
            Some(kind) if !condition.is_negated() => probe_for(condition, kind).map(|probe| (kind, probe)),
            _ => None,
        };
        match native {
            Some((kind, probe)) => {
                plan.native.push(NativeClause {
                    column: condition.column().to_vec(),
                    probe,
                });
                if !kind.is_exact() {
                    plan.filters.push(filter);
                }
            }
            None => plan.filters.push(filter),
        }
    }
    debug!(
        native = plan.native.len(),
        filters = plan.filters.len(),
        "query planned"
    );
    Ok(plan)
}

fn probe_for(condition: &Condition, kind: IndexType) -> Option<IndexProbe> {
    let literals = condition.operand().literals();
    let numeric = condition.is_numeric();
    // NaN compares false against everything but encodes above +inf
    if numeric && literals.iter().any(|lit| lit.as_number().is_nan()) {
        return None;
    }
    match kind {
        IndexType::Lexical if !numeric => ordered_probe(condition.operator(), literals, text_key)
            .or_else(|| match (condition.operator(), literals) {
                (Operator::StartsWith, [Literal::Text(prefix)]) => {
                    Some(IndexProbe::Prefix(escape_text(prefix)))
                }
                _ => None,
            }),
        IndexType::Decimal if numeric => ordered_probe(condition.operator(), literals, decimal_key),
        IndexType::Token => {
            let tokens: Vec<Vec<u8>> = literals.iter().map(|t| encode_text(&t.to_bytes())).collect();
            if tokens.is_empty() {
                return None;
            }
            match condition.operator() {
                Operator::AllTokens => Some(IndexProbe::AllOf(tokens)),
                Operator::AnyToken => Some(IndexProbe::AnyOf(tokens)),
                _ => None,
            }
        }
        IndexType::QGram => match (condition.operator(), literals) {
            (
                Operator::Eq | Operator::Contains | Operator::StartsWith | Operator::EndsWith,
                [Literal::Text(needle)],
            ) if needle.len() >= GRAM => Some(IndexProbe::AllOf(
                qgrams(needle).into_iter().map(<[u8]>::to_vec).collect(),
            )),
            _ => None,
        },
        _ => None,
    }
}

fn text_key(lit: &Literal) -> Vec<u8> {
    encode_text(&lit.to_bytes())
}

fn decimal_key(lit: &Literal) -> Vec<u8> {
    encode_decimal(lit.as_number()).to_vec()
}

/// Probes for comparison operators over an order-preserving encoding.
fn ordered_probe(
    operator: Operator,
    literals: &[Literal],
    key: fn(&Literal) -> Vec<u8>,
) -> Option<IndexProbe> {
    let probe = match (operator, literals) {
        (Operator::Eq, [lit]) => IndexProbe::Prefix(key(lit)),
        (Operator::InList, list) if !list.is_empty() => {
            IndexProbe::AnyOf(list.iter().map(key).collect())
        }
        (Operator::Lt, [lit]) => IndexProbe::Range {
            lower: Bound::Unbounded,
            upper: Bound::Excluded(key(lit)),
        },
        (Operator::Le, [lit]) => IndexProbe::Range {
            lower: Bound::Unbounded,
            upper: past(&key(lit)),
        },
        (Operator::Gt, [lit]) => IndexProbe::Range {
            lower: Bound::Included(prefix_upper_bound(&key(lit))?),
            upper: Bound::Unbounded,
        },
        (Operator::Ge, [lit]) => IndexProbe::Range {
            lower: Bound::Included(key(lit)),
            upper: Bound::Unbounded,
        },
        (Operator::Between, [lo, hi]) => IndexProbe::Range {
            lower: Bound::Included(key(lo)),
            upper: past(&key(hi)),
        },
        _ => return None,
    };
    Some(probe)
}

/// Upper bound just past every entry starting with `encoded`.
fn past(encoded: &[u8]) -> Bound<Vec<u8>> {
    match prefix_upper_bound(encoded) {
        Some(upper) => Bound::Excluded(upper),
        None => Bound::Unbounded,
    }
}
