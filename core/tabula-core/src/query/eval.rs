//! Post-filter evaluation of conditions against decoded rows.

use crate::error::{TabulaError, TabulaResult};
use crate::index::keys::tokens;
use crate::query::predicate::{Condition, Literal, Operand, Operator};
use crate::row::Row;
use crate::row::numeric::parse_decimal;
use ahash::AHashSet;
use regex::bytes::Regex;
use std::cmp::Ordering;

/// Comparison target: raw bytes or a decimal.
#[derive(Debug, Clone)]
enum Target {
    Text(Vec<u8>),
    Number(f64),
}

impl Target {
    fn from_literal(lit: &Literal) -> Self {
        match lit {
            Literal::Text(t) => Self::Text(t.clone()),
            Literal::Number(n) => Self::Number(*n),
        }
    }

    fn compare(&self, value: &[u8]) -> Option<Ordering> {
        match self {
            Self::Text(t) => Some(value.cmp(t.as_slice())),
            Self::Number(n) => parse_decimal(value).partial_cmp(n),
        }
    }
}

#[derive(Debug)]
enum Test {
    Compare(Operator, Target),
    Between(Target, Target),
    StartsWith(Vec<u8>),
    EndsWith(Vec<u8>),
    Contains(Vec<u8>),
    Matches(Regex),
    InText(AHashSet<Vec<u8>>),
    InNumber(Vec<f64>),
    AllTokens(Vec<Vec<u8>>),
    AnyToken(Vec<Vec<u8>>),
}

impl Test {
    fn eval(&self, value: &[u8]) -> bool {
        match self {
            Self::Compare(op, target) => match target.compare(value) {
                Some(ord) => match op {
                    Operator::Eq => ord == Ordering::Equal,
                    Operator::Lt => ord == Ordering::Less,
                    Operator::Le => ord != Ordering::Greater,
                    Operator::Gt => ord == Ordering::Greater,
                    Operator::Ge => ord != Ordering::Less,
                    _ => false,
                },
                None => false,
            },
            Self::Between(lo, hi) => {
                matches!(lo.compare(value), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(hi.compare(value), Some(Ordering::Less | Ordering::Equal))
            }
            Self::StartsWith(prefix) => value.starts_with(prefix),
            Self::EndsWith(suffix) => value.ends_with(suffix),
            Self::Contains(needle) => contains_slice(value, needle),
            Self::Matches(re) => re.is_match(value),
            Self::InText(set) => set.contains(value),
            Self::InNumber(list) => {
                let n = parse_decimal(value);
                list.iter().any(|x| *x == n)
            }
            Self::AllTokens(wanted) => {
                let have = tokens(value);
                wanted.iter().all(|t| have.contains(&t.as_slice()))
            }
            Self::AnyToken(wanted) => {
                let have = tokens(value);
                wanted.iter().any(|t| have.contains(&t.as_slice()))
            }
        }
    }
}

fn contains_slice(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// A compiled condition.
#[derive(Debug)]
pub(crate) struct Filter {
    column: Vec<u8>,
    test: Test,
    negated: bool,
}

impl Filter {
    /// Compile a condition; invalid patterns and operand arity fail here.
    pub(crate) fn compile(condition: &Condition) -> TabulaResult<Self> {
        let literals = condition.operand().literals();
        let test = match condition.operator() {
            op @ (Operator::Eq | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge) => {
                Test::Compare(op, Target::from_literal(scalar(condition)?))
            }
            Operator::Between => match literals {
                [lo, hi] => Test::Between(Target::from_literal(lo), Target::from_literal(hi)),
                _ => return Err(arity(condition, "exactly two bounds")),
            },
            Operator::StartsWith => Test::StartsWith(scalar(condition)?.to_bytes()),
            Operator::EndsWith => Test::EndsWith(scalar(condition)?.to_bytes()),
            Operator::Contains => Test::Contains(scalar(condition)?.to_bytes()),
            Operator::Matches => Test::Matches(compile_regex(&scalar(condition)?.to_bytes())?),
            Operator::InList => {
                if condition.is_numeric() {
                    Test::InNumber(literals.iter().map(Literal::as_number).collect())
                } else {
                    Test::InText(literals.iter().map(Literal::to_bytes).collect())
                }
            }
            Operator::AllTokens => Test::AllTokens(literals.iter().map(Literal::to_bytes).collect()),
            Operator::AnyToken => Test::AnyToken(literals.iter().map(Literal::to_bytes).collect()),
        };
        Ok(Self {
            column: condition.column().to_vec(),
            test,
            negated: condition.is_negated(),
        })
    }

    /// A row lacking the column fails the plain test, so it passes the
    /// negated one.
    pub(crate) fn matches(&self, row: &Row) -> bool {
        match row.get(&self.column) {
            Some(value) => self.test.eval(value) != self.negated,
            None => self.negated,
        }
    }
}

fn scalar(condition: &Condition) -> TabulaResult<&Literal> {
    match condition.operand() {
        Operand::Scalar(lit) => Ok(lit),
        Operand::List(_) => Err(arity(condition, "a single value")),
    }
}

fn arity(condition: &Condition, expected: &str) -> TabulaError {
    TabulaError::InvalidOperation {
        message: format!("operator expects {expected}"),
        context: condition.to_string(),
    }
}

fn compile_regex(pattern: &[u8]) -> TabulaResult<Regex> {
    let text = std::str::from_utf8(pattern).map_err(|e| TabulaError::InvalidPattern {
        pattern: String::from_utf8_lossy(pattern).into_owned(),
        message: e.to_string(),
    })?;
    Regex::new(text).map_err(|e| TabulaError::InvalidPattern {
        pattern: text.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::predicate::Col;

    fn check(condition: Condition, row: &Row) -> bool {
        Filter::compile(&condition).unwrap().matches(row)
    }

    fn chopin() -> Row {
        Row::new()
            .with("name", "Chopin")
            .with("age", "180")
            .with("tags", "piano, romantic")
    }

    #[test]
    fn numeric_vs_lexical_comparison() {
        let row = chopin();
        // "180" < "68" lexically, 180 > 68 numerically
        assert!(check(Col::new("age").gt(68), &row));
        assert!(check(Col::new("age").lt("68"), &row));
    }

    #[test]
    fn between_is_inclusive() {
        let row = chopin();
        assert!(check(Col::new("age").between(180, 220), &row));
        assert!(check(Col::new("age").between(100, 180), &row));
        assert!(!check(Col::new("age").between(181, 220), &row));
    }

    #[test]
    fn missing_column_and_negation() {
        let row = chopin();
        assert!(!check(Col::new("born").eq("1810"), &row));
        assert!(check(Col::new("born").ne("1810"), &row));
        assert!(check(!Col::new("born").eq("1810"), &row));
    }

    #[test]
    fn string_operators() {
        let row = chopin();
        assert!(check(Col::new("name").starts_with("Cho"), &row));
        assert!(check(Col::new("name").ends_with("pin"), &row));
        assert!(check(Col::new("name").contains("opi"), &row));
        assert!(check(Col::new("name").like(""), &row));
        assert!(check(Col::new("name").contains(vec!["Liszt", "Chopin"]), &row));
        assert!(!check(Col::new("name").contains(vec!["Chop"]), &row));
    }

    #[test]
    fn regex_searches_anywhere() {
        let row = chopin();
        assert!(check(Col::new("name").matches("op"), &row));
        assert!(check(Col::new("name").matches("pin$"), &row));
        assert!(!check(Col::new("name").matches("^op"), &row));
    }

    #[test]
    fn invalid_regex_fails_at_compile() {
        let err = Filter::compile(&Col::new("name").matches("(")).unwrap_err();
        assert!(matches!(err, TabulaError::InvalidPattern { .. }));
    }

    #[test]
    fn in_list_numeric_and_text() {
        let row = chopin();
        assert!(check(Col::new("age").in_list([180.0, 220.0]), &row));
        assert!(check(Col::new("age").in_list(["180"]), &row));
        assert!(!check(Col::new("age").in_list(["180.0"]), &row));
        assert!(check(Col::new("age").in_list([180]), &row));
    }

    #[test]
    fn token_sets() {
        let row = chopin();
        assert!(check(Col::new("tags").has_all_tokens(["piano", "romantic"]), &row));
        assert!(!check(Col::new("tags").has_all_tokens(["piano", "organ"]), &row));
        assert!(check(Col::new("tags").has_any_token(["organ", "piano"]), &row));
        assert!(!check(Col::new("tags").has_any_token(Vec::<&str>::new()), &row));
    }

    #[test]
    fn bad_arity_is_invalid_operation() {
        let cond = Condition::new("age", Operator::Lt, vec![1, 2]);
        assert!(matches!(
            Filter::compile(&cond),
            Err(TabulaError::InvalidOperation { .. })
        ));
    }
}
