//! Predicate Algebra
//!
//! A [`Condition`] describes one column test: column, operator, operand and
//! a negated flag. Conditions never look at data; the executor compiles
//! them into filters and index probes.
//!
//! Conditions are built from a [`Col`], which carries the column and any
//! pending negation until an operator method finalizes it:
//!
//! ```rust
//! use tabula_core::{Col, Operator};
//!
//! let adult = Col::new("age").ge(18);
//! assert!(adult.is_numeric());
//!
//! // negation composes before the comparison: NOT (age <= 68)
//! let c = (!Col::new("age")).le(68);
//! assert!(c.is_negated());
//! assert_eq!(c.operator(), Operator::Le);
//! ```

use crate::row::numeric::parse_decimal;
use std::fmt;
use std::ops::Not;

// ════════════════════════════════════════════
// Literals
// ════════════════════════════════════════════

/// A single operand value.
///
/// A `Number` operand switches comparisons into numeric mode: stored values
/// are read as decimals before comparing.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(Vec<u8>),
    Number(f64),
}

impl Literal {
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// Numeric reading; text literals follow the stored-value parsing rules.
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Text(t) => parse_decimal(t),
        }
    }

    /// Byte form; numbers are rendered without a trailing `.0`.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Text(t) => t.clone(),
            Self::Number(n) => n.to_string().into_bytes(),
        }
    }

    fn into_text(self) -> Literal {
        match self {
            Self::Number(_) => Self::Text(self.to_bytes()),
            text => text,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(t) => write!(f, "'{}'", String::from_utf8_lossy(t)),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Self::Text(s.as_bytes().to_vec())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Self::Text(s.into_bytes())
    }
}

impl From<&String> for Literal {
    fn from(s: &String) -> Self {
        Self::Text(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Literal {
    fn from(b: &[u8]) -> Self {
        Self::Text(b.to_vec())
    }
}

impl From<Vec<u8>> for Literal {
    fn from(b: Vec<u8>) -> Self {
        Self::Text(b)
    }
}

impl<const N: usize> From<&[u8; N]> for Literal {
    fn from(b: &[u8; N]) -> Self {
        Self::Text(b.to_vec())
    }
}

macro_rules! number_literal {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Literal {
                fn from(n: $t) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

number_literal!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

// ════════════════════════════════════════════
// Operands
// ════════════════════════════════════════════

/// Right-hand side of a condition: one literal or a list of literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Scalar(Literal),
    List(Vec<Literal>),
}

impl Operand {
    pub fn literals(&self) -> &[Literal] {
        match self {
            Self::Scalar(lit) => std::slice::from_ref(lit),
            Self::List(list) => list,
        }
    }

    fn into_literals(self) -> Vec<Literal> {
        match self {
            Self::Scalar(lit) => vec![lit],
            Self::List(list) => list,
        }
    }
}

impl From<Literal> for Operand {
    fn from(lit: Literal) -> Self {
        Self::Scalar(lit)
    }
}

macro_rules! scalar_operand {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Self::Scalar(Literal::from(v))
                }
            }
        )*
    };
}

scalar_operand!(&str, String, &String, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl<const N: usize> From<&[u8; N]> for Operand {
    fn from(b: &[u8; N]) -> Self {
        Self::Scalar(Literal::from(b))
    }
}

// Byte strings are single text literals, so `u8` has no list form.
macro_rules! list_operand {
    ($($t:ty),*) => {
        $(
            impl From<Vec<$t>> for Operand {
                fn from(list: Vec<$t>) -> Self {
                    Self::List(list.into_iter().map(Literal::from).collect())
                }
            }

            impl<const N: usize> From<[$t; N]> for Operand {
                fn from(list: [$t; N]) -> Self {
                    Self::List(list.into_iter().map(Literal::from).collect())
                }
            }

            impl From<&[$t]> for Operand {
                fn from(list: &[$t]) -> Self {
                    Self::List(list.iter().cloned().map(Literal::from).collect())
                }
            }
        )*
    };
}

list_operand!(Literal, &str, String, i8, i16, i32, i64, isize, u16, u32, u64, usize, f32, f64);

// ════════════════════════════════════════════
// Conditions
// ════════════════════════════════════════════

/// Column test operators. `!=` is a negated [`Operator::Eq`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    /// Inclusive on both ends; operand is a two-element list.
    Between,
    StartsWith,
    EndsWith,
    /// Substring test.
    Contains,
    /// Regular expression, matched anywhere in the value.
    Matches,
    /// Exact equality with any literal of the list.
    InList,
    /// Every listed token occurs in the value's token set.
    AllTokens,
    /// At least one listed token occurs in the value's token set.
    AnyToken,
}

impl Operator {
    fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Between => "between",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Contains => "contains",
            Self::Matches => "matches",
            Self::InList => "in",
            Self::AllTokens => "has_all_tokens",
            Self::AnyToken => "has_any_token",
        }
    }

    fn is_comparison(&self) -> bool {
        matches!(self, Self::Eq | Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }
}

/// One finalized column condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    column: Vec<u8>,
    operator: Operator,
    operand: Operand,
    negated: bool,
}

impl Condition {
    /// Build a condition from an explicit (column, operator, operand) triple.
    ///
    /// The operand is normalized to the operator's mode:
    /// - `Contains` with a list becomes `InList`
    /// - `Between` and `InList` are numeric only when every literal is a
    ///   number; otherwise all literals are compared as text
    /// - text operators (`StartsWith`, `Matches`, tokens, ...) always take text
    ///
    /// Arity mistakes (a list for `Lt`, three bounds for `Between`) are
    /// reported when the query runs.
    pub fn new(column: impl Into<Vec<u8>>, operator: Operator, operand: impl Into<Operand>) -> Self {
        let (operator, operand) = normalize(operator, operand.into());
        Self {
            column: column.into(),
            operator,
            operand,
            negated: false,
        }
    }

    pub fn column(&self) -> &[u8] {
        &self.column
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Invert the condition. Negating twice restores the original.
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Whether stored values are compared as decimals.
    pub fn is_numeric(&self) -> bool {
        let literals = self.operand.literals();
        !literals.is_empty() && literals.iter().all(Literal::is_number)
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        self.negate()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "NOT (")?;
        }
        write!(
            f,
            "{} {} ",
            String::from_utf8_lossy(&self.column),
            self.operator.symbol()
        )?;
        match &self.operand {
            Operand::Scalar(lit) => write!(f, "{lit}")?,
            Operand::List(list) => {
                write!(f, "[")?;
                for (i, lit) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{lit}")?;
                }
                write!(f, "]")?;
            }
        }
        if self.negated {
            write!(f, ")")?;
        }
        Ok(())
    }
}

fn normalize(operator: Operator, operand: Operand) -> (Operator, Operand) {
    match (operator, operand) {
        (Operator::Contains, Operand::List(list)) => (Operator::InList, homogeneous(list)),
        (Operator::InList, operand) | (Operator::Between, operand) => {
            (operator, homogeneous(operand.into_literals()))
        }
        (op, operand) if op.is_comparison() => (op, operand),
        (op, Operand::Scalar(lit)) => (op, Operand::Scalar(lit.into_text())),
        (op, Operand::List(list)) => {
            (op, Operand::List(list.into_iter().map(Literal::into_text).collect()))
        }
    }
}

fn homogeneous(list: Vec<Literal>) -> Operand {
    if list.iter().all(Literal::is_number) {
        Operand::List(list)
    } else {
        Operand::List(list.into_iter().map(Literal::into_text).collect())
    }
}

// ════════════════════════════════════════════
// Column builder
// ════════════════════════════════════════════

/// Column reference with a pending negation, finalized by an operator method.
#[derive(Debug, Clone)]
pub struct Col {
    column: Vec<u8>,
    negated: bool,
}

impl Col {
    pub fn new(column: impl Into<Vec<u8>>) -> Self {
        Self {
            column: column.into(),
            negated: false,
        }
    }

    /// Negate the condition this column will produce.
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    fn finish(self, operator: Operator, operand: impl Into<Operand>) -> Condition {
        let condition = Condition::new(self.column, operator, operand);
        if self.negated { condition.negate() } else { condition }
    }

    pub fn eq(self, value: impl Into<Literal>) -> Condition {
        self.finish(Operator::Eq, Operand::Scalar(value.into()))
    }

    /// Negated equality; rows lacking the column match.
    pub fn ne(self, value: impl Into<Literal>) -> Condition {
        self.finish(Operator::Eq, Operand::Scalar(value.into())).negate()
    }

    pub fn lt(self, value: impl Into<Literal>) -> Condition {
        self.finish(Operator::Lt, Operand::Scalar(value.into()))
    }

    pub fn le(self, value: impl Into<Literal>) -> Condition {
        self.finish(Operator::Le, Operand::Scalar(value.into()))
    }

    pub fn gt(self, value: impl Into<Literal>) -> Condition {
        self.finish(Operator::Gt, Operand::Scalar(value.into()))
    }

    pub fn ge(self, value: impl Into<Literal>) -> Condition {
        self.finish(Operator::Ge, Operand::Scalar(value.into()))
    }

    /// Inclusive range; numeric only when both bounds are numbers.
    pub fn between(self, lo: impl Into<Literal>, hi: impl Into<Literal>) -> Condition {
        self.finish(Operator::Between, Operand::List(vec![lo.into(), hi.into()]))
    }

    pub fn starts_with(self, prefix: impl Into<Literal>) -> Condition {
        self.finish(Operator::StartsWith, Operand::Scalar(prefix.into()))
    }

    pub fn ends_with(self, suffix: impl Into<Literal>) -> Condition {
        self.finish(Operator::EndsWith, Operand::Scalar(suffix.into()))
    }

    /// A scalar operand is a substring test; a list operand means
    /// "equals one of these".
    ///
    /// ```rust
    /// use tabula_core::{Col, Operator};
    ///
    /// assert_eq!(Col::new("name").contains("op").operator(), Operator::Contains);
    /// assert_eq!(Col::new("name").contains(vec!["Chopin", "Liszt"]).operator(), Operator::InList);
    /// ```
    pub fn contains(self, operand: impl Into<Operand>) -> Condition {
        self.finish(Operator::Contains, operand)
    }

    /// Substring test; same as a scalar [`Col::contains`].
    pub fn like(self, needle: impl Into<Literal>) -> Condition {
        self.finish(Operator::Contains, Operand::Scalar(needle.into()))
    }

    /// Regular expression searched anywhere in the value.
    pub fn matches(self, pattern: impl Into<Literal>) -> Condition {
        self.finish(Operator::Matches, Operand::Scalar(pattern.into()))
    }

    pub fn in_list<I, T>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = T>,
        T: Into<Literal>,
    {
        let list: Vec<Literal> = values.into_iter().map(Into::into).collect();
        self.finish(Operator::InList, Operand::List(list))
    }

    pub fn has_all_tokens<I, T>(self, tokens: I) -> Condition
    where
        I: IntoIterator<Item = T>,
        T: Into<Literal>,
    {
        let list: Vec<Literal> = tokens.into_iter().map(Into::into).collect();
        self.finish(Operator::AllTokens, Operand::List(list))
    }

    pub fn has_any_token<I, T>(self, tokens: I) -> Condition
    where
        I: IntoIterator<Item = T>,
        T: Into<Literal>,
    {
        let list: Vec<Literal> = tokens.into_iter().map(Into::into).collect();
        self.finish(Operator::AnyToken, Operand::List(list))
    }
}

impl Not for Col {
    type Output = Col;

    fn not(self) -> Col {
        self.negate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_operand_is_numeric() {
        assert!(Col::new("age").eq(180).is_numeric());
        assert!(!Col::new("age").eq("180").is_numeric());
    }

    #[test]
    fn ne_is_negated_eq() {
        let c = Col::new("name").ne("Chopin");
        assert_eq!(c.operator(), Operator::Eq);
        assert!(c.is_negated());
    }

    #[test]
    fn negation_before_finalize() {
        let c = (!Col::new("x")).le(68);
        assert_eq!(c.operator(), Operator::Le);
        assert!(c.is_negated());
        assert_eq!(c.to_string(), "NOT (x <= 68)");
    }

    #[test]
    fn double_negation_cancels() {
        let c = !(!Col::new("x")).eq(1);
        assert!(!c.is_negated());
        assert!(!Col::new("x").ne(1).negate().is_negated());
    }

    #[test]
    fn contains_dispatches_on_operand_shape() {
        let substring = Col::new("name").contains("op");
        assert_eq!(substring.operator(), Operator::Contains);

        let list = Col::new("name").contains(vec!["Chopin", "Liszt"]);
        assert_eq!(list.operator(), Operator::InList);
        assert_eq!(list.operand().literals().len(), 2);

        let numbers = Col::new("age").contains([180, 220]);
        assert_eq!(numbers.operator(), Operator::InList);
        assert!(numbers.is_numeric());
    }

    #[test]
    fn mixed_between_is_lexical() {
        let c = Col::new("age").between(100, "200");
        assert!(!c.is_numeric());
        assert_eq!(
            c.operand().literals(),
            &[Literal::Text(b"100".to_vec()), Literal::Text(b"200".to_vec())]
        );
        assert!(Col::new("age").between(100, 200.5).is_numeric());
    }

    #[test]
    fn text_operators_take_text() {
        let c = Col::new("age").starts_with(18);
        assert_eq!(c.operand(), &Operand::Scalar(Literal::Text(b"18".to_vec())));
        assert!(!c.is_numeric());
    }

    #[test]
    fn in_list_numeric_only_when_homogeneous() {
        assert!(Col::new("age").in_list([1, 2]).is_numeric());
        assert!(!Col::new("age").in_list(vec![Literal::from(1), Literal::from("x")]).is_numeric());
    }

    #[test]
    fn display_lists() {
        let c = Col::new("name").in_list(["a", "b"]);
        assert_eq!(c.to_string(), "name in ['a', 'b']");
    }
}
