//! Query layer: predicate algebra, planner and executor.

pub mod builder;
pub(crate) mod eval;
pub(crate) mod executor;
pub(crate) mod planner;
pub mod predicate;

pub use builder::{Direction, Mode, Order, Query, QueryOutput};
pub use predicate::{Col, Condition, Literal, Operand, Operator};
