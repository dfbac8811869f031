//! Table Engine Module

pub mod constructors;
pub mod crud;
pub mod index;
pub(crate) mod metadata;
pub mod table;
pub mod transaction;
pub mod types;

pub use table::Table;
pub use transaction::{Active, Committed, RolledBack, Transaction, TxState};
pub use types::{PutMode, PutOutcome};
