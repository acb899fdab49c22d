//! Parameterized statement construction for sqlrecord.
//!
//! `sqlrecord-query` turns record intent into SQL text plus positional
//! parameters. It never executes anything on its own; [`BuiltQuery`] offers
//! thin `execute`/`fetch` helpers over a [`sqlrecord_core::Connection`].
//!
//! # Safety Of Generated SQL
//!
//! - Table and column names come from the [`sqlrecord_schema::TableSchema`]
//!   the builder is created with; caller-supplied names outside it are
//!   dropped (filters, sort terms) or rejected (write payloads).
//! - Comparison operators are a closed [`Operator`] set.
//! - Values are always bound as parameters.

pub mod builder;
pub mod condition;
pub mod order;

pub use builder::{BuiltQuery, Dialect, Operation, QueryBuilder};
pub use condition::{Condition, Conditions, Criterion, Operator};
pub use order::{Direction, OrderBy};
