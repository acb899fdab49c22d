//! Schema introspection and column type coercion for sqlrecord.
//!
//! `sqlrecord-schema` owns everything the engine knows about table layout.
//!
//! - [`SchemaCatalog`] describes each table once and caches the ordered
//!   column list and raw SQL types for the life of the process.
//! - [`ValueDomain`] and [`coerce`] normalize raw values into the domain of
//!   their column type before they reach a record or a statement.
//!
//! The facade crate holds one `Arc<SchemaCatalog>` per database and shares it
//! between engines.

pub mod catalog;
pub mod coerce;

pub use catalog::{ColumnInfo, SchemaCatalog, TableSchema};
pub use coerce::{ValueDomain, coerce};
