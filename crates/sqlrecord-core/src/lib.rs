//! Core types and the connection seam for sqlrecord.
//!
//! `sqlrecord-core` is the **foundation layer** of the workspace. It defines the
//! data types every other crate exchanges and the one trait storage drivers
//! implement.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Connection` is the capability the record engine consumes
//!   (query / execute / last-insert-id with positional parameter binding).
//! - **Data model**: `Value` and `Row` carry query inputs and outputs.
//! - **Errors**: a single `Error` enum shared by the schema, query and engine crates.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync so every
//!   storage round trip is cancel-correct and budget-aware.
//!
//! # Who Uses This Crate
//!
//! - `sqlrecord-schema` introspects tables through `Connection` and coerces `Value`s.
//! - `sqlrecord-query` renders SQL text with `Value` parameters.
//! - `sqlrecord` (the facade) orchestrates everything into record operations.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod config;
pub mod connection;
pub mod error;
pub mod identifiers;
pub mod lazy;
pub mod outcome;
pub mod row;
pub mod value;

pub use config::ConnectionConfig;
pub use connection::Connection;
pub use error::{Error, Result, SchemaError, StorageError};
pub use identifiers::{is_valid_identifier, validate_identifier};
pub use lazy::LazyConnection;
pub use outcome::into_outcome;
pub use row::{Properties, Row};
pub use value::Value;
