//! Record types bound to relational tables.
//!
//! `sqlrecord` is the facade crate. Application code registers record types,
//! hands the registry and a [`Connection`] to a [`RecordEngine`], and works
//! with [`Record`]s: rows whose values are coerced to their column types and
//! whose relationships are loaded eagerly.
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlrecord::prelude::*;
//!
//! let registry = Registry::new()
//!     .with(RecordType::builder("User").has_many("posts", "Post").build()?)?
//!     .with(RecordType::builder("Post").belongs_to("user", "User").build()?)?;
//!
//! let conn = LazyConnection::new(ConnectionConfig::from_env()?, |config| async move {
//!     MyDriver::connect(&config).await
//! });
//! let engine = RecordEngine::new(conn, registry)?;
//!
//! let post = engine
//!     .create(&cx, "Post", &Properties::new().with("title", "Hello").with("user_id", 7))
//!     .await;
//! let drafts = engine
//!     .select(&cx, "Post", &Conditions::new().eq("user_id", 7), Some(&OrderBy::desc("id")))
//!     .await;
//! ```
//!
//! # Behavior
//!
//! - Table metadata is introspected once per table and shared through a
//!   [`SchemaCatalog`].
//! - Soft-delete types are filtered on their marker column by default and
//!   are never physically removed by [`RecordEngine::delete`].
//! - Relationship loading stops at reciprocal back-references, at records
//!   already on the loading path and at [`EngineConfig::max_relation_depth`].
//! - Every async operation takes the caller's [`Cx`] and returns an
//!   [`Outcome`].

pub mod config;
pub mod engine;
pub mod record;
pub mod record_type;
pub mod registry;
pub mod resolver;

pub use config::{DEFAULT_MAX_RELATION_DEPTH, EngineConfig};
pub use engine::RecordEngine;
pub use record::{Record, RecordState, Related};
pub use record_type::{RecordType, RecordTypeBuilder, Relationship, RelationshipKind};
pub use registry::Registry;
pub use resolver::{RelationKeys, Visit};

pub use sqlrecord_core::{
    Connection, ConnectionConfig, Cx, Error, LazyConnection, Outcome, Properties, Result, Row,
    SchemaError, StorageError, Value, into_outcome, try_outcome,
};
pub use sqlrecord_query::{
    BuiltQuery, Condition, Conditions, Criterion, Dialect, Direction, Operation, Operator,
    OrderBy, QueryBuilder,
};
pub use sqlrecord_schema::{ColumnInfo, SchemaCatalog, TableSchema, ValueDomain, coerce};

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        Conditions, Connection, ConnectionConfig, Cx, Direction, EngineConfig, Error,
        LazyConnection, Operator, OrderBy, Outcome, Properties, Record, RecordEngine,
        RecordState, RecordType, Related, Registry, Relationship, Row, Value,
    };
}
