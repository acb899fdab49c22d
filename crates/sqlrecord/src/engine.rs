//! The record engine.
//!
//! [`RecordEngine`] executes every record operation against one logical
//! connection: construction with coercion and eager relationship loading,
//! filtered selects, create/save/update, soft and hard deletes, and the
//! find helpers built on top of them.
//!
//! Each operation awaits its storage round trips in sequence and checks the
//! caller's [`Cx`] for cancellation before issuing one.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use asupersync::{Cx, Outcome};
use sqlrecord_core::{
    Connection, Error, Properties, Result, Row, Value, into_outcome, try_outcome,
};
use sqlrecord_query::{Conditions, Operation, OrderBy, QueryBuilder};
use sqlrecord_schema::{SchemaCatalog, TableSchema};

use crate::config::EngineConfig;
use crate::record::{Record, RecordState, Related};
use crate::record_type::{RecordType, Relationship};
use crate::registry::Registry;
use crate::resolver::{self, RelationKeys, Visit};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Read every declared column from `properties`, coerced to its domain.
fn coerce_fields(ty: &RecordType, schema: &TableSchema, properties: &Row) -> Result<Row> {
    schema
        .columns()
        .iter()
        .map(|column| match properties.get(&column.name) {
            Some(value) => Ok((column.name.clone(), column.domain.coerce(value.clone()))),
            None => Err(Error::MissingField {
                record_type: ty.name().to_string(),
                field: column.name.clone(),
            }),
        })
        .collect()
}

/// Executes record operations for the types in a [`Registry`].
///
/// Cloning is cheap; clones share the connection, registry and schema
/// catalog.
///
/// # Example
///
/// ```ignore
/// let registry = Registry::new()
///     .with(RecordType::builder("User").has_many("posts", "Post").build()?)?
///     .with(RecordType::builder("Post").belongs_to("user", "User").build()?)?;
/// let engine = RecordEngine::new(conn, registry)?;
///
/// let post = engine.find(&cx, "Post", 1).await;
/// ```
pub struct RecordEngine<C> {
    conn: Arc<C>,
    registry: Arc<Registry>,
    catalog: Arc<SchemaCatalog>,
    config: EngineConfig,
    clock: Clock,
}

impl<C> Clone for RecordEngine<C> {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            registry: Arc::clone(&self.registry),
            catalog: Arc::clone(&self.catalog),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> fmt::Debug for RecordEngine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordEngine")
            .field("record_types", &self.registry.names())
            .field("cached_tables", &self.catalog.cached_tables())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> RecordEngine<C> {
    /// Create an engine with the default configuration.
    pub fn new(conn: C, registry: Registry) -> Result<Self> {
        Self::with_config(conn, registry, EngineConfig::default())
    }

    /// Create an engine. Fails if a relationship targets an unregistered
    /// type or the table prefix is unusable.
    pub fn with_config(conn: C, registry: Registry, config: EngineConfig) -> Result<Self> {
        registry.validate()?;
        config.validate()?;
        tracing::debug!(
            record_types = registry.len(),
            dialect = ?config.dialect,
            "Created record engine"
        );
        Ok(Self {
            conn: Arc::new(conn),
            registry: Arc::new(registry),
            catalog: Arc::new(SchemaCatalog::new()),
            config,
            clock: Arc::new(unix_now),
        })
    }

    /// Share an existing schema catalog.
    pub fn with_catalog(mut self, catalog: Arc<SchemaCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the timestamp source (Unix seconds).
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// A sibling engine whose tables are `<prefix><table>`.
    ///
    /// The connection, registry and catalog are shared.
    pub fn with_table_prefix(&self, prefix: impl Into<String>) -> Result<Self> {
        let config = self.config.clone().table_prefix(prefix);
        config.validate()?;
        Ok(Self {
            config,
            ..self.clone()
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Resolved table for a record type under this engine.
    pub fn table_for(&self, record_type: &str) -> Result<String> {
        let ty = self.registry.get(record_type)?;
        Ok(self.config.resolve_table(ty.table()))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Build a record from `properties`, coercing every declared field and
    /// eagerly resolving relationships.
    ///
    /// Every column of the table must be present in `properties`.
    #[tracing::instrument(level = "debug", skip(self, cx, properties))]
    pub async fn construct(
        &self,
        cx: &Cx,
        record_type: &str,
        properties: &Properties,
    ) -> Outcome<Record, Error> {
        let ty = try_outcome!(into_outcome(self.registry.get(record_type)));
        let schema = try_outcome!(self.schema(cx, &ty).await);
        self.hydrate(
            cx,
            ty,
            schema,
            properties.clone(),
            RecordState::Constructed,
            Visit::root(),
        )
        .await
    }

    /// Records matching every condition, optionally ordered.
    ///
    /// Soft-delete types exclude rows whose marker is set unless a condition
    /// targets the marker column. Conditions and sort terms naming unknown
    /// columns are dropped.
    #[tracing::instrument(level = "debug", skip(self, cx, conditions, order_by))]
    pub async fn select(
        &self,
        cx: &Cx,
        record_type: &str,
        conditions: &Conditions,
        order_by: Option<&OrderBy>,
    ) -> Outcome<Vec<Record>, Error> {
        let ty = try_outcome!(into_outcome(self.registry.get(record_type)));
        let schema = try_outcome!(self.schema(cx, &ty).await);
        let rows = try_outcome!(
            self.select_rows(cx, &ty, &schema, conditions, order_by)
                .await
        );
        tracing::debug!(rows = rows.len(), "Selected rows");

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(try_outcome!(
                self.hydrate(
                    cx,
                    Arc::clone(&ty),
                    Arc::clone(&schema),
                    row,
                    RecordState::Persisted,
                    Visit::root(),
                )
                .await
            ));
        }
        Outcome::Ok(records)
    }

    /// Every record of a type (soft-delete filtered).
    pub async fn all(&self, cx: &Cx, record_type: &str) -> Outcome<Vec<Record>, Error> {
        self.select(cx, record_type, &Conditions::new(), None).await
    }

    /// First record whose identity equals `value`.
    pub async fn find(
        &self,
        cx: &Cx,
        record_type: &str,
        value: impl Into<Value>,
    ) -> Outcome<Option<Record>, Error> {
        let value = value.into();
        let ty = try_outcome!(into_outcome(self.registry.get(record_type)));
        self.find_by(cx, record_type, ty.identity(), value).await
    }

    /// First record whose `field` equals `value`.
    ///
    /// Unlike [`RecordEngine::select`], an unknown `field` is an error rather
    /// than a dropped condition.
    #[tracing::instrument(level = "debug", skip(self, cx, value))]
    pub async fn find_by(
        &self,
        cx: &Cx,
        record_type: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Outcome<Option<Record>, Error> {
        let value = value.into();
        let ty = try_outcome!(into_outcome(self.registry.get(record_type)));
        let schema = try_outcome!(self.schema(cx, &ty).await);
        if !schema.contains(field) {
            return Outcome::Err(Error::unknown_column(schema.table(), field));
        }

        let filter = Conditions::new().eq(field, value);
        let rows = try_outcome!(self.select_rows(cx, &ty, &schema, &filter, None).await);
        let Some(row) = rows.into_iter().next() else {
            return Outcome::Ok(None);
        };
        self.hydrate(cx, ty, schema, row, RecordState::Persisted, Visit::root())
            .await
            .map(Some)
    }

    /// First record matching the equality conditions, created from them when
    /// none exists. Operator conditions are ignored.
    #[tracing::instrument(level = "debug", skip(self, cx, conditions))]
    pub async fn find_or_create(
        &self,
        cx: &Cx,
        record_type: &str,
        conditions: &Conditions,
    ) -> Outcome<Option<Record>, Error> {
        let equalities = conditions.equalities();
        if equalities.len() < conditions.len() {
            tracing::debug!(
                stripped = conditions.len() - equalities.len(),
                "Ignoring operator conditions"
            );
        }

        let ty = try_outcome!(into_outcome(self.registry.get(record_type)));
        let schema = try_outcome!(self.schema(cx, &ty).await);
        let rows = try_outcome!(
            self.select_rows(cx, &ty, &schema, &equalities, None)
                .await
        );
        if let Some(row) = rows.into_iter().next() {
            return self
                .hydrate(cx, ty, schema, row, RecordState::Persisted, Visit::root())
                .await
                .map(Some);
        }
        self.create(cx, record_type, &equalities.to_properties()).await
    }

    /// Column names of the type's table, in order.
    pub async fn get_fields(&self, cx: &Cx, record_type: &str) -> Outcome<Vec<String>, Error> {
        let ty = try_outcome!(into_outcome(self.registry.get(record_type)));
        let schema = try_outcome!(self.schema(cx, &ty).await);
        Outcome::Ok(schema.fields().map(str::to_string).collect())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Insert a new row and return it as stored.
    ///
    /// Timestamps are stamped when enabled and their columns exist, the
    /// soft-delete marker defaults to 0 and other absent fields to NULL.
    /// A caller-supplied identity is not written; the row is re-read by the
    /// identity the connection generated. Returns `None` if the insert
    /// affected no rows.
    #[tracing::instrument(level = "debug", skip(self, cx, properties))]
    pub async fn create(
        &self,
        cx: &Cx,
        record_type: &str,
        properties: &Properties,
    ) -> Outcome<Option<Record>, Error> {
        let ty = try_outcome!(into_outcome(self.registry.get(record_type)));
        let schema = try_outcome!(self.schema(cx, &ty).await);

        let mut properties = properties.clone();
        if ty.timestamps() {
            let now = self.now();
            for column in [ty.created_column(), ty.updated_column()] {
                if schema.contains(column) {
                    properties.set(column, now);
                }
            }
        }
        if ty.soft_deletes()
            && schema.contains(ty.deleted_column())
            && !properties.contains(ty.deleted_column())
        {
            properties.set(ty.deleted_column(), 0);
        }
        for field in schema.fields() {
            if !properties.contains(field) {
                properties.set(field, Value::Null);
            }
        }

        let fields = try_outcome!(into_outcome(coerce_fields(&ty, &schema, &properties)));
        let query = try_outcome!(into_outcome(self.builder(&schema).build(Operation::Insert {
            values: &fields,
            identity: ty.identity(),
        })));

        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        let affected = try_outcome!(query.execute(cx, self.conn.as_ref()).await);
        if affected == 0 {
            tracing::warn!(table = schema.table(), "Insert affected no rows");
            return Outcome::Ok(None);
        }

        // The identity column is never part of the INSERT, so only the
        // generated value names the new row.
        let generated = try_outcome!(self.conn.last_insert_id(cx).await);
        let Some(generated) = generated else {
            return Outcome::Err(Error::storage(format!(
                "insert into `{}` reported no generated identity",
                schema.table()
            )));
        };
        let id = match schema.column(ty.identity()) {
            Some(column) => column.domain.coerce(generated),
            None => generated,
        };
        tracing::info!(table = schema.table(), id = ?id, "Created record");

        self.find(cx, record_type, id).await
    }

    /// Write every field of `record` back, keyed by identity. Returns rows
    /// affected.
    #[tracing::instrument(
        level = "debug",
        skip(self, cx, record),
        fields(record_type = record.record_type())
    )]
    pub async fn save(&self, cx: &Cx, record: &mut Record) -> Outcome<u64, Error> {
        try_outcome!(into_outcome(writable(record)));
        let ty = try_outcome!(into_outcome(self.registry.get(record.record_type())));
        let schema = try_outcome!(self.catalog.table(cx, self.conn.as_ref(), record.table()).await);
        let query = try_outcome!(into_outcome(self.builder(&schema).build(Operation::Update {
            values: record.fields(),
            identity: ty.identity(),
        })));

        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        let affected = try_outcome!(query.execute(cx, self.conn.as_ref()).await);
        tracing::info!(table = record.table(), id = ?record.id(), affected, "Saved record");

        if affected > 0 && record.state() == RecordState::Constructed {
            record.set_state(RecordState::Persisted);
        }
        Outcome::Ok(affected)
    }

    /// Merge `properties` into `record` and save it.
    ///
    /// Keys that are not columns of the record, and the identity key, are
    /// ignored. The update timestamp is stamped when enabled.
    #[tracing::instrument(
        level = "debug",
        skip(self, cx, record, properties),
        fields(record_type = record.record_type())
    )]
    pub async fn update(
        &self,
        cx: &Cx,
        record: &mut Record,
        properties: &Properties,
    ) -> Outcome<u64, Error> {
        try_outcome!(into_outcome(writable(record)));
        let ty = try_outcome!(into_outcome(self.registry.get(record.record_type())));
        let schema = try_outcome!(self.catalog.table(cx, self.conn.as_ref(), record.table()).await);

        for (field, value) in properties.iter() {
            let column = schema.column(field).filter(|_| field != ty.identity());
            match column {
                Some(column) if record.fields().contains(field) => {
                    record
                        .fields_mut()
                        .set(field, column.domain.coerce(value.clone()));
                }
                _ => tracing::debug!(field, "Ignoring property"),
            }
        }
        if ty.timestamps() && schema.contains(ty.updated_column()) {
            let now = self.now();
            record.fields_mut().set(ty.updated_column(), now);
        }
        self.save(cx, record).await
    }

    /// Set one field and save.
    pub async fn update_property(
        &self,
        cx: &Cx,
        record: &mut Record,
        field: &str,
        value: impl Into<Value>,
    ) -> Outcome<u64, Error> {
        let properties = Row::new().with(field, value);
        self.update(cx, record, &properties).await
    }

    /// Delete `record`.
    ///
    /// Soft-delete types stamp the marker column with the current time and
    /// keep the row; other types remove it.
    #[tracing::instrument(
        level = "debug",
        skip(self, cx, record),
        fields(record_type = record.record_type())
    )]
    pub async fn delete(&self, cx: &Cx, record: &mut Record) -> Outcome<u64, Error> {
        try_outcome!(into_outcome(writable(record)));
        let ty = try_outcome!(into_outcome(self.registry.get(record.record_type())));
        let schema = try_outcome!(self.catalog.table(cx, self.conn.as_ref(), record.table()).await);

        if ty.soft_deletes() {
            let marker = ty.deleted_column();
            if !schema.contains(marker) {
                return Outcome::Err(Error::unknown_column(schema.table(), marker));
            }
            let now = self.now();
            let affected = try_outcome!(self.update_property(cx, record, marker, now).await);
            record.set_state(RecordState::SoftDeleted);
            tracing::info!(table = record.table(), id = ?record.id(), "Soft-deleted record");
            return Outcome::Ok(affected);
        }

        let Some(id) = record.id().cloned() else {
            return Outcome::Err(Error::MissingField {
                record_type: ty.name().to_string(),
                field: ty.identity().to_string(),
            });
        };
        let query = try_outcome!(into_outcome(self.builder(&schema).build(Operation::Delete {
            identity: ty.identity(),
            value: &id,
        })));

        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        let affected = try_outcome!(query.execute(cx, self.conn.as_ref()).await);
        record.set_state(RecordState::Removed);
        tracing::info!(table = record.table(), id = ?id, affected, "Deleted record");
        Outcome::Ok(affected)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn now(&self) -> i64 {
        (self.clock)()
    }

    fn builder<'s>(&self, schema: &'s TableSchema) -> QueryBuilder<'s> {
        QueryBuilder::new(schema).dialect(self.config.dialect)
    }

    async fn schema(&self, cx: &Cx, ty: &RecordType) -> Outcome<Arc<TableSchema>, Error> {
        let table = self.config.resolve_table(ty.table());
        self.catalog.table(cx, self.conn.as_ref(), &table).await
    }

    async fn select_rows(
        &self,
        cx: &Cx,
        ty: &RecordType,
        schema: &TableSchema,
        conditions: &Conditions,
        order_by: Option<&OrderBy>,
    ) -> Outcome<Vec<Row>, Error> {
        let soft_delete = ty.soft_deletes().then(|| ty.deleted_column());
        let query = try_outcome!(into_outcome(self.builder(schema).build(Operation::Select {
            conditions,
            order_by,
            soft_delete,
        })));

        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        query.fetch(cx, self.conn.as_ref()).await
    }

    /// Coerce `row` into a record of `ty` and resolve its relationships.
    fn hydrate<'a>(
        &'a self,
        cx: &'a Cx,
        ty: Arc<RecordType>,
        schema: Arc<TableSchema>,
        row: Row,
        state: RecordState,
        visit: Visit,
    ) -> BoxFuture<'a, Outcome<Record, Error>> {
        Box::pin(async move {
            let fields = try_outcome!(into_outcome(coerce_fields(&ty, &schema, &row)));
            let mut record = Record::new(ty.name(), schema.table(), ty.identity(), fields, state);
            let id = record.id().cloned().unwrap_or_default();

            if let Some(cut) = resolver::cut(&visit, ty.name(), &id, self.config.max_relation_depth)
            {
                tracing::trace!(record_type = ty.name(), ?cut, "Relationships not loaded");
                for rel in ty.relationships() {
                    record.push_relation(&rel.name, Related::NotLoaded);
                }
                return Outcome::Ok(record);
            }

            let child = visit.child(ty.name(), &id);
            for rel in ty.relationships() {
                let related = try_outcome!(
                    self.resolve_relation(cx, &ty, &record, rel, &visit, &child)
                        .await
                );
                record.push_relation(&rel.name, related);
            }
            Outcome::Ok(record)
        })
    }

    async fn resolve_relation(
        &self,
        cx: &Cx,
        owner: &RecordType,
        record: &Record,
        rel: &Relationship,
        visit: &Visit,
        child: &Visit,
    ) -> Outcome<Related, Error> {
        let target = try_outcome!(into_outcome(self.registry.get(&rel.target)));
        if resolver::is_reciprocal(owner, rel, &target, visit) {
            tracing::trace!(
                record_type = owner.name(),
                relationship = %rel.name,
                "Skipping reciprocal relationship"
            );
            return Outcome::Ok(Related::NotLoaded);
        }

        let many = rel.kind.is_many();
        let keys = RelationKeys::resolve(owner, rel, &target);
        let Some(local) = record.get(&keys.local_key).cloned() else {
            return Outcome::Err(Error::unknown_column(record.table(), &keys.local_key));
        };
        if local.is_null() {
            return Outcome::Ok(if many {
                Related::Many(Vec::new())
            } else {
                Related::One(None)
            });
        }

        let schema = try_outcome!(self.schema(cx, &target).await);
        if !schema.contains(&keys.foreign_key) {
            return Outcome::Err(Error::unknown_column(schema.table(), &keys.foreign_key));
        }

        let filter = Conditions::new().eq(keys.foreign_key.as_str(), local);
        let mut rows = try_outcome!(self.select_rows(cx, &target, &schema, &filter, None).await);
        if !many {
            rows.truncate(1);
        }

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(try_outcome!(
                self.hydrate(
                    cx,
                    Arc::clone(&target),
                    Arc::clone(&schema),
                    row,
                    RecordState::Persisted,
                    child.clone(),
                )
                .await
            ));
        }

        Outcome::Ok(if many {
            Related::Many(records)
        } else {
            Related::One(records.pop().map(Box::new))
        })
    }
}

fn writable(record: &Record) -> Result<()> {
    if record.state() == RecordState::Removed {
        Err(Error::RecordRemoved {
            record_type: record.record_type().to_string(),
        })
    } else {
        Ok(())
    }
}
