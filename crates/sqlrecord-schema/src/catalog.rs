//! Table introspection and the per-table schema cache.
//!
//! Column metadata is fetched with `DESCRIBE <table>` the first time a table
//! is used and kept for the lifetime of the catalog. The cache is keyed by
//! resolved table name, so a record type whose table resolves differently
//! (for example under a tenant prefix) simply misses and is introspected once
//! under its new name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use asupersync::sync::Mutex;
use asupersync::{Cx, Outcome};
use sqlrecord_core::{
    Connection, Error, Result, Row, SchemaError, Value, into_outcome, is_valid_identifier,
    try_outcome, validate_identifier,
};

use crate::coerce::ValueDomain;

/// Metadata for one table column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Raw SQL type string, e.g. `varchar(255)`.
    pub sql_type: String,
    /// Value domain derived from `sql_type`.
    pub domain: ValueDomain,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Key marker (`PRI`, `UNI`, `MUL`), if any.
    pub key: Option<String>,
    /// Column default.
    pub default: Value,
    /// Extra attributes, e.g. `auto_increment`.
    pub extra: Option<String>,
}

impl ColumnInfo {
    /// Create a column; the domain is derived from the raw type.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        let sql_type = sql_type.into();
        Self {
            name: name.into(),
            domain: ValueDomain::from_sql_type(&sql_type),
            sql_type,
            nullable: true,
            key: None,
            default: Value::Null,
            extra: None,
        }
    }

    /// Set nullability.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark as primary key.
    pub fn primary_key(mut self) -> Self {
        self.key = Some("PRI".to_string());
        self
    }

    /// Set the column default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    /// Set extra attributes.
    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// True if the key marker is `PRI`.
    pub fn is_primary_key(&self) -> bool {
        self.key.as_deref().is_some_and(|k| k.eq_ignore_ascii_case("PRI"))
    }

    /// True if the extra attributes mention `auto_increment`.
    pub fn is_auto_increment(&self) -> bool {
        self.extra
            .as_deref()
            .is_some_and(|e| e.to_ascii_lowercase().contains("auto_increment"))
    }

    /// Parse one row of `DESCRIBE` output.
    pub fn from_describe_row(table: &str, row: &Row) -> Result<Self> {
        let name = text(row, "Field").ok_or_else(|| SchemaError {
            table: table.to_string(),
            column: None,
            message: format!("DESCRIBE {table} returned a row without `Field`"),
        })?;
        if !is_valid_identifier(&name) {
            return Err(Error::Schema(SchemaError {
                table: table.to_string(),
                column: Some(name.clone()),
                message: format!("column `{name}` on `{table}` is not a plain identifier"),
            }));
        }
        let sql_type = text(row, "Type").unwrap_or_default();

        let mut column = ColumnInfo::new(name, sql_type);
        column.nullable = text(row, "Null").is_none_or(|n| n.eq_ignore_ascii_case("YES"));
        column.key = text(row, "Key").filter(|k| !k.is_empty());
        column.default = row.get_ignore_case("Default").cloned().unwrap_or_default();
        column.extra = text(row, "Extra").filter(|e| !e.is_empty());
        Ok(column)
    }
}

fn text(row: &Row, header: &str) -> Option<String> {
    match row.get_ignore_case(header)? {
        Value::Text(s) => Some(s.clone()),
        Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        Value::Null => None,
        other => Some(format!("{other:?}")),
    }
}

/// Ordered column metadata for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    table: String,
    columns: Vec<ColumnInfo>,
}

impl TableSchema {
    /// Build a schema, validating every name that may be placed in SQL text.
    pub fn new(table: impl Into<String>, columns: Vec<ColumnInfo>) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        if columns.is_empty() {
            return Err(Error::unknown_table(table));
        }
        for column in &columns {
            validate_identifier(&column.name)?;
        }
        Ok(Self { table, columns })
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns in schema order.
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Column names in schema order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Look up a column.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// True if the table has this column.
    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Raw SQL type of a column.
    pub fn field_type(&self, name: &str) -> Result<&str> {
        self.column(name)
            .map(|c| c.sql_type.as_str())
            .ok_or_else(|| Error::unknown_column(&self.table, name))
    }

    /// Name of the first `PRI` column, if the table reports one.
    pub fn primary_key(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.is_primary_key())
            .map(|c| c.name.as_str())
    }
}

/// Process-wide cache of table metadata.
///
/// Share one catalog (behind an `Arc`) between every engine that talks to the
/// same database.
#[derive(Debug)]
pub struct SchemaCatalog {
    cache: RwLock<HashMap<String, Arc<TableSchema>>>,
    /// Serializes introspection so concurrent first use issues one DESCRIBE.
    introspect: Mutex<()>,
    round_trips: AtomicUsize,
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            introspect: Mutex::new(()),
            round_trips: AtomicUsize::new(0),
        }
    }

    /// Schema for `table`, introspecting on first use.
    #[tracing::instrument(level = "debug", skip(self, cx, conn))]
    pub async fn table<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table: &str,
    ) -> Outcome<Arc<TableSchema>, Error> {
        if let Some(schema) = self.cached(table) {
            return Outcome::Ok(schema);
        }
        try_outcome!(into_outcome(validate_identifier(table).map(|_| ())));

        let Ok(_guard) = self.introspect.lock(cx).await else {
            return Outcome::Err(Error::storage("failed to acquire schema introspection lock"));
        };
        // Another task may have finished introspecting while we waited.
        if let Some(schema) = self.cached(table) {
            return Outcome::Ok(schema);
        }
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }

        let sql = format!("DESCRIBE {table}");
        tracing::debug!(table, "Introspecting table");
        tracing::trace!(sql = %sql, "Schema introspection");
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        let rows = try_outcome!(conn.query(cx, &sql, &[]).await);

        let columns: Vec<ColumnInfo> = try_outcome!(into_outcome(
            rows.iter()
                .map(|row| ColumnInfo::from_describe_row(table, row))
                .collect::<Result<_>>()
        ));
        let schema = try_outcome!(into_outcome(TableSchema::new(table, columns)));

        tracing::debug!(table, columns = schema.columns().len(), "Cached table schema");
        Outcome::Ok(self.insert(schema))
    }

    /// Ordered column names for `table`.
    pub async fn get_fields<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table: &str,
    ) -> Outcome<Vec<String>, Error> {
        let schema = try_outcome!(self.table(cx, conn, table).await);
        Outcome::Ok(schema.fields().map(str::to_string).collect())
    }

    /// Raw SQL type of `field` on `table`.
    pub async fn get_field_type<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        table: &str,
        field: &str,
    ) -> Outcome<String, Error> {
        let schema = try_outcome!(self.table(cx, conn, table).await);
        into_outcome(schema.field_type(field).map(str::to_string))
    }

    /// Cached schema without touching storage.
    pub fn cached(&self, table: &str) -> Option<Arc<TableSchema>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
    }

    /// Seed the cache with known metadata, replacing any existing entry.
    pub fn insert(&self, schema: TableSchema) -> Arc<TableSchema> {
        let schema = Arc::new(schema);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(schema.table().to_string(), Arc::clone(&schema));
        schema
    }

    /// Drop one table so the next use re-introspects it.
    pub fn invalidate(&self, table: &str) -> bool {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(table)
            .is_some()
    }

    /// Drop every cached table.
    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Names of the cached tables, sorted.
    pub fn cached_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        tables.sort();
        tables
    }

    /// Number of DESCRIBE round trips issued so far.
    pub fn introspections(&self) -> usize {
        self.round_trips.load(Ordering::Relaxed)
    }
}
