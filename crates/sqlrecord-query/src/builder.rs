//! Statement construction for record operations.
//!
//! This module turns an [`Operation`] plus the cached [`TableSchema`] into
//! SQL text and a positional parameter list:
//! - SELECT with an AND-joined condition list, the implicit soft-delete
//!   filter and ORDER BY
//! - INSERT of the non-null, non-identity fields
//! - UPDATE of every non-identity field keyed by identity
//! - DELETE keyed by identity
//!
//! Only names present in the schema are ever placed in the SQL text; every
//! value is bound.

use asupersync::{Cx, Outcome};
use serde::{Deserialize, Serialize};
use sqlrecord_core::{Connection, Error, Result, Row, Value};
use sqlrecord_schema::TableSchema;

use crate::condition::{Condition, Conditions};
use crate::order::OrderBy;

/// Placeholder syntax of the target database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `?`
    #[default]
    Mysql,
    /// `$1`, `$2`, ...
    Postgres,
    /// `?1`, `?2`, ...
    Sqlite,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Mysql => "?".to_string(),
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
        }
    }

    /// Count the placeholders in `sql` written in this dialect.
    pub fn count_placeholders(self, sql: &str) -> usize {
        let bytes = sql.as_bytes();
        let marker = match self {
            Dialect::Mysql | Dialect::Sqlite => b'?',
            Dialect::Postgres => b'$',
        };
        bytes
            .iter()
            .enumerate()
            .filter(|&(i, &b)| {
                b == marker
                    && match self {
                        Dialect::Mysql => true,
                        Dialect::Postgres | Dialect::Sqlite => {
                            bytes.get(i + 1).is_some_and(u8::is_ascii_digit)
                        }
                    }
            })
            .count()
    }
}

/// What to build.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    /// `SELECT * FROM <table> [WHERE ...] [ORDER BY ...]`.
    Select {
        conditions: &'a Conditions,
        order_by: Option<&'a OrderBy>,
        /// Soft-delete marker column; adds `<marker> = 0` first unless a
        /// caller condition already targets it.
        soft_delete: Option<&'a str>,
    },
    /// `INSERT INTO <table> (...) VALUES (...)`.
    Insert { values: &'a Row, identity: &'a str },
    /// `UPDATE <table> SET ... WHERE <identity> = ?`.
    Update { values: &'a Row, identity: &'a str },
    /// `DELETE FROM <table> WHERE <identity> = ?`.
    Delete { identity: &'a str, value: &'a Value },
}

impl Operation<'_> {
    fn name(&self) -> &'static str {
        match self {
            Operation::Select { .. } => "select",
            Operation::Insert { .. } => "insert",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
        }
    }
}

/// SQL text with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
    pub dialect: Dialect,
}

impl BuiltQuery {
    /// Number of placeholders in `sql`; always equals `params.len()`.
    pub fn placeholder_count(&self) -> usize {
        self.dialect.count_placeholders(&self.sql)
    }

    /// Run as a statement and return rows affected.
    pub async fn execute<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        tracing::trace!(sql = %self.sql, params = self.params.len(), "Executing statement");
        let outcome = conn.execute(cx, &self.sql, &self.params).await;
        self.attach_sql(outcome)
    }

    /// Run as a query and fetch every row.
    pub async fn fetch<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<Vec<Row>, Error> {
        tracing::trace!(sql = %self.sql, params = self.params.len(), "Running query");
        let outcome = conn.query(cx, &self.sql, &self.params).await;
        self.attach_sql(outcome)
    }

    /// Tag storage failures with the statement text (never the parameters).
    fn attach_sql<T>(&self, outcome: Outcome<T, Error>) -> Outcome<T, Error> {
        match outcome {
            Outcome::Err(Error::Storage(e)) if e.sql.is_none() => {
                Outcome::Err(Error::Storage(e.with_sql(self.sql.as_str())))
            }
            other => other,
        }
    }
}

/// Builds statements against one table's schema.
///
/// # Example
///
/// ```ignore
/// let schema = catalog.table(&cx, &conn, "posts").await?;
/// let filter = Conditions::new().eq("user_id", 7);
/// let query = QueryBuilder::new(&schema).build(Operation::Select {
///     conditions: &filter,
///     order_by: Some(&OrderBy::desc("created_at")),
///     soft_delete: Some("deleted_at"),
/// })?;
/// assert_eq!(
///     query.sql,
///     "SELECT * FROM posts WHERE deleted_at = ? AND user_id = ? ORDER BY created_at DESC"
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'s> {
    schema: &'s TableSchema,
    dialect: Dialect,
}

impl<'s> QueryBuilder<'s> {
    /// Create a builder for `schema` with the default dialect (MySQL).
    pub fn new(schema: &'s TableSchema) -> Self {
        Self {
            schema,
            dialect: Dialect::default(),
        }
    }

    /// Use a specific placeholder dialect.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Build the statement for `operation`.
    pub fn build(&self, operation: Operation<'_>) -> Result<BuiltQuery> {
        let mut params = Vec::new();
        let sql = match operation {
            Operation::Select {
                conditions,
                order_by,
                soft_delete,
            } => self.select(conditions, order_by, soft_delete, &mut params),
            Operation::Insert { values, identity } => self.insert(values, identity, &mut params)?,
            Operation::Update { values, identity } => self.update(values, identity, &mut params)?,
            Operation::Delete { identity, value } => self.delete(identity, value, &mut params)?,
        };

        let query = BuiltQuery {
            sql,
            params,
            dialect: self.dialect,
        };
        debug_assert_eq!(query.placeholder_count(), query.params.len());
        tracing::trace!(
            operation = operation.name(),
            sql = %query.sql,
            "Built query"
        );
        Ok(query)
    }

    fn next_placeholder(&self, params: &[Value]) -> String {
        self.dialect.placeholder(params.len() + 1)
    }

    fn select(
        &self,
        conditions: &Conditions,
        order_by: Option<&OrderBy>,
        soft_delete: Option<&str>,
        params: &mut Vec<Value>,
    ) -> String {
        let table = self.schema.table();
        let mut sql = format!("SELECT * FROM {table}");

        let mut clauses = Vec::new();
        if let Some(marker) = soft_delete {
            if !self.schema.contains(marker) {
                tracing::debug!(table, marker, "Soft-delete marker column missing, filter skipped");
            } else if !conditions.targets(marker) {
                clauses.push(format!("{marker} = {}", self.next_placeholder(params)));
                params.push(Value::Int(0));
            }
        }
        for condition in conditions {
            if let Some(clause) = self.render_condition(condition, params) {
                clauses.push(clause);
            }
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if let Some(order_by) = order_by {
            let terms: Vec<String> = order_by
                .terms()
                .iter()
                .filter(|(field, _)| {
                    let known = self.schema.contains(field);
                    if !known {
                        tracing::debug!(table, field = %field, "Dropping unknown sort field");
                    }
                    known
                })
                .map(|(field, direction)| format!("{field} {}", direction.as_sql()))
                .collect();
            if !terms.is_empty() {
                sql.push_str(" ORDER BY ");
                sql.push_str(&terms.join(", "));
            }
        }
        sql
    }

    fn render_condition(&self, condition: &Condition, params: &mut Vec<Value>) -> Option<String> {
        if !self.schema.contains(&condition.field) {
            tracing::debug!(
                table = self.schema.table(),
                field = %condition.field,
                "Dropping unknown filter field"
            );
            return None;
        }
        let clause = format!(
            "{} {} {}",
            condition.field,
            condition.operator().as_sql(),
            self.next_placeholder(params)
        );
        params.push(condition.value().clone());
        Some(clause)
    }

    /// Payload columns in schema order, rejecting names the table lacks.
    fn payload<'v>(&self, values: &'v Row) -> Result<Vec<(&'s str, &'v Value)>> {
        if let Some(unknown) = values.names().find(|name| !self.schema.contains(name)) {
            return Err(Error::unknown_column(self.schema.table(), unknown));
        }
        Ok(self
            .schema
            .fields()
            .filter_map(|field| values.get(field).map(|value| (field, value)))
            .collect())
    }

    fn require_identity(&self, identity: &str) -> Result<()> {
        if self.schema.contains(identity) {
            Ok(())
        } else {
            Err(Error::unknown_column(self.schema.table(), identity))
        }
    }

    fn insert(&self, values: &Row, identity: &str, params: &mut Vec<Value>) -> Result<String> {
        let table = self.schema.table();
        let mut columns = Vec::new();
        let mut placeholders = Vec::new();
        for (field, value) in self.payload(values)? {
            if field == identity || value.is_null() {
                continue;
            }
            columns.push(field);
            placeholders.push(self.next_placeholder(params));
            params.push(value.clone());
        }
        if columns.is_empty() {
            return Err(Error::EmptyPayload {
                table: table.to_string(),
                operation: "insert",
            });
        }
        Ok(format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        ))
    }

    fn update(&self, values: &Row, identity: &str, params: &mut Vec<Value>) -> Result<String> {
        let table = self.schema.table();
        self.require_identity(identity)?;
        let Some(id) = values.get(identity) else {
            return Err(Error::MissingField {
                record_type: table.to_string(),
                field: identity.to_string(),
            });
        };

        let mut sets = Vec::new();
        for (field, value) in self.payload(values)? {
            if field == identity {
                continue;
            }
            sets.push(format!("{field} = {}", self.next_placeholder(params)));
            params.push(value.clone());
        }
        if sets.is_empty() {
            return Err(Error::EmptyPayload {
                table: table.to_string(),
                operation: "update",
            });
        }

        let sql = format!(
            "UPDATE {table} SET {} WHERE {identity} = {}",
            sets.join(", "),
            self.next_placeholder(params)
        );
        params.push(id.clone());
        Ok(sql)
    }

    fn delete(&self, identity: &str, value: &Value, params: &mut Vec<Value>) -> Result<String> {
        self.require_identity(identity)?;
        let sql = format!(
            "DELETE FROM {} WHERE {identity} = {}",
            self.schema.table(),
            self.next_placeholder(params)
        );
        params.push(value.clone());
        Ok(sql)
    }
}
