//! In-memory `Connection` fake for engine tests.
//!
//! Interprets exactly the statement shapes the engine emits with the MySQL
//! dialect: `DESCRIBE t`, `SELECT * FROM t [WHERE ..] [ORDER BY ..]`,
//! `INSERT INTO t (..) VALUES (..)`, `UPDATE t SET .. WHERE id = ?` and
//! `DELETE FROM t WHERE id = ?`.

#![allow(dead_code, clippy::manual_async_fn)]

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use asupersync::runtime::RuntimeBuilder;
use sqlrecord::prelude::*;
use sqlrecord::StorageError;

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> std::result::Result<T, String> {
    match outcome {
        Outcome::Ok(v) => Ok(v),
        Outcome::Err(e) => Err(format!("unexpected error: {e}")),
        Outcome::Cancelled(r) => Err(format!("cancelled: {r:?}")),
        Outcome::Panicked(p) => Err(format!("panicked: {p:?}")),
    }
}

pub fn block_on<F: Future>(future: F) -> F::Output {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(future)
}

#[derive(Debug, Default)]
struct Table {
    columns: Vec<(String, String)>,
    rows: Vec<Row>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Table>,
    last_insert_id: Option<i64>,
    statements: Vec<String>,
    fail_on: Option<String>,
    affect_nothing: bool,
}

/// A tiny table store speaking the engine's SQL subset.
#[derive(Debug, Default)]
pub struct MemoryDb {
    state: Mutex<State>,
}

impl MemoryDb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Define a table. The first column is the auto-increment identity.
    pub fn create_table(&self, name: &str, columns: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        state.tables.insert(
            name.to_string(),
            Table {
                columns: columns
                    .iter()
                    .map(|(n, t)| ((*n).to_string(), (*t).to_string()))
                    .collect(),
                rows: Vec::new(),
                next_id: 1,
            },
        );
    }

    /// Insert a row directly, bypassing the engine. Returns its identity.
    pub fn seed(&self, table: &str, values: Row) -> i64 {
        let mut state = self.state.lock().unwrap();
        let table = state.tables.get_mut(table).expect("seeded table exists");
        insert_row(table, &values)
    }

    /// Every row currently stored in `table`, including soft-deleted ones.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        let state = self.state.lock().unwrap();
        state.tables.get(table).map(|t| t.rows.clone()).unwrap_or_default()
    }

    /// Every statement received so far.
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    /// Number of statements starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.statements()
            .iter()
            .filter(|s| s.starts_with(prefix))
            .count()
    }

    pub fn clear_statements(&self) {
        self.state.lock().unwrap().statements.clear();
    }

    /// Fail every statement containing `needle` with a storage error.
    pub fn fail_on(&self, needle: &str) {
        self.state.lock().unwrap().fail_on = Some(needle.to_string());
    }

    /// Make writes report zero affected rows without changing anything.
    pub fn affect_nothing(&self) {
        self.state.lock().unwrap().affect_nothing = true;
    }

    fn run_query(&self, sql: &str, params: &[Value]) -> std::result::Result<Vec<Row>, String> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql.to_string());
        check_failure(&state, sql)?;

        if let Some(table) = sql.strip_prefix("DESCRIBE ") {
            let Some(table) = state.tables.get(table) else {
                return Ok(Vec::new());
            };
            return Ok(table
                .columns
                .iter()
                .enumerate()
                .map(|(i, (name, ty))| {
                    Row::new()
                        .with("Field", name.as_str())
                        .with("Type", ty.as_str())
                        .with("Null", if i == 0 { "NO" } else { "YES" })
                        .with("Key", if i == 0 { "PRI" } else { "" })
                        .with("Default", Value::Null)
                        .with("Extra", if i == 0 { "auto_increment" } else { "" })
                })
                .collect());
        }

        let rest = sql
            .strip_prefix("SELECT * FROM ")
            .ok_or_else(|| format!("unsupported query: {sql}"))?;
        let (rest, order) = match rest.split_once(" ORDER BY ") {
            Some((rest, order)) => (rest, Some(order)),
            None => (rest, None),
        };
        let (table_name, filter) = split_where(rest);
        let table = state
            .tables
            .get(table_name)
            .ok_or_else(|| format!("no such table: {table_name}"))?;

        let predicates = parse_predicates(filter, params)?;
        let mut rows: Vec<Row> = table
            .rows
            .iter()
            .filter(|row| predicates.iter().all(|p| p.matches(row)))
            .cloned()
            .collect();

        if let Some(order) = order {
            let terms: Vec<(&str, bool)> = order
                .split(", ")
                .map(|term| {
                    let (field, dir) = term.split_once(' ').unwrap_or((term, "ASC"));
                    (field, dir == "DESC")
                })
                .collect();
            rows.sort_by(|a, b| {
                for (field, desc) in &terms {
                    let ord = compare(a.get(field), b.get(field)).unwrap_or(Ordering::Equal);
                    let ord = if *desc { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }
        Ok(rows)
    }

    fn run_execute(&self, sql: &str, params: &[Value]) -> std::result::Result<u64, String> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql.to_string());
        check_failure(&state, sql)?;
        if state.affect_nothing {
            return Ok(0);
        }

        if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
            let (table_name, rest) = rest.split_once(" (").ok_or("malformed insert")?;
            let (columns, _) = rest.split_once(") VALUES").ok_or("malformed insert")?;
            let values: Row = columns
                .split(", ")
                .zip(params.iter().cloned())
                .collect();
            let table = state
                .tables
                .get_mut(table_name)
                .ok_or_else(|| format!("no such table: {table_name}"))?;
            let id = insert_row(table, &values);
            state.last_insert_id = Some(id);
            return Ok(1);
        }

        if let Some(rest) = sql.strip_prefix("UPDATE ") {
            let (table_name, rest) = rest.split_once(" SET ").ok_or("malformed update")?;
            let (sets, filter) = rest.split_once(" WHERE ").ok_or("malformed update")?;
            let columns: Vec<&str> = sets
                .split(", ")
                .map(|s| s.trim_end_matches(" = ?"))
                .collect();
            let (assigned, rest) = params.split_at(columns.len());
            let predicates = parse_predicates(Some(filter), rest)?;
            let table = state
                .tables
                .get_mut(table_name)
                .ok_or_else(|| format!("no such table: {table_name}"))?;
            let mut affected = 0;
            for row in table.rows.iter_mut().filter(|r| predicates.iter().all(|p| p.matches(r))) {
                for (column, value) in columns.iter().zip(assigned) {
                    row.set(*column, value.clone());
                }
                affected += 1;
            }
            return Ok(affected);
        }

        if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
            let (table_name, filter) = split_where(rest);
            let predicates = parse_predicates(filter, params)?;
            let table = state
                .tables
                .get_mut(table_name)
                .ok_or_else(|| format!("no such table: {table_name}"))?;
            let before = table.rows.len();
            table.rows.retain(|r| !predicates.iter().all(|p| p.matches(r)));
            return Ok((before - table.rows.len()) as u64);
        }

        Err(format!("unsupported statement: {sql}"))
    }
}

fn check_failure(state: &State, sql: &str) -> std::result::Result<(), String> {
    match &state.fail_on {
        Some(needle) if sql.contains(needle.as_str()) => Err("simulated storage failure".into()),
        _ => Ok(()),
    }
}

fn insert_row(table: &mut Table, values: &Row) -> i64 {
    let identity = table.columns[0].0.clone();
    let mut row = Row::new();
    for (name, _) in &table.columns {
        row.set(name.as_str(), values.get(name).cloned().unwrap_or_default());
    }
    let id = match row.get(&identity).and_then(Value::as_i64) {
        Some(id) => id,
        None => {
            let id = table.next_id;
            row.set(identity.as_str(), id);
            id
        }
    };
    table.next_id = table.next_id.max(id + 1);
    table.rows.push(row);
    id
}

fn split_where(rest: &str) -> (&str, Option<&str>) {
    match rest.split_once(" WHERE ") {
        Some((table, filter)) => (table, Some(filter)),
        None => (rest, None),
    }
}

struct Predicate {
    field: String,
    op: String,
    value: Value,
}

impl Predicate {
    fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(&self.field) else {
            return false;
        };
        match self.op.as_str() {
            "LIKE" => like(actual, &self.value),
            "NOT LIKE" => !actual.is_null() && !like(actual, &self.value),
            op => match compare(Some(actual), Some(&self.value)) {
                None => false,
                Some(ord) => match op {
                    "=" => ord == Ordering::Equal,
                    "!=" => ord != Ordering::Equal,
                    "<" => ord == Ordering::Less,
                    "<=" => ord != Ordering::Greater,
                    ">" => ord == Ordering::Greater,
                    ">=" => ord != Ordering::Less,
                    _ => false,
                },
            },
        }
    }
}

fn parse_predicates(
    filter: Option<&str>,
    params: &[Value],
) -> std::result::Result<Vec<Predicate>, String> {
    let Some(filter) = filter else {
        return Ok(Vec::new());
    };
    let clauses: Vec<&str> = filter.split(" AND ").collect();
    if clauses.len() != params.len() {
        return Err(format!(
            "{} placeholders but {} params",
            clauses.len(),
            params.len()
        ));
    }
    Ok(clauses
        .iter()
        .zip(params)
        .map(|(clause, value)| {
            let words: Vec<&str> = clause.split_whitespace().collect();
            Predicate {
                field: words[0].to_string(),
                op: words[1..words.len() - 1].join(" "),
                value: value.clone(),
            }
        })
        .collect())
}

/// SQL comparison: NULL compares with nothing, numbers compare numerically.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Option<Ordering> {
    match (a?, b?) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (x, y) => x.as_f64()?.partial_cmp(&y.as_f64()?),
    }
}

fn like(actual: &Value, pattern: &Value) -> bool {
    let (Some(text), Some(pattern)) = (actual.as_str(), pattern.as_str()) else {
        return false;
    };
    let parts: Vec<&str> = pattern.split('%').collect();
    let mut rest = text;
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            let Some(stripped) = rest.strip_prefix(part) else {
                return false;
            };
            rest = stripped;
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            let Some(pos) = rest.find(part) else {
                return false;
            };
            rest = &rest[pos + part.len()..];
        }
    }
    rest.is_empty()
}

fn storage(message: String) -> Error {
    Error::Storage(StorageError::new(message))
}

impl Connection for MemoryDb {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.run_query(sql, params);
        async move {
            match result {
                Ok(rows) => Outcome::Ok(rows),
                Err(message) => Outcome::Err(storage(message)),
            }
        }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.run_execute(sql, params);
        async move {
            match result {
                Ok(n) => Outcome::Ok(n),
                Err(message) => Outcome::Err(storage(message)),
            }
        }
    }

    fn last_insert_id(&self, _cx: &Cx) -> impl Future<Output = Outcome<Option<Value>, Error>> + Send {
        let id = self.state.lock().unwrap().last_insert_id;
        async move { Outcome::Ok(id.map(Value::Int)) }
    }
}

// ----------------------------------------------------------------------
// Blog fixture
// ----------------------------------------------------------------------

pub const T0: i64 = 1_700_000_000;

/// `user`, `post`, `profile` and `tag` tables.
pub fn blog_db() -> Arc<MemoryDb> {
    let db = MemoryDb::new();
    db.create_table(
        "user",
        &[
            ("id", "int(11)"),
            ("name", "varchar(255)"),
            ("created_at", "int(11)"),
            ("updated_at", "int(11)"),
            ("deleted_at", "int(11)"),
        ],
    );
    db.create_table(
        "post",
        &[
            ("id", "int(11)"),
            ("user_id", "int(11)"),
            ("title", "varchar(255)"),
            ("views", "int(11)"),
            ("rating", "decimal(3,1)"),
            ("created_at", "int(11)"),
            ("updated_at", "int(11)"),
            ("deleted_at", "int(11)"),
        ],
    );
    db.create_table(
        "profile",
        &[
            ("id", "int(11)"),
            ("user_id", "int(11)"),
            ("bio", "text"),
            ("deleted_at", "int(11)"),
        ],
    );
    db.create_table(
        "tag",
        &[("id", "int(11)"), ("label", "varchar(64)")],
    );
    db
}

pub fn blog_registry() -> Registry {
    Registry::new()
        .with(
            RecordType::builder("User")
                .has_many("posts", "Post")
                .has_one("profile", "Profile")
                .build()
                .unwrap(),
        )
        .unwrap()
        .with(
            RecordType::builder("Post")
                .belongs_to("user", "User")
                .build()
                .unwrap(),
        )
        .unwrap()
        .with(
            RecordType::builder("Profile")
                .timestamps(false)
                .belongs_to("user", "User")
                .build()
                .unwrap(),
        )
        .unwrap()
        .with(
            RecordType::builder("Tag")
                .soft_deletes(false)
                .timestamps(false)
                .build()
                .unwrap(),
        )
        .unwrap()
}

/// Engine over `db` with a fixed clock at [`T0`].
pub fn blog_engine(db: &Arc<MemoryDb>) -> RecordEngine<Arc<MemoryDb>> {
    RecordEngine::new(Arc::clone(db), blog_registry())
        .unwrap()
        .with_clock(|| T0)
}

pub fn user_row(name: &str) -> Row {
    Row::new()
        .with("name", name)
        .with("created_at", T0 - 100)
        .with("updated_at", T0 - 100)
        .with("deleted_at", 0)
}

pub fn post_row(user_id: i64, title: &str) -> Row {
    Row::new()
        .with("user_id", user_id)
        .with("title", title)
        .with("views", 0)
        .with("rating", 0.0)
        .with("created_at", T0 - 100)
        .with("updated_at", T0 - 100)
        .with("deleted_at", 0)
}
