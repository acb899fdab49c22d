//! Error types shared across the workspace.

use std::fmt;

/// Result alias used by the synchronous parts of the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// All failures the record engine can report.
///
/// "Not found" is never an error; lookups return `Option::None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Unknown table or column.
    Schema(SchemaError),
    /// A declared field was absent from the properties passed to construct.
    MissingField {
        record_type: String,
        field: String,
    },
    /// An insert or update had no columns to write.
    EmptyPayload {
        table: String,
        operation: &'static str,
    },
    /// The connection reported an execution failure.
    Storage(StorageError),
    /// Comparison operator text outside the supported set.
    InvalidOperator(String),
    /// Sort direction text other than `ASC` / `DESC`.
    InvalidDirection(String),
    /// A table or column name that cannot be safely placed into SQL text.
    InvalidIdentifier(String),
    /// No record type registered under this identifier.
    UnknownRecordType(String),
    /// A record type identifier was registered twice.
    DuplicateRecordType(String),
    /// Write attempted on a record that was hard-deleted.
    RecordRemoved { record_type: String },
    /// Configuration could not be parsed or validated.
    Config(String),
}

/// Details for [`Error::Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Table being inspected.
    pub table: String,
    /// Offending column, if the table itself was found.
    pub column: Option<String>,
    /// Human readable explanation.
    pub message: String,
}

impl SchemaError {
    /// Unknown or empty table.
    pub fn unknown_table(table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            message: format!("table `{table}` does not exist or has no columns"),
            table,
            column: None,
        }
    }

    /// Unknown column on a known table.
    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        let table = table.into();
        let column = column.into();
        Self {
            message: format!("table `{table}` has no column `{column}`"),
            table,
            column: Some(column),
        }
    }
}

/// Details for [`Error::Storage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    /// SQL text of the failing statement (never parameter values).
    pub sql: Option<String>,
    /// Driver-supplied message.
    pub message: String,
}

impl StorageError {
    /// Create a storage error without statement context.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            sql: None,
            message: message.into(),
        }
    }

    /// Attach the failing statement text.
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

impl Error {
    /// Shorthand for an unknown column error.
    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::Schema(SchemaError::unknown_column(table, column))
    }

    /// Shorthand for an unknown table error.
    pub fn unknown_table(table: impl Into<String>) -> Self {
        Error::Schema(SchemaError::unknown_table(table))
    }

    /// Shorthand for a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage(StorageError::new(message))
    }

    /// True for [`Error::Schema`].
    pub fn is_schema(&self) -> bool {
        matches!(self, Error::Schema(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Schema(e) => write!(f, "schema error: {}", e.message),
            Error::MissingField { record_type, field } => {
                write!(f, "missing field `{field}` constructing `{record_type}`")
            }
            Error::EmptyPayload { table, operation } => {
                write!(f, "{operation} on `{table}` has no fields to write")
            }
            Error::Storage(e) => match &e.sql {
                Some(sql) => write!(f, "storage error: {} (while executing `{sql}`)", e.message),
                None => write!(f, "storage error: {}", e.message),
            },
            Error::InvalidOperator(op) => write!(f, "unsupported comparison operator `{op}`"),
            Error::InvalidDirection(dir) => write!(f, "invalid sort direction `{dir}`"),
            Error::InvalidIdentifier(name) => write!(f, "invalid SQL identifier `{name}`"),
            Error::UnknownRecordType(name) => write!(f, "record type `{name}` is not registered"),
            Error::DuplicateRecordType(name) => {
                write!(f, "record type `{name}` is already registered")
            }
            Error::RecordRemoved { record_type } => {
                write!(f, "`{record_type}` record was deleted and can no longer be written")
            }
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<SchemaError> for Error {
    fn from(e: SchemaError) -> Self {
        Error::Schema(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::Storage(e)
    }
}
