//! Materialized records.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use sqlrecord_core::{Error, Result, Row, Value};

/// Lifecycle of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Built from properties, not known to be stored.
    #[default]
    Constructed,
    /// Loaded from or written to storage.
    Persisted,
    /// Soft-deleted; the row is still stored with its marker set.
    SoftDeleted,
    /// Hard-deleted; further writes fail with [`Error::RecordRemoved`].
    Removed,
}

/// Value of a relationship property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Related {
    /// `HasOne` / `BelongsTo`: the matching record, if any.
    One(Option<Box<Record>>),
    /// `HasMany` / `BelongsToMany`: every matching record.
    Many(Vec<Record>),
    /// Not resolved: cut by the reciprocal, visited or depth guard.
    NotLoaded,
}

impl Related {
    /// The single related record, if this is a resolved `One`.
    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Related::One(record) => record.as_deref(),
            _ => None,
        }
    }

    /// The related records; empty unless this is a resolved `Many`.
    pub fn as_many(&self) -> &[Record] {
        match self {
            Related::Many(records) => records,
            _ => &[],
        }
    }

    pub fn is_loaded(&self) -> bool {
        !matches!(self, Related::NotLoaded)
    }
}

/// One row of a record type, with coerced field values and eagerly resolved
/// relationships.
///
/// Fields follow the table's column order. Serializes as a single JSON object
/// holding the fields followed by every loaded relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    record_type: String,
    table: String,
    identity: String,
    fields: Row,
    relations: Vec<(String, Related)>,
    state: RecordState,
}

impl Record {
    pub(crate) fn new(
        record_type: impl Into<String>,
        table: impl Into<String>,
        identity: impl Into<String>,
        fields: Row,
        state: RecordState,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            table: table.into(),
            identity: identity.into(),
            fields,
            relations: Vec::new(),
            state,
        }
    }

    /// Type identifier this record belongs to.
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Resolved table the record was loaded from (prefix included).
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Read a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Value of the identity column.
    pub fn id(&self) -> Option<&Value> {
        self.fields.get(&self.identity)
    }

    /// Identity column name.
    pub fn identity_column(&self) -> &str {
        &self.identity
    }

    /// All fields in column order.
    pub fn fields(&self) -> &Row {
        &self.fields
    }

    /// A relationship property.
    pub fn related(&self, name: &str) -> Option<&Related> {
        self.relations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, related)| related)
    }

    /// Relationship properties in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &Related)> {
        self.relations.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Render as a JSON string.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Config(format!("cannot render record: {e}")))
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Row {
        &mut self.fields
    }

    pub(crate) fn set_state(&mut self, state: RecordState) {
        self.state = state;
    }

    pub(crate) fn push_relation(&mut self, name: impl Into<String>, related: Related) {
        self.relations.push((name.into(), related));
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let loaded = self.relations.iter().filter(|(_, r)| r.is_loaded());
        let mut map = serializer.serialize_map(Some(self.fields.len() + loaded.clone().count()))?;
        for (name, value) in self.fields.iter() {
            map.serialize_entry(name, value)?;
        }
        for (name, related) in loaded {
            map.serialize_entry(name, related)?;
        }
        map.end()
    }
}
