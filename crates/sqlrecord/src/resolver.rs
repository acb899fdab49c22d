//! Relationship key resolution and the guards that bound eager loading.
//!
//! The engine resolves every relationship of a record while materializing
//! it. Three rules keep that finite:
//!
//! 1. **Reciprocal**: an owned relationship (`BelongsTo`/`BelongsToMany`)
//!    back to the record type we were reached from is skipped when that type
//!    owns us. A `User`'s posts do not load their `user` again.
//! 2. **Visited**: a record already on the current materialization path gets
//!    its fields only.
//! 3. **Depth**: nothing is resolved at or below the configured depth.

use sqlrecord_core::Value;

use crate::record_type::{RecordType, Relationship, RelationshipKind};

/// Concrete key columns for one relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationKeys {
    /// Column on the target table matched against the owner's value.
    pub foreign_key: String,
    /// Column on the owner supplying the value.
    pub local_key: String,
}

impl RelationKeys {
    /// Apply the key defaults for `rel`, declared on `owner`, pointing at
    /// `target`.
    ///
    /// | kind | foreign key (target) | local key (owner) |
    /// |---|---|---|
    /// | `HasOne`, `HasMany`, `BelongsToMany` | `<owner table>_id` | `id` |
    /// | `BelongsTo` | `id` | `<target table>_id` |
    ///
    /// Defaults use base table names, never a tenant prefix.
    pub fn resolve(owner: &RecordType, rel: &Relationship, target: &RecordType) -> Self {
        let (default_foreign, default_local) = match rel.kind {
            RelationshipKind::HasOne
            | RelationshipKind::HasMany
            | RelationshipKind::BelongsToMany => (format!("{}_id", owner.table()), "id".to_string()),
            RelationshipKind::BelongsTo => ("id".to_string(), format!("{}_id", target.table())),
        };
        Self {
            foreign_key: rel.foreign_key.clone().unwrap_or(default_foreign),
            local_key: rel.local_key.clone().unwrap_or(default_local),
        }
    }
}

/// Where a record sits in the current eager-loading walk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Visit {
    depth: usize,
    parent: Option<String>,
    path: Vec<(String, Value)>,
}

impl Visit {
    /// A top-level materialization.
    pub fn root() -> Self {
        Self::default()
    }

    /// Context for records loaded through a relationship of `owner_type`
    /// whose identity is `owner_id`.
    pub fn child(&self, owner_type: &str, owner_id: &Value) -> Self {
        let mut path = self.path.clone();
        path.push((owner_type.to_string(), owner_id.clone()));
        Self {
            depth: self.depth + 1,
            parent: Some(owner_type.to_string()),
            path,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Record type this record was reached from.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// True if `(record_type, id)` is already being materialized above us.
    pub fn contains(&self, record_type: &str, id: &Value) -> bool {
        !id.is_null() && self.path.iter().any(|(t, v)| t == record_type && v == id)
    }
}

/// Why relationships of a record are not being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cut {
    /// Record already on the materialization path.
    Visited,
    /// Depth limit reached.
    Depth,
}

/// Decide whether a record's relationships are resolved at all.
pub fn cut(visit: &Visit, record_type: &str, id: &Value, max_depth: usize) -> Option<Cut> {
    if visit.contains(record_type, id) {
        Some(Cut::Visited)
    } else if visit.depth() >= max_depth {
        Some(Cut::Depth)
    } else {
        None
    }
}

/// True if `rel` on `owner` leads straight back to the record we were
/// reached from.
pub fn is_reciprocal(
    owner: &RecordType,
    rel: &Relationship,
    target: &RecordType,
    visit: &Visit,
) -> bool {
    !rel.kind.is_owning() && visit.parent() == Some(target.name()) && target.owns(owner.name())
}
