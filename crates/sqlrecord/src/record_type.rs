//! Record type descriptors.
//!
//! A [`RecordType`] binds a type identifier to a table and carries the
//! per-type behavior flags (soft deletes, timestamps), marker column names,
//! identity column and relationship declarations. Descriptors are immutable
//! once built and shared as `Arc<RecordType>` through the
//! [`Registry`](crate::Registry).

use sqlrecord_core::{Error, Result, validate_identifier};

/// The four relationship shapes a record type can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// One owned record: `User` has one `Profile`.
    HasOne,
    /// Owned records: `User` has many `Post`s.
    HasMany,
    /// The owning record: `Post` belongs to `User`.
    BelongsTo,
    /// Several owning records, keyed like `HasMany` (no join table).
    BelongsToMany,
}

impl RelationshipKind {
    /// `HasOne` and `HasMany` own their targets.
    pub const fn is_owning(self) -> bool {
        matches!(self, RelationshipKind::HasOne | RelationshipKind::HasMany)
    }

    /// True when the property holds a list.
    pub const fn is_many(self) -> bool {
        matches!(
            self,
            RelationshipKind::HasMany | RelationshipKind::BelongsToMany
        )
    }
}

/// A relationship declared on a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Property name on the owning record.
    pub name: String,
    /// Target record type identifier.
    pub target: String,
    /// Shape of the relationship.
    pub kind: RelationshipKind,
    /// Column on the target side. Defaults depend on `kind`.
    pub foreign_key: Option<String>,
    /// Column on the owner side. Defaults depend on `kind`.
    pub local_key: Option<String>,
}

impl Relationship {
    /// Create a relationship with default keys.
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
            foreign_key: None,
            local_key: None,
        }
    }

    pub fn has_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, RelationshipKind::HasOne)
    }

    pub fn has_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, RelationshipKind::HasMany)
    }

    pub fn belongs_to(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, RelationshipKind::BelongsTo)
    }

    pub fn belongs_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, RelationshipKind::BelongsToMany)
    }

    /// Override the target-side key column.
    #[must_use]
    pub fn foreign_key(mut self, key: impl Into<String>) -> Self {
        self.foreign_key = Some(key.into());
        self
    }

    /// Override the owner-side key column.
    #[must_use]
    pub fn local_key(mut self, key: impl Into<String>) -> Self {
        self.local_key = Some(key.into());
        self
    }
}

/// Descriptor of a table-backed record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    name: String,
    table: String,
    identity: String,
    soft_deletes: bool,
    timestamps: bool,
    deleted_column: String,
    created_column: String,
    updated_column: String,
    relationships: Vec<Relationship>,
}

impl RecordType {
    /// Start describing a record type. The table defaults to the lowercase
    /// type identifier.
    pub fn builder(name: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder::new(name)
    }

    /// Type identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base table name, before any engine table prefix.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Identity column.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn soft_deletes(&self) -> bool {
        self.soft_deletes
    }

    pub fn timestamps(&self) -> bool {
        self.timestamps
    }

    /// Soft-delete marker column.
    pub fn deleted_column(&self) -> &str {
        &self.deleted_column
    }

    pub fn created_column(&self) -> &str {
        &self.created_column
    }

    pub fn updated_column(&self) -> &str {
        &self.updated_column
    }

    /// Relationships in declaration order.
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Look up a relationship by property name.
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// True if this type owns `target` through a `HasOne`/`HasMany`.
    pub fn owns(&self, target: &str) -> bool {
        self.relationships
            .iter()
            .any(|r| r.kind.is_owning() && r.target == target)
    }
}

/// Builder for [`RecordType`].
///
/// # Example
///
/// ```ignore
/// let post = RecordType::builder("Post")
///     .belongs_to("user", "User")
///     .build()?;
/// assert_eq!(post.table(), "post");
/// ```
#[derive(Debug, Clone)]
pub struct RecordTypeBuilder {
    ty: RecordType,
}

impl RecordTypeBuilder {
    fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            ty: RecordType {
                table: name.to_lowercase(),
                name,
                identity: "id".to_string(),
                soft_deletes: true,
                timestamps: true,
                deleted_column: "deleted_at".to_string(),
                created_column: "created_at".to_string(),
                updated_column: "updated_at".to_string(),
                relationships: Vec::new(),
            },
        }
    }

    /// Use an explicit table name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.ty.table = table.into();
        self
    }

    /// Identity column (default `id`).
    pub fn identity(mut self, column: impl Into<String>) -> Self {
        self.ty.identity = column.into();
        self
    }

    /// Enable/disable soft deletes (default on).
    pub fn soft_deletes(mut self, enabled: bool) -> Self {
        self.ty.soft_deletes = enabled;
        self
    }

    /// Enable/disable created/updated stamping (default on).
    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.ty.timestamps = enabled;
        self
    }

    /// Soft-delete marker column (default `deleted_at`).
    pub fn deleted_column(mut self, column: impl Into<String>) -> Self {
        self.ty.deleted_column = column.into();
        self
    }

    /// Creation timestamp column (default `created_at`).
    pub fn created_column(mut self, column: impl Into<String>) -> Self {
        self.ty.created_column = column.into();
        self
    }

    /// Update timestamp column (default `updated_at`).
    pub fn updated_column(mut self, column: impl Into<String>) -> Self {
        self.ty.updated_column = column.into();
        self
    }

    /// Declare a relationship.
    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.ty.relationships.push(relationship);
        self
    }

    pub fn has_one(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relationship(Relationship::has_one(name, target))
    }

    pub fn has_many(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relationship(Relationship::has_many(name, target))
    }

    pub fn belongs_to(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relationship(Relationship::belongs_to(name, target))
    }

    pub fn belongs_to_many(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relationship(Relationship::belongs_to_many(name, target))
    }

    /// Validate and finish.
    ///
    /// Every name that may be placed into SQL text must be a plain
    /// identifier, and relationship property names must be unique.
    pub fn build(self) -> Result<RecordType> {
        let ty = self.ty;
        if ty.name.is_empty() {
            return Err(Error::Config("record type identifier is empty".to_string()));
        }
        validate_identifier(&ty.table)?;
        validate_identifier(&ty.identity)?;
        validate_identifier(&ty.deleted_column)?;
        validate_identifier(&ty.created_column)?;
        validate_identifier(&ty.updated_column)?;

        for (i, rel) in ty.relationships.iter().enumerate() {
            if ty.relationships[..i].iter().any(|r| r.name == rel.name) {
                return Err(Error::Config(format!(
                    "relationship `{}` is declared twice on `{}`",
                    rel.name, ty.name
                )));
            }
            if let Some(key) = &rel.foreign_key {
                validate_identifier(key)?;
            }
            if let Some(key) = &rel.local_key {
                validate_identifier(key)?;
            }
        }
        Ok(ty)
    }
}
