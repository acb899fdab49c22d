//! Type identifier → record type lookup.

use std::collections::HashMap;
use std::sync::Arc;

use sqlrecord_core::{Error, Result};

use crate::record_type::RecordType;

/// The set of record types an engine can operate on.
///
/// Built once at startup and then shared read-only by every engine.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: HashMap<String, Arc<RecordType>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record type. Identifiers must be unique.
    pub fn register(&mut self, ty: RecordType) -> Result<Arc<RecordType>> {
        if self.types.contains_key(ty.name()) {
            return Err(Error::DuplicateRecordType(ty.name().to_string()));
        }
        tracing::debug!(record_type = ty.name(), table = ty.table(), "Registered record type");
        let ty = Arc::new(ty);
        self.types.insert(ty.name().to_string(), Arc::clone(&ty));
        Ok(ty)
    }

    /// Builder-style [`Registry::register`].
    pub fn with(mut self, ty: RecordType) -> Result<Self> {
        self.register(ty)?;
        Ok(self)
    }

    /// Look up a record type by identifier.
    pub fn get(&self, name: &str) -> Result<Arc<RecordType>> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownRecordType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check that every relationship points at a registered type.
    pub fn validate(&self) -> Result<()> {
        for ty in self.types.values() {
            for rel in ty.relationships() {
                if !self.contains(&rel.target) {
                    tracing::warn!(
                        record_type = ty.name(),
                        relationship = %rel.name,
                        target = %rel.target,
                        "Relationship target is not registered"
                    );
                    return Err(Error::UnknownRecordType(rel.target.clone()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> RecordType {
        RecordType::builder("User")
            .has_many("posts", "Post")
            .build()
            .unwrap()
    }

    fn post() -> RecordType {
        RecordType::builder("Post")
            .belongs_to("user", "User")
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let registry = Registry::new().with(user()).unwrap().with(post()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["Post", "User"]);
        assert_eq!(registry.get("Post").unwrap().table(), "post");
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_unknown_type() {
        let registry = Registry::new();
        assert!(matches!(
            registry.get("Ghost"),
            Err(Error::UnknownRecordType(name)) if name == "Ghost"
        ));
    }

    #[test]
    fn test_duplicate_type() {
        let mut registry = Registry::new();
        registry.register(user()).unwrap();
        assert!(matches!(
            registry.register(user()),
            Err(Error::DuplicateRecordType(_))
        ));
    }

    #[test]
    fn test_validate_dangling_target() {
        let registry = Registry::new().with(post()).unwrap();
        assert!(matches!(
            registry.validate(),
            Err(Error::UnknownRecordType(name)) if name == "User"
        ));
    }
}
