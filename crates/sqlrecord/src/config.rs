//! Engine configuration.

use sqlrecord_core::{Error, Result, validate_identifier};
use sqlrecord_query::Dialect;

/// Default relationship depth for eager loading.
pub const DEFAULT_MAX_RELATION_DEPTH: usize = 3;

/// Configuration for [`RecordEngine`](crate::RecordEngine) behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Relationships are resolved for records above this depth; top-level
    /// records are depth 0.
    pub max_relation_depth: usize,
    /// Placeholder syntax for generated statements.
    pub dialect: Dialect,
    /// Prepended to every record type's table name.
    pub table_prefix: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_relation_depth: DEFAULT_MAX_RELATION_DEPTH,
            dialect: Dialect::default(),
            table_prefix: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the eager-loading depth bound.
    pub fn max_relation_depth(mut self, depth: usize) -> Self {
        self.max_relation_depth = depth;
        self
    }

    /// Set the placeholder dialect.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the table prefix. An empty prefix clears it.
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.table_prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    /// Table name for `base` under this configuration.
    pub fn resolve_table(&self, base: &str) -> String {
        match &self.table_prefix {
            Some(prefix) => format!("{prefix}{base}"),
            None => base.to_string(),
        }
    }

    /// Check the prefix can be safely placed in front of table names.
    pub fn validate(&self) -> Result<()> {
        if let Some(prefix) = &self.table_prefix {
            // A prefix followed by any identifier must itself form one.
            validate_identifier(&format!("{prefix}t"))
                .map_err(|_| Error::Config(format!("invalid table prefix `{prefix}`")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_relation_depth, 3);
        assert_eq!(config.dialect, Dialect::Mysql);
        assert_eq!(config.resolve_table("post"), "post");
    }

    #[test]
    fn test_prefix() {
        let config = EngineConfig::new().table_prefix("acme_");
        assert_eq!(config.resolve_table("post"), "acme_post");
        assert!(config.validate().is_ok());

        let cleared = config.table_prefix("");
        assert_eq!(cleared.table_prefix, None);
    }

    #[test]
    fn test_invalid_prefix() {
        let config = EngineConfig::new().table_prefix("x; --");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
