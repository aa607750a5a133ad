//! Model bindings: which table a repository reads and what its key is.

use std::collections::HashMap;

use sea_query::{Alias, Asterisk, Query, SelectStatement};
use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, RepositoryResult};

/// Validate a SQL identifier name (table/column names).
/// Allows only `[a-zA-Z_][a-zA-Z0-9_]*` with max 63 chars (PostgreSQL limit).
pub(crate) fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
}

/// Storage model a repository is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Table to query.
    pub table: String,

    /// Primary key column.
    #[serde(default = "default_key_name")]
    pub key_name: String,
}

fn default_key_name() -> String {
    "id".to_string()
}

impl ModelDefinition {
    pub fn new(table: impl Into<String>, key_name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_name: key_name.into(),
        }
    }

    /// Model keyed by `id`.
    pub fn table(table: impl Into<String>) -> Self {
        Self::new(table, default_key_name())
    }

    pub fn is_valid(&self) -> bool {
        is_safe_identifier(&self.table) && is_safe_identifier(&self.key_name)
    }

    /// Fresh root query: `SELECT * FROM "<table>"`.
    pub fn new_query(&self) -> SelectStatement {
        Query::select()
            .column(Asterisk)
            .from(Alias::new(&self.table))
            .to_owned()
    }
}

/// Model definitions keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelDefinition>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under `identifier`, replacing any previous binding.
    pub fn register(&mut self, identifier: impl Into<String>, model: ModelDefinition) -> &mut Self {
        self.models.insert(identifier.into(), model);
        self
    }

    pub fn get(&self, identifier: &str) -> Option<&ModelDefinition> {
        self.models.get(identifier)
    }

    /// Resolve a binding, rejecting unknown identifiers and unsafe names.
    pub fn resolve(&self, identifier: &str) -> RepositoryResult<ModelDefinition> {
        match self.models.get(identifier) {
            Some(model) if model.is_valid() => Ok(model.clone()),
            _ => Err(RepositoryError::InvalidModelBinding {
                model: identifier.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sea_query::PostgresQueryBuilder;

    #[test]
    fn safe_identifiers() {
        assert!(is_safe_identifier("users"));
        assert!(is_safe_identifier("_tmp"));
        assert!(is_safe_identifier("item_type2"));
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("2fast"));
        assert!(!is_safe_identifier("users; DROP TABLE x"));
        assert!(!is_safe_identifier(&"a".repeat(64)));
    }

    #[test]
    fn new_query_selects_everything() {
        let sql = ModelDefinition::table("users")
            .new_query()
            .to_string(PostgresQueryBuilder);
        assert_eq!(sql, r#"SELECT * FROM "users""#);
    }

    #[test]
    fn resolve_known_model() {
        let mut models = ModelRegistry::new();
        models.register("user", ModelDefinition::table("users"));

        let model = models.resolve("user").unwrap();
        assert_eq!(model.table, "users");
        assert_eq!(model.key_name, "id");
    }

    #[test]
    fn resolve_unknown_model_fails() {
        let models = ModelRegistry::new();
        let err = models.resolve("ghost").unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::InvalidModelBinding { ref model } if model == "ghost"
        ));
    }

    #[test]
    fn resolve_unsafe_model_fails() {
        let mut models = ModelRegistry::new();
        models.register("bad", ModelDefinition::new("users", "id; --"));
        assert!(models.resolve("bad").is_err());
    }

    #[test]
    fn key_name_defaults_when_deserialized() {
        let model: ModelDefinition = serde_json::from_str(r#"{"table":"posts"}"#).unwrap();
        assert_eq!(model.key_name, "id");
    }
}
