//! Criteria catalog for named, configurable criteria.
//!
//! Declarations bind an extension name to a built-in factory plus default
//! config. Registry entries then reference criteria by name, and the
//! catalog builds them when the pipeline resolves the entry.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::builtin;
use super::criterion::Criterion;
use crate::error::{RepositoryError, RepositoryResult};

// ---------------------------------------------------------------------------
// Factory trait
// ---------------------------------------------------------------------------

/// Builds a criterion from JSON config.
pub trait CriterionFactory: Send + Sync {
    fn build(&self, config: &serde_json::Value) -> Result<Arc<dyn Criterion>>;
}

impl<F> CriterionFactory for F
where
    F: Fn(&serde_json::Value) -> Result<Arc<dyn Criterion>> + Send + Sync,
{
    fn build(&self, config: &serde_json::Value) -> Result<Arc<dyn Criterion>> {
        self(config)
    }
}

// ---------------------------------------------------------------------------
// Serde declaration types
// ---------------------------------------------------------------------------

/// Top-level criteria declaration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CriteriaDeclaration {
    #[serde(default)]
    pub criteria: Vec<CriteriaExtension>,
}

impl CriteriaDeclaration {
    /// Load a declaration from a `.json`, `.yml` or `.yaml` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read criteria file {}", path.display()))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));

        if is_yaml {
            serde_yml::from_str(&raw)
                .with_context(|| format!("failed to parse criteria YAML {}", path.display()))
        } else {
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse criteria JSON {}", path.display()))
        }
    }
}

/// One named criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaExtension {
    /// Name used by `CriteriaEntry::Named`.
    pub name: String,
    /// Built-in factory name (e.g. "tenant_scope", "search").
    pub handler: String,
    /// Default config; entry config overrides individual keys.
    #[serde(default)]
    pub config: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

struct Registration {
    handler_name: String,
    config: serde_json::Value,
}

/// Validate an extension name: must be non-empty, alphanumeric/underscore/hyphen,
/// start with a letter or underscore, max 64 chars.
fn is_valid_extension_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
}

/// Overlay `overrides` onto `base`. Objects merge key by key; a null
/// override keeps the base; anything else replaces it.
fn merge_config(base: &serde_json::Value, overrides: &serde_json::Value) -> serde_json::Value {
    match (base, overrides) {
        (_, serde_json::Value::Null) => base.clone(),
        (serde_json::Value::Object(base), serde_json::Value::Object(overrides)) => {
            let mut merged = base.clone();
            for (key, value) in overrides {
                merged.insert(key.clone(), value.clone());
            }
            serde_json::Value::Object(merged)
        }
        _ => overrides.clone(),
    }
}

/// Catalog of criterion factories and named declarations.
///
/// Two-level lookup: extension name → (factory name, config) → factory.
/// A name with no declaration is tried as a factory name directly.
pub struct CriteriaCatalog {
    factories: HashMap<String, Box<dyn CriterionFactory>>,
    extensions: HashMap<String, Registration>,
}

impl Default for CriteriaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CriteriaCatalog {
    /// Create a catalog with the built-in factories registered.
    pub fn new() -> Self {
        let mut catalog = Self {
            factories: HashMap::new(),
            extensions: HashMap::new(),
        };

        catalog.register_factory("where_equals", Box::new(builtin::where_equals_factory));
        catalog.register_factory(
            "exclude_soft_deleted",
            Box::new(builtin::exclude_soft_deleted_factory),
        );
        catalog.register_factory("tenant_scope", Box::new(builtin::tenant_scope_factory));
        catalog.register_factory("search", Box::new(builtin::search_factory));
        catalog.register_factory("order_by", Box::new(builtin::order_by_factory));
        catalog.register_factory("limit", Box::new(builtin::limit_factory));
        catalog.register_factory("where_key_in", Box::new(builtin::where_key_in_factory));

        catalog
    }

    /// Register a factory by name.
    pub fn register_factory(&mut self, name: &str, factory: Box<dyn CriterionFactory>) {
        self.factories.insert(name.to_string(), factory);
    }

    /// Apply declarations, validating that referenced factories exist.
    ///
    /// Each entry is `(source, declaration)`; `source` only appears in
    /// warnings. Invalid declarations are skipped, not fatal.
    pub fn apply_declarations(
        &mut self,
        declarations: Vec<(String, CriteriaDeclaration)>,
    ) -> Vec<String> {
        let mut warnings = Vec::new();

        for (source, decl) in declarations {
            for extension in decl.criteria {
                if !is_valid_extension_name(&extension.name) {
                    warnings.push(format!(
                        "{}: criteria name '{}' is invalid (must be alphanumeric/underscore/hyphen, start with letter or underscore)",
                        source, extension.name
                    ));
                    continue;
                }
                if !self.factories.contains_key(&extension.handler) {
                    warnings.push(format!(
                        "{}: criteria '{}' references unknown handler '{}'",
                        source, extension.name, extension.handler
                    ));
                    continue;
                }
                if self.extensions.contains_key(&extension.name) {
                    warnings.push(format!(
                        "{}: criteria '{}' overwrites existing declaration",
                        source, extension.name
                    ));
                }
                self.extensions.insert(
                    extension.name,
                    Registration {
                        handler_name: extension.handler,
                        config: extension.config,
                    },
                );
            }
        }

        for warning in &warnings {
            tracing::warn!(warning = %warning, "criteria declaration rejected");
        }

        warnings
    }

    /// Build the criterion registered under `name`.
    pub fn build(
        &self,
        name: &str,
        overrides: &serde_json::Value,
    ) -> RepositoryResult<Arc<dyn Criterion>> {
        let (handler_name, base) = match self.extensions.get(name) {
            Some(reg) => (reg.handler_name.as_str(), &reg.config),
            None => (name, &serde_json::Value::Null),
        };

        let factory = self.factories.get(handler_name).ok_or_else(|| {
            RepositoryError::invalid_criteria(name, "no criteria is registered under this name")
        })?;

        let config = merge_config(base, overrides);
        factory
            .build(&config)
            .map_err(|e| RepositoryError::invalid_criteria(name, format!("{e:#}")))
    }

    /// Check if a name resolves to something buildable.
    pub fn has(&self, name: &str) -> bool {
        self.extensions.contains_key(name) || self.factories.contains_key(name)
    }

    /// List declared extension names.
    pub fn extension_names(&self) -> Vec<&str> {
        self.extensions.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declaration(json: serde_json::Value) -> CriteriaDeclaration {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn declaration_serde_roundtrip() {
        let json = r#"{
            "criteria": [{
                "name": "acme_only",
                "handler": "tenant_scope",
                "config": { "column": "org_id", "tenant": "acme" }
            }]
        }"#;

        let decl: CriteriaDeclaration = serde_json::from_str(json).unwrap();
        assert_eq!(decl.criteria.len(), 1);
        assert_eq!(decl.criteria[0].handler, "tenant_scope");

        let reserialized = serde_json::to_string(&decl).unwrap();
        let again: CriteriaDeclaration = serde_json::from_str(&reserialized).unwrap();
        assert_eq!(again.criteria[0].name, "acme_only");
    }

    #[test]
    fn yaml_declaration_parses() {
        let yaml = "criteria:\n  - name: live\n    handler: exclude_soft_deleted\n";
        let decl: CriteriaDeclaration = serde_yml::from_str(yaml).unwrap();
        assert_eq!(decl.criteria[0].name, "live");
        assert!(decl.criteria[0].config.is_null());
    }

    #[test]
    fn builtins_are_buildable_by_factory_name() {
        let catalog = CriteriaCatalog::new();
        for name in [
            "where_equals",
            "exclude_soft_deleted",
            "tenant_scope",
            "search",
            "order_by",
            "limit",
            "where_key_in",
        ] {
            assert!(catalog.has(name), "missing built-in {name}");
        }
        let criterion = catalog.build("exclude_soft_deleted", &json!(null)).unwrap();
        assert_eq!(criterion.name(), "exclude_soft_deleted");
    }

    #[test]
    fn declared_extension_resolves_through_handler() {
        let mut catalog = CriteriaCatalog::new();
        let warnings = catalog.apply_declarations(vec![(
            "app".to_string(),
            declaration(json!({
                "criteria": [{
                    "name": "acme_only",
                    "handler": "tenant_scope",
                    "config": { "tenant": "acme" }
                }]
            })),
        )]);

        assert!(warnings.is_empty());
        assert_eq!(catalog.extension_names(), vec!["acme_only"]);
        let criterion = catalog.build("acme_only", &json!(null)).unwrap();
        assert_eq!(criterion.name(), "tenant_scope");
    }

    #[test]
    fn unknown_handler_warns() {
        let mut catalog = CriteriaCatalog::new();
        let warnings = catalog.apply_declarations(vec![(
            "app".to_string(),
            declaration(json!({
                "criteria": [{ "name": "weird", "handler": "no_such_handler" }]
            })),
        )]);

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("unknown handler"));
        assert!(!catalog.has("weird"));
    }

    #[test]
    fn invalid_name_warns() {
        let mut catalog = CriteriaCatalog::new();
        let warnings = catalog.apply_declarations(vec![(
            "app".to_string(),
            declaration(json!({
                "criteria": [
                    { "name": "", "handler": "limit" },
                    { "name": "9lives", "handler": "limit" },
                    { "name": "a b", "handler": "limit" }
                ]
            })),
        )]);

        assert_eq!(warnings.len(), 3);
        assert!(catalog.extension_names().is_empty());
    }

    #[test]
    fn overwrite_warns_but_applies() {
        let mut catalog = CriteriaCatalog::new();
        let warnings = catalog.apply_declarations(vec![
            (
                "first".to_string(),
                declaration(json!({
                    "criteria": [{ "name": "recent", "handler": "limit", "config": { "count": 10 } }]
                })),
            ),
            (
                "second".to_string(),
                declaration(json!({
                    "criteria": [{ "name": "recent", "handler": "order_by", "config": { "column": "created" } }]
                })),
            ),
        ]);

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("overwrites"));
        let criterion = catalog.build("recent", &json!(null)).unwrap();
        assert_eq!(criterion.name(), "order_by");
    }

    #[test]
    fn entry_config_overrides_declared_keys() {
        let base = json!({ "column": "tenant_id", "tenant": "acme" });
        let merged = merge_config(&base, &json!({ "tenant": "globex" }));
        assert_eq!(merged, json!({ "column": "tenant_id", "tenant": "globex" }));

        assert_eq!(merge_config(&base, &json!(null)), base);
        assert_eq!(merge_config(&json!(null), &json!(5)), json!(5));
    }

    #[test]
    fn bad_config_is_invalid_criteria() {
        let catalog = CriteriaCatalog::new();
        let err = catalog
            .build("limit", &json!({ "count": "many" }))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RepositoryError::InvalidCriteriaInstance { ref name, .. } if name == "limit"
        ));
    }

    #[test]
    fn custom_factory_closure() {
        let mut catalog = CriteriaCatalog::new();
        catalog.register_factory(
            "newest_first",
            Box::new(|_: &serde_json::Value| -> Result<Arc<dyn Criterion>> {
                Ok(Arc::new(builtin::OrderBy::desc("created")))
            }),
        );
        assert!(catalog.has("newest_first"));
        assert_eq!(
            catalog.build("newest_first", &json!({})).unwrap().name(),
            "order_by"
        );
    }

    #[test]
    fn valid_extension_names() {
        assert!(is_valid_extension_name("tenant_scope"));
        assert!(is_valid_extension_name("_private"));
        assert!(is_valid_extension_name("soft-delete"));
        assert!(!is_valid_extension_name(""));
        assert!(!is_valid_extension_name("1abc"));
        assert!(!is_valid_extension_name("a.b"));
        assert!(!is_valid_extension_name(&"x".repeat(65)));
    }
}
