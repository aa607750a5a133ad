//! Strainer test utilities.
//!
//! Helpers for integration testing: an in-memory storage that records the
//! SQL it is asked to run, probe criteria that count their calls, model
//! fixtures, and assertion utilities.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use sea_query::{
    Alias, DeleteStatement, Expr, InsertStatement, PostgresQueryBuilder,
    SelectStatement, UpdateStatement, Value,
};
use serde_json::Value as JsonValue;

use strainer_kernel::criteria::{Applied, CriteriaEntry, Criterion, RepositoryContext};
use strainer_kernel::repository::{ModelDefinition, ModelRegistry, Repository, Row, Storage};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Recording storage
// ---------------------------------------------------------------------------

/// Storage that answers with canned data and records every statement.
#[derive(Debug, Default)]
pub struct RecordingStorage {
    statements: Mutex<Vec<String>>,
    rows: Vec<Row>,
    total: Option<u64>,
    scalar: JsonValue,
    inserted: JsonValue,
    affected: u64,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows returned by every select.
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    /// Count reported by `count`; defaults to the number of canned rows.
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    /// Value returned by `fetch_scalar`.
    pub fn with_scalar(mut self, scalar: JsonValue) -> Self {
        self.scalar = scalar;
        self
    }

    /// Row returned by `insert`.
    pub fn with_inserted(mut self, inserted: JsonValue) -> Self {
        self.inserted = inserted;
        self
    }

    /// Rows affected by `update` and `delete`.
    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    /// Rendered statements, oldest first.
    pub fn statements(&self) -> Vec<String> {
        lock(&self.statements).clone()
    }

    /// Most recent statement.
    pub fn last(&self) -> Option<String> {
        lock(&self.statements).last().cloned()
    }

    fn record(&self, sql: String) {
        lock(&self.statements).push(sql);
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn fetch_all(&self, query: &SelectStatement) -> Result<Vec<Row>> {
        self.record(query.to_string(PostgresQueryBuilder));
        Ok(self.rows.clone())
    }

    async fn fetch_optional(&self, query: &SelectStatement) -> Result<Option<Row>> {
        self.record(query.to_string(PostgresQueryBuilder));
        Ok(self.rows.first().cloned())
    }

    async fn fetch_scalar(&self, query: &SelectStatement) -> Result<JsonValue> {
        self.record(query.to_string(PostgresQueryBuilder));
        Ok(self.scalar.clone())
    }

    async fn count(&self, query: &SelectStatement) -> Result<u64> {
        self.record(format!(
            "COUNT {}",
            query.to_string(PostgresQueryBuilder)
        ));
        Ok(self.total.unwrap_or(self.rows.len() as u64))
    }

    async fn insert(&self, statement: &InsertStatement) -> Result<Row> {
        self.record(statement.to_string(PostgresQueryBuilder));
        Ok(self.inserted.clone())
    }

    async fn update(&self, statement: &UpdateStatement) -> Result<u64> {
        self.record(statement.to_string(PostgresQueryBuilder));
        Ok(self.affected)
    }

    async fn delete(&self, statement: &DeleteStatement) -> Result<u64> {
        self.record(statement.to_string(PostgresQueryBuilder));
        Ok(self.affected)
    }
}

// ---------------------------------------------------------------------------
// Probe criteria
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Behavior {
    Filter(String, Value),
    Skip,
    StopWith(String, Value),
    NoChange,
}

/// Criterion that counts its calls and remembers the SQL it was given.
#[derive(Debug)]
pub struct Probe {
    label: String,
    behavior: Behavior,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl Probe {
    fn build(label: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Adds `column = value` and continues.
    pub fn filter(column: &str, value: impl Into<Value>) -> Arc<Self> {
        Self::build(column, Behavior::Filter(column.to_string(), value.into()))
    }

    /// Signals skip without touching the query.
    pub fn skip(label: &str) -> Arc<Self> {
        Self::build(label, Behavior::Skip)
    }

    /// Adds `column = value` and stops the pipeline.
    pub fn stop_filter(column: &str, value: impl Into<Value>) -> Arc<Self> {
        Self::build(column, Behavior::StopWith(column.to_string(), value.into()))
    }

    /// Returns no change.
    pub fn no_change(label: &str) -> Arc<Self> {
        Self::build(label, Behavior::NoChange)
    }

    /// Registry entry sharing this probe.
    pub fn entry(self: &Arc<Self>) -> CriteriaEntry {
        let criterion: Arc<dyn Criterion> = self.clone();
        CriteriaEntry::from(criterion)
    }

    /// How many times `apply` ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// SQL of the query state handed to each call.
    pub fn seen(&self) -> Vec<String> {
        lock(&self.seen).clone()
    }
}

impl Criterion for Probe {
    fn apply(&self, query: &SelectStatement, _repository: &dyn RepositoryContext) -> Applied {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.seen).push(query.to_string(PostgresQueryBuilder));

        match &self.behavior {
            Behavior::Filter(column, value) => Applied::replace(
                query
                    .clone()
                    .and_where(Expr::col(Alias::new(column)).eq(value.clone()))
                    .to_owned(),
            ),
            Behavior::Skip => Applied::skip(),
            Behavior::StopWith(column, value) => Applied::stop(
                query
                    .clone()
                    .and_where(Expr::col(Alias::new(column)).eq(value.clone()))
                    .to_owned(),
            ),
            Behavior::NoChange => Applied::no_change(),
        }
    }

    fn name(&self) -> &str {
        &self.label
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// `users` keyed by `id`.
pub fn users_model() -> ModelDefinition {
    ModelDefinition::table("users")
}

/// Registry with `user` → `users(id)` and `post` → `posts(post_id)`.
pub fn models() -> ModelRegistry {
    let mut models = ModelRegistry::new();
    models
        .register("user", users_model())
        .register("post", ModelDefinition::new("posts", "post_id"));
    models
}

/// Repository over `users` with recording storage.
pub fn users_repository(storage: Arc<RecordingStorage>) -> Repository<RecordingStorage> {
    Repository::new(storage, &models(), "user").unwrap_or_else(|e| panic!("fixture model: {e}"))
}

/// Assertion helpers for SQL and JSON output.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{}', got: {}",
            key,
            value
        );
    }

    /// Assert that a JSON value equals expected.
    pub fn json_eq(actual: &Value, expected: &Value) {
        assert_eq!(
            actual,
            expected,
            "JSON mismatch:\nactual: {}\nexpected: {}",
            serde_json::to_string_pretty(actual).unwrap_or_default(),
            serde_json::to_string_pretty(expected).unwrap_or_default()
        );
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{}'\nActual: {}",
            needle,
            haystack
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{}'\nActual: {}",
            needle,
            haystack
        );
    }

    /// Assert that `first` appears before `second` in `haystack`.
    pub fn ordered(haystack: &str, first: &str, second: &str) {
        let a = haystack.find(first);
        let b = haystack.find(second);
        assert!(
            matches!((a, b), (Some(a), Some(b)) if a < b),
            "Expected '{}' before '{}'\nActual: {}",
            first,
            second,
            haystack
        );
    }
}
