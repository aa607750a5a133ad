//! Storage boundary.
//!
//! The repository hands finished SeaQuery statements to a [`Storage`]
//! implementation and gets JSON rows back. The pipeline never talks to
//! storage directly.

use anyhow::Result;
use async_trait::async_trait;
use sea_query::{DeleteStatement, InsertStatement, SelectStatement, UpdateStatement};

/// One result row, as a JSON object keyed by column name.
pub type Row = serde_json::Value;

/// Executes statements built by a repository.
#[async_trait]
pub trait Storage: Send + Sync {
    /// All rows produced by `query`.
    async fn fetch_all(&self, query: &SelectStatement) -> Result<Vec<Row>>;

    /// First row produced by `query`, if any.
    async fn fetch_optional(&self, query: &SelectStatement) -> Result<Option<Row>>;

    /// First column of the first row; `null` when there is no row.
    async fn fetch_scalar(&self, query: &SelectStatement) -> Result<serde_json::Value>;

    /// Number of rows `query` would produce.
    async fn count(&self, query: &SelectStatement) -> Result<u64>;

    /// Execute an insert and return the inserted row.
    async fn insert(&self, statement: &InsertStatement) -> Result<Row>;

    /// Execute an update and return the number of affected rows.
    async fn update(&self, statement: &UpdateStatement) -> Result<u64>;

    /// Execute a delete and return the number of affected rows.
    async fn delete(&self, statement: &DeleteStatement) -> Result<u64>;
}
