//! PostgreSQL storage on a sqlx pool.
//!
//! Statements are rendered with SeaQuery's Postgres builder. Reads are
//! wrapped as `SELECT row_to_json(t) FROM (...) t` so every row comes back
//! as a JSON object, and run inside a transaction with a statement timeout.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sea_query::{
    DeleteStatement, InsertStatement, PostgresQueryBuilder, SelectStatement, UpdateStatement,
};
use sqlx::{PgPool, Postgres, Transaction};

use super::storage::{Row, Storage};

/// Default per-statement timeout for reads.
const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`Storage`] backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    /// Override the read statement timeout.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction with `SET LOCAL statement_timeout` applied.
    async fn begin_read(&self) -> Result<Transaction<'_, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;

        let timeout = format!(
            "SET LOCAL statement_timeout = '{}ms'",
            self.statement_timeout.as_millis()
        );
        sqlx::query(&timeout)
            .execute(&mut *tx)
            .await
            .context("failed to set statement timeout")?;

        Ok(tx)
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn fetch_all(&self, query: &SelectStatement) -> Result<Vec<Row>> {
        let sql = query.to_string(PostgresQueryBuilder);
        tracing::debug!(sql = %sql, "fetch_all");

        let mut tx = self.begin_read().await?;
        let rows: Vec<Row> = sqlx::query_scalar(&format!("SELECT row_to_json(t) FROM ({sql}) t"))
            .fetch_all(&mut *tx)
            .await
            .context("failed to execute select")?;
        tx.commit()
            .await
            .context("failed to commit read transaction")?;

        Ok(rows)
    }

    async fn fetch_optional(&self, query: &SelectStatement) -> Result<Option<Row>> {
        let sql = query.to_string(PostgresQueryBuilder);
        tracing::debug!(sql = %sql, "fetch_optional");

        let mut tx = self.begin_read().await?;
        let row: Option<Row> =
            sqlx::query_scalar(&format!("SELECT row_to_json(t) FROM ({sql}) t LIMIT 1"))
                .fetch_optional(&mut *tx)
                .await
                .context("failed to execute select")?;
        tx.commit()
            .await
            .context("failed to commit read transaction")?;

        Ok(row)
    }

    async fn fetch_scalar(&self, query: &SelectStatement) -> Result<serde_json::Value> {
        let row = self.fetch_optional(query).await?;
        Ok(row
            .as_ref()
            .and_then(|row| row.as_object())
            .and_then(|object| object.values().next().cloned())
            .unwrap_or(serde_json::Value::Null))
    }

    async fn count(&self, query: &SelectStatement) -> Result<u64> {
        let sql = query.to_string(PostgresQueryBuilder);
        tracing::debug!(sql = %sql, "count");

        let mut tx = self.begin_read().await?;
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM ({sql}) t"))
            .fetch_one(&mut *tx)
            .await
            .context("failed to execute count query")?;
        tx.commit()
            .await
            .context("failed to commit read transaction")?;

        Ok(u64::try_from(total).unwrap_or_default())
    }

    async fn insert(&self, statement: &InsertStatement) -> Result<Row> {
        let sql = statement.to_string(PostgresQueryBuilder);
        tracing::debug!(sql = %sql, "insert");

        let row: Row = sqlx::query_scalar(&format!(
            "WITH inserted AS ({sql}) SELECT row_to_json(inserted) FROM inserted"
        ))
        .fetch_one(&self.pool)
        .await
        .context("failed to execute insert")?;

        Ok(row)
    }

    async fn update(&self, statement: &UpdateStatement) -> Result<u64> {
        let sql = statement.to_string(PostgresQueryBuilder);
        tracing::debug!(sql = %sql, "update");

        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .context("failed to execute update")?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, statement: &DeleteStatement) -> Result<u64> {
        let sql = statement.to_string(PostgresQueryBuilder);
        tracing::debug!(sql = %sql, "delete");

        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .context("failed to execute delete")?;

        Ok(result.rows_affected())
    }
}
