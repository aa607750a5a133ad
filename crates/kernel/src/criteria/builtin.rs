//! Built-in criteria.
//!
//! Each criterion here has a matching factory so that the catalog can
//! build it from JSON config (`{"column": "deleted_at"}` and so on).

use std::sync::Arc;

use anyhow::{Result, bail};
use sea_query::extension::postgres::PgExpr;
use sea_query::{Alias, Cond, Expr, Order, SelectStatement, Value};
use serde::{Deserialize, Serialize};

use super::criterion::{Criterion, RepositoryContext};
use super::expression::Applied;
use crate::repository::is_safe_identifier;
use crate::value::json_to_value;

/// Column qualified with the repository's table.
fn column(repository: &dyn RepositoryContext, name: &str) -> Expr {
    Expr::col((Alias::new(repository.table_name()), Alias::new(name)))
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
pub(crate) fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn ensure_identifier(field: &str, name: &str) -> Result<()> {
    if !is_safe_identifier(name) {
        let shown: String = name.chars().take(64).collect();
        bail!("unsafe {field} name: '{shown}'");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// WhereEquals
// ---------------------------------------------------------------------------

/// `table.column = value`.
#[derive(Debug, Clone)]
pub struct WhereEquals {
    column: String,
    value: Value,
}

impl WhereEquals {
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

impl Criterion for WhereEquals {
    fn apply(&self, query: &SelectStatement, repository: &dyn RepositoryContext) -> Applied {
        let mut next = query.clone();
        next.and_where(column(repository, &self.column).eq(self.value.clone()));
        Applied::replace(next)
    }

    fn name(&self) -> &str {
        "where_equals"
    }
}

#[derive(Deserialize)]
struct WhereEqualsConfig {
    column: String,
    value: serde_json::Value,
}

pub(super) fn where_equals_factory(config: &serde_json::Value) -> Result<Arc<dyn Criterion>> {
    let config: WhereEqualsConfig = serde_json::from_value(config.clone())?;
    ensure_identifier("column", &config.column)?;
    // `col = NULL` never matches; soft-delete style checks use exclude_soft_deleted.
    if serde_json::Value::is_null(&config.value) {
        bail!("where_equals requires a non-null value");
    }
    Ok(Arc::new(WhereEquals::new(
        config.column,
        json_to_value(&config.value),
    )))
}

// ---------------------------------------------------------------------------
// ExcludeSoftDeleted
// ---------------------------------------------------------------------------

/// Hide soft-deleted rows: `table.deleted_at IS NULL`.
#[derive(Debug, Clone)]
pub struct ExcludeSoftDeleted {
    column: String,
}

impl ExcludeSoftDeleted {
    pub fn new() -> Self {
        Self::on("deleted_at")
    }

    pub fn on(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Default for ExcludeSoftDeleted {
    fn default() -> Self {
        Self::new()
    }
}

impl Criterion for ExcludeSoftDeleted {
    fn apply(&self, query: &SelectStatement, repository: &dyn RepositoryContext) -> Applied {
        let mut next = query.clone();
        next.and_where(column(repository, &self.column).is_null());
        Applied::replace(next)
    }

    fn name(&self) -> &str {
        "exclude_soft_deleted"
    }
}

#[derive(Deserialize)]
struct SoftDeleteConfig {
    #[serde(default = "default_soft_delete_column")]
    column: String,
}

fn default_soft_delete_column() -> String {
    "deleted_at".to_string()
}

pub(super) fn exclude_soft_deleted_factory(
    config: &serde_json::Value,
) -> Result<Arc<dyn Criterion>> {
    let config: SoftDeleteConfig = if config.is_null() {
        SoftDeleteConfig {
            column: default_soft_delete_column(),
        }
    } else {
        serde_json::from_value(config.clone())?
    };
    ensure_identifier("column", &config.column)?;
    Ok(Arc::new(ExcludeSoftDeleted::on(config.column)))
}

// ---------------------------------------------------------------------------
// TenantScope
// ---------------------------------------------------------------------------

/// Restrict rows to one tenant.
#[derive(Debug, Clone)]
pub struct TenantScope {
    column: String,
    tenant: Value,
}

impl TenantScope {
    pub fn new(tenant: impl Into<Value>) -> Self {
        Self {
            column: "tenant_id".to_string(),
            tenant: tenant.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }
}

impl Criterion for TenantScope {
    fn apply(&self, query: &SelectStatement, repository: &dyn RepositoryContext) -> Applied {
        let mut next = query.clone();
        next.and_where(column(repository, &self.column).eq(self.tenant.clone()));
        Applied::replace(next)
    }

    fn name(&self) -> &str {
        "tenant_scope"
    }
}

#[derive(Deserialize)]
struct TenantScopeConfig {
    #[serde(default = "default_tenant_column")]
    column: String,
    tenant: serde_json::Value,
}

fn default_tenant_column() -> String {
    "tenant_id".to_string()
}

pub(super) fn tenant_scope_factory(config: &serde_json::Value) -> Result<Arc<dyn Criterion>> {
    let config: TenantScopeConfig = serde_json::from_value(config.clone())?;
    ensure_identifier("column", &config.column)?;
    if serde_json::Value::is_null(&config.tenant) {
        bail!("tenant_scope requires a non-null tenant");
    }
    Ok(Arc::new(
        TenantScope::new(json_to_value(&config.tenant)).with_column(config.column),
    ))
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Case-insensitive substring match over any of the given columns.
///
/// A blank term skips: the criterion contributes nothing and the pipeline
/// carries on.
#[derive(Debug, Clone)]
pub struct Search {
    columns: Vec<String>,
    term: String,
}

impl Search {
    pub fn new<I, S>(columns: I, term: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            term: term.into(),
        }
    }
}

impl Criterion for Search {
    fn apply(&self, query: &SelectStatement, repository: &dyn RepositoryContext) -> Applied {
        let term = self.term.trim();
        if term.is_empty() || self.columns.is_empty() {
            return Applied::skip();
        }

        let pattern = format!("%{}%", escape_like_wildcards(term));
        let mut any = Cond::any();
        for name in &self.columns {
            any = any.add(column(repository, name).ilike(pattern.clone()));
        }

        let mut next = query.clone();
        next.cond_where(any);
        Applied::replace(next)
    }

    fn name(&self) -> &str {
        "search"
    }
}

#[derive(Deserialize)]
struct SearchConfig {
    columns: Vec<String>,
    #[serde(default)]
    term: String,
}

pub(super) fn search_factory(config: &serde_json::Value) -> Result<Arc<dyn Criterion>> {
    let config: SearchConfig = serde_json::from_value(config.clone())?;
    for name in &config.columns {
        ensure_identifier("column", name)?;
    }
    Ok(Arc::new(Search::new(config.columns, config.term)))
}

// ---------------------------------------------------------------------------
// OrderBy
// ---------------------------------------------------------------------------

/// Sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// `ORDER BY table.column`.
#[derive(Debug, Clone)]
pub struct OrderBy {
    column: String,
    direction: SortDirection,
}

impl OrderBy {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Asc)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Desc)
    }
}

impl Criterion for OrderBy {
    fn apply(&self, query: &SelectStatement, repository: &dyn RepositoryContext) -> Applied {
        let order = match self.direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        let mut next = query.clone();
        next.order_by(
            (
                Alias::new(repository.table_name()),
                Alias::new(&self.column),
            ),
            order,
        );
        Applied::replace(next)
    }

    fn name(&self) -> &str {
        "order_by"
    }
}

#[derive(Deserialize)]
struct OrderByConfig {
    column: String,
    #[serde(default)]
    direction: SortDirection,
}

pub(super) fn order_by_factory(config: &serde_json::Value) -> Result<Arc<dyn Criterion>> {
    let config: OrderByConfig = serde_json::from_value(config.clone())?;
    ensure_identifier("column", &config.column)?;
    Ok(Arc::new(OrderBy::new(config.column, config.direction)))
}

// ---------------------------------------------------------------------------
// Limit
// ---------------------------------------------------------------------------

/// Cap the number of rows.
#[derive(Debug, Clone, Copy)]
pub struct Limit {
    count: u64,
}

impl Limit {
    pub fn new(count: u64) -> Self {
        Self { count }
    }
}

impl Criterion for Limit {
    fn apply(&self, query: &SelectStatement, _repository: &dyn RepositoryContext) -> Applied {
        let mut next = query.clone();
        next.limit(self.count);
        Applied::replace(next)
    }

    fn name(&self) -> &str {
        "limit"
    }
}

#[derive(Deserialize)]
struct LimitConfig {
    count: u64,
}

pub(super) fn limit_factory(config: &serde_json::Value) -> Result<Arc<dyn Criterion>> {
    let config: LimitConfig = serde_json::from_value(config.clone())?;
    if config.count == 0 {
        bail!("limit count must be greater than zero");
    }
    Ok(Arc::new(Limit::new(config.count)))
}

// ---------------------------------------------------------------------------
// WhereKeyIn
// ---------------------------------------------------------------------------

/// Restrict rows to a set of primary keys.
///
/// The key column comes from the repository's model. An empty key set stops
/// the pipeline with a query that matches nothing; later criteria cannot
/// widen it again.
#[derive(Debug, Clone)]
pub struct WhereKeyIn {
    keys: Vec<Value>,
}

impl WhereKeyIn {
    pub fn new<I, V>(keys: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl Criterion for WhereKeyIn {
    fn apply(&self, query: &SelectStatement, repository: &dyn RepositoryContext) -> Applied {
        let mut next = query.clone();
        if self.keys.is_empty() {
            next.and_where(Expr::cust("FALSE"));
            return Applied::stop(next);
        }
        next.and_where(column(repository, repository.key_name()).is_in(self.keys.clone()));
        Applied::replace(next)
    }

    fn name(&self) -> &str {
        "where_key_in"
    }
}

#[derive(Deserialize)]
struct WhereKeyInConfig {
    #[serde(default)]
    keys: Vec<serde_json::Value>,
}

pub(super) fn where_key_in_factory(config: &serde_json::Value) -> Result<Arc<dyn Criterion>> {
    let config: WhereKeyInConfig = serde_json::from_value(config.clone())?;
    Ok(Arc::new(WhereKeyIn::new(
        config.keys.iter().map(json_to_value),
    )))
}
