//! Repository façade.
//!
//! A [`Repository`] owns one query state, one criteria registry and a
//! storage handle. Read methods other than [`Repository::all`] run the
//! criteria pipeline before handing the query to storage; writes go
//! straight to the model's table.

mod model;
mod page;
mod postgres;
mod storage;

use std::sync::Arc;

use sea_query::{
    Alias, Asterisk, Expr, PostgresQueryBuilder, Query, SelectStatement, SimpleExpr, Value,
};

use crate::criteria::pipeline::{self, PipelineOutcome};
use crate::criteria::{CriteriaCatalog, CriteriaEntry, CriteriaRegistry, Criterion, RepositoryContext};
use crate::error::RepositoryResult;
use crate::value::json_to_value;

pub(crate) use model::is_safe_identifier;
pub use model::{ModelDefinition, ModelRegistry};
pub use page::Page;
pub use postgres::PgStorage;
pub use storage::{Row, Storage};

/// Default page size for [`Repository::paginate`].
pub const DEFAULT_PER_PAGE: u32 = 15;

/// Default upper bound for the page size.
pub const MAX_PER_PAGE: u32 = 100;

/// Alias for the derived table that wraps projections and aggregates.
const SUBQUERY_ALIAS: &str = "t";

/// Column data for create/update, keyed by column name.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Repository bound to one model.
pub struct Repository<S: ?Sized = dyn Storage> {
    storage: Arc<S>,
    model: ModelDefinition,
    query: SelectStatement,
    criteria: CriteriaRegistry,
    catalog: Option<Arc<CriteriaCatalog>>,
    max_per_page: u32,
}

impl<S: Storage + ?Sized> Repository<S> {
    /// Create a repository for the model registered as `identifier`.
    pub fn new(storage: Arc<S>, models: &ModelRegistry, identifier: &str) -> RepositoryResult<Self> {
        let model = models.resolve(identifier)?;
        Ok(Self::bind(storage, model))
    }

    /// Create a repository for an explicit model definition.
    pub fn for_model(storage: Arc<S>, model: ModelDefinition) -> RepositoryResult<Self> {
        if !model.is_valid() {
            return Err(crate::error::RepositoryError::InvalidModelBinding { model: model.table });
        }
        Ok(Self::bind(storage, model))
    }

    fn bind(storage: Arc<S>, model: ModelDefinition) -> Self {
        let query = model.new_query();
        let mut repository = Self {
            storage,
            model,
            query,
            criteria: CriteriaRegistry::new(),
            catalog: None,
            max_per_page: MAX_PER_PAGE,
        };
        repository.reset_scope();
        repository
    }

    /// Attach a catalog so named criteria can be resolved.
    pub fn with_catalog(mut self, catalog: Arc<CriteriaCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Cap page sizes requested through [`Repository::paginate`].
    pub fn with_max_per_page(mut self, max_per_page: u32) -> Self {
        self.max_per_page = max_per_page.max(1);
        self
    }

    // -----------------------------------------------------------------------
    // Query state
    // -----------------------------------------------------------------------

    /// Current query state.
    pub fn query(&self) -> &SelectStatement {
        &self.query
    }

    /// Replace the query state.
    pub fn set_query(&mut self, query: SelectStatement) -> &mut Self {
        self.query = query;
        self
    }

    /// Fresh root query for the bound model.
    pub fn new_query(&self) -> SelectStatement {
        self.model.new_query()
    }

    /// Discard everything applied so far and start from the root query.
    pub fn reset_query(&mut self) -> &mut Self {
        self.query = self.new_query();
        self
    }

    /// Current query state rendered as PostgreSQL.
    pub fn to_sql(&self) -> String {
        self.query.to_string(PostgresQueryBuilder)
    }

    // -----------------------------------------------------------------------
    // Criteria
    // -----------------------------------------------------------------------

    /// Append a criteria entry.
    pub fn push_criteria(&mut self, entry: impl Into<CriteriaEntry>) -> &mut Self {
        self.criteria.push(entry);
        self
    }

    /// Append a criteria entry only when `condition` holds.
    pub fn push_criteria_when(
        &mut self,
        condition: bool,
        entry: impl Into<CriteriaEntry>,
    ) -> &mut Self {
        self.criteria.push_when(condition, entry);
        self
    }

    /// Pending criteria, in application order.
    pub fn get_criteria(&self) -> &[CriteriaEntry] {
        self.criteria.list()
    }

    /// Disable (or re-enable) the pipeline for subsequent calls.
    pub fn skip_criteria(&mut self, status: bool) -> &mut Self {
        self.criteria.skip(status);
        self
    }

    pub fn is_skipping_criteria(&self) -> bool {
        self.criteria.is_skipped()
    }

    /// Re-enable the pipeline.
    pub fn reset_scope(&mut self) -> &mut Self {
        self.skip_criteria(false)
    }

    /// Run every pending criterion against the query state.
    ///
    /// On error, effects of criteria applied before the failing entry
    /// remain in the query state.
    pub fn apply_criteria(&mut self) -> RepositoryResult<PipelineOutcome> {
        let mut query = std::mem::replace(&mut self.query, Query::select());
        let outcome = pipeline::run(&self.criteria, &mut query, &*self, self.catalog.as_deref());
        self.query = query;
        outcome
    }

    /// Apply one criterion immediately, bypassing the registry.
    ///
    /// The result is interpreted like a single pipeline step: a stop adopts
    /// its query, a skip leaves the state alone.
    pub fn get_by_criteria(&mut self, criterion: &dyn Criterion) -> RepositoryResult<&mut Self> {
        let applied = criterion.apply(&self.query, &*self);
        pipeline::interpret(applied, &mut self.query)?;
        Ok(self)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Rows for the current query state. Criteria are not applied.
    pub async fn all(&self, columns: &[&str]) -> RepositoryResult<Vec<Row>> {
        let query = self.project(self.query.clone(), columns);
        Ok(self.storage.fetch_all(&query).await?)
    }

    /// Rows after applying criteria.
    pub async fn get(&mut self, columns: &[&str]) -> RepositoryResult<Vec<Row>> {
        self.apply_criteria()?;
        self.all(columns).await
    }

    /// One page of rows after applying criteria. `page` is 1-indexed.
    pub async fn paginate(
        &mut self,
        per_page: u32,
        page: u32,
        columns: &[&str],
    ) -> RepositoryResult<Page> {
        self.apply_criteria()?;

        let page = page.max(1);
        let per_page = if per_page > self.max_per_page {
            tracing::warn!(
                requested = per_page,
                capped = self.max_per_page,
                "per_page exceeds maximum, capping"
            );
            self.max_per_page
        } else {
            per_page.max(1)
        };

        // Paging wraps the refined query so its own LIMIT/OFFSET survive.
        let query = self.derived(self.query.clone(), columns);
        let total = self.storage.count(&query).await?;
        if total == 0 {
            return Ok(Page::empty(page, per_page));
        }

        let offset = u64::from(page - 1) * u64::from(per_page);
        let mut paged = query;
        paged.limit(u64::from(per_page)).offset(offset);
        let items = self.storage.fetch_all(&paged).await?;

        Ok(Page::new(items, total, page, per_page))
    }

    /// Row whose primary key equals `key`, after applying criteria.
    pub async fn find(
        &mut self,
        key: impl Into<Value>,
        columns: &[&str],
    ) -> RepositoryResult<Option<Row>> {
        let key_name = self.model.key_name.clone();
        self.find_by(&key_name, key, columns).await
    }

    /// First row where `column = value`, after applying criteria.
    pub async fn find_by(
        &mut self,
        column: &str,
        value: impl Into<Value>,
        columns: &[&str],
    ) -> RepositoryResult<Option<Row>> {
        self.apply_criteria()?;

        let mut query = self.query.clone();
        query.and_where(self.column(column).eq(value.into()));
        let mut query = self.project(query, columns);
        query.limit(1);

        Ok(self.storage.fetch_optional(&query).await?)
    }

    /// `SUM(column)` over the rows left after applying criteria.
    pub async fn sum(&mut self, column: &str) -> RepositoryResult<serde_json::Value> {
        self.apply_criteria()?;

        let query = Query::select()
            .expr_as(
                Expr::col((Alias::new(SUBQUERY_ALIAS), Alias::new(column))).sum(),
                Alias::new("aggregate"),
            )
            .from_subquery(self.query.clone(), Alias::new(SUBQUERY_ALIAS))
            .to_owned();

        Ok(self.storage.fetch_scalar(&query).await?)
    }

    /// Query state after applying criteria, for callers that execute it
    /// themselves.
    pub fn create_builder(&mut self) -> RepositoryResult<SelectStatement> {
        self.apply_criteria()?;
        Ok(self.query.clone())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert a row and return it.
    pub async fn create(&self, data: &Record) -> RepositoryResult<Row> {
        let (columns, values): (Vec<Alias>, Vec<SimpleExpr>) = data
            .iter()
            .map(|(column, value)| {
                (
                    Alias::new(column),
                    SimpleExpr::Value(json_to_value(value)),
                )
            })
            .unzip();

        let mut insert = Query::insert();
        insert
            .into_table(Alias::new(&self.model.table))
            .columns(columns)
            .values(values)?
            .returning_all();

        Ok(self.storage.insert(&insert).await?)
    }

    /// Update rows where `key_name = key` (the model key by default).
    pub async fn update(
        &self,
        data: &Record,
        key: impl Into<Value>,
        key_name: Option<&str>,
    ) -> RepositoryResult<u64> {
        let key_name = key_name.unwrap_or(&self.model.key_name);

        let mut update = Query::update();
        update
            .table(Alias::new(&self.model.table))
            .values(data.iter().map(|(column, value)| {
                (
                    Alias::new(column),
                    SimpleExpr::Value(json_to_value(value)),
                )
            }))
            .and_where(Expr::col(Alias::new(key_name)).eq(key.into()));

        Ok(self.storage.update(&update).await?)
    }

    /// Delete rows where `key_name = key` (the model key by default).
    pub async fn delete(
        &self,
        key: impl Into<Value>,
        key_name: Option<&str>,
    ) -> RepositoryResult<u64> {
        let key_name = key_name.unwrap_or(&self.model.key_name);

        let mut delete = Query::delete();
        delete
            .from_table(Alias::new(&self.model.table))
            .and_where(Expr::col(Alias::new(key_name)).eq(key.into()));

        Ok(self.storage.delete(&delete).await?)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn column(&self, name: &str) -> Expr {
        Expr::col((Alias::new(&self.model.table), Alias::new(name)))
    }

    /// Restrict `query` to `columns`. `*` (or no columns) keeps the query's
    /// own selection.
    fn project(&self, query: SelectStatement, columns: &[&str]) -> SelectStatement {
        if columns.is_empty() || columns.contains(&"*") {
            return query;
        }
        self.derived(query, columns)
    }

    /// Select `columns` (everything for `*` or none) from `query` as a
    /// derived table.
    fn derived(&self, query: SelectStatement, columns: &[&str]) -> SelectStatement {
        let mut select = Query::select();
        if columns.is_empty() || columns.contains(&"*") {
            select.column(Asterisk);
        } else {
            select.columns(
                columns
                    .iter()
                    .map(|c| (Alias::new(SUBQUERY_ALIAS), Alias::new(*c))),
            );
        }
        select
            .from_subquery(query, Alias::new(SUBQUERY_ALIAS))
            .to_owned()
    }
}

impl<S: ?Sized> RepositoryContext for Repository<S> {
    fn model(&self) -> &ModelDefinition {
        &self.model
    }

    fn criteria(&self) -> &[CriteriaEntry] {
        self.criteria.list()
    }
}
