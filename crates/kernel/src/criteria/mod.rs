//! Criteria pipeline.
//!
//! This module provides:
//! - Criterion: a reusable unit of query refinement
//! - Expression / Applied: what a criterion hands back to the pipeline
//! - CriteriaRegistry: ordered entries plus the skip flag
//! - CriteriaCatalog: named, configurable criteria built from declarations
//! - pipeline: the executor that folds the registry over a query

mod builtin;
mod catalog;
mod criterion;
mod expression;
pub mod pipeline;
mod registry;
mod resolver;

pub use builtin::{
    ExcludeSoftDeleted, Limit, OrderBy, Search, SortDirection, TenantScope, WhereEquals,
    WhereKeyIn,
};
pub use catalog::{
    CriteriaCatalog, CriteriaDeclaration, CriteriaExtension, CriterionFactory,
};
pub use criterion::{Criterion, RepositoryContext};
pub use expression::{Applied, Expression};
pub use pipeline::PipelineOutcome;
pub use registry::{CriteriaEntry, CriteriaRegistry, Producer};
pub use resolver::resolve;
