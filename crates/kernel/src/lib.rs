//! Strainer kernel library.
//!
//! Query refinement through an ordered pipeline of criteria, a repository
//! façade that runs the pipeline before reading, and PostgreSQL storage.
//! The `strainer` binary is a thin command-line front end over this crate.

pub mod config;
pub mod criteria;
pub mod db;
pub mod error;
pub mod repository;
pub mod value;

pub use criteria::{
    Applied, CriteriaCatalog, CriteriaEntry, CriteriaRegistry, Criterion, Expression,
    PipelineOutcome, RepositoryContext,
};
pub use error::{RepositoryError, RepositoryResult};
pub use repository::{ModelDefinition, ModelRegistry, Page, PgStorage, Repository, Storage};
