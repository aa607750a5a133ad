//! The criterion capability and the read-only view it gets of its repository.

use sea_query::SelectStatement;

use super::expression::Applied;
use super::registry::CriteriaEntry;
use crate::repository::ModelDefinition;

/// Read-only view of the repository a criterion is applied for.
///
/// Criteria cannot reach the registry's mutators or the skip flag through
/// this interface, so applying a criterion never reshapes the pipeline.
pub trait RepositoryContext {
    /// Model the repository is bound to.
    fn model(&self) -> &ModelDefinition;

    /// Pending criteria, in application order.
    fn criteria(&self) -> &[CriteriaEntry];

    /// Table the repository queries.
    fn table_name(&self) -> &str {
        &self.model().table
    }

    /// Primary key column of the bound model.
    fn key_name(&self) -> &str {
        &self.model().key_name
    }
}

/// A reusable unit of query refinement.
///
/// Criteria receive the current query state and return an [`Applied`]
/// describing what the pipeline should do with it. A criterion may carry
/// its own configuration (a search term, a tenant id) but keeps no state
/// about where it sits in the pipeline.
pub trait Criterion: Send + Sync {
    /// Apply this criterion to `query`.
    fn apply(&self, query: &SelectStatement, repository: &dyn RepositoryContext) -> Applied;

    /// Name used in logs and error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
