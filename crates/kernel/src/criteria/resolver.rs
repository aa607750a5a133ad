//! Turns registry entries into concrete criteria.

use std::sync::Arc;

use super::catalog::CriteriaCatalog;
use super::criterion::Criterion;
use super::registry::CriteriaEntry;
use crate::error::{RepositoryError, RepositoryResult};

/// Resolve one entry.
///
/// Deferred producers are invoked exactly once per resolution and must
/// yield a criterion directly. `Ok(None)` means there is nothing to apply.
/// Named entries that the catalog cannot build are an
/// [`RepositoryError::InvalidCriteriaInstance`].
pub fn resolve(
    entry: &CriteriaEntry,
    catalog: Option<&CriteriaCatalog>,
) -> RepositoryResult<Option<Arc<dyn Criterion>>> {
    match entry {
        CriteriaEntry::Concrete(criterion) => Ok(Some(Arc::clone(criterion))),
        CriteriaEntry::Deferred(producer) => Ok(producer.produce()),
        CriteriaEntry::Named { name, config } => {
            let catalog = catalog.ok_or_else(|| {
                RepositoryError::invalid_criteria(
                    name.as_str(),
                    "no criteria catalog is attached to the repository",
                )
            })?;
            catalog.build(name, config).map(Some)
        }
    }
}
