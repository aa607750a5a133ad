//! Criteria registry - the ordered list of pending criteria.
//!
//! Insertion order is application order. Entries are never removed; the
//! only switch is the skip flag, which disables the whole pipeline.

use std::fmt;
use std::sync::Arc;

use super::criterion::Criterion;

type ProducerFn = dyn Fn() -> Option<Arc<dyn Criterion>> + Send + Sync;

/// Zero-argument producer that builds a criterion when the pipeline runs.
///
/// Returning `None` marks an inert placeholder; the pipeline skips it
/// without error.
pub struct Producer(Box<ProducerFn>);

impl Producer {
    pub fn new<F>(produce: F) -> Self
    where
        F: Fn() -> Option<Arc<dyn Criterion>> + Send + Sync + 'static,
    {
        Self(Box::new(produce))
    }

    /// Invoke the producer.
    pub fn produce(&self) -> Option<Arc<dyn Criterion>> {
        (self.0)()
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Producer(..)")
    }
}

/// One pending registry entry.
pub enum CriteriaEntry {
    /// A ready criterion.
    Concrete(Arc<dyn Criterion>),
    /// A criterion built late, each time the pipeline runs.
    Deferred(Producer),
    /// A criterion looked up by name in the repository's catalog.
    Named {
        name: String,
        config: serde_json::Value,
    },
}

impl CriteriaEntry {
    /// Wrap a ready criterion.
    pub fn concrete<C: Criterion + 'static>(criterion: C) -> Self {
        Self::Concrete(Arc::new(criterion))
    }

    /// Wrap a producer that may decline to build anything.
    pub fn deferred<F>(produce: F) -> Self
    where
        F: Fn() -> Option<Arc<dyn Criterion>> + Send + Sync + 'static,
    {
        Self::Deferred(Producer::new(produce))
    }

    /// Wrap a producer that always builds a criterion.
    pub fn lazy<C, F>(produce: F) -> Self
    where
        C: Criterion + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        Self::deferred(move || Some(Arc::new(produce()) as Arc<dyn Criterion>))
    }

    /// Reference a catalog criterion by name, with config overrides.
    pub fn named(name: impl Into<String>, config: serde_json::Value) -> Self {
        Self::Named {
            name: name.into(),
            config,
        }
    }

    /// Label for diagnostics. Deferred entries are not resolved here.
    pub fn label(&self) -> &str {
        match self {
            Self::Concrete(criterion) => criterion.name(),
            Self::Deferred(_) => "<deferred>",
            Self::Named { name, .. } => name,
        }
    }
}

impl fmt::Debug for CriteriaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concrete(criterion) => f.debug_tuple("Concrete").field(&criterion.name()).finish(),
            Self::Deferred(producer) => f.debug_tuple("Deferred").field(producer).finish(),
            Self::Named { name, config } => f
                .debug_struct("Named")
                .field("name", name)
                .field("config", config)
                .finish(),
        }
    }
}

impl From<Arc<dyn Criterion>> for CriteriaEntry {
    fn from(criterion: Arc<dyn Criterion>) -> Self {
        Self::Concrete(criterion)
    }
}

impl From<Box<dyn Criterion>> for CriteriaEntry {
    fn from(criterion: Box<dyn Criterion>) -> Self {
        Self::Concrete(Arc::from(criterion))
    }
}

impl From<Producer> for CriteriaEntry {
    fn from(producer: Producer) -> Self {
        Self::Deferred(producer)
    }
}

/// Ordered criteria plus the skip flag.
#[derive(Debug, Default)]
pub struct CriteriaRegistry {
    entries: Vec<CriteriaEntry>,
    skip: bool,
}

impl CriteriaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. No deduplication.
    pub fn push(&mut self, entry: impl Into<CriteriaEntry>) {
        self.entries.push(entry.into());
    }

    /// Append an entry only when `condition` holds.
    pub fn push_when(&mut self, condition: bool, entry: impl Into<CriteriaEntry>) {
        if condition {
            self.push(entry);
        }
    }

    /// Entries in insertion order.
    pub fn list(&self) -> &[CriteriaEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CriteriaEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set or clear the skip flag.
    pub fn skip(&mut self, status: bool) {
        self.skip = status;
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::criteria::{Applied, RepositoryContext};
    use sea_query::SelectStatement;

    struct Passthrough;

    impl Criterion for Passthrough {
        fn apply(&self, _query: &SelectStatement, _repo: &dyn RepositoryContext) -> Applied {
            Applied::no_change()
        }
    }

    #[test]
    fn push_preserves_insertion_order() {
        let mut registry = CriteriaRegistry::new();
        registry.push(CriteriaEntry::concrete(Passthrough));
        registry.push(CriteriaEntry::named("soft_delete", serde_json::Value::Null));
        registry.push(CriteriaEntry::lazy(|| Passthrough));

        let labels: Vec<&str> = registry.iter().map(CriteriaEntry::label).collect();
        assert_eq!(labels.len(), 3);
        assert!(labels[0].ends_with("Passthrough"));
        assert_eq!(labels[1], "soft_delete");
        assert_eq!(labels[2], "<deferred>");
    }

    #[test]
    fn push_when_false_is_noop() {
        let mut registry = CriteriaRegistry::new();
        registry.push_when(false, CriteriaEntry::concrete(Passthrough));
        assert!(registry.is_empty());

        registry.push_when(true, CriteriaEntry::concrete(Passthrough));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicates_are_kept() {
        let shared: Arc<dyn Criterion> = Arc::new(Passthrough);
        let mut registry = CriteriaRegistry::new();
        registry.push(Arc::clone(&shared));
        registry.push(shared);
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn skip_flag_toggles() {
        let mut registry = CriteriaRegistry::new();
        assert!(!registry.is_skipped());
        registry.skip(true);
        assert!(registry.is_skipped());
        registry.skip(false);
        assert!(!registry.is_skipped());
    }

    #[test]
    fn deferred_producer_is_not_invoked_on_push() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = CriteriaRegistry::new();
        registry.push(CriteriaEntry::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Passthrough
        }));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let CriteriaEntry::Deferred(producer) = &registry.list()[0] else {
            panic!("expected a deferred entry");
        };
        assert!(producer.produce().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
