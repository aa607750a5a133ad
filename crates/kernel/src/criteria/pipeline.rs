//! Pipeline executor.
//!
//! Folds the registry over the query state, left to right. Each criterion
//! sees the cumulative effect of the ones before it. A criterion can replace
//! the state, leave it alone, skip its own effect, or stop the pipeline with
//! a final query. Resolution failures abort the run; effects already applied
//! stay in place.

use sea_query::SelectStatement;

use super::catalog::CriteriaCatalog;
use super::criterion::RepositoryContext;
use super::expression::{Applied, Expression};
use super::registry::CriteriaRegistry;
use super::resolver;
use crate::error::{RepositoryError, RepositoryResult};

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The skip flag was set; nothing ran.
    Bypassed,
    /// Every entry was evaluated.
    Exhausted,
    /// The entry at `index` stopped the pipeline.
    Stopped { index: usize },
}

/// What the executor does after interpreting one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Stop,
}

/// Run every registry entry against `query`.
pub fn run(
    registry: &CriteriaRegistry,
    query: &mut SelectStatement,
    repository: &dyn RepositoryContext,
    catalog: Option<&CriteriaCatalog>,
) -> RepositoryResult<PipelineOutcome> {
    if registry.is_skipped() {
        tracing::trace!("criteria skipped for this repository");
        return Ok(PipelineOutcome::Bypassed);
    }

    for (index, entry) in registry.iter().enumerate() {
        let Some(criterion) = resolver::resolve(entry, catalog)? else {
            tracing::trace!(index, "criteria entry resolved to nothing");
            continue;
        };

        let applied = criterion.apply(query, repository);
        if interpret(applied, query)? == Step::Stop {
            tracing::debug!(index, criterion = criterion.name(), "criteria pipeline stopped");
            return Ok(PipelineOutcome::Stopped { index });
        }
        tracing::debug!(index, criterion = criterion.name(), "criterion applied");
    }

    Ok(PipelineOutcome::Exhausted)
}

/// Fold one criterion result into the query state.
pub(crate) fn interpret(applied: Applied, query: &mut SelectStatement) -> RepositoryResult<Step> {
    match applied {
        Applied::Replace(next) => {
            *query = next;
            Ok(Step::Continue)
        }
        Applied::NoChange => Ok(Step::Continue),
        Applied::Expression(expression) => match expression {
            Expression::Skip => {
                tracing::trace!("criterion skipped its own effect");
                Ok(Step::Continue)
            }
            Expression::Stop(last) => {
                *query = last;
                Ok(Step::Stop)
            }
            #[allow(unreachable_patterns)]
            other => Err(RepositoryError::UnsupportedExpression {
                kind: other.kind().to_string(),
            }),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::criteria::{CriteriaEntry, Criterion};
    use crate::repository::ModelDefinition;
    use sea_query::{Alias, Asterisk, ConditionalStatement, Expr, ExprTrait, PostgresQueryBuilder, Query};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Context {
        model: ModelDefinition,
    }

    impl RepositoryContext for Context {
        fn model(&self) -> &ModelDefinition {
            &self.model
        }

        fn criteria(&self) -> &[CriteriaEntry] {
            &[]
        }
    }

    fn context() -> Context {
        Context {
            model: ModelDefinition::new("users", "id"),
        }
    }

    fn base() -> SelectStatement {
        Query::select()
            .column(Asterisk)
            .from(Alias::new("users"))
            .to_owned()
    }

    fn sql(query: &SelectStatement) -> String {
        query.to_string(PostgresQueryBuilder)
    }

    enum Behavior {
        Filter(&'static str),
        Skip,
        StopWith(&'static str),
        Nothing,
    }

    struct Stage {
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl Stage {
        fn new(behavior: Behavior) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    behavior,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl Criterion for Stage {
        fn apply(&self, query: &SelectStatement, _repo: &dyn RepositoryContext) -> Applied {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Filter(column) => {
                    let mut next = query.clone();
                    next.and_where(Expr::col(Alias::new(column)).is_not_null());
                    Applied::replace(next)
                }
                Behavior::Skip => Applied::skip(),
                Behavior::StopWith(column) => {
                    let mut last = query.clone();
                    last.and_where(Expr::col(Alias::new(column)).is_null());
                    Applied::stop(last)
                }
                Behavior::Nothing => Applied::no_change(),
            }
        }
    }

    #[test]
    fn empty_registry_leaves_query_alone() {
        let registry = CriteriaRegistry::new();
        let mut query = base();
        let outcome = run(&registry, &mut query, &context(), None).unwrap();

        assert_eq!(outcome, PipelineOutcome::Exhausted);
        assert_eq!(sql(&query), sql(&base()));
    }

    #[test]
    fn replacements_accumulate_in_order() {
        let (first, _) = Stage::new(Behavior::Filter("email"));
        let (second, _) = Stage::new(Behavior::Filter("name"));
        let mut registry = CriteriaRegistry::new();
        registry.push(CriteriaEntry::concrete(first));
        registry.push(CriteriaEntry::concrete(second));

        let mut query = base();
        run(&registry, &mut query, &context(), None).unwrap();

        let rendered = sql(&query);
        let email = rendered.find("\"email\"").unwrap();
        let name = rendered.find("\"name\"").unwrap();
        assert!(email < name, "filters out of order: {rendered}");
    }

    #[test]
    fn skip_keeps_state_and_continues() {
        let (skipper, skip_calls) = Stage::new(Behavior::Skip);
        let (after, after_calls) = Stage::new(Behavior::Filter("name"));
        let mut registry = CriteriaRegistry::new();
        registry.push(CriteriaEntry::concrete(skipper));
        registry.push(CriteriaEntry::concrete(after));

        let mut query = base();
        let outcome = run(&registry, &mut query, &context(), None).unwrap();

        assert_eq!(outcome, PipelineOutcome::Exhausted);
        assert_eq!(skip_calls.load(Ordering::SeqCst), 1);
        assert_eq!(after_calls.load(Ordering::SeqCst), 1);
        assert!(sql(&query).contains("\"name\" IS NOT NULL"));
    }

    #[test]
    fn stop_adopts_query_and_short_circuits() {
        let (stopper, _) = Stage::new(Behavior::StopWith("deleted_at"));
        let (never, never_calls) = Stage::new(Behavior::Filter("name"));
        let mut registry = CriteriaRegistry::new();
        registry.push(CriteriaEntry::concrete(stopper));
        registry.push(CriteriaEntry::concrete(never));

        let mut query = base();
        let outcome = run(&registry, &mut query, &context(), None).unwrap();

        assert_eq!(outcome, PipelineOutcome::Stopped { index: 0 });
        assert_eq!(never_calls.load(Ordering::SeqCst), 0);
        let rendered = sql(&query);
        assert!(rendered.contains("\"deleted_at\" IS NULL"));
        assert!(!rendered.contains("\"name\""));
    }

    #[test]
    fn no_change_keeps_state() {
        let (idle, idle_calls) = Stage::new(Behavior::Nothing);
        let mut registry = CriteriaRegistry::new();
        registry.push(CriteriaEntry::concrete(idle));

        let mut query = base();
        run(&registry, &mut query, &context(), None).unwrap();

        assert_eq!(idle_calls.load(Ordering::SeqCst), 1);
        assert_eq!(sql(&query), sql(&base()));
    }

    #[test]
    fn skip_flag_bypasses_every_entry() {
        let (filter, calls) = Stage::new(Behavior::Filter("name"));
        let mut registry = CriteriaRegistry::new();
        registry.push(CriteriaEntry::concrete(filter));
        registry.skip(true);

        let mut query = base();
        let outcome = run(&registry, &mut query, &context(), None).unwrap();

        assert_eq!(outcome, PipelineOutcome::Bypassed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sql(&query), sql(&base()));
    }

    #[test]
    fn invalid_entry_fails_fast_and_keeps_prior_effects() {
        let (before, before_calls) = Stage::new(Behavior::Filter("email"));
        let (after, after_calls) = Stage::new(Behavior::Filter("name"));
        let mut registry = CriteriaRegistry::new();
        registry.push(CriteriaEntry::concrete(before));
        registry.push(CriteriaEntry::named("missing", serde_json::Value::Null));
        registry.push(CriteriaEntry::concrete(after));

        let mut query = base();
        let err = run(&registry, &mut query, &context(), None).unwrap_err();

        assert!(matches!(err, RepositoryError::InvalidCriteriaInstance { .. }));
        assert_eq!(before_calls.load(Ordering::SeqCst), 1);
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
        assert!(sql(&query).contains("\"email\" IS NOT NULL"));
    }

    #[test]
    fn interpret_maps_every_variant() {
        let mut query = base();
        assert_eq!(interpret(Applied::no_change(), &mut query).unwrap(), Step::Continue);
        assert_eq!(interpret(Applied::skip(), &mut query).unwrap(), Step::Continue);
        assert_eq!(
            interpret(Applied::stop(base()), &mut query).unwrap(),
            Step::Stop
        );
        assert_eq!(
            interpret(Applied::replace(base()), &mut query).unwrap(),
            Step::Continue
        );
    }
}
