//! Results a criterion hands back to the pipeline.

use sea_query::SelectStatement;

/// Control signal a criterion may emit instead of a replacement query.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Expression {
    /// Discard this criterion's effect and continue with the next entry.
    Skip,
    /// Adopt the carried query and stop the pipeline.
    Stop(SelectStatement),
}

impl Expression {
    pub fn skip() -> Self {
        Self::Skip
    }

    pub fn stop(query: SelectStatement) -> Self {
        Self::Stop(query)
    }

    /// Short tag used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Stop(_) => "stop",
        }
    }
}

/// Outcome of applying one criterion to the current query state.
#[derive(Debug, Clone)]
pub enum Applied {
    /// Replace the query state wholesale.
    Replace(SelectStatement),
    /// Keep the query state as it is.
    NoChange,
    /// Let the pipeline interpret a control signal.
    Expression(Expression),
}

impl Applied {
    pub fn replace(query: SelectStatement) -> Self {
        Self::Replace(query)
    }

    pub fn no_change() -> Self {
        Self::NoChange
    }

    pub fn skip() -> Self {
        Self::Expression(Expression::skip())
    }

    pub fn stop(query: SelectStatement) -> Self {
        Self::Expression(Expression::stop(query))
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, Self::Expression(_))
    }
}

impl From<Expression> for Applied {
    fn from(expression: Expression) -> Self {
        Self::Expression(expression)
    }
}

impl From<SelectStatement> for Applied {
    fn from(query: SelectStatement) -> Self {
        Self::Replace(query)
    }
}

impl From<Option<SelectStatement>> for Applied {
    fn from(query: Option<SelectStatement>) -> Self {
        query.map_or(Self::NoChange, Self::Replace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::Query;

    #[test]
    fn expression_kinds() {
        assert_eq!(Expression::skip().kind(), "skip");
        assert_eq!(Expression::stop(Query::select()).kind(), "stop");
    }

    #[test]
    fn missing_query_means_no_change() {
        let applied: Applied = None.into();
        assert!(matches!(applied, Applied::NoChange));

        let applied: Applied = Some(Query::select()).into();
        assert!(matches!(applied, Applied::Replace(_)));
    }

    #[test]
    fn helpers_wrap_expressions() {
        assert!(Applied::skip().is_expression());
        assert!(Applied::stop(Query::select()).is_expression());
        assert!(!Applied::no_change().is_expression());
        assert!(matches!(
            Applied::from(Expression::skip()),
            Applied::Expression(Expression::Skip)
        ));
    }
}
