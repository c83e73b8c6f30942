// Planner Error Types
//
// This module defines the error channel of statement lowering.

use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors raised while lowering a bound statement to logical operators
#[derive(Error, Debug)]
pub enum PlanError {
    /// Catalog lookup failed while resolving a statement target
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("column \"{column}\" of relation \"{table}\" does not exist")]
    UndefinedColumn { column: String, table: String },
    #[error("INSERT has more expressions than target columns")]
    TooManyExpressions,
    #[error("INSERT has more target columns than expressions")]
    TooManyTargetColumns,
    #[error("null value in column \"{0}\" violates not-null constraint")]
    NotNullViolation(String),
    #[error("non-aggregation expression must appear in the GROUP BY clause or be used in an aggregate function")]
    UngroupedExpression,
    /// Statement shapes the rewriter does not support yet
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    /// Invariant violations that indicate a planner bug
    #[error("internal planner error: {0}")]
    Internal(&'static str),
}

/// Result type for planner operations
pub type PlanResult<T> = Result<T, PlanError>;
