// Logical Operators
//
// This module defines the relational-algebra nodes emitted by the logical
// planner. Nodes carry semantic attributes only; physical implementation
// choices belong to the downstream cost-based planner.

use std::collections::HashMap;
use std::fmt;

use crate::common::types::{ColumnId, DatabaseId, NamespaceId, TableId, INVALID_ID};
use crate::query::ast::{Expression, ExternalFile, OrderDirection, UpdateClause};

use super::predicates::AnnotatedExpression;

/// A logical relational operator together with its attributes
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalOperator {
    /// Base-table scan; predicates may be empty
    Get {
        database: DatabaseId,
        namespace: NamespaceId,
        table: TableId,
        predicates: Vec<AnnotatedExpression>,
        table_alias: String,
        is_for_update: bool,
    },
    /// Projects a nested SELECT as a named relation
    QueryDerivedGet {
        table_alias: String,
        alias_to_expr: HashMap<String, Expression>,
    },
    /// COPY source reading an external file
    ExternalFileGet { file: ExternalFile },
    /// COPY sink writing an external file
    ExportExternalFile { file: ExternalFile },
    /// Conjunction above its child
    Filter { predicates: Vec<AnnotatedExpression> },
    InnerJoin,
    OuterJoin { condition: Expression },
    LeftJoin { condition: Expression },
    RightJoin { condition: Expression },
    SemiJoin { condition: Expression },
    /// At-most-one inner row per outer row; scalar-subquery rewrites
    SingleJoin,
    /// Boolean presence marker per outer row; IN and EXISTS rewrites
    MarkJoin,
    /// Aggregation; empty group columns mean plain aggregation
    AggregateAndGroupBy { group_by: Vec<Expression> },
    Distinct,
    Limit {
        offset: i64,
        limit: i64,
        sort_exprs: Vec<Expression>,
        sort_directions: Vec<OrderDirection>,
    },
    Insert {
        database: DatabaseId,
        namespace: NamespaceId,
        table: TableId,
        columns: Vec<ColumnId>,
        values: Vec<Vec<Expression>>,
    },
    InsertSelect {
        database: DatabaseId,
        namespace: NamespaceId,
        table: TableId,
    },
    Update {
        database: DatabaseId,
        namespace: NamespaceId,
        table_alias: String,
        table: TableId,
        updates: Vec<UpdateClause>,
    },
    Delete {
        database: DatabaseId,
        namespace: NamespaceId,
        table: TableId,
    },
}

impl LogicalOperator {
    /// Scan bound to no table, used for SELECT without FROM
    pub fn dummy_get() -> Self {
        LogicalOperator::Get {
            database: INVALID_ID,
            namespace: INVALID_ID,
            table: INVALID_ID,
            predicates: Vec::new(),
            table_alias: String::new(),
            is_for_update: false,
        }
    }

    /// Whether this operator is one of the two-child join kinds
    pub fn is_join(&self) -> bool {
        matches!(
            self,
            LogicalOperator::InnerJoin
                | LogicalOperator::OuterJoin { .. }
                | LogicalOperator::LeftJoin { .. }
                | LogicalOperator::RightJoin { .. }
                | LogicalOperator::SemiJoin { .. }
                | LogicalOperator::SingleJoin
                | LogicalOperator::MarkJoin
        )
    }

    /// Operator name as shown in plan renderings
    pub fn name(&self) -> &'static str {
        match self {
            LogicalOperator::Get { .. } => "Get",
            LogicalOperator::QueryDerivedGet { .. } => "QueryDerivedGet",
            LogicalOperator::ExternalFileGet { .. } => "ExternalFileGet",
            LogicalOperator::ExportExternalFile { .. } => "ExportExternalFile",
            LogicalOperator::Filter { .. } => "Filter",
            LogicalOperator::InnerJoin => "InnerJoin",
            LogicalOperator::OuterJoin { .. } => "OuterJoin",
            LogicalOperator::LeftJoin { .. } => "LeftJoin",
            LogicalOperator::RightJoin { .. } => "RightJoin",
            LogicalOperator::SemiJoin { .. } => "SemiJoin",
            LogicalOperator::SingleJoin => "SingleJoin",
            LogicalOperator::MarkJoin => "MarkJoin",
            LogicalOperator::AggregateAndGroupBy { .. } => "AggregateAndGroupBy",
            LogicalOperator::Distinct => "Distinct",
            LogicalOperator::Limit { .. } => "Limit",
            LogicalOperator::Insert { .. } => "Insert",
            LogicalOperator::InsertSelect { .. } => "InsertSelect",
            LogicalOperator::Update { .. } => "Update",
            LogicalOperator::Delete { .. } => "Delete",
        }
    }
}

fn join_expressions(predicates: &[AnnotatedExpression]) -> String {
    predicates
        .iter()
        .map(|predicate| predicate.expression().to_string())
        .collect::<Vec<_>>()
        .join(" AND ")
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::Get {
                table,
                predicates,
                table_alias,
                is_for_update,
                ..
            } => {
                write!(f, "Get(table={}, alias={}", table, table_alias)?;
                if !predicates.is_empty() {
                    write!(f, ", predicates=[{}]", join_expressions(predicates))?;
                }
                if *is_for_update {
                    write!(f, ", for_update")?;
                }
                write!(f, ")")
            }
            LogicalOperator::QueryDerivedGet { table_alias, .. } => {
                write!(f, "QueryDerivedGet(alias={})", table_alias)
            }
            LogicalOperator::ExternalFileGet { file } => {
                write!(f, "ExternalFileGet({}, {})", file.format, file.path)
            }
            LogicalOperator::ExportExternalFile { file } => {
                write!(f, "ExportExternalFile({}, {})", file.format, file.path)
            }
            LogicalOperator::Filter { predicates } => {
                write!(f, "Filter({})", join_expressions(predicates))
            }
            LogicalOperator::OuterJoin { condition }
            | LogicalOperator::LeftJoin { condition }
            | LogicalOperator::RightJoin { condition }
            | LogicalOperator::SemiJoin { condition } => {
                write!(f, "{}({})", self.name(), condition)
            }
            LogicalOperator::AggregateAndGroupBy { group_by } => {
                if group_by.is_empty() {
                    write!(f, "AggregateAndGroupBy")
                } else {
                    let columns = group_by
                        .iter()
                        .map(|column| column.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(f, "AggregateAndGroupBy([{}])", columns)
                }
            }
            LogicalOperator::Limit { offset, limit, .. } => {
                write!(f, "Limit(offset={}, limit={})", offset, limit)
            }
            LogicalOperator::Insert { table, columns, values, .. } => {
                write!(
                    f,
                    "Insert(table={}, columns={}, rows={})",
                    table,
                    columns.len(),
                    values.len()
                )
            }
            LogicalOperator::InsertSelect { table, .. } => {
                write!(f, "InsertSelect(table={})", table)
            }
            LogicalOperator::Update { table, table_alias, updates, .. } => {
                let clauses = updates
                    .iter()
                    .map(|clause| format!("{} := {}", clause.column, clause.value))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "Update(table={}, alias={}, [{}])", table, table_alias, clauses)
            }
            LogicalOperator::Delete { table, .. } => write!(f, "Delete(table={})", table),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// A node in the logical operator tree
///
/// Each node owns its ordered children; the root returned by the planner
/// owns the whole tree.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorNode {
    op: LogicalOperator,
    children: Vec<OperatorNode>,
}

impl OperatorNode {
    pub fn new(op: LogicalOperator, children: Vec<OperatorNode>) -> Self {
        OperatorNode { op, children }
    }

    pub fn leaf(op: LogicalOperator) -> Self {
        OperatorNode {
            op,
            children: Vec::new(),
        }
    }

    pub fn op(&self) -> &LogicalOperator {
        &self.op
    }

    pub fn children(&self) -> &[OperatorNode] {
        &self.children
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.op, indent = indent * 2)?;
        for child in &self.children {
            child.fmt_indented(f, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for OperatorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
