// Logical Planner
//
// This module lowers bound SQL statements into trees of logical operators.
// Row subqueries in supported predicate positions are unnested into mark
// or single joins; conjunctive predicates are split, annotated with the
// table aliases they reference, and carried on Filter and Get nodes for
// the downstream rewrite passes to place.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::RwLock;

use crate::catalog::{Catalog, Table};
use crate::common::types::{ColumnId, DatabaseId, NamespaceId, TableId};
use crate::query::ast::{
    CopyStatement, DeleteStatement, Expression, ExpressionKind, InsertSource, InsertStatement,
    JoinRef, JoinType, SelectStatement, Statement, TableName, TableRef, UpdateStatement,
};

use super::error::{PlanError, PlanResult};
use super::operators::{LogicalOperator, OperatorNode};
use super::predicates::{
    extract_predicates, is_supported_conjunct, split_conjunction, AnnotatedExpression,
};

/// Lowers one bound statement at a time into a logical operator tree
pub struct LogicalPlanner {
    /// Catalog used to resolve statement targets
    catalog: Arc<RwLock<Catalog>>,
    /// Conjuncts deposited by table-reference lowering (inner-join ON
    /// clauses) and drained by the enclosing SELECT's WHERE processing
    predicates: Vec<AnnotatedExpression>,
}

impl LogicalPlanner {
    /// Create a planner over the given catalog
    pub fn new(catalog: Arc<RwLock<Catalog>>) -> Self {
        LogicalPlanner {
            catalog,
            predicates: Vec::new(),
        }
    }

    /// Lower `statement` to a logical operator tree.
    ///
    /// The statement is rewritten in place where subquery unnesting
    /// applies: a rewritten predicate ends up referencing the subquery's
    /// projected column, and its kind changes (IN becomes =, EXISTS
    /// becomes IS NOT NULL).
    pub fn plan_statement(&mut self, statement: &mut Statement) -> PlanResult<OperatorNode> {
        debug!("planning {}", statement);
        self.predicates.clear();
        match statement {
            Statement::Select(select) => self.plan_select(select),
            Statement::Insert(insert) => self.plan_insert(insert),
            Statement::Update(update) => self.plan_update(update),
            Statement::Delete(delete) => self.plan_delete(delete),
            Statement::Copy(copy) => self.plan_copy(copy),
        }
    }

    fn plan_select(&mut self, select: &mut SelectStatement) -> PlanResult<OperatorNode> {
        // Nested SELECTs must not observe the conjuncts of their parents.
        let outer_predicates = std::mem::take(&mut self.predicates);

        let mut plan = match select.from.as_mut() {
            Some(table_ref) => self.plan_table_ref(table_ref)?,
            None => OperatorNode::leaf(LogicalOperator::dummy_get()),
        };

        if let Some(condition) = select.where_clause.as_mut() {
            let mut conjuncts = std::mem::take(&mut self.predicates);
            plan = self.collect_predicates(condition, plan, &mut conjuncts)?;
            self.predicates = conjuncts;
        }
        if !self.predicates.is_empty() {
            let predicates = std::mem::take(&mut self.predicates);
            plan = OperatorNode::new(LogicalOperator::Filter { predicates }, vec![plan]);
        }

        if requires_aggregation(select)? {
            let group_by = select.group_by.clone().unwrap_or_default();
            plan = OperatorNode::new(LogicalOperator::AggregateAndGroupBy { group_by }, vec![plan]);

            if let Some(having) = select.having.as_mut() {
                let mut having_predicates = Vec::new();
                plan = self.collect_predicates(having, plan, &mut having_predicates)?;
                if !having_predicates.is_empty() {
                    plan = OperatorNode::new(
                        LogicalOperator::Filter {
                            predicates: having_predicates,
                        },
                        vec![plan],
                    );
                }
            }
        }

        if select.distinct {
            plan = OperatorNode::new(LogicalOperator::Distinct, vec![plan]);
        }

        if let Some(limit) = &select.limit {
            if limit.limit != -1 {
                let (sort_exprs, sort_directions) = match &select.order_by {
                    Some(order_by) => (order_by.expressions.clone(), order_by.directions.clone()),
                    None => (Vec::new(), Vec::new()),
                };
                plan = OperatorNode::new(
                    LogicalOperator::Limit {
                        offset: limit.offset,
                        limit: limit.limit,
                        sort_exprs,
                        sort_directions,
                    },
                    vec![plan],
                );
            }
        }

        self.predicates = outer_predicates;
        Ok(plan)
    }

    fn plan_table_ref(&mut self, table_ref: &mut TableRef) -> PlanResult<OperatorNode> {
        match table_ref {
            TableRef::Derived { alias, select } => {
                // The alias map is built from the inner projection before
                // lowering so subquery rewrites cannot disturb it.
                let table_alias = alias.to_lowercase();
                let alias_to_expr = select_alias_map(&select.columns);
                let child = self.plan_select(select)?;
                Ok(OperatorNode::new(
                    LogicalOperator::QueryDerivedGet {
                        table_alias,
                        alias_to_expr,
                    },
                    vec![child],
                ))
            }
            TableRef::Join(join) => self.plan_join(join),
            TableRef::CrossProduct(tables) => match tables.as_mut_slice() {
                [] => Err(PlanError::Internal("empty FROM list")),
                [single] => self.plan_table_ref(single),
                [first, rest @ ..] => {
                    // Left-deep tree of condition-free inner joins, in
                    // FROM-list order.
                    let mut plan = self.plan_table_ref(first)?;
                    for table in rest {
                        let right = self.plan_table_ref(table)?;
                        plan = OperatorNode::new(LogicalOperator::InnerJoin, vec![plan, right]);
                    }
                    Ok(plan)
                }
            },
            TableRef::Base(name) => self.plan_base_table(name),
        }
    }

    fn plan_join(&mut self, join: &mut JoinRef) -> PlanResult<OperatorNode> {
        let left = self.plan_table_ref(&mut join.left)?;
        let mut right = self.plan_table_ref(&mut join.right)?;

        let op = match join.join_type {
            JoinType::Inner => {
                // ON conjuncts are absorbed by the enclosing SELECT's filter.
                let mut conjuncts = std::mem::take(&mut self.predicates);
                right = self.collect_predicates(&mut join.condition, right, &mut conjuncts)?;
                self.predicates = conjuncts;
                LogicalOperator::InnerJoin
            }
            JoinType::Outer => LogicalOperator::OuterJoin {
                condition: join.condition.clone(),
            },
            JoinType::Left => LogicalOperator::LeftJoin {
                condition: join.condition.clone(),
            },
            JoinType::Right => LogicalOperator::RightJoin {
                condition: join.condition.clone(),
            },
            JoinType::Semi => LogicalOperator::SemiJoin {
                condition: join.condition.clone(),
            },
        };
        Ok(OperatorNode::new(op, vec![left, right]))
    }

    fn plan_base_table(&self, name: &TableName) -> PlanResult<OperatorNode> {
        let (database, namespace, table) = self.resolve_table(name)?;
        Ok(OperatorNode::leaf(LogicalOperator::Get {
            database,
            namespace,
            table,
            predicates: Vec::new(),
            table_alias: name.alias().to_string(),
            is_for_update: false,
        }))
    }

    fn resolve_table(&self, name: &TableName) -> PlanResult<(DatabaseId, NamespaceId, TableId)> {
        let catalog = self.catalog.read();
        let database = catalog.database_id(name.database.as_deref())?;
        let namespace = catalog.default_namespace_id();
        let table = catalog.table_id(&name.table)?;
        Ok((database, namespace, table))
    }

    fn plan_insert(&mut self, insert: &mut InsertStatement) -> PlanResult<OperatorNode> {
        let (database, namespace, table) = self.resolve_table(&insert.table)?;

        match &mut insert.source {
            InsertSource::Select(select) => {
                let child = self.plan_select(select)?;
                Ok(OperatorNode::new(
                    LogicalOperator::InsertSelect {
                        database,
                        namespace,
                        table,
                    },
                    vec![child],
                ))
            }
            InsertSource::Values { columns, values } => {
                let catalog = self.catalog.read();
                let schema = catalog.table_schema(table)?;
                let column_ids = if columns.is_empty() {
                    conform_implicit_columns(schema, values)?
                } else {
                    conform_explicit_columns(schema, &insert.table.table, columns, values)?
                };
                Ok(OperatorNode::leaf(LogicalOperator::Insert {
                    database,
                    namespace,
                    table,
                    columns: column_ids,
                    values: values.clone(),
                }))
            }
        }
    }

    fn plan_delete(&mut self, delete: &mut DeleteStatement) -> PlanResult<OperatorNode> {
        let (database, namespace, table) = self.resolve_table(&delete.table)?;

        let mut predicates = Vec::new();
        if let Some(condition) = &delete.where_clause {
            extract_predicates(condition, &mut predicates);
        }
        let scan = OperatorNode::leaf(LogicalOperator::Get {
            database,
            namespace,
            table,
            predicates,
            table_alias: delete.table.alias().to_string(),
            is_for_update: true,
        });

        Ok(OperatorNode::new(
            LogicalOperator::Delete {
                database,
                namespace,
                table,
            },
            vec![scan],
        ))
    }

    fn plan_update(&mut self, update: &mut UpdateStatement) -> PlanResult<OperatorNode> {
        let (database, namespace, table) = self.resolve_table(&update.table)?;

        let mut predicates = Vec::new();
        if let Some(condition) = &update.where_clause {
            extract_predicates(condition, &mut predicates);
        }
        let scan = OperatorNode::leaf(LogicalOperator::Get {
            database,
            namespace,
            table,
            predicates,
            table_alias: update.table.alias().to_string(),
            is_for_update: true,
        });

        Ok(OperatorNode::new(
            LogicalOperator::Update {
                database,
                namespace,
                table_alias: update.table.alias().to_string(),
                table,
                updates: update.updates.clone(),
            },
            vec![scan],
        ))
    }

    fn plan_copy(&mut self, copy: &mut CopyStatement) -> PlanResult<OperatorNode> {
        if copy.is_from {
            // Reading a file into a table: an external-file scan as the
            // leaf, an insert as the root.
            let Some(target) = &copy.table else {
                return Err(PlanError::Internal("COPY FROM requires a bound target table"));
            };
            let (database, namespace, table) = self.resolve_table(target)?;
            let source = OperatorNode::leaf(LogicalOperator::ExternalFileGet {
                file: copy.file.clone(),
            });
            Ok(OperatorNode::new(
                LogicalOperator::InsertSelect {
                    database,
                    namespace,
                    table,
                },
                vec![source],
            ))
        } else {
            let child = match (&mut copy.select, &copy.table) {
                (Some(select), _) => self.plan_select(select)?,
                (None, Some(table)) => self.plan_base_table(table)?,
                (None, None) => {
                    return Err(PlanError::Internal("COPY TO requires a table or query source"))
                }
            };
            Ok(OperatorNode::new(
                LogicalOperator::ExportExternalFile {
                    file: copy.file.clone(),
                },
                vec![child],
            ))
        }
    }

    /// Check that every conjunct of `condition` is supported, rewrite
    /// subquery predicates against `plan`, then split and annotate the
    /// result into `sink`
    fn collect_predicates(
        &mut self,
        condition: &mut Expression,
        plan: OperatorNode,
        sink: &mut Vec<AnnotatedExpression>,
    ) -> PlanResult<OperatorNode> {
        let mut atoms = Vec::new();
        split_conjunction(Some(&*condition), &mut atoms);
        if atoms.iter().any(|atom| !is_supported_conjunct(atom)) {
            return Err(PlanError::NotImplemented("predicate shape with subquery"));
        }

        // Rewriting first means the alias annotation sees the projected
        // column a subquery was replaced with.
        let plan = self.rewrite_expression(condition, plan)?;
        extract_predicates(condition, sink);
        Ok(plan)
    }

    /// Walk `expr`, unnesting row subqueries in rewritable positions; the
    /// current plan picks up a join per rewrite
    fn rewrite_expression(
        &mut self,
        expr: &mut Expression,
        mut plan: OperatorNode,
    ) -> PlanResult<OperatorNode> {
        match expr.kind() {
            ExpressionKind::CompareIn => {
                let (next, rewritten) = self.unnest_subquery(expr, 1, plan, false)?;
                plan = next;
                if rewritten {
                    expr.set_kind(ExpressionKind::CompareEqual);
                }
            }
            kind if kind.is_scalar_comparison() => {
                let both_subqueries = matches!(
                    expr.children(),
                    [left, right]
                        if left.kind() == ExpressionKind::RowSubquery
                            && right.kind() == ExpressionKind::RowSubquery
                );
                if both_subqueries {
                    return Err(PlanError::NotImplemented("comparison between two sub-selects"));
                }
                let (next, rewritten) = self.unnest_subquery(expr, 0, plan, true)?;
                plan = next;
                if !rewritten {
                    let (next, _) = self.unnest_subquery(expr, 1, plan, true)?;
                    plan = next;
                }
            }
            ExpressionKind::Exists => {
                let (next, rewritten) = self.unnest_subquery(expr, 0, plan, false)?;
                plan = next;
                if rewritten {
                    expr.set_kind(ExpressionKind::IsNotNull);
                }
            }
            _ => {}
        }

        for child in expr.children_mut() {
            plan = self.rewrite_expression(child, plan)?;
        }
        Ok(plan)
    }

    /// Rewrite the row subquery at `parent.children[slot]` into a join
    /// against `plan`, replacing the slot with the subquery's projected
    /// column. Returns the (possibly new) plan and whether a rewrite
    /// happened; a non-subquery slot is left untouched.
    fn unnest_subquery(
        &mut self,
        parent: &mut Expression,
        slot: usize,
        plan: OperatorNode,
        single_join: bool,
    ) -> PlanResult<(OperatorNode, bool)> {
        let Some(subselect) = parent.child(slot).and_then(Expression::subselect) else {
            return Ok((plan, false));
        };
        if !is_supported_subselect(subselect) {
            return Err(PlanError::NotImplemented("correlated sub-select shape"));
        }
        if subselect.columns.len() != 1 {
            return Err(PlanError::NotImplemented(
                "sub-select with more than one output column",
            ));
        }
        trace!(
            "unnesting sub-select at depth {} into a {} join",
            subselect.depth,
            if single_join { "single" } else { "mark" }
        );

        let mut subselect = subselect.clone();
        let sub_plan = self.plan_select(&mut subselect)?;

        let join = if single_join {
            LogicalOperator::SingleJoin
        } else {
            LogicalOperator::MarkJoin
        };
        let plan = OperatorNode::new(join, vec![plan, sub_plan]);

        parent.replace_child(slot, subselect.columns.swap_remove(0));
        Ok((plan, true))
    }
}

/// Whether lowering `select` must insert an aggregation operator
///
/// True when the statement has a GROUP BY or any projection entry contains
/// an aggregate call. A projection mixing aggregate and plain expressions
/// without GROUP BY is rejected here even though the binder usually
/// catches it first.
pub fn requires_aggregation(select: &SelectStatement) -> PlanResult<bool> {
    if select.group_by.is_some() {
        return Ok(true);
    }

    let mut has_aggregates = false;
    let mut has_plain = false;
    for expr in &select.columns {
        if expr.contains_aggregate() {
            has_aggregates = true;
        } else {
            has_plain = true;
        }
    }
    if has_aggregates && has_plain {
        return Err(PlanError::UngroupedExpression);
    }
    Ok(has_aggregates)
}

/// Whether the rewriter can unnest `select`
///
/// Every correlated conjunct in its WHERE clause must be an equality
/// between an outer column value and an expression rooted at the
/// subselect's own depth; any other correlated shape cannot be expressed
/// with a mark or single join.
fn is_supported_subselect(select: &SelectStatement) -> bool {
    let mut atoms = Vec::new();
    split_conjunction(select.where_clause.as_ref(), &mut atoms);

    for atom in atoms {
        if atom.depth() >= select.depth {
            continue;
        }
        if atom.kind() != ExpressionKind::CompareEqual {
            return false;
        }
        let [left, right] = atom.children() else {
            return false;
        };
        let decorrelatable = (right.depth() == select.depth
            && left.kind() == ExpressionKind::ColumnValue)
            || (left.depth() == select.depth && right.kind() == ExpressionKind::ColumnValue);
        if !decorrelatable {
            return false;
        }
    }
    true
}

/// Map each projection entry's output name to its defining expression
///
/// The name is the explicit alias when present and the column name for
/// bare column values; other entries contribute nothing. Keys are
/// lowercased, and later entries overwrite earlier ones.
pub fn select_alias_map(columns: &[Expression]) -> HashMap<String, Expression> {
    let mut map = HashMap::new();
    for expr in columns {
        let name = match expr.alias() {
            Some(alias) => alias.to_string(),
            None => match expr.column_name() {
                Some(column) => column.to_string(),
                None => continue,
            },
        };
        map.insert(name.to_lowercase(), expr.clone());
    }
    map
}

/// INSERT without a column list: tuples bind schema columns positionally,
/// and every trailing column a tuple omits must be nullable or defaulted
fn conform_implicit_columns(
    schema: &Table,
    values: &[Vec<Expression>],
) -> PlanResult<Vec<ColumnId>> {
    let columns = schema.columns();
    for tuple in values {
        if tuple.len() > columns.len() {
            return Err(PlanError::TooManyExpressions);
        }
        for column in &columns[tuple.len()..] {
            if !column.is_nullable() && column.default_value().is_none() {
                return Err(PlanError::NotNullViolation(column.name().to_string()));
            }
        }
    }
    Ok(columns.iter().map(|column| column.id()).collect())
}

/// INSERT with a column list: tuple arity must match the list exactly, and
/// every schema column outside the list must be nullable or defaulted.
/// Emitted ids follow statement order, first occurrence winning.
fn conform_explicit_columns(
    schema: &Table,
    relation: &str,
    columns: &[String],
    values: &[Vec<Expression>],
) -> PlanResult<Vec<ColumnId>> {
    for tuple in values {
        if tuple.len() > columns.len() {
            return Err(PlanError::TooManyExpressions);
        }
        if tuple.len() < columns.len() {
            return Err(PlanError::TooManyTargetColumns);
        }
    }

    let mut specified = HashSet::new();
    let mut column_ids = Vec::with_capacity(columns.len());
    for name in columns {
        let column = schema
            .get_column(name)
            .ok_or_else(|| PlanError::UndefinedColumn {
                column: name.clone(),
                table: relation.to_string(),
            })?;
        if specified.insert(column.id()) {
            column_ids.push(column.id());
        }
    }

    for column in schema.columns() {
        if !specified.contains(&column.id())
            && !column.is_nullable()
            && column.default_value().is_none()
        {
            return Err(PlanError::NotNullViolation(column.name().to_string()));
        }
    }
    Ok(column_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{AggregateFunction, Value};

    fn column(table: &str, name: &str) -> Expression {
        Expression::column(Some(table), name)
    }

    #[test]
    fn test_alias_map_uses_alias_then_column_name() {
        let columns = vec![
            column("t", "x").with_alias("A"),
            column("t", "y"),
            Expression::literal(Value::Integer(3)),
        ];
        let map = select_alias_map(&columns);

        let mut keys = map.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_alias_map_later_entries_overwrite() {
        let columns = vec![
            column("t", "x").with_alias("n"),
            column("t", "y").with_alias("N"),
        ];
        let map = select_alias_map(&columns);

        assert_eq!(map.len(), 1);
        assert_eq!(map["n"].column_name(), Some("y"));
    }

    #[test]
    fn test_requires_aggregation_with_group_by() {
        let select = SelectStatement {
            columns: vec![column("t", "a")],
            group_by: Some(vec![column("t", "a")]),
            ..Default::default()
        };
        assert!(requires_aggregation(&select).unwrap());
    }

    #[test]
    fn test_requires_aggregation_with_aggregate_projection() {
        let select = SelectStatement {
            columns: vec![Expression::aggregate(AggregateFunction::Count, None)],
            ..Default::default()
        };
        assert!(requires_aggregation(&select).unwrap());

        let plain = SelectStatement {
            columns: vec![column("t", "a")],
            ..Default::default()
        };
        assert!(!requires_aggregation(&plain).unwrap());
    }

    #[test]
    fn test_mixed_projection_without_group_by_is_rejected() {
        let select = SelectStatement {
            columns: vec![
                column("t", "a"),
                Expression::aggregate(AggregateFunction::Count, None),
            ],
            ..Default::default()
        };
        let err = requires_aggregation(&select).unwrap_err();
        assert!(matches!(err, PlanError::UngroupedExpression));
    }

    #[test]
    fn test_supported_subselect_shapes() {
        // Uncorrelated: always supported.
        let uncorrelated = SelectStatement {
            columns: vec![column("t2", "b").at_depth(1)],
            depth: 1,
            ..Default::default()
        };
        assert!(is_supported_subselect(&uncorrelated));

        // Correlated equality against an outer column: supported.
        let correlated_eq = SelectStatement {
            columns: vec![column("t2", "b").at_depth(1)],
            where_clause: Some(Expression::comparison(
                ExpressionKind::CompareEqual,
                column("t2", "b").at_depth(1),
                column("t1", "a"),
            )),
            depth: 1,
            ..Default::default()
        };
        assert!(is_supported_subselect(&correlated_eq));

        // Correlated non-equality: not supported.
        let correlated_lt = SelectStatement {
            columns: vec![Expression::literal(Value::Integer(1))],
            where_clause: Some(Expression::comparison(
                ExpressionKind::CompareLess,
                column("t2", "x").at_depth(1),
                column("t1", "y"),
            )),
            depth: 1,
            ..Default::default()
        };
        assert!(!is_supported_subselect(&correlated_lt));

        // Correlated equality between two outer columns: not decorrelatable.
        let outer_only = SelectStatement {
            columns: vec![column("t2", "b").at_depth(1)],
            where_clause: Some(Expression::comparison(
                ExpressionKind::CompareEqual,
                column("t1", "a"),
                column("t1", "b"),
            )),
            depth: 1,
            ..Default::default()
        };
        assert!(!is_supported_subselect(&outer_only));
    }
}
