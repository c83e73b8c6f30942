use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use quilldb::catalog::{Catalog, ColumnSpec, DataType};
use quilldb::query::ast::{Expression, ExpressionKind, SelectStatement, TableName, TableRef, Value};
use quilldb::query::planner::{LogicalOperator, LogicalPlanner, OperatorNode};

// Build a catalog with the tables the planner scenarios use: a few TPC-C
// style tables plus two small generic ones for subquery tests.
#[allow(dead_code)]
pub fn test_catalog() -> Arc<RwLock<Catalog>> {
    let mut catalog = Catalog::new();

    catalog
        .create_table(
            "warehouse",
            vec![
                ColumnSpec::new("w_id", DataType::Integer).not_null(),
                ColumnSpec::new("w_name", DataType::Text),
                ColumnSpec::new("w_street_1", DataType::Text),
                ColumnSpec::new("w_ytd", DataType::Float),
            ],
        )
        .expect("create warehouse");

    catalog
        .create_table(
            "customer",
            vec![
                ColumnSpec::new("c_id", DataType::Integer).not_null(),
                ColumnSpec::new("c_d_id", DataType::Integer).not_null(),
                ColumnSpec::new("c_w_id", DataType::Integer).not_null(),
                ColumnSpec::new("c_first", DataType::Text),
                ColumnSpec::new("c_last", DataType::Text),
            ],
        )
        .expect("create customer");

    catalog
        .create_table(
            "history",
            vec![
                ColumnSpec::new("h_c_id", DataType::Integer).not_null(),
                ColumnSpec::new("h_c_d_id", DataType::Integer).not_null(),
                ColumnSpec::new("h_c_w_id", DataType::Integer).not_null(),
                ColumnSpec::new("h_d_id", DataType::Integer).not_null(),
                ColumnSpec::new("h_w_id", DataType::Integer).not_null(),
                ColumnSpec::new("h_date", DataType::Timestamp).not_null(),
                ColumnSpec::new("h_amount", DataType::Float).not_null(),
                ColumnSpec::new("h_data", DataType::Text).not_null(),
            ],
        )
        .expect("create history");

    catalog
        .create_table(
            "stock",
            vec![
                ColumnSpec::new("s_i_id", DataType::Integer).not_null(),
                ColumnSpec::new("s_quantity", DataType::Integer)
                    .not_null()
                    .with_default(Value::Integer(0)),
                ColumnSpec::new("s_remote_cnt", DataType::Integer),
            ],
        )
        .expect("create stock");

    catalog
        .create_table(
            "t1",
            vec![
                ColumnSpec::new("a", DataType::Integer),
                ColumnSpec::new("b", DataType::Integer),
            ],
        )
        .expect("create t1");

    catalog
        .create_table(
            "t2",
            vec![
                ColumnSpec::new("b", DataType::Integer),
                ColumnSpec::new("x", DataType::Integer),
                ColumnSpec::new("y", DataType::Integer),
            ],
        )
        .expect("create t2");

    Arc::new(RwLock::new(catalog))
}

#[allow(dead_code)]
pub fn planner(catalog: &Arc<RwLock<Catalog>>) -> LogicalPlanner {
    LogicalPlanner::new(catalog.clone())
}

// Expression shorthands

#[allow(dead_code)]
pub fn col(table: &str, name: &str) -> Expression {
    Expression::column(Some(table), name)
}

#[allow(dead_code)]
pub fn lit_int(value: i64) -> Expression {
    Expression::literal(Value::Integer(value))
}

#[allow(dead_code)]
pub fn lit_str(value: &str) -> Expression {
    Expression::literal(Value::String(value.to_string()))
}

#[allow(dead_code)]
pub fn eq(left: Expression, right: Expression) -> Expression {
    Expression::comparison(ExpressionKind::CompareEqual, left, right)
}

#[allow(dead_code)]
pub fn and(left: Expression, right: Expression) -> Expression {
    Expression::conjunction(left, right)
}

#[allow(dead_code)]
pub fn aliases(names: &[&str]) -> HashSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

// A SELECT over a single base table with the given projection.
#[allow(dead_code)]
pub fn select_from(table: &str, columns: Vec<Expression>) -> SelectStatement {
    SelectStatement {
        columns,
        from: Some(TableRef::Base(TableName::new(table))),
        ..Default::default()
    }
}

// Check the structural invariants every emitted tree must satisfy: join
// arity, non-empty filters, for-update scans exactly under UPDATE/DELETE,
// lowercased derived-table aliases, and aligned Limit sort vectors.
#[allow(dead_code)]
pub fn assert_valid_plan(root: &OperatorNode) {
    check_node(root, false);
}

fn check_node(node: &OperatorNode, for_update_scan: bool) {
    match node.op() {
        LogicalOperator::Get { is_for_update, .. } => {
            assert_eq!(
                *is_for_update, for_update_scan,
                "Get for-update flag out of place: {}",
                node
            );
        }
        LogicalOperator::Filter { predicates } => {
            assert!(!predicates.is_empty(), "Filter with no predicates: {}", node);
        }
        LogicalOperator::QueryDerivedGet {
            table_alias,
            alias_to_expr,
        } => {
            assert_eq!(table_alias, &table_alias.to_lowercase());
            for key in alias_to_expr.keys() {
                assert_eq!(key, &key.to_lowercase());
            }
        }
        LogicalOperator::Limit {
            sort_exprs,
            sort_directions,
            ..
        } => {
            assert_eq!(sort_exprs.len(), sort_directions.len());
        }
        _ => {}
    }

    if node.op().is_join() {
        assert_eq!(node.children().len(), 2, "join without two children: {}", node);
    }

    let children_for_update = matches!(
        node.op(),
        LogicalOperator::Update { .. } | LogicalOperator::Delete { .. }
    );
    for child in node.children() {
        check_node(child, children_for_update);
    }
}
