// Predicate Toolkit
//
// Splitting AND trees into atoms, annotating atoms with the table aliases
// they reference, and recognizing the conjunct shapes the subquery
// rewriter supports.

use std::collections::HashSet;

use crate::query::ast::{Expression, ExpressionKind};

/// An atomic predicate paired with every table alias its column-value
/// descendants reference
///
/// Downstream rewrite passes use the alias set to decide where the
/// predicate can be placed.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedExpression {
    expression: Expression,
    table_aliases: HashSet<String>,
}

impl AnnotatedExpression {
    pub fn new(expression: Expression, table_aliases: HashSet<String>) -> Self {
        AnnotatedExpression {
            expression,
            table_aliases,
        }
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn table_aliases(&self) -> &HashSet<String> {
        &self.table_aliases
    }
}

/// Flatten an AND tree into its conjuncts
///
/// Non-AND nodes become single atoms regardless of their internal
/// structure; disjunctions are not split. A missing input yields no atoms.
pub fn split_conjunction<'a>(expr: Option<&'a Expression>, atoms: &mut Vec<&'a Expression>) {
    let Some(expr) = expr else {
        return;
    };
    if expr.kind() == ExpressionKind::ConjunctionAnd {
        for child in expr.children() {
            split_conjunction(Some(child), atoms);
        }
    } else {
        atoms.push(expr);
    }
}

/// Collect the table aliases referenced by column values under `expr`
pub fn collect_table_aliases(expr: &Expression, aliases: &mut HashSet<String>) {
    if expr.kind() == ExpressionKind::ColumnValue {
        if let Some(table) = expr.column_table() {
            aliases.insert(table.to_string());
        }
    } else {
        for child in expr.children() {
            collect_table_aliases(child, aliases);
        }
    }
}

/// Whether a conjunct has a shape the planner can lower
///
/// Conjuncts without subqueries always qualify. With a subquery the only
/// supported shapes are `x IN (SELECT ...)`, `EXISTS (SELECT ...)`, and a
/// scalar comparison with a subquery on exactly one side.
pub fn is_supported_conjunct(expr: &Expression) -> bool {
    if !expr.has_subquery() {
        return true;
    }
    match expr.kind() {
        ExpressionKind::CompareIn => match expr.children() {
            [left, right] => {
                left.kind() != ExpressionKind::RowSubquery
                    && right.kind() == ExpressionKind::RowSubquery
            }
            _ => false,
        },
        ExpressionKind::Exists => {
            matches!(expr.children(), [sub] if sub.kind() == ExpressionKind::RowSubquery)
        }
        kind if kind.is_scalar_comparison() => match expr.children() {
            [left, right] => {
                (!left.has_subquery() && right.kind() == ExpressionKind::RowSubquery)
                    || (!right.has_subquery() && left.kind() == ExpressionKind::RowSubquery)
            }
            _ => false,
        },
        _ => false,
    }
}

/// Split `expr` and annotate each atom with its referenced table aliases,
/// appending to `predicates` in split order
pub fn extract_predicates(expr: &Expression, predicates: &mut Vec<AnnotatedExpression>) {
    let mut atoms = Vec::new();
    split_conjunction(Some(expr), &mut atoms);

    for atom in atoms {
        let mut aliases = HashSet::new();
        collect_table_aliases(atom, &mut aliases);
        predicates.push(AnnotatedExpression::new(atom.clone(), aliases));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{SelectStatement, Value};

    fn column(table: &str, name: &str) -> Expression {
        Expression::column(Some(table), name)
    }

    fn equals(left: Expression, right: Expression) -> Expression {
        Expression::comparison(ExpressionKind::CompareEqual, left, right)
    }

    fn subquery() -> Expression {
        Expression::subquery(SelectStatement {
            columns: vec![column("t2", "b").at_depth(1)],
            depth: 1,
            ..Default::default()
        })
    }

    #[test]
    fn test_split_missing_input_is_empty() {
        let mut atoms = Vec::new();
        split_conjunction(None, &mut atoms);
        assert!(atoms.is_empty());
    }

    #[test]
    fn test_split_produces_atoms_in_order_for_both_associations() {
        let a = equals(column("t", "a"), Expression::literal(Value::Integer(1)));
        let b = equals(column("t", "b"), Expression::literal(Value::Integer(2)));
        let c = equals(column("t", "c"), Expression::literal(Value::Integer(3)));

        let left_assoc =
            Expression::conjunction(Expression::conjunction(a.clone(), b.clone()), c.clone());
        let right_assoc =
            Expression::conjunction(a.clone(), Expression::conjunction(b.clone(), c.clone()));

        for tree in [&left_assoc, &right_assoc] {
            let mut atoms = Vec::new();
            split_conjunction(Some(tree), &mut atoms);
            assert_eq!(atoms, vec![&a, &b, &c]);
        }
    }

    #[test]
    fn test_split_is_idempotent_at_the_list_level() {
        let a = equals(column("t", "a"), Expression::literal(Value::Integer(1)));
        let b = column("t", "flag");
        let tree = Expression::conjunction(a, b);

        let mut atoms = Vec::new();
        split_conjunction(Some(&tree), &mut atoms);

        let mut again = Vec::new();
        for atom in &atoms {
            split_conjunction(Some(atom), &mut again);
        }
        assert_eq!(atoms, again);
    }

    #[test]
    fn test_split_does_not_descend_into_disjunctions() {
        let a = equals(column("t", "a"), Expression::literal(Value::Integer(1)));
        let b = equals(column("t", "b"), Expression::literal(Value::Integer(2)));
        let or = Expression::disjunction(a, b);

        let mut atoms = Vec::new();
        split_conjunction(Some(&or), &mut atoms);
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].kind(), ExpressionKind::ConjunctionOr);
    }

    #[test]
    fn test_alias_collection_gathers_every_referenced_table() {
        let predicate = Expression::conjunction(
            equals(column("t1", "a"), column("t2", "b")),
            equals(column("t1", "c"), Expression::literal(Value::Integer(3))),
        );
        let mut aliases = HashSet::new();
        collect_table_aliases(&predicate, &mut aliases);

        let expected: HashSet<String> =
            ["t1".to_string(), "t2".to_string()].into_iter().collect();
        assert_eq!(aliases, expected);
    }

    #[test]
    fn test_supported_conjunct_shapes() {
        let plain = equals(column("t", "a"), Expression::literal(Value::Integer(1)));
        assert!(is_supported_conjunct(&plain));

        let in_subquery =
            Expression::comparison(ExpressionKind::CompareIn, column("t1", "a"), subquery());
        assert!(is_supported_conjunct(&in_subquery));

        let reversed_in =
            Expression::comparison(ExpressionKind::CompareIn, subquery(), column("t1", "a"));
        assert!(!is_supported_conjunct(&reversed_in));

        let exists = Expression::exists(subquery());
        assert!(is_supported_conjunct(&exists));

        let scalar = Expression::comparison(
            ExpressionKind::CompareLess,
            column("t1", "a"),
            subquery(),
        );
        assert!(is_supported_conjunct(&scalar));

        let both_sides =
            Expression::comparison(ExpressionKind::CompareEqual, subquery(), subquery());
        assert!(!is_supported_conjunct(&both_sides));

        let not_equal = Expression::comparison(
            ExpressionKind::CompareNotEqual,
            column("t1", "a"),
            subquery(),
        );
        assert!(!is_supported_conjunct(&not_equal));

        let disjunction = Expression::disjunction(
            Expression::comparison(ExpressionKind::CompareIn, column("t1", "a"), subquery()),
            plain,
        );
        assert!(!is_supported_conjunct(&disjunction));
    }

    #[test]
    fn test_extract_predicates_annotates_each_atom() {
        let predicate = Expression::conjunction(
            equals(column("t1", "a"), column("t2", "b")),
            equals(column("t1", "c"), Expression::literal(Value::Integer(3))),
        );

        let mut predicates = Vec::new();
        extract_predicates(&predicate, &mut predicates);

        assert_eq!(predicates.len(), 2);
        let first: HashSet<String> =
            ["t1".to_string(), "t2".to_string()].into_iter().collect();
        assert_eq!(predicates[0].table_aliases(), &first);
        let second: HashSet<String> = ["t1".to_string()].into_iter().collect();
        assert_eq!(predicates[1].table_aliases(), &second);
    }
}
