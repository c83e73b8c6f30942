// Bound SQL Abstract Syntax Tree
//
// This module defines the statement and expression forms produced by the
// binder. Every expression carries the scope depth assigned during binding
// and a has-subquery summary over its subtree; the planner relies on both.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A bound SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Copy(CopyStatement),
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(_) => write!(f, "SELECT statement"),
            Statement::Insert(_) => write!(f, "INSERT statement"),
            Statement::Update(_) => write!(f, "UPDATE statement"),
            Statement::Delete(_) => write!(f, "DELETE statement"),
            Statement::Copy(_) => write!(f, "COPY statement"),
        }
    }
}

/// SELECT statement representation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    /// Projection list; entries may carry output aliases
    pub columns: Vec<Expression>,
    /// SELECT DISTINCT
    pub distinct: bool,
    /// FROM clause (optional)
    pub from: Option<TableRef>,
    /// WHERE clause (optional)
    pub where_clause: Option<Expression>,
    /// GROUP BY expressions (optional)
    pub group_by: Option<Vec<Expression>>,
    /// HAVING clause (optional)
    pub having: Option<Expression>,
    /// ORDER BY clause (optional)
    pub order_by: Option<OrderByClause>,
    /// LIMIT/OFFSET clause (optional)
    pub limit: Option<LimitClause>,
    /// Scope depth assigned by the binder; outer scopes are smaller
    pub depth: i32,
}

/// ORDER BY clause: expressions with matching directions
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub expressions: Vec<Expression>,
    pub directions: Vec<OrderDirection>,
}

/// Sort direction of one ORDER BY entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// LIMIT/OFFSET clause; a limit of -1 means no limit was given
#[derive(Debug, Clone, PartialEq)]
pub struct LimitClause {
    pub limit: i64,
    pub offset: i64,
}

/// A (possibly qualified, possibly aliased) table name
#[derive(Debug, Clone, PartialEq)]
pub struct TableName {
    pub database: Option<String>,
    pub table: String,
    pub alias: Option<String>,
}

impl TableName {
    pub fn new(table: &str) -> Self {
        TableName {
            database: None,
            table: table.to_string(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn in_database(mut self, database: &str) -> Self {
        self.database = Some(database.to_string());
        self
    }

    /// The name this table is referenced by: its alias when present,
    /// otherwise the table name itself
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

/// Table reference in a FROM clause
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    /// A base table
    Base(TableName),
    /// Parenthesized SELECT with an alias (derived table)
    Derived {
        alias: String,
        select: Box<SelectStatement>,
    },
    /// Explicit JOIN
    Join(Box<JoinRef>),
    /// Comma-separated FROM list (implicit cross product)
    CrossProduct(Vec<TableRef>),
}

/// Explicit JOIN between two table references
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRef {
    pub join_type: JoinType,
    pub left: TableRef,
    pub right: TableRef,
    pub condition: Expression,
}

/// Types of SQL JOINs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Outer,
    Semi,
}

/// INSERT statement
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: TableName,
    pub source: InsertSource,
}

/// What an INSERT inserts: literal tuples or a bound SELECT
#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values {
        /// Explicit target columns; empty means the full schema order
        columns: Vec<String>,
        values: Vec<Vec<Expression>>,
    },
    Select(Box<SelectStatement>),
}

/// UPDATE statement
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: TableName,
    pub updates: Vec<UpdateClause>,
    pub where_clause: Option<Expression>,
}

/// Column assignment in UPDATE
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateClause {
    pub column: String,
    pub value: Expression,
}

/// DELETE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: TableName,
    pub where_clause: Option<Expression>,
}

/// COPY statement; `is_from` distinguishes file-to-table from table-to-file
#[derive(Debug, Clone, PartialEq)]
pub struct CopyStatement {
    pub table: Option<TableName>,
    pub select: Option<Box<SelectStatement>>,
    pub is_from: bool,
    pub file: ExternalFile,
}

/// External file descriptor of a COPY source or sink
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalFile {
    pub format: ExternalFileFormat,
    pub path: String,
    pub delimiter: char,
    pub quote: char,
    pub escape: char,
}

/// Formats COPY can read and write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalFileFormat {
    Csv,
    Binary,
}

impl fmt::Display for ExternalFileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalFileFormat::Csv => write!(f, "CSV"),
            ExternalFileFormat::Binary => write!(f, "BINARY"),
        }
    }
}

/// SQL values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

/// Aggregate function types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "COUNT"),
            AggregateFunction::Sum => write!(f, "SUM"),
            AggregateFunction::Avg => write!(f, "AVG"),
            AggregateFunction::Min => write!(f, "MIN"),
            AggregateFunction::Max => write!(f, "MAX"),
        }
    }
}

/// Expression kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    Literal,
    ColumnValue,
    Star,
    Aggregate,
    Function,
    Operator,
    CompareEqual,
    CompareNotEqual,
    CompareLess,
    CompareLessEqual,
    CompareGreater,
    CompareGreaterEqual,
    CompareIn,
    ConjunctionAnd,
    ConjunctionOr,
    Exists,
    IsNull,
    IsNotNull,
    RowSubquery,
}

impl ExpressionKind {
    /// Comparisons that can take part in a scalar-subquery rewrite
    pub fn is_scalar_comparison(&self) -> bool {
        matches!(
            self,
            ExpressionKind::CompareEqual
                | ExpressionKind::CompareLess
                | ExpressionKind::CompareLessEqual
                | ExpressionKind::CompareGreater
                | ExpressionKind::CompareGreaterEqual
        )
    }
}

/// Kind-specific payload of an expression node
#[derive(Debug, Clone, PartialEq)]
enum Payload {
    None,
    Column { table: Option<String>, name: String },
    Literal(Value),
    Aggregate(AggregateFunction),
    Function(String),
    Subquery(Box<SelectStatement>),
}

/// A bound expression node
///
/// Nodes are tagged with an `ExpressionKind` rather than being a pure sum
/// type so the planner's subquery rewrites can retag a node in place while
/// keeping its children. Constructors derive the scope depth (minimum
/// non-negative child depth, -1 when unresolved) and the has-subquery
/// summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    kind: ExpressionKind,
    depth: i32,
    has_subquery: bool,
    alias: Option<String>,
    payload: Payload,
    children: Vec<Expression>,
}

impl Expression {
    fn make(kind: ExpressionKind, payload: Payload, children: Vec<Expression>) -> Self {
        let mut depth = -1;
        for child in &children {
            if child.depth >= 0 && (depth < 0 || child.depth < depth) {
                depth = child.depth;
            }
        }
        let has_subquery =
            kind == ExpressionKind::RowSubquery || children.iter().any(|c| c.has_subquery);
        Expression {
            kind,
            depth,
            has_subquery,
            alias: None,
            payload,
            children,
        }
    }

    /// A literal value; its depth stays unresolved
    pub fn literal(value: Value) -> Self {
        Self::make(ExpressionKind::Literal, Payload::Literal(value), Vec::new())
    }

    /// A column reference resolved by the binder; the depth defaults to the
    /// outermost scope and is adjusted with `at_depth`
    pub fn column(table: Option<&str>, name: &str) -> Self {
        let mut expr = Self::make(
            ExpressionKind::ColumnValue,
            Payload::Column {
                table: table.map(str::to_string),
                name: name.to_string(),
            },
            Vec::new(),
        );
        expr.depth = 0;
        expr
    }

    /// The `*` projection
    pub fn star() -> Self {
        Self::make(ExpressionKind::Star, Payload::None, Vec::new())
    }

    /// A binary comparison; `kind` must be one of the comparison kinds
    pub fn comparison(kind: ExpressionKind, left: Expression, right: Expression) -> Self {
        Self::make(kind, Payload::None, vec![left, right])
    }

    /// `left AND right`
    pub fn conjunction(left: Expression, right: Expression) -> Self {
        Self::make(ExpressionKind::ConjunctionAnd, Payload::None, vec![left, right])
    }

    /// `left OR right`
    pub fn disjunction(left: Expression, right: Expression) -> Self {
        Self::make(ExpressionKind::ConjunctionOr, Payload::None, vec![left, right])
    }

    /// An aggregate call; `COUNT(*)` is an aggregate without an argument
    pub fn aggregate(function: AggregateFunction, argument: Option<Expression>) -> Self {
        let children = argument.into_iter().collect();
        Self::make(ExpressionKind::Aggregate, Payload::Aggregate(function), children)
    }

    /// A scalar function call
    pub fn function(name: &str, arguments: Vec<Expression>) -> Self {
        Self::make(
            ExpressionKind::Function,
            Payload::Function(name.to_string()),
            arguments,
        )
    }

    /// A generic operator expression, e.g. arithmetic
    pub fn operator(name: &str, operands: Vec<Expression>) -> Self {
        Self::make(
            ExpressionKind::Operator,
            Payload::Function(name.to_string()),
            operands,
        )
    }

    /// A parenthesized SELECT in expression position
    pub fn subquery(select: SelectStatement) -> Self {
        Self::make(
            ExpressionKind::RowSubquery,
            Payload::Subquery(Box::new(select)),
            Vec::new(),
        )
    }

    /// `EXISTS (...)` over a row subquery
    pub fn exists(subquery: Expression) -> Self {
        Self::make(ExpressionKind::Exists, Payload::None, vec![subquery])
    }

    /// Attach an output alias (SELECT list `AS` name)
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Override the binder scope depth of this node
    pub fn at_depth(mut self, depth: i32) -> Self {
        self.depth = depth;
        self
    }

    pub fn kind(&self) -> ExpressionKind {
        self.kind
    }

    pub(crate) fn set_kind(&mut self, kind: ExpressionKind) {
        self.kind = kind;
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn has_subquery(&self) -> bool {
        self.has_subquery
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn children(&self) -> &[Expression] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut [Expression] {
        &mut self.children
    }

    pub fn child(&self, index: usize) -> Option<&Expression> {
        self.children.get(index)
    }

    pub(crate) fn replace_child(&mut self, index: usize, expr: Expression) {
        self.children[index] = expr;
    }

    /// The inner SELECT of a row subquery
    pub fn subselect(&self) -> Option<&SelectStatement> {
        match &self.payload {
            Payload::Subquery(select) => Some(select),
            _ => None,
        }
    }

    /// Column name of a column-value expression
    pub fn column_name(&self) -> Option<&str> {
        match &self.payload {
            Payload::Column { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Table name of a column-value expression
    pub fn column_table(&self) -> Option<&str> {
        match &self.payload {
            Payload::Column { table, .. } => table.as_deref(),
            _ => None,
        }
    }

    /// Literal value of a literal expression
    pub fn value(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Aggregate function of an aggregate expression
    pub fn aggregate_function(&self) -> Option<AggregateFunction> {
        match &self.payload {
            Payload::Aggregate(function) => Some(*function),
            _ => None,
        }
    }

    /// Whether any node in this subtree is an aggregate call
    pub fn contains_aggregate(&self) -> bool {
        self.kind == ExpressionKind::Aggregate
            || self.children.iter().any(Expression::contains_aggregate)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ExpressionKind::Literal => match &self.payload {
                Payload::Literal(value) => write!(f, "{}", value),
                _ => write!(f, "?"),
            },
            ExpressionKind::ColumnValue => match &self.payload {
                Payload::Column { table: Some(table), name } => write!(f, "{}.{}", table, name),
                Payload::Column { table: None, name } => write!(f, "{}", name),
                _ => write!(f, "?"),
            },
            ExpressionKind::Star => write!(f, "*"),
            ExpressionKind::Aggregate => {
                let function = match &self.payload {
                    Payload::Aggregate(function) => function.to_string(),
                    _ => "?".to_string(),
                };
                match self.children.first() {
                    Some(argument) => write!(f, "{}({})", function, argument),
                    None => write!(f, "{}(*)", function),
                }
            }
            ExpressionKind::Function | ExpressionKind::Operator => {
                let name = match &self.payload {
                    Payload::Function(name) => name.as_str(),
                    _ => "?",
                };
                let arguments = self
                    .children
                    .iter()
                    .map(|child| child.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{}({})", name, arguments)
            }
            ExpressionKind::RowSubquery => write!(f, "(subquery)"),
            ExpressionKind::Exists => write!(f, "EXISTS (subquery)"),
            ExpressionKind::IsNull => match self.children.first() {
                Some(child) => write!(f, "{} IS NULL", child),
                None => write!(f, "IS NULL"),
            },
            ExpressionKind::IsNotNull => match self.children.first() {
                Some(child) => write!(f, "{} IS NOT NULL", child),
                None => write!(f, "IS NOT NULL"),
            },
            kind => {
                let symbol = match kind {
                    ExpressionKind::CompareEqual => "=",
                    ExpressionKind::CompareNotEqual => "!=",
                    ExpressionKind::CompareLess => "<",
                    ExpressionKind::CompareLessEqual => "<=",
                    ExpressionKind::CompareGreater => ">",
                    ExpressionKind::CompareGreaterEqual => ">=",
                    ExpressionKind::CompareIn => "IN",
                    ExpressionKind::ConjunctionAnd => "AND",
                    ExpressionKind::ConjunctionOr => "OR",
                    _ => "?",
                };
                match self.children.as_slice() {
                    [left, right] => write!(f, "({} {} {})", left, symbol, right),
                    _ => write!(f, "({})", symbol),
                }
            }
        }
    }
}
