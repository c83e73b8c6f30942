// Column Management Module
//
// This module defines the Column type that represents a database column
// schema, together with the definition form used to create tables.

use serde::{Deserialize, Serialize};

use crate::common::types::ColumnId;
use crate::query::ast::Value;

/// Data types supported by the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
    Date,
    Timestamp,
}

/// Definition of a column as supplied to `Catalog::create_table`
///
/// Columns are nullable with no default unless the builder methods say
/// otherwise; the catalog assigns the column id.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub(crate) name: String,
    pub(crate) data_type: DataType,
    pub(crate) nullable: bool,
    pub(crate) default_value: Option<Value>,
}

impl ColumnSpec {
    pub fn new(name: &str, data_type: DataType) -> Self {
        ColumnSpec {
            name: name.to_string(),
            data_type,
            nullable: true,
            default_value: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Represents a column in a table schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column id, unique within the catalog
    id: ColumnId,
    /// Column name
    name: String,
    /// Column data type
    data_type: DataType,
    /// Whether this column can contain NULL values
    nullable: bool,
    /// Stored default value (if any)
    default_value: Option<Value>,
}

impl Column {
    pub(crate) fn from_spec(id: ColumnId, spec: ColumnSpec) -> Self {
        Column {
            id,
            name: spec.name,
            data_type: spec.data_type,
            nullable: spec.nullable,
            default_value: spec.default_value,
        }
    }

    /// Get the column id
    pub fn id(&self) -> ColumnId {
        self.id
    }

    /// Get the column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the column data type
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Check if the column can contain NULL values
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Get the stored default value (if any)
    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }
}
