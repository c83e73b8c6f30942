// Table Management Module
//
// This module defines the Table type that represents a table schema:
// the table id plus its columns in schema order.

use serde::{Deserialize, Serialize};

use crate::common::types::TableId;

use super::column::Column;

/// Schema of a single table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table id, unique within the catalog
    id: TableId,
    /// Table name
    name: String,
    /// Columns in schema order
    columns: Vec<Column>,
}

impl Table {
    pub(crate) fn new(id: TableId, name: String, columns: Vec<Column>) -> Self {
        Table { id, name, columns }
    }

    /// Get the table id
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Get the table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in schema order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Case-sensitive lookup of a column by name
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name() == name)
    }
}
