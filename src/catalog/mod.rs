// Catalog Management Module
//
// This module is responsible for the schema metadata the planner consumes:
// databases, the default namespace, and table schemas, addressed by the
// ids that logical operators carry.

pub mod column;
pub mod table;

// Re-export key types
pub use self::column::{Column, ColumnSpec, DataType};
pub use self::table::Table;

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use thiserror::Error;

use crate::common::types::{ColumnId, DatabaseId, NamespaceId, TableId};

/// Name of the database used when a statement does not qualify one
pub const DEFAULT_DATABASE: &str = "quilldb";

// Global catalog instance using a thread-safe lazy initialization
static CATALOG_INSTANCE: Lazy<Arc<RwLock<Catalog>>> =
    Lazy::new(|| Arc::new(RwLock::new(Catalog::new())));

/// Errors from catalog lookups and mutations
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("database \"{0}\" does not exist")]
    DatabaseNotFound(String),
    #[error("relation \"{0}\" does not exist")]
    TableNotFound(String),
    #[error("no schema registered for table id {0}")]
    UnknownTableId(TableId),
    #[error("relation \"{0}\" already exists")]
    TableExists(String),
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// The Catalog is the central repository for all database schema information
pub struct Catalog {
    /// Registered databases by name
    databases: HashMap<String, DatabaseId>,
    /// Id of the namespace unqualified table names resolve into
    default_namespace: NamespaceId,
    /// Tables of the default namespace, by name
    tables: HashMap<String, TableId>,
    /// Table schemas by table id
    schemas: HashMap<TableId, Table>,
    next_database_id: DatabaseId,
    next_table_id: TableId,
    next_column_id: ColumnId,
}

impl Catalog {
    /// Get the global catalog instance
    pub fn instance() -> Arc<RwLock<Catalog>> {
        CATALOG_INSTANCE.clone()
    }

    /// Create a new catalog holding only the default database and namespace
    pub fn new() -> Self {
        let mut databases = HashMap::new();
        databases.insert(DEFAULT_DATABASE.to_string(), 1);

        Catalog {
            databases,
            default_namespace: 1,
            tables: HashMap::new(),
            schemas: HashMap::new(),
            next_database_id: 2,
            next_table_id: 1,
            next_column_id: 1,
        }
    }

    /// Register a database, returning its id; registering an existing name
    /// returns the id it already has
    pub fn create_database(&mut self, name: &str) -> DatabaseId {
        if let Some(id) = self.databases.get(name) {
            return *id;
        }
        let id = self.next_database_id;
        self.next_database_id += 1;
        self.databases.insert(name.to_string(), id);
        id
    }

    /// Create a table in the default namespace and return its id
    pub fn create_table(&mut self, name: &str, columns: Vec<ColumnSpec>) -> CatalogResult<TableId> {
        if self.tables.contains_key(name) {
            return Err(CatalogError::TableExists(name.to_string()));
        }
        let id = self.next_table_id;
        self.next_table_id += 1;

        let columns = columns
            .into_iter()
            .map(|spec| {
                let column_id = self.next_column_id;
                self.next_column_id += 1;
                Column::from_spec(column_id, spec)
            })
            .collect();

        self.tables.insert(name.to_string(), id);
        self.schemas.insert(id, Table::new(id, name.to_string(), columns));
        Ok(id)
    }

    /// Resolve a database name to its id; `None` resolves the default database
    pub fn database_id(&self, name: Option<&str>) -> CatalogResult<DatabaseId> {
        let name = name.unwrap_or(DEFAULT_DATABASE);
        self.databases
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::DatabaseNotFound(name.to_string()))
    }

    /// Id of the namespace used for unqualified table names
    pub fn default_namespace_id(&self) -> NamespaceId {
        self.default_namespace
    }

    /// Resolve a table name in the default namespace to its id
    pub fn table_id(&self, name: &str) -> CatalogResult<TableId> {
        self.tables
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    /// Get the schema of a table by id
    pub fn table_schema(&self, id: TableId) -> CatalogResult<&Table> {
        self.schemas.get(&id).ok_or(CatalogError::UnknownTableId(id))
    }

    /// Get the schema of a table by name
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name).and_then(|id| self.schemas.get(id))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog::new()
    }
}
