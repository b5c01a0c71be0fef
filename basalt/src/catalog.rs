//! Read only metadata lookup used while planning.
use std::collections::HashMap;
use std::sync::Arc;

use strum_macros::AsRefStr;

use crate::error::{BasaltError, BasaltResult, LookupKind};
use crate::properties::DataModel;
use crate::types::{AlgDataType, AlgDataTypeField};

/// Where the rows of a table live, decides which scan implementation applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr)]
pub enum TableSource {
    /// Held by the engine itself, scanned by the enumerable engine.
    Memory,
    /// Held by an external relational store, scanned through jdbc.
    Jdbc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTable {
    id: usize,
    namespace: String,
    name: String,
    model: DataModel,
    source: TableSource,
    row_type: AlgDataType,
}

impl CatalogTable {
    /// Relational table with `row_type` columns.
    pub fn new<S: Into<String>>(
        namespace: S,
        name: S,
        source: TableSource,
        row_type: AlgDataType,
    ) -> Self {
        Self {
            id: 0,
            namespace: namespace.into(),
            name: name.into(),
            model: DataModel::Relational,
            source,
            row_type,
        }
    }

    /// Document collection, every row holds one document.
    pub fn collection<S: Into<String>>(namespace: S, name: S, source: TableSource) -> Self {
        Self {
            id: 0,
            namespace: namespace.into(),
            name: name.into(),
            model: DataModel::Document,
            source,
            row_type: AlgDataType::document_row(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> DataModel {
        self.model
    }

    pub fn source(&self) -> TableSource {
        self.source
    }

    pub fn row_type(&self) -> &AlgDataType {
        &self.row_type
    }
}

/// Metadata lookup, misses are reported as [`BasaltError::Unknown`].
pub trait Catalog: Send + Sync {
    fn table(&self, namespace: &str, name: &str) -> BasaltResult<Arc<CatalogTable>>;

    fn column<'a>(
        &self,
        table: &'a CatalogTable,
        name: &str,
    ) -> BasaltResult<&'a AlgDataTypeField> {
        table.row_type().field(name).ok_or_else(|| {
            BasaltError::unknown(
                LookupKind::Column,
                format!("{}.{}.{}", table.namespace(), table.name(), name),
            )
        })
    }
}

/// Catalog populated up front, then shared read only.
#[derive(Default)]
pub struct MemoryCatalog {
    tables: HashMap<(String, String), Arc<CatalogTable>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `table`, assigning its id.
    pub fn register_table(&mut self, mut table: CatalogTable) -> BasaltResult<Arc<CatalogTable>> {
        let key = (table.namespace.clone(), table.name.clone());
        if self.tables.contains_key(&key) {
            return Err(BasaltError::Config(format!(
                "Table {}.{} already registered",
                key.0, key.1
            )));
        }
        table.id = self.tables.len();
        let table = Arc::new(table);
        self.tables.insert(key, table.clone());
        Ok(table)
    }
}

impl Catalog for MemoryCatalog {
    fn table(&self, namespace: &str, name: &str) -> BasaltResult<Arc<CatalogTable>> {
        if let Some(table) = self.tables.get(&(namespace.to_string(), name.to_string())) {
            return Ok(table.clone());
        }
        if self.tables.keys().any(|(ns, _)| ns == namespace) {
            Err(BasaltError::unknown(
                LookupKind::Table,
                format!("{}.{}", namespace, name),
            ))
        } else {
            Err(BasaltError::unknown(LookupKind::Namespace, namespace))
        }
    }
}
