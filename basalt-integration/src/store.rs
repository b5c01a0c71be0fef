use std::collections::HashMap;
use std::sync::Arc;

use basalt::catalog::{Catalog, CatalogTable, MemoryCatalog, TableSource};
use basalt::error::{BasaltError, BasaltResult, LookupKind};
use basalt::types::AlgDataType;
use serde_json::Value;

use crate::value::Row;

/// Tables and collections held in memory.
///
/// The store is also the catalog planning runs against, so plans and data can't disagree on
/// what exists.
#[derive(Default)]
pub struct MemoryStore {
    catalog: MemoryCatalog,
    rows: HashMap<(String, String), Vec<Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a relational table, every row must have one value per column.
    pub fn add_table<S: Into<String>>(
        &mut self,
        namespace: S,
        name: S,
        source: TableSource,
        row_type: AlgDataType,
        rows: Vec<Row>,
    ) -> BasaltResult<()> {
        let field_count = row_type.field_count();
        if let Some(row) = rows.iter().find(|row| row.len() != field_count) {
            return Err(BasaltError::Config(format!(
                "Row {:?} doesn't match {} columns",
                row, field_count
            )));
        }
        let table = self
            .catalog
            .register_table(CatalogTable::new(namespace, name, source, row_type))?;
        self.insert(&table, rows);
        Ok(())
    }

    /// Registers a collection of documents.
    pub fn add_collection<S: Into<String>>(
        &mut self,
        namespace: S,
        name: S,
        documents: Vec<Value>,
    ) -> BasaltResult<()> {
        let table = self.catalog.register_table(CatalogTable::collection(
            namespace,
            name,
            TableSource::Memory,
        ))?;
        self.insert(&table, documents.into_iter().map(|d| vec![d]).collect());
        Ok(())
    }

    fn insert(&mut self, table: &CatalogTable, rows: Vec<Row>) {
        self.rows.insert(
            (table.namespace().to_string(), table.name().to_string()),
            rows,
        );
    }

    pub fn rows(&self, namespace: &str, name: &str) -> BasaltResult<&[Row]> {
        self.rows
            .get(&(namespace.to_string(), name.to_string()))
            .map(|rows| rows.as_slice())
            .ok_or_else(|| BasaltError::unknown(LookupKind::Table, format!("{}.{}", namespace, name)))
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Catalog for MemoryStore {
    fn table(&self, namespace: &str, name: &str) -> BasaltResult<Arc<CatalogTable>> {
        self.catalog.table(namespace, name)
    }
}

#[cfg(test)]
mod tests {
    use basalt::catalog::{Catalog, TableSource};
    use basalt::error::BasaltError;
    use basalt::properties::DataModel;
    use basalt::types::{AlgDataType, PolyType, RecordTypeBuilder};
    use serde_json::json;

    use crate::store::MemoryStore;

    #[test]
    fn test_store_tables() {
        let mut store = MemoryStore::new();
        store
            .add_collection("shop", "orders", vec![json!({"amount": 10})])
            .unwrap();
        let row_type = RecordTypeBuilder::new()
            .add("id", AlgDataType::not_null(PolyType::Integer))
            .build()
            .unwrap();
        store
            .add_table(
                "public",
                "emp",
                TableSource::Memory,
                row_type.clone(),
                vec![vec![json!(1)]],
            )
            .unwrap();

        assert_eq!(DataModel::Document, store.table("shop", "orders").unwrap().model());
        assert_eq!(&[vec![json!({"amount": 10})]], store.rows("shop", "orders").unwrap());
        assert!(matches!(
            store.rows("public", "dept"),
            Err(BasaltError::Unknown { .. })
        ));
        assert!(matches!(
            store.add_table("public", "dept", TableSource::Memory, row_type, vec![vec![]]),
            Err(BasaltError::Config(_))
        ));
    }
}
