use std::fmt::Formatter;

use crate::error::BasaltResult;
use crate::operator::{DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

/// Reads every row of a catalog table.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Scan {
    namespace: String,
    table: String,
}

impl Scan {
    pub fn new<S: Into<String>>(namespace: S, table: S) -> Self {
        Self {
            namespace: namespace.into(),
            table: table.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl OperatorTrait for Scan {
    fn derive_logical_prop(
        &self,
        _inputs: &[&LogicalProperty],
        context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        let table = context.catalog.table(&self.namespace, &self.table)?;
        Ok(LogicalProperty::new(
            table.row_type().clone(),
            table.model(),
            1,
        ))
    }
}

impl DisplayFields for Scan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("namespace", &self.namespace)
            .field("table", &self.table)
            .finish()
    }
}
