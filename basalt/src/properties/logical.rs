use strum_macros::{AsRefStr, Display};

use crate::types::AlgDataType;

/// Data model of the rows produced by an operator.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DataModel {
    Relational,
    Document,
    Graph,
}

#[derive(Clone, PartialEq, Debug)]
pub struct LogicalProperty {
    row_type: AlgDataType,
    model: DataModel,
    /// Number of base relations below, used to gate join reordering.
    relation_count: usize,
}

impl LogicalProperty {
    pub fn new(row_type: AlgDataType, model: DataModel, relation_count: usize) -> Self {
        Self {
            row_type,
            model,
            relation_count,
        }
    }

    pub fn row_type(&self) -> &AlgDataType {
        &self.row_type
    }

    pub fn model(&self) -> DataModel {
        self.model
    }

    pub fn relation_count(&self) -> usize {
        self.relation_count
    }

    pub fn field_count(&self) -> usize {
        self.row_type.field_count()
    }
}
