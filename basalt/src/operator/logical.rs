use std::fmt::{Display, Formatter};

use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use strum_macros::AsRefStr;

use crate::operator::{
    Aggregate, Calc, DisplayFields, DocumentAggregate, DocumentFilter, DocumentProject,
    DocumentSort, DocumentUnwind, Filter, Join, Project, Scan, Sort,
};
use crate::properties::DataModel;

/// Logical algebra operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner, AsRefStr)]
#[enum_dispatch]
pub enum LogicalOperator {
    LogicalScan(Scan),
    LogicalFilter(Filter),
    LogicalProject(Project),
    LogicalCalc(Calc),
    LogicalAggregate(Aggregate),
    LogicalSort(Sort),
    LogicalJoin(Join),
    LogicalDocumentFilter(DocumentFilter),
    LogicalDocumentProject(DocumentProject),
    LogicalDocumentAggregate(DocumentAggregate),
    LogicalDocumentSort(DocumentSort),
    LogicalDocumentUnwind(DocumentUnwind),
}

impl LogicalOperator {
    /// Data model the operator's expressions are written in.
    pub fn model(&self) -> DataModel {
        use LogicalOperator::*;
        match self {
            LogicalDocumentFilter(_)
            | LogicalDocumentProject(_)
            | LogicalDocumentAggregate(_)
            | LogicalDocumentSort(_)
            | LogicalDocumentUnwind(_) => DataModel::Document,
            _ => DataModel::Relational,
        }
    }
}

impl Display for LogicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())?;
        self.display(f)
    }
}
