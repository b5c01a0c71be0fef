use std::fmt::Formatter;

use crate::error::BasaltResult;
use crate::operator::{input_prop, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;
use crate::rex::RexNode;
use crate::types::{AlgDataType, RecordTypeBuilder};

/// Computes one output field per expression.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Project {
    exprs: Vec<RexNode>,
    names: Vec<String>,
}

impl Project {
    pub fn new(exprs: Vec<RexNode>, names: Vec<String>) -> Self {
        Self { exprs, names }
    }

    pub fn exprs(&self) -> &[RexNode] {
        &self.exprs
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether this projection returns its input unchanged.
    pub fn is_identity(&self, input_type: &AlgDataType) -> bool {
        self.exprs.len() == input_type.field_count()
            && self
                .exprs
                .iter()
                .zip(input_type.fields())
                .zip(&self.names)
                .all(|((expr, field), name)| {
                    matches!(expr.as_input_ref(), Some(r) if r.index() == field.index())
                        && field.name() == name
                })
    }
}

/// Row type of named expressions.
pub(crate) fn projection_type(exprs: &[RexNode], names: &[String]) -> BasaltResult<AlgDataType> {
    if exprs.len() != names.len() {
        bail_internal!(
            "{} expressions projected with {} names",
            exprs.len(),
            names.len()
        );
    }
    exprs
        .iter()
        .zip(names)
        .fold(RecordTypeBuilder::new(), |builder, (expr, name)| {
            builder.add(name.clone(), expr.data_type().clone())
        })
        .build()
}

impl OperatorTrait for Project {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        let input = input_prop("Project", inputs, 1, 0)?;
        Ok(LogicalProperty::new(
            projection_type(&self.exprs, &self.names)?,
            input.model(),
            input.relation_count(),
        ))
    }
}

impl DisplayFields for Project {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("exprs", &self.exprs)
            .field("names", &self.names)
            .finish()
    }
}
