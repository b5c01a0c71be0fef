use std::fmt::Formatter;

use crate::error::BasaltResult;
use crate::operator::{input_prop, projection_type, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;
use crate::rex::RexNode;

/// Filter and projection evaluated as one program.
///
/// The condition is evaluated against the input row, rows passing it are projected.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Calc {
    projects: Vec<RexNode>,
    names: Vec<String>,
    condition: Option<RexNode>,
}

impl Calc {
    pub fn new(projects: Vec<RexNode>, names: Vec<String>, condition: Option<RexNode>) -> Self {
        Self {
            projects,
            names,
            condition,
        }
    }

    pub fn projects(&self) -> &[RexNode] {
        &self.projects
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn condition(&self) -> Option<&RexNode> {
        self.condition.as_ref()
    }
}

impl OperatorTrait for Calc {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        let input = input_prop("Calc", inputs, 1, 0)?;
        Ok(LogicalProperty::new(
            projection_type(&self.projects, &self.names)?,
            input.model(),
            input.relation_count(),
        ))
    }
}

impl DisplayFields for Calc {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("projects", &self.projects);
        s.field("names", &self.names);
        if let Some(condition) = &self.condition {
            s.field("condition", condition);
        }
        s.finish()
    }
}
