use std::fmt::Formatter;

use crate::error::BasaltResult;
use crate::operator::{input_prop, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;
use crate::rex::RexNode;

/// Keeps rows for which `condition` is true.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Filter {
    condition: RexNode,
}

impl Filter {
    pub fn new(condition: RexNode) -> Self {
        Self { condition }
    }

    pub fn condition(&self) -> &RexNode {
        &self.condition
    }
}

impl OperatorTrait for Filter {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        Ok(input_prop("Filter", inputs, 1, 0)?.clone())
    }
}

impl DisplayFields for Filter {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("condition", &self.condition)
            .finish()
    }
}
