use std::fmt::Formatter;

use crate::error::BasaltResult;
use crate::operator::{input_prop, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

/// Changes the convention of its input without touching rows.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct Converter {}

impl Converter {
    pub fn new() -> Self {
        Self {}
    }
}

impl OperatorTrait for Converter {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        Ok(input_prop("Converter", inputs, 1, 0)?.clone())
    }
}

impl DisplayFields for Converter {
    fn display(&self, _f: &mut Formatter<'_>) -> std::fmt::Result {
        Ok(())
    }
}
