//! Contains algebra operators such as scan, filter, aggregate, etc.
//!
//! Currently they are classified into two categories: logical and physical. We separate logical
//! and physical operators in two enums since they need to implement different traits. For
//! example, physical operators derive the conventions and orderings of their inputs.
//!
//! Logical operators are further split by data model: relational operators reference fields by
//! position while document operators address dotted paths of the document held by each row.
mod logical;
pub use logical::*;
mod physical;
pub use physical::*;
mod scan;
pub use scan::*;
mod filter;
pub use filter::*;
mod project;
pub use project::*;
mod calc;
pub use calc::*;
mod aggregate;
pub use aggregate::*;
mod sort;
pub use sort::*;
mod join;
pub use join::*;
mod document;
pub use document::*;
mod converter;
pub use converter::*;

use std::fmt::{Display, Formatter};

use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;

use crate::error::BasaltResult;
use crate::operator::Operator::{Logical, Physical};
use crate::optimizer::OptimizerContext;
use crate::properties::{Convention, LogicalProperty};

#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner)]
pub enum Operator {
    Logical(LogicalOperator),
    Physical(PhysicalOperator),
}

impl Operator {
    /// Convention of rows produced by this operator, logical operators are not executable.
    pub fn convention(&self) -> Convention {
        match self {
            Logical(_) => Convention::None,
            Physical(op) => op.convention(),
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Logical(_))
    }
}

#[enum_dispatch(LogicalOperator)]
pub trait OperatorTrait {
    /// Derives logical property from inputs' logical properties.
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty>;
}

/// Writes operator fields in explain output.
#[enum_dispatch(LogicalOperator)]
pub trait DisplayFields {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result;
}

impl OperatorTrait for Operator {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        match self {
            Logical(op) => op.derive_logical_prop(inputs, context),
            Physical(op) => op.derive_logical_prop(inputs, context),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Logical(op) => write!(f, "{}", op),
            Physical(op) => write!(f, "{}", op),
        }
    }
}

impl From<LogicalOperator> for Operator {
    fn from(op: LogicalOperator) -> Self {
        Logical(op)
    }
}

impl From<PhysicalOperator> for Operator {
    fn from(op: PhysicalOperator) -> Self {
        Physical(op)
    }
}

/// Input `idx` of an operator expecting `arity` inputs.
pub(crate) fn input_prop<'a>(
    operator: &str,
    inputs: &[&'a LogicalProperty],
    arity: usize,
    idx: usize,
) -> BasaltResult<&'a LogicalProperty> {
    if inputs.len() != arity {
        bail_internal!(
            "{} expects {} inputs, got {}",
            operator,
            arity,
            inputs.len()
        );
    }
    Ok(inputs[idx])
}
