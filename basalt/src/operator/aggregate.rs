use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use itertools::Itertools;

use crate::error::BasaltResult;
use crate::operator::{input_prop, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;
use crate::rex::{RexBuilder, RexOperator};
use crate::types::{AlgDataType, RecordTypeBuilder};

/// Call of an aggregate function over input fields.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct AggregateCall {
    operator: Arc<RexOperator>,
    args: Vec<usize>,
    distinct: bool,
    name: String,
    ty: AlgDataType,
}

impl AggregateCall {
    /// Validates the call against `input_type` and infers its result type.
    pub fn create<S: Into<String>>(
        builder: &RexBuilder,
        operator: Arc<RexOperator>,
        args: Vec<usize>,
        distinct: bool,
        name: S,
        input_type: &AlgDataType,
    ) -> BasaltResult<Self> {
        let operands = args
            .iter()
            .map(|&idx| match input_type.fields().get(idx) {
                Some(field) => Ok(builder.make_input_ref(idx, field.data_type().clone())),
                None => Err(internal_err!(
                    "Aggregate argument ${} out of range of {} fields",
                    idx,
                    input_type.field_count()
                )),
            })
            .collect::<BasaltResult<Vec<_>>>()?;
        let ty = builder
            .make_call(operator.clone(), operands)?
            .data_type()
            .clone();

        Ok(Self {
            operator,
            args,
            distinct,
            name: name.into(),
            ty,
        })
    }

    pub fn operator(&self) -> &Arc<RexOperator> {
        &self.operator
    }

    pub fn args(&self) -> &[usize] {
        &self.args
    }

    pub fn distinct(&self) -> bool {
        self.distinct
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &AlgDataType {
        &self.ty
    }
}

impl Debug for AggregateCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}{}) AS {}",
            self.operator.name(),
            if self.distinct { "DISTINCT " } else { "" },
            self.args.iter().map(|idx| format!("${}", idx)).join(", "),
            self.name
        )
    }
}

/// Groups rows by the `group` fields and computes `calls` per group.
///
/// Output fields are the group fields followed by one field per call. Without group fields the
/// whole input forms one group.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Aggregate {
    group: Vec<usize>,
    calls: Vec<AggregateCall>,
}

impl Aggregate {
    pub fn new(group: Vec<usize>, calls: Vec<AggregateCall>) -> Self {
        Self { group, calls }
    }

    pub fn group(&self) -> &[usize] {
        &self.group
    }

    pub fn calls(&self) -> &[AggregateCall] {
        &self.calls
    }
}

impl OperatorTrait for Aggregate {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        let input = input_prop("Aggregate", inputs, 1, 0)?;
        let mut builder = RecordTypeBuilder::new();
        for &idx in &self.group {
            match input.row_type().fields().get(idx) {
                Some(field) => builder = builder.add(field.name(), field.data_type().clone()),
                None => bail_internal!(
                    "Group key ${} out of range of {} fields",
                    idx,
                    input.field_count()
                ),
            }
        }
        for call in &self.calls {
            builder = builder.add(call.name.clone(), call.ty.clone());
        }

        Ok(LogicalProperty::new(
            builder.build()?,
            input.model(),
            input.relation_count(),
        ))
    }
}

impl DisplayFields for Aggregate {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("group", &self.group)
            .field("calls", &self.calls)
            .finish()
    }
}
