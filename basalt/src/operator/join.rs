use std::fmt::Formatter;

use strum_macros::AsRefStr;

use crate::error::BasaltResult;
use crate::operator::{input_prop, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::{DataModel, LogicalProperty};
use crate::rex::RexNode;
use crate::types::RecordTypeBuilder;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, AsRefStr)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    /// Whether fields of the left input may be null-padded.
    pub fn generates_nulls_on_left(&self) -> bool {
        matches!(self, JoinKind::Right | JoinKind::Full)
    }

    pub fn generates_nulls_on_right(&self) -> bool {
        matches!(self, JoinKind::Left | JoinKind::Full)
    }
}

/// Logical join operator.
///
/// The condition references left fields first, followed by right fields.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Join {
    kind: JoinKind,
    condition: RexNode,
}

impl Join {
    pub fn new(kind: JoinKind, condition: RexNode) -> Self {
        Self { kind, condition }
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn condition(&self) -> &RexNode {
        &self.condition
    }
}

impl OperatorTrait for Join {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        let left = input_prop("Join", inputs, 2, 0)?;
        let right = inputs[1];

        let mut builder = RecordTypeBuilder::new();
        for field in left.row_type().fields() {
            let ty = field
                .data_type()
                .with_nullable(field.data_type().is_nullable() || self.kind.generates_nulls_on_left());
            builder = builder.add_unique(field.name(), ty);
        }
        for field in right.row_type().fields() {
            let ty = field
                .data_type()
                .with_nullable(field.data_type().is_nullable() || self.kind.generates_nulls_on_right());
            builder = builder.add_unique(field.name(), ty);
        }

        let model = if left.model() == right.model() {
            left.model()
        } else {
            DataModel::Relational
        };

        Ok(LogicalProperty::new(
            builder.build()?,
            model,
            left.relation_count() + right.relation_count(),
        ))
    }
}

impl DisplayFields for Join {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("kind", &self.kind)
            .field("condition", &self.condition)
            .finish()
    }
}
