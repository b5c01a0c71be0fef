use std::sync::Arc;

use crate::error::BasaltResult;
use crate::optimizer::CorrelationId;
use crate::rex::{
    registry, Kind, LiteralValue, OperatorRegistry, QueryLanguage, RexCall, RexCorrelVariable,
    RexDynamicParam, RexInputRef, RexLiteral, RexNameRef, RexNode, RexOperator,
};
use crate::types::{AlgDataType, CallBinding, OperandTypeCheck, PolyType};

/// Factory of [`RexNode`]s.
///
/// Calls are validated against the operator's operand count range and type checker before they
/// are created, so every call reachable from a plan is well typed.
#[derive(Clone)]
pub struct RexBuilder {
    registry: Arc<OperatorRegistry>,
}

impl Default for RexBuilder {
    fn default() -> Self {
        Self::new(registry())
    }
}

impl RexBuilder {
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    pub fn make_literal(&self, value: LiteralValue) -> RexNode {
        let ty = Self::literal_type(&value);
        RexNode::Literal(RexLiteral { value, ty })
    }

    pub fn make_typed_literal(&self, value: LiteralValue, ty: AlgDataType) -> RexNode {
        RexNode::Literal(RexLiteral { value, ty })
    }

    pub fn make_null_literal(&self) -> RexNode {
        self.make_literal(LiteralValue::Null)
    }

    pub fn make_bool_literal(&self, value: bool) -> RexNode {
        self.make_literal(LiteralValue::Boolean(value))
    }

    /// List literal of the segments of a dotted path, `a.b` becomes `['a', 'b']`.
    pub fn make_path_literal(&self, path: &str) -> RexNode {
        self.make_literal(LiteralValue::List(
            path.split('.')
                .map(|segment| LiteralValue::String(segment.to_string()))
                .collect(),
        ))
    }

    pub fn make_input_ref(&self, index: usize, ty: AlgDataType) -> RexNode {
        RexNode::InputRef(RexInputRef { index, ty })
    }

    /// Reference to a dotted document path, its type is only known at runtime.
    pub fn make_name_ref(&self, path: &str) -> RexNode {
        RexNode::NameRef(RexNameRef {
            names: path.split('.').map(|s| s.to_string()).collect(),
            ty: AlgDataType::nullable(PolyType::Any),
        })
    }

    pub fn make_dynamic_param(&self, index: usize, ty: AlgDataType) -> RexNode {
        RexNode::DynamicParam(RexDynamicParam { index, ty })
    }

    pub fn make_correl(&self, id: CorrelationId, ty: AlgDataType) -> RexNode {
        RexNode::CorrelVariable(RexCorrelVariable { id, ty })
    }

    /// Creates a validated call.
    pub fn make_call(
        &self,
        operator: Arc<RexOperator>,
        operands: Vec<RexNode>,
    ) -> BasaltResult<RexNode> {
        let operand_types = operands
            .iter()
            .map(|o| o.data_type().clone())
            .collect::<Vec<_>>();
        let binding = CallBinding::new(operator.name(), &operand_types);
        if !operator
            .operand_count_range()
            .is_valid_count(operand_types.len())
        {
            return Err(binding.validation_error(
                format!("wrong number of arguments: {}", operand_types.len()),
                operator.signature(),
            ));
        }
        operator.checker().check_operand_types(&binding, true)?;
        let ty = operator.infer_return_type(&operand_types)?;

        Ok(RexNode::Call(RexCall {
            operator,
            operands,
            ty,
        }))
    }

    pub fn make_call_kind(&self, kind: Kind, operands: Vec<RexNode>) -> BasaltResult<RexNode> {
        self.make_call(self.registry.get_by_kind(kind)?, operands)
    }

    /// Creates a call of the operator registered as `name` for `language`.
    pub fn call(
        &self,
        language: QueryLanguage,
        name: &str,
        operands: Vec<RexNode>,
    ) -> BasaltResult<RexNode> {
        self.make_call(self.registry.get(language, name)?, operands)
    }

    /// Creates a boolean call, simplifying its shape.
    ///
    /// * AND/OR operands which are calls of the same operator are spliced in place.
    /// * AND/OR with a single operand is that operand, an empty AND is `true` and an empty OR
    /// is `false`.
    /// * `NOT(NOT(x))` is `x`.
    ///
    /// Other kinds are created as is.
    pub fn fixed_call(&self, kind: Kind, operands: Vec<RexNode>) -> BasaltResult<RexNode> {
        match kind {
            Kind::And | Kind::Or => {
                let mut flattened = Vec::with_capacity(operands.len());
                for operand in operands {
                    Self::flatten_into(kind, operand, &mut flattened);
                }
                match flattened.len() {
                    0 => Ok(self.make_bool_literal(kind == Kind::And)),
                    1 => Ok(flattened.remove(0)),
                    _ => {
                        let call = self.make_call_kind(kind, flattened)?;
                        Ok(Self::with_type(call, AlgDataType::nullable(PolyType::Boolean)))
                    }
                }
            }
            Kind::Not if operands.len() == 1 => match &operands[0] {
                RexNode::Call(inner) if inner.kind() == Kind::Not => {
                    Ok(inner.operands()[0].clone())
                }
                _ => self.make_call_kind(Kind::Not, operands),
            },
            _ => self.make_call_kind(kind, operands),
        }
    }

    pub fn and(&self, operands: Vec<RexNode>) -> BasaltResult<RexNode> {
        self.fixed_call(Kind::And, operands)
    }

    pub fn or(&self, operands: Vec<RexNode>) -> BasaltResult<RexNode> {
        self.fixed_call(Kind::Or, operands)
    }

    pub fn not(&self, operand: RexNode) -> BasaltResult<RexNode> {
        self.fixed_call(Kind::Not, vec![operand])
    }

    fn flatten_into(kind: Kind, node: RexNode, out: &mut Vec<RexNode>) {
        match node {
            RexNode::Call(call) if call.kind() == kind => {
                for operand in call.operands {
                    Self::flatten_into(kind, operand, out);
                }
            }
            other => out.push(other),
        }
    }

    fn with_type(node: RexNode, ty: AlgDataType) -> RexNode {
        match node {
            RexNode::Call(call) => RexNode::Call(RexCall { ty, ..call }),
            other => other,
        }
    }

    fn literal_type(value: &LiteralValue) -> AlgDataType {
        match value {
            LiteralValue::Null => AlgDataType::nullable(PolyType::Null),
            LiteralValue::Boolean(_) => AlgDataType::not_null(PolyType::Boolean),
            LiteralValue::Integer(i) if i32::try_from(*i).is_ok() => {
                AlgDataType::not_null(PolyType::Integer)
            }
            LiteralValue::Integer(_) => AlgDataType::not_null(PolyType::Bigint),
            LiteralValue::Double(_) => AlgDataType::not_null(PolyType::Double),
            LiteralValue::String(_) => AlgDataType::not_null(PolyType::Varchar),
            LiteralValue::List(values) => {
                let component = AlgDataType::least_restrictive(
                    &values.iter().map(Self::literal_type).collect::<Vec<_>>(),
                )
                .unwrap_or_else(|| AlgDataType::nullable(PolyType::Any));
                AlgDataType::array(component, false)
            }
        }
    }
}
