use crate::error::BasaltResult;
use crate::rex::{
    RexCall, RexCorrelVariable, RexDynamicParam, RexInputRef, RexLiteral, RexNameRef, RexNode,
};

/// Rewrites a [`RexNode`] tree bottom up.
///
/// Every method defaults to identity, a call is only rebuilt when one of its operands changed.
pub trait RexShuttle {
    fn visit_literal(&mut self, literal: &RexLiteral) -> BasaltResult<RexNode> {
        Ok(RexNode::Literal(literal.clone()))
    }

    fn visit_input_ref(&mut self, input_ref: &RexInputRef) -> BasaltResult<RexNode> {
        Ok(RexNode::InputRef(input_ref.clone()))
    }

    fn visit_name_ref(&mut self, name_ref: &RexNameRef) -> BasaltResult<RexNode> {
        Ok(RexNode::NameRef(name_ref.clone()))
    }

    fn visit_call(&mut self, call: &RexCall) -> BasaltResult<RexNode> {
        let operands = call
            .operands()
            .iter()
            .map(|operand| operand.accept(self))
            .collect::<BasaltResult<Vec<_>>>()?;
        if operands.as_slice() == call.operands() {
            Ok(RexNode::Call(call.clone()))
        } else {
            Ok(call.clone_with_operands(operands))
        }
    }

    fn visit_dynamic_param(&mut self, param: &RexDynamicParam) -> BasaltResult<RexNode> {
        Ok(RexNode::DynamicParam(param.clone()))
    }

    fn visit_correl_variable(&mut self, variable: &RexCorrelVariable) -> BasaltResult<RexNode> {
        Ok(RexNode::CorrelVariable(variable.clone()))
    }
}

/// Read only traversal of a [`RexNode`] tree.
///
/// [`RexVisitor::visit_call`] visits operands by default, other methods do nothing.
pub trait RexVisitor {
    fn visit_literal(&mut self, _literal: &RexLiteral) {}

    fn visit_input_ref(&mut self, _input_ref: &RexInputRef) {}

    fn visit_name_ref(&mut self, _name_ref: &RexNameRef) {}

    fn visit_call(&mut self, call: &RexCall) {
        for operand in call.operands() {
            operand.visit(self);
        }
    }

    fn visit_dynamic_param(&mut self, _param: &RexDynamicParam) {}

    fn visit_correl_variable(&mut self, _variable: &RexCorrelVariable) {}
}

impl RexNode {
    pub fn accept<S: RexShuttle + ?Sized>(&self, shuttle: &mut S) -> BasaltResult<RexNode> {
        match self {
            RexNode::Literal(l) => shuttle.visit_literal(l),
            RexNode::InputRef(r) => shuttle.visit_input_ref(r),
            RexNode::NameRef(r) => shuttle.visit_name_ref(r),
            RexNode::Call(c) => shuttle.visit_call(c),
            RexNode::DynamicParam(p) => shuttle.visit_dynamic_param(p),
            RexNode::CorrelVariable(v) => shuttle.visit_correl_variable(v),
        }
    }

    pub fn visit<V: RexVisitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            RexNode::Literal(l) => visitor.visit_literal(l),
            RexNode::InputRef(r) => visitor.visit_input_ref(r),
            RexNode::NameRef(r) => visitor.visit_name_ref(r),
            RexNode::Call(c) => visitor.visit_call(c),
            RexNode::DynamicParam(p) => visitor.visit_dynamic_param(p),
            RexNode::CorrelVariable(v) => visitor.visit_correl_variable(v),
        }
    }

    /// Shifts every input reference by `offset`.
    ///
    /// Callers guarantee that no shifted index becomes negative.
    pub fn shift(&self, offset: isize) -> BasaltResult<RexNode> {
        self.map_input_refs(|index| (index as isize + offset) as usize)
    }

    /// Replaces every input reference `$i` by `$mapping(i)`.
    pub fn map_input_refs<F: Fn(usize) -> usize>(&self, mapping: F) -> BasaltResult<RexNode> {
        self.accept(&mut InputRefMapper { mapping })
    }

    /// Replaces every input reference `$i` by `exprs[i]`.
    ///
    /// Used to push an expression through a projection computing `exprs`.
    pub fn inline(&self, exprs: &[RexNode]) -> BasaltResult<RexNode> {
        self.accept(&mut Inliner { exprs })
    }
}

struct InputRefMapper<F> {
    mapping: F,
}

impl<F: Fn(usize) -> usize> RexShuttle for InputRefMapper<F> {
    fn visit_input_ref(&mut self, input_ref: &RexInputRef) -> BasaltResult<RexNode> {
        Ok(RexNode::InputRef(RexInputRef {
            index: (self.mapping)(input_ref.index),
            ty: input_ref.ty.clone(),
        }))
    }
}

struct Inliner<'a> {
    exprs: &'a [RexNode],
}

impl<'a> RexShuttle for Inliner<'a> {
    fn visit_input_ref(&mut self, input_ref: &RexInputRef) -> BasaltResult<RexNode> {
        match self.exprs.get(input_ref.index) {
            Some(expr) => Ok(expr.clone()),
            None => bail_internal!(
                "Input ref ${} out of range of {} expressions",
                input_ref.index,
                self.exprs.len()
            ),
        }
    }
}

/// Collects indices of input references.
#[derive(Default)]
pub struct InputFinder {
    pub indices: Vec<usize>,
}

impl RexVisitor for InputFinder {
    fn visit_input_ref(&mut self, input_ref: &RexInputRef) {
        self.indices.push(input_ref.index);
    }
}

#[cfg(test)]
mod tests {
    use crate::error::BasaltResult;
    use crate::rex::{Kind, LiteralValue, RexBuilder, RexNameRef, RexNode, RexShuttle};
    use crate::types::{AlgDataType, PolyType};

    struct NameToLiteral;

    impl RexShuttle for NameToLiteral {
        fn visit_name_ref(&mut self, name_ref: &RexNameRef) -> BasaltResult<RexNode> {
            Ok(RexBuilder::default().make_literal(LiteralValue::String(name_ref.path())))
        }
    }

    fn int_ref(builder: &RexBuilder, index: usize) -> RexNode {
        builder.make_input_ref(index, AlgDataType::not_null(PolyType::Integer))
    }

    #[test]
    fn test_shift_and_map() {
        let builder = RexBuilder::default();
        let cond = builder
            .make_call_kind(Kind::Equals, vec![int_ref(&builder, 1), int_ref(&builder, 3)])
            .unwrap();

        assert_eq!("=($0, $2)", cond.shift(-1).unwrap().to_string());
        assert_eq!(
            "=($1, $0)",
            cond.map_input_refs(|i| if i == 1 { 1 } else { 0 })
                .unwrap()
                .to_string()
        );
    }

    #[test]
    fn test_inline() {
        let builder = RexBuilder::default();
        let plus = builder
            .make_call_kind(
                Kind::Plus,
                vec![int_ref(&builder, 0), builder.make_literal(LiteralValue::Integer(1))],
            )
            .unwrap();
        let cond = builder
            .make_call_kind(Kind::GreaterThan, vec![int_ref(&builder, 1), int_ref(&builder, 0)])
            .unwrap();

        let inlined = cond.inline(&[int_ref(&builder, 2), plus]).unwrap();
        assert_eq!(">(+($0, 1), $2)", inlined.to_string());
        assert!(cond.inline(&[int_ref(&builder, 2)]).is_err());
    }

    #[test]
    fn test_identity_shuttle_keeps_node() {
        let builder = RexBuilder::default();
        let cond = builder
            .call(
                crate::rex::QueryLanguage::Mongo,
                "$eq",
                vec![builder.make_name_ref("a.b"), int_ref(&builder, 0)],
            )
            .unwrap();

        let rewritten = cond.accept(&mut NameToLiteral).unwrap();
        assert_eq!("$eq('a.b', $0)", rewritten.to_string());
        assert_eq!(cond, cond.accept(&mut NoopShuttle).unwrap());
    }

    struct NoopShuttle;

    impl RexShuttle for NoopShuttle {}
}
