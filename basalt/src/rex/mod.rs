//! Scalar expressions carried by plan operators.
//!
//! A [`RexNode`] is immutable, rewriting an expression always creates new nodes, either directly
//! or through a [`RexShuttle`]. Calls are created by [`RexBuilder`], which validates operands
//! against the operator's checker and infers the result type.
mod operator;
pub use operator::*;
mod builder;
pub use builder::*;
mod shuttle;
pub use shuttle::*;

use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use enum_as_inner::EnumAsInner;
use itertools::Itertools;

use crate::optimizer::CorrelationId;
use crate::types::AlgDataType;

/// Value of a literal.
#[derive(Clone, Debug)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    List(Vec<LiteralValue>),
}

impl PartialEq for LiteralValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LiteralValue::Null, LiteralValue::Null) => true,
            (LiteralValue::Boolean(a), LiteralValue::Boolean(b)) => a == b,
            (LiteralValue::Integer(a), LiteralValue::Integer(b)) => a == b,
            (LiteralValue::Double(a), LiteralValue::Double(b)) => a.to_bits() == b.to_bits(),
            (LiteralValue::String(a), LiteralValue::String(b)) => a == b,
            (LiteralValue::List(a), LiteralValue::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LiteralValue {}

impl Hash for LiteralValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            LiteralValue::Null => {}
            LiteralValue::Boolean(b) => b.hash(state),
            LiteralValue::Integer(i) => i.hash(state),
            LiteralValue::Double(d) => d.to_bits().hash(state),
            LiteralValue::String(s) => s.hash(state),
            LiteralValue::List(l) => l.hash(state),
        }
    }
}

impl Display for LiteralValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LiteralValue::Null => write!(f, "null"),
            LiteralValue::Boolean(b) => write!(f, "{}", b),
            LiteralValue::Integer(i) => write!(f, "{}", i),
            LiteralValue::Double(d) => write!(f, "{:?}", d),
            LiteralValue::String(s) => write!(f, "'{}'", s),
            LiteralValue::List(l) => write!(f, "[{}]", l.iter().join(", ")),
        }
    }
}

impl LiteralValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LiteralValue::Integer(i) => Some(*i as f64),
            LiteralValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LiteralValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LiteralValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

#[derive(Clone, Hash, PartialEq, Eq)]
pub struct RexLiteral {
    value: LiteralValue,
    ty: AlgDataType,
}

impl RexLiteral {
    pub fn value(&self) -> &LiteralValue {
        &self.value
    }
}

/// Positional reference to a field of the input row.
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct RexInputRef {
    index: usize,
    ty: AlgDataType,
}

impl RexInputRef {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Dotted path into the document held by the input row.
///
/// Only valid on document operators, lowering replaces it by an extraction call.
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct RexNameRef {
    names: Vec<String>,
    ty: AlgDataType,
}

impl RexNameRef {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn path(&self) -> String {
        self.names.join(".")
    }
}

#[derive(Clone, Hash, PartialEq, Eq)]
pub struct RexCall {
    operator: Arc<RexOperator>,
    operands: Vec<RexNode>,
    ty: AlgDataType,
}

impl RexCall {
    pub fn operator(&self) -> &Arc<RexOperator> {
        &self.operator
    }

    pub fn kind(&self) -> Kind {
        self.operator.kind()
    }

    pub fn operands(&self) -> &[RexNode] {
        &self.operands
    }

    /// Same operator and type with new operands, operands are not revalidated.
    pub fn clone_with_operands(&self, operands: Vec<RexNode>) -> RexNode {
        RexNode::Call(RexCall {
            operator: self.operator.clone(),
            operands,
            ty: self.ty.clone(),
        })
    }
}

#[derive(Clone, Hash, PartialEq, Eq)]
pub struct RexDynamicParam {
    index: usize,
    ty: AlgDataType,
}

impl RexDynamicParam {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Reference to a correlated subtree registered in the compilation's correlation table.
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct RexCorrelVariable {
    id: CorrelationId,
    ty: AlgDataType,
}

impl RexCorrelVariable {
    pub fn id(&self) -> CorrelationId {
        self.id
    }
}

/// Scalar expression.
#[derive(Clone, Hash, PartialEq, Eq, EnumAsInner)]
pub enum RexNode {
    Literal(RexLiteral),
    InputRef(RexInputRef),
    NameRef(RexNameRef),
    Call(RexCall),
    DynamicParam(RexDynamicParam),
    CorrelVariable(RexCorrelVariable),
}

impl RexNode {
    pub fn data_type(&self) -> &AlgDataType {
        match self {
            RexNode::Literal(l) => &l.ty,
            RexNode::InputRef(r) => &r.ty,
            RexNode::NameRef(r) => &r.ty,
            RexNode::Call(c) => &c.ty,
            RexNode::DynamicParam(p) => &p.ty,
            RexNode::CorrelVariable(v) => &v.ty,
        }
    }

    /// Kind of the call, `None` for other variants.
    pub fn call_kind(&self) -> Option<Kind> {
        self.as_call().map(|c| c.kind())
    }

    pub fn is_always_true(&self) -> bool {
        matches!(self, RexNode::Literal(RexLiteral { value: LiteralValue::Boolean(true), .. }))
    }

    /// Splits a condition at its top level AND.
    pub fn conjunctions(&self) -> Vec<RexNode> {
        match self {
            RexNode::Call(call) if call.kind() == Kind::And => call
                .operands
                .iter()
                .flat_map(|operand| operand.conjunctions())
                .collect(),
            node if node.is_always_true() => vec![],
            node => vec![node.clone()],
        }
    }

    /// Calls `f` on this node and every descendant, parents first.
    pub fn walk<F: FnMut(&RexNode)>(&self, f: &mut F) {
        f(self);
        if let RexNode::Call(call) = self {
            for operand in &call.operands {
                operand.walk(f);
            }
        }
    }

    /// Sorted, distinct indices of all input references.
    pub fn input_refs(&self) -> Vec<usize> {
        let mut finder = InputFinder::default();
        self.visit(&mut finder);
        finder.indices.into_iter().sorted().dedup().collect()
    }

    pub fn contains_name_ref(&self) -> bool {
        let mut found = false;
        self.walk(&mut |node| found |= matches!(node, RexNode::NameRef(_)));
        found
    }

    pub fn contains_correlation(&self) -> bool {
        let mut found = false;
        self.walk(&mut |node| found |= matches!(node, RexNode::CorrelVariable(_)));
        found
    }
}

impl Display for RexNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RexNode::Literal(l) => write!(f, "{}", l.value),
            RexNode::InputRef(r) => write!(f, "${}", r.index),
            RexNode::NameRef(r) => write!(f, "\"{}\"", r.path()),
            RexNode::Call(c) => write!(
                f,
                "{}({})",
                c.operator.name(),
                c.operands.iter().join(", ")
            ),
            RexNode::DynamicParam(p) => write!(f, "?{}", p.index),
            RexNode::CorrelVariable(v) => write!(f, "$cor{}", v.id.0),
        }
    }
}

impl Debug for RexNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use crate::rex::{Kind, LiteralValue, RexBuilder, RexNode};
    use crate::types::{AlgDataType, PolyType};

    #[test]
    fn test_digest() {
        let builder = RexBuilder::default();
        let cond = builder
            .make_call_kind(
                Kind::And,
                vec![
                    builder
                        .make_call_kind(
                            Kind::GreaterThanOrEqual,
                            vec![
                                builder.make_input_ref(1, AlgDataType::nullable(PolyType::Double)),
                                builder.make_literal(LiteralValue::Double(5.0)),
                            ],
                        )
                        .unwrap(),
                    builder
                        .make_call_kind(
                            Kind::Equals,
                            vec![
                                builder.make_input_ref(0, AlgDataType::not_null(PolyType::Varchar)),
                                builder.make_literal(LiteralValue::String("a".to_string())),
                            ],
                        )
                        .unwrap(),
                ],
            )
            .unwrap();

        assert_eq!("AND(>=($1, 5.0), =($0, 'a'))", cond.to_string());
        assert_eq!(2, cond.conjunctions().len());
        assert_eq!(vec![0, 1], cond.input_refs());
    }

    #[test]
    fn test_name_ref_digest() {
        let builder = RexBuilder::default();
        let name_ref = builder.make_name_ref("customer.id");
        assert_eq!("\"customer.id\"", name_ref.to_string());
        assert!(name_ref.contains_name_ref());
        assert!(matches!(name_ref, RexNode::NameRef(_)));
        let list = builder.make_literal(LiteralValue::List(vec![
            LiteralValue::String("_id".to_string()),
            LiteralValue::String("total".to_string()),
        ]));
        assert_eq!("['_id', 'total']", list.to_string());
    }
}
