use std::fmt::{Debug, Formatter};
use std::ops::Index;

use crate::error::BasaltResult;
use crate::operator::Operator;
use crate::optimizer::{OptExpr, OptGroup, Optimizer};
use crate::properties::LogicalProperty;
use crate::rules::OptExprNode::{ExprHandleNode, GroupHandleNode, OperatorNode};
use crate::rules::OptExprVec;
use crate::utils::RootBuilder;

/// One node in [`OptExpression`].
pub enum OptExprNode<O: Optimizer> {
    OperatorNode(Operator),
    ExprHandleNode(O::ExprHandle),
    GroupHandleNode(O::GroupHandle),
}

impl<O: Optimizer> Clone for OptExprNode<O> {
    fn clone(&self) -> Self {
        match self {
            OperatorNode(op) => OperatorNode(op.clone()),
            ExprHandleNode(handle) => ExprHandleNode(handle.clone()),
            GroupHandleNode(handle) => GroupHandleNode(handle.clone()),
        }
    }
}

impl<O: Optimizer> PartialEq for OptExprNode<O> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OperatorNode(this_op), OperatorNode(other_op)) => this_op == other_op,
            (ExprHandleNode(handle), ExprHandleNode(other_handle)) => handle == other_handle,
            (GroupHandleNode(handle), GroupHandleNode(other_handle)) => handle == other_handle,
            _ => false,
        }
    }
}

impl<O: Optimizer> Debug for OptExprNode<O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatorNode(op) => write!(f, "OperatorNode: {}", op),
            ExprHandleNode(handle) => write!(f, "ExprHandleNode: {:?}", handle),
            GroupHandleNode(handle) => write!(f, "GroupHandleNode: {:?}", handle),
        }
    }
}

impl<O: Optimizer> From<Operator> for OptExprNode<O> {
    fn from(t: Operator) -> Self {
        OperatorNode(t)
    }
}

/// Optimizer expression tree matches rule pattern. Used as input/output of optimizer rule.
///
/// When used as input, `node` is an [`crate::optimizer::OptExprHandle`], and the inputs of
/// pattern leaves are [`crate::optimizer::OptGroupHandle`]s.
/// When used as output, `node` can be either of a handle or an [`Operator`]. A node created by
/// the rule is an [`Operator`], a subtree kept from the input is a handle.
pub struct OptExpression<O: Optimizer> {
    node: OptExprNode<O>,
    inputs: OptExprVec<O>,
}

impl<O: Optimizer> Clone for OptExpression<O> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            inputs: self.inputs.clone(),
        }
    }
}

impl<O: Optimizer> PartialEq for OptExpression<O> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.inputs == other.inputs
    }
}

impl<O: Optimizer> OptExpression<O> {
    pub fn new_builder<N: Into<OptExprNode<O>>>(node: N) -> RootBuilder<Self, OptExprNode<O>> {
        RootBuilder::new(node.into())
    }

    pub fn with_operator<I>(operator: Operator, inputs: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self {
            node: OperatorNode(operator),
            inputs: inputs.into_iter().collect(),
        }
    }

    pub fn with_expr_handle<I>(opt_node: O::ExprHandle, inputs: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self {
            node: ExprHandleNode(opt_node),
            inputs: inputs.into_iter().collect(),
        }
    }

    /// Creates an opt expression with group handle.
    ///
    /// Note that group handle can only be leaf node, so it never has inputs.
    pub fn with_group_handle(handle: O::GroupHandle) -> Self {
        Self {
            node: GroupHandleNode(handle),
            inputs: vec![],
        }
    }

    /// New operator over the same inputs.
    pub fn clone_with_inputs(&self, operator: Operator) -> Self {
        Self {
            node: OperatorNode(operator),
            inputs: self.inputs.clone(),
        }
    }

    pub fn inputs(&self) -> &[Self] {
        &self.inputs
    }

    pub fn node(&self) -> &OptExprNode<O> {
        &self.node
    }

    pub fn get_operator<'a>(&'a self, optimizer: &'a O) -> BasaltResult<&'a Operator> {
        match &self.node {
            ExprHandleNode(opt_node) => Ok(optimizer.expr_at(opt_node.clone()).operator()),
            OperatorNode(op) => Ok(op),
            GroupHandleNode(_) => bail_internal!("Can't get operator from group handle!"),
        }
    }

    /// Logical property of a bound node, nodes created by rules have none yet.
    pub fn logical_prop<'a>(&'a self, optimizer: &'a O) -> BasaltResult<&'a LogicalProperty> {
        match &self.node {
            ExprHandleNode(handle) => Ok(optimizer.expr_at(handle.clone()).logical_prop(optimizer)),
            GroupHandleNode(handle) => Ok(optimizer.group_at(handle.clone()).logical_prop()),
            OperatorNode(op) => bail_internal!("No logical property derived for new node {}", op),
        }
    }

    /// Logical property of input `idx`.
    pub fn input_prop<'a>(&'a self, idx: usize, optimizer: &'a O) -> BasaltResult<&'a LogicalProperty> {
        match self.inputs.get(idx) {
            Some(input) => input.logical_prop(optimizer),
            None => bail_internal!("Input {} not bound, only {} inputs", idx, self.inputs.len()),
        }
    }
}

impl<O: Optimizer> Debug for OptExpression<O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.format(f, 0)
    }
}

/// Creates a leaf opt expression from operator.
impl<O: Optimizer> From<Operator> for OptExpression<O> {
    fn from(op: Operator) -> Self {
        OptExpression::<O>::with_operator(op, vec![])
    }
}

impl<O: Optimizer> OptExpression<O> {
    fn format(&self, f: &mut Formatter<'_>, level: usize) -> std::fmt::Result {
        if level > 0 {
            write!(f, "{}--", "  ".repeat(level - 1))?;
        }
        writeln!(f, "{:?}", self.node)?;
        for input in &self.inputs {
            input.format(f, level + 1)?;
        }

        Ok(())
    }
}

/// Index of inputs.
impl<O: Optimizer> Index<usize> for OptExpression<O> {
    type Output = OptExpression<O>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.inputs[index]
    }
}

impl<O: Optimizer> From<(OptExprNode<O>, Vec<OptExpression<O>>)> for OptExpression<O> {
    fn from(t: (OptExprNode<O>, Vec<OptExpression<O>>)) -> Self {
        OptExpression {
            node: t.0,
            inputs: t.1,
        }
    }
}
