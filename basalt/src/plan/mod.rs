//! Plans are the input and output of every optimizer.
use std::sync::Arc;

mod logical;
pub use logical::*;
mod physical;
pub use physical::*;
mod explain;
pub use explain::*;
mod visit;
pub use visit::*;

use crate::error::BasaltResult;
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::{EnumerableFilter, EnumerableSort};
use crate::operator::{Operator, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::{Convention, LogicalProperty, PhysicalPropertySet};

pub type PlanNodeId = u32;

pub type PlanNodeRef = Arc<PlanNode>;

#[derive(Clone, Default, Debug)]
pub struct PlanNodeIdGen {
    next: PlanNodeId,
}

impl PlanNodeIdGen {
    pub fn gen_next(&mut self) -> PlanNodeId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// One node in a plan.
///
/// This is used in both input and output of an optimizer. Given that we may have many different
/// phases in query optimization, we use one data structure to represent a plan. Nodes are
/// immutable, a rewrite always creates new nodes.
#[derive(Debug)]
pub struct PlanNode {
    id: PlanNodeId,
    operator: Operator,
    inputs: Vec<PlanNodeRef>,
    logical_prop: Option<LogicalProperty>,
    physical_props: Option<PhysicalPropertySet>,
}

/// The `eq` ignores `id` and derived properties.
impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator && self.inputs == other.inputs
    }
}

/// A query plan.
///
/// A query plan is a single root dag(directed acyclic graph). It can be used in many places, for
/// example, the algebra tree after validating a query, a physical plan after completing optimizer.
#[derive(PartialEq, Debug)]
pub struct Plan {
    root: PlanNodeRef,
}

impl Plan {
    pub fn new(root: PlanNodeRef) -> Self {
        Self { root }
    }

    pub fn root(&self) -> PlanNodeRef {
        self.root.clone()
    }

    /// Copy of this plan with the logical property of every node derived.
    pub fn with_logical_props(&self, context: &OptimizerContext) -> BasaltResult<Plan> {
        let mut deriver = LogicalPropDeriver { context };
        Ok(Plan::new(visit_bottom_up(&mut deriver, &self.root)?))
    }
}

impl PlanNode {
    pub fn new(id: PlanNodeId, operator: Operator, inputs: Vec<PlanNodeRef>) -> Self {
        Self {
            id,
            operator,
            inputs,
            logical_prop: None,
            physical_props: None,
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    pub fn inputs(&self) -> &[PlanNodeRef] {
        &self.inputs
    }

    pub fn logical_prop(&self) -> Option<&LogicalProperty> {
        self.logical_prop.as_ref()
    }

    pub fn physical_props(&self) -> Option<&PhysicalPropertySet> {
        self.physical_props.as_ref()
    }

    /// Physical properties delivered by this node.
    ///
    /// Uses the properties recorded by the optimizer when present, otherwise derives them from
    /// the operator.
    pub fn traits(&self) -> PhysicalPropertySet {
        if let Some(props) = &self.physical_props {
            return props.clone();
        }
        match &self.operator {
            Logical(_) => PhysicalPropertySet::default(),
            Physical(EnumerableSort(sort)) => {
                PhysicalPropertySet::new(Convention::Enumerable, sort.collation().clone())
            }
            Physical(EnumerableFilter(_)) => PhysicalPropertySet::new(
                Convention::Enumerable,
                self.inputs
                    .first()
                    .map(|input| input.traits().collation().clone())
                    .unwrap_or_default(),
            ),
            Physical(op) => PhysicalPropertySet::with_convention(op.convention()),
        }
    }
}

pub struct PlanNodeBuilder {
    plan_node: PlanNode,
}

impl PlanNodeBuilder {
    pub fn new(id: PlanNodeId, operator: &Operator) -> Self {
        Self {
            plan_node: PlanNode::new(id, operator.clone(), vec![]),
        }
    }

    pub fn add_inputs<I>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = PlanNodeRef>,
    {
        self.plan_node.inputs.extend(inputs);
        self
    }

    pub fn with_logical_prop(mut self, logical_prop: Option<LogicalProperty>) -> Self {
        self.plan_node.logical_prop = logical_prop;
        self
    }

    pub fn with_physical_props(mut self, physical_props: Option<PhysicalPropertySet>) -> Self {
        self.plan_node.physical_props = physical_props;
        self
    }

    pub fn build(self) -> PlanNode {
        self.plan_node
    }
}

struct LogicalPropDeriver<'a> {
    context: &'a OptimizerContext,
}

impl<'a> PlanVisitor for LogicalPropDeriver<'a> {
    type Output = PlanNodeRef;

    fn visit_node(
        &mut self,
        node: &PlanNodeRef,
        inputs: Vec<PlanNodeRef>,
    ) -> BasaltResult<PlanNodeRef> {
        let input_props = inputs
            .iter()
            .filter_map(|input| input.logical_prop())
            .collect::<Vec<_>>();
        let logical_prop = node
            .operator()
            .derive_logical_prop(&input_props, self.context)?;

        Ok(Arc::new(
            PlanNodeBuilder::new(node.id(), node.operator())
                .add_inputs(inputs)
                .with_logical_prop(Some(logical_prop))
                .with_physical_props(node.physical_props().cloned())
                .build(),
        ))
    }
}
