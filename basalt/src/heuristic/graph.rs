use std::collections::HashMap;
use std::sync::Arc;

use petgraph::prelude::{NodeIndex, StableGraph};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::{Directed, Direction};
use serde::Deserialize;

use crate::error::BasaltResult;
use crate::heuristic::HepOptimizer;
use crate::operator::Operator;
use crate::optimizer::{OptExpr, OptExprHandle, OptGroup, OptGroupHandle};
use crate::plan::{Plan, PlanNodeBuilder, PlanNodeId, PlanNodeRef};
use crate::properties::LogicalProperty;

/// Edge weight is the index of the target among the source's inputs.
type HepGraph = StableGraph<HepOptimizerNode, usize, Directed, PlanNodeId>;
pub type HepNodeId = NodeIndex<PlanNodeId>;

/// Match order of plan tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOrder {
    BottomUp,
    TopDown,
}

pub struct HepOptimizerNode {
    pub(super) id: HepNodeId,
    pub(super) operator: Operator,
    pub(super) logical_prop: LogicalProperty,
}

/// A plan should be a single root dag.
#[derive(Default)]
pub(super) struct PlanGraph {
    pub(super) graph: HepGraph,
    pub(super) root: HepNodeId,
}

impl PlanGraph {
    /// Nodes reachable from root, parents before children for [`MatchOrder::TopDown`].
    pub(super) fn nodes_iter(&self, match_order: MatchOrder) -> Vec<HepNodeId> {
        let mut ids = Vec::with_capacity(self.graph.node_count());
        let mut bfs = Bfs::new(&self.graph, self.root);
        while let Some(node_id) = bfs.next(&self.graph) {
            ids.push(node_id);
        }

        if match_order == MatchOrder::BottomUp {
            ids.reverse();
        }
        ids
    }

    /// Inputs of `node_id` in order.
    pub(super) fn inputs(&self, node_id: HepNodeId) -> Vec<HepNodeId> {
        let mut edges = self
            .graph
            .edges_directed(node_id, Direction::Outgoing)
            .map(|edge| (*edge.weight(), edge.target()))
            .collect::<Vec<_>>();
        edges.sort();
        edges.into_iter().map(|(_, target)| target).collect()
    }

    pub(super) fn to_plan(&self) -> BasaltResult<Plan> {
        let mut next_plan_node_id = 0;
        let mut plan_nodes = HashMap::<HepNodeId, PlanNodeRef>::new();
        let root = self.build_plan_node(self.root, &mut next_plan_node_id, &mut plan_nodes)?;
        Ok(Plan::new(root))
    }

    fn build_plan_node(
        &self,
        node_id: HepNodeId,
        next_plan_node_id: &mut PlanNodeId,
        plan_nodes: &mut HashMap<HepNodeId, PlanNodeRef>,
    ) -> BasaltResult<PlanNodeRef> {
        if let Some(plan_node) = plan_nodes.get(&node_id) {
            return Ok(plan_node.clone());
        }
        let node = match self.graph.node_weight(node_id) {
            Some(node) => node,
            None => bail_internal!("Plan graph node {:?} was removed", node_id),
        };

        let inputs = self
            .inputs(node_id)
            .into_iter()
            .map(|input| self.build_plan_node(input, next_plan_node_id, plan_nodes))
            .collect::<BasaltResult<Vec<_>>>()?;
        let plan_node = Arc::new(
            PlanNodeBuilder::new(*next_plan_node_id, &node.operator)
                .with_logical_prop(Some(node.logical_prop.clone()))
                .add_inputs(inputs)
                .build(),
        );
        *next_plan_node_id += 1;
        plan_nodes.insert(node_id, plan_node.clone());
        Ok(plan_node)
    }
}

impl OptGroup for HepOptimizerNode {
    fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }
}

impl OptExpr for HepOptimizerNode {
    type InputHandle = HepNodeId;
    type O = HepOptimizer;

    fn operator(&self) -> &Operator {
        &self.operator
    }

    fn inputs_len(&self, opt: &HepOptimizer) -> usize {
        opt.graph
            .graph
            .neighbors_directed(self.id, Direction::Outgoing)
            .count()
    }

    fn input_at(&self, idx: usize, opt: &HepOptimizer) -> HepNodeId {
        opt.graph.inputs(self.id)[idx]
    }

    fn logical_prop<'a>(&'a self, _opt: &'a HepOptimizer) -> &'a LogicalProperty {
        &self.logical_prop
    }
}

impl OptExprHandle for HepNodeId {
    type O = HepOptimizer;
}

impl OptGroupHandle for HepNodeId {
    type O = HepOptimizer;
}
