use std::collections::HashMap;

use log::{debug, trace, warn};
use petgraph::algo::has_path_connecting;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::{BasaltError, BasaltResult};
use crate::heuristic::graph::{HepOptimizerNode, PlanGraph};
use crate::heuristic::{Binding, HepNodeId, MatchOrder};
use crate::operator::Operator::Physical;
use crate::operator::{Operator, OperatorTrait};
use crate::optimizer::{OptExpr, Optimizer, OptimizerContext};
use crate::plan::{Plan, PlanNode, PlanNodeRef};
use crate::properties::Convention;
use crate::rules::OptExprNode::{ExprHandleNode, GroupHandleNode, OperatorNode};
use crate::rules::{OptExpression, Rule, RuleImpl, RuleResult};

/// Rewrites a plan graph in place.
///
/// Structurally equal nodes, same operator over the same inputs, are stored once. After every
/// successful rule application matching restarts from the root, and the pass ends at fixed point
/// or after `max_iter_times` applications.
pub struct HepOptimizer {
    match_order: MatchOrder,
    /// Max number of rule applications.
    max_iter_times: usize,
    rules: Vec<RuleImpl>,
    pub(super) graph: PlanGraph,
    dedup: HashMap<(Operator, Vec<HepNodeId>), HepNodeId>,
    context: OptimizerContext,
}

impl Optimizer for HepOptimizer {
    type GroupHandle = HepNodeId;
    type ExprHandle = HepNodeId;
    type Group = HepOptimizerNode;
    type Expr = HepOptimizerNode;

    fn context(&self) -> &OptimizerContext {
        &self.context
    }

    fn group_at(&self, group_handle: HepNodeId) -> &HepOptimizerNode {
        &self.graph.graph[group_handle]
    }

    fn expr_at(&self, expr_handle: HepNodeId) -> &HepOptimizerNode {
        &self.graph.graph[expr_handle]
    }

    fn find_best_plan(mut self) -> BasaltResult<Plan> {
        let rules = self.rules.clone();
        for times in 0..self.max_iter_times {
            // The plan no longer changes after iteration
            let mut fixed_point = true;
            'nodes: for node_id in self.graph.nodes_iter(self.match_order) {
                for rule in &rules {
                    trace!(
                        "Trying to apply rule {:?} to expression {}",
                        rule,
                        self.expr_at(node_id).operator()
                    );
                    if self.apply_rule(rule, node_id)? {
                        debug!("Applied rule {:?} to node {:?}", rule, node_id);
                        fixed_point = false;
                        break 'nodes;
                    }
                }
            }

            if fixed_point {
                debug!("Heuristic pass reached fixed point after {} applications", times);
                return self.graph.to_plan();
            }
        }

        warn!(
            "Heuristic pass stopped after {} rule applications without reaching fixed point",
            self.max_iter_times
        );
        self.graph.to_plan()
    }
}

impl HepOptimizer {
    pub fn new(
        match_order: MatchOrder,
        max_iter_times: usize,
        rules: Vec<RuleImpl>,
        plan: Plan,
        context: OptimizerContext,
    ) -> BasaltResult<Self> {
        let mut optimizer = Self {
            match_order,
            max_iter_times,
            rules,
            graph: PlanGraph::default(),
            dedup: HashMap::new(),
            context,
        };
        optimizer.init_with_plan(plan)?;
        Ok(optimizer)
    }

    pub(crate) fn root_node_id(&self) -> HepNodeId {
        self.graph.root
    }

    /// Applies `rule` to the node, returns whether the graph changed.
    fn apply_rule(&mut self, rule: &RuleImpl, expr_handle: HepNodeId) -> BasaltResult<bool> {
        let opt_expr = match Binding::new(expr_handle, rule.pattern(), self).next() {
            Some(opt_expr) => opt_expr,
            None => return Ok(false),
        };
        if !rule.matches(&opt_expr, self)? {
            return Ok(false);
        }

        let mut results = RuleResult::new();
        match rule.apply(opt_expr, self, &mut results) {
            Ok(()) => {}
            Err(BasaltError::Unsupported(message)) => {
                warn!("Skipped rule {:?}: {}", rule, message);
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        let mut results = results.results();
        match (results.next(), results.next()) {
            (None, _) => Ok(false),
            (Some(new_expr), None) => self.replace_opt_expression(new_expr, expr_handle),
            (Some(_), Some(_)) => {
                bail_internal!("Rewrite rule {:?} returned more than one result", rule)
            }
        }
    }

    /// Replace relational expression with optimizer rule result.
    ///
    /// # Return
    ///
    /// The return value indicates whether graph changed.
    fn replace_opt_expression(
        &mut self,
        opt_node: OptExpression<HepOptimizer>,
        origin_node_id: HepNodeId,
    ) -> BasaltResult<bool> {
        let new_node_id = self.insert_opt_node(&opt_node)?;
        if new_node_id == origin_node_id {
            return Ok(false);
        }

        let (origin_count, new_count) = (
            self.graph.graph[origin_node_id].logical_prop.field_count(),
            self.graph.graph[new_node_id].logical_prop.field_count(),
        );
        if origin_count != new_count {
            bail_internal!(
                "Rewrite of {} produced {} fields instead of {}",
                self.graph.graph[origin_node_id].operator,
                new_count,
                origin_count
            );
        }

        // Redirect parents' inputs to new node, keeping input positions. Parents inside the new
        // subtree keep referencing the original node.
        let parent_edges = self
            .graph
            .graph
            .edges_directed(origin_node_id, Direction::Incoming)
            .map(|edge| (edge.id(), edge.source(), *edge.weight()))
            .collect::<Vec<_>>();
        for (edge, parent, input_idx) in parent_edges {
            if parent == new_node_id
                || has_path_connecting(&self.graph.graph, new_node_id, parent, None)
            {
                continue;
            }
            self.unregister(parent);
            self.graph.graph.remove_edge(edge);
            self.graph.graph.add_edge(parent, new_node_id, input_idx);
            self.register(parent);
        }

        if self.graph.root == origin_node_id {
            self.graph.root = new_node_id;
        }
        if self
            .graph
            .graph
            .neighbors_directed(origin_node_id, Direction::Incoming)
            .next()
            .is_none()
        {
            self.unregister(origin_node_id);
            self.graph.graph.remove_node(origin_node_id);
        }

        self.check_conventions()?;
        Ok(true)
    }

    fn insert_opt_node(&mut self, opt_expr: &OptExpression<HepOptimizer>) -> BasaltResult<HepNodeId> {
        match opt_expr.node() {
            ExprHandleNode(expr_handle) => Ok(*expr_handle),
            GroupHandleNode(group_handle) => Ok(*group_handle),
            OperatorNode(operator) => {
                let inputs = opt_expr
                    .inputs()
                    .iter()
                    .map(|input| self.insert_opt_node(input))
                    .collect::<BasaltResult<Vec<_>>>()?;
                self.insert_node(operator, inputs)
            }
        }
    }

    /// Inserts `operator` over `inputs`, reusing an equal node when one exists.
    fn insert_node(&mut self, operator: &Operator, inputs: Vec<HepNodeId>) -> BasaltResult<HepNodeId> {
        let key = (operator.clone(), inputs);
        if let Some(existing) = self.dedup.get(&key) {
            return Ok(*existing);
        }

        let logical_prop = {
            let input_props = key
                .1
                .iter()
                .map(|input| &self.graph.graph[*input].logical_prop)
                .collect::<Vec<_>>();
            operator.derive_logical_prop(&input_props, &self.context)?
        };
        let hep_node = HepOptimizerNode {
            id: HepNodeId::default(),
            operator: operator.clone(),
            logical_prop,
        };

        let new_node_id = self.graph.graph.add_node(hep_node);
        self.graph.graph[new_node_id].id = new_node_id;
        for (idx, input) in key.1.iter().enumerate() {
            self.graph.graph.add_edge(new_node_id, *input, idx);
        }
        self.dedup.insert(key, new_node_id);
        Ok(new_node_id)
    }

    fn register(&mut self, node_id: HepNodeId) {
        let key = (
            self.graph.graph[node_id].operator.clone(),
            self.graph.inputs(node_id),
        );
        self.dedup.entry(key).or_insert(node_id);
    }

    fn unregister(&mut self, node_id: HepNodeId) {
        let key = (
            self.graph.graph[node_id].operator.clone(),
            self.graph.inputs(node_id),
        );
        if self.dedup.get(&key) == Some(&node_id) {
            self.dedup.remove(&key);
        }
    }

    /// Physical nodes must receive the convention they require from physical inputs.
    fn check_conventions(&self) -> BasaltResult<()> {
        for node_id in self.graph.nodes_iter(MatchOrder::TopDown) {
            let operator = match &self.graph.graph[node_id].operator {
                Physical(op) => op,
                _ => continue,
            };
            for (idx, input) in self.graph.inputs(node_id).into_iter().enumerate() {
                let input_operator = &self.graph.graph[input].operator;
                let required = operator.required_input_convention(idx);
                if input_operator.is_logical() || required == Convention::None {
                    continue;
                }
                if input_operator.convention() != required {
                    bail_internal!(
                        "{} requires {} input {}, got {}",
                        operator,
                        required.as_ref(),
                        idx,
                        input_operator.convention().as_ref()
                    );
                }
            }
        }
        Ok(())
    }

    fn init_with_plan(&mut self, plan: Plan) -> BasaltResult<()> {
        let mut node_id_map = HashMap::<*const PlanNode, HepNodeId>::new();
        self.graph.root = self.insert_plan_node(&plan.root(), &mut node_id_map)?;
        Ok(())
    }

    fn insert_plan_node(
        &mut self,
        plan_node: &PlanNodeRef,
        node_id_map: &mut HashMap<*const PlanNode, HepNodeId>,
    ) -> BasaltResult<HepNodeId> {
        if let Some(node_id) = node_id_map.get(&std::sync::Arc::as_ptr(plan_node)) {
            return Ok(*node_id);
        }
        let inputs = plan_node
            .inputs()
            .iter()
            .map(|input| self.insert_plan_node(input, node_id_map))
            .collect::<BasaltResult<Vec<_>>>()?;
        let node_id = self.insert_node(plan_node.operator(), inputs)?;
        node_id_map.insert(std::sync::Arc::as_ptr(plan_node), node_id);
        Ok(node_id)
    }
}
