use std::sync::Arc;

use crate::operator::Operator::Physical;
use crate::operator::PhysicalOperator::{
    EnumerableAggregate, EnumerableCalc, EnumerableDocumentUnwind, EnumerableFilter,
    EnumerableHashJoin, EnumerableNestedLoopJoin, EnumerableProject, EnumerableScan,
    EnumerableSort, JdbcScan, JdbcToEnumerableConverter,
};
use crate::operator::{
    Aggregate, AggregateCall, Calc, Converter, DocumentUnwind, Filter, Join, JoinKind,
    PhysicalOperator, Project, Scan, Sort,
};
use crate::plan::{Plan, PlanNode, PlanNodeId, PlanNodeRef};
use crate::properties::Collation;
use crate::rex::RexNode;

/// Builds physical plans bottom up, mostly to spell out expected optimizer output.
pub struct PhysicalPlanBuilder {
    root: PlanNodeRef,
    next_plan_node_id: PlanNodeId,
}

impl PhysicalPlanBuilder {
    fn leaf(operator: PhysicalOperator) -> Self {
        Self {
            root: Arc::new(PlanNode::new(0, Physical(operator), vec![])),
            next_plan_node_id: 1,
        }
    }

    fn push(mut self, operator: PhysicalOperator, extra_inputs: Vec<PlanNodeRef>) -> Self {
        let mut inputs = vec![self.root.clone()];
        inputs.extend(extra_inputs);
        self.root = Arc::new(PlanNode::new(
            self.next_plan_node_id,
            Physical(operator),
            inputs,
        ));
        self.next_plan_node_id += 1;
        self
    }

    pub fn scan<S: Into<String>>(namespace: S, table: S) -> Self {
        Self::leaf(EnumerableScan(Scan::new(namespace, table)))
    }

    pub fn jdbc_scan<S: Into<String>>(namespace: S, table: S) -> Self {
        Self::leaf(JdbcScan(Scan::new(namespace, table)))
    }

    pub fn jdbc_to_enumerable(self) -> Self {
        self.push(JdbcToEnumerableConverter(Converter::new()), vec![])
    }

    pub fn filter(self, condition: RexNode) -> Self {
        self.push(EnumerableFilter(Filter::new(condition)), vec![])
    }

    pub fn project(self, exprs: Vec<RexNode>, names: Vec<String>) -> Self {
        self.push(EnumerableProject(Project::new(exprs, names)), vec![])
    }

    pub fn calc(self, projects: Vec<RexNode>, names: Vec<String>, condition: Option<RexNode>) -> Self {
        self.push(EnumerableCalc(Calc::new(projects, names, condition)), vec![])
    }

    pub fn aggregate(self, group: Vec<usize>, calls: Vec<AggregateCall>) -> Self {
        self.push(EnumerableAggregate(Aggregate::new(group, calls)), vec![])
    }

    pub fn sort(self, collation: Collation, offset: Option<usize>, fetch: Option<usize>) -> Self {
        self.push(EnumerableSort(Sort::new(collation, offset, fetch)), vec![])
    }

    pub fn hash_join(self, kind: JoinKind, condition: RexNode, right: PlanNodeRef) -> Self {
        self.push(EnumerableHashJoin(Join::new(kind, condition)), vec![right])
    }

    pub fn nested_loop_join(self, kind: JoinKind, condition: RexNode, right: PlanNodeRef) -> Self {
        self.push(EnumerableNestedLoopJoin(Join::new(kind, condition)), vec![right])
    }

    pub fn document_unwind<S: Into<String>>(self, path: S) -> Self {
        self.push(EnumerableDocumentUnwind(DocumentUnwind::new(path)), vec![])
    }

    pub fn build(self) -> Plan {
        Plan::new(self.root)
    }
}
