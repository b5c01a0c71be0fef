use std::sync::Arc;

use crate::operator::LogicalOperator::{
    LogicalAggregate, LogicalCalc, LogicalDocumentAggregate, LogicalDocumentFilter,
    LogicalDocumentProject, LogicalDocumentSort, LogicalDocumentUnwind, LogicalFilter,
    LogicalJoin, LogicalProject, LogicalScan, LogicalSort,
};
use crate::operator::Operator::Logical;
use crate::operator::{
    Aggregate, AggregateCall, Calc, DocumentAggregate, DocumentFilter, DocumentProject,
    DocumentSort, DocumentUnwind, Filter, Join, JoinKind, LaxAggregateCall, LogicalOperator,
    Project, Scan, Sort,
};
use crate::plan::{Plan, PlanNode, PlanNodeId, PlanNodeRef};
use crate::properties::{Collation, Direction};
use crate::rex::RexNode;

/// Builds logical plans bottom up, each call puts a new root over the current one.
///
/// # Panics
///
/// Operators with inputs panic when no input was built before.
#[derive(Default)]
pub struct LogicalPlanBuilder {
    root: Option<PlanNodeRef>,
    next_plan_node_id: PlanNodeId,
}

impl LogicalPlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset_root(&mut self, new_root: PlanNodeRef) -> &mut Self {
        self.root = Some(new_root);
        self.next_plan_node_id += 1;
        self
    }

    fn push(&mut self, operator: LogicalOperator, extra_inputs: Vec<PlanNodeRef>) -> &mut Self {
        let input = self
            .root
            .clone()
            .expect("operator requires an input, build a scan first");
        let mut inputs = vec![input];
        inputs.extend(extra_inputs);
        let plan_node = Arc::new(PlanNode::new(
            self.next_plan_node_id,
            Logical(operator),
            inputs,
        ));

        self.reset_root(plan_node)
    }

    pub fn scan<S: Into<String>>(&mut self, namespace: S, table: S) -> &mut Self {
        let plan_node = Arc::new(PlanNode::new(
            self.next_plan_node_id,
            Logical(LogicalScan(Scan::new(namespace, table))),
            vec![],
        ));

        self.reset_root(plan_node)
    }

    pub fn filter(&mut self, condition: RexNode) -> &mut Self {
        self.push(LogicalFilter(Filter::new(condition)), vec![])
    }

    pub fn project<S: Into<String>>(&mut self, exprs: Vec<(RexNode, S)>) -> &mut Self {
        let (exprs, names) = exprs
            .into_iter()
            .map(|(expr, name)| (expr, name.into()))
            .unzip();
        self.push(LogicalProject(Project::new(exprs, names)), vec![])
    }

    pub fn calc(
        &mut self,
        projects: Vec<RexNode>,
        names: Vec<String>,
        condition: Option<RexNode>,
    ) -> &mut Self {
        self.push(LogicalCalc(Calc::new(projects, names, condition)), vec![])
    }

    pub fn aggregate(&mut self, group: Vec<usize>, calls: Vec<AggregateCall>) -> &mut Self {
        self.push(LogicalAggregate(Aggregate::new(group, calls)), vec![])
    }

    pub fn sort(
        &mut self,
        collation: Collation,
        offset: Option<usize>,
        fetch: Option<usize>,
    ) -> &mut Self {
        self.push(LogicalSort(Sort::new(collation, offset, fetch)), vec![])
    }

    /// Joins the current root, as left input, with `right`.
    pub fn join(&mut self, kind: JoinKind, condition: RexNode, right: PlanNodeRef) -> &mut Self {
        self.push(LogicalJoin(Join::new(kind, condition)), vec![right])
    }

    pub fn document_filter(&mut self, condition: RexNode) -> &mut Self {
        self.push(LogicalDocumentFilter(DocumentFilter::new(condition)), vec![])
    }

    pub fn document_project(
        &mut self,
        includes: Vec<(String, RexNode)>,
        excludes: Vec<String>,
    ) -> &mut Self {
        self.push(
            LogicalDocumentProject(DocumentProject::new(includes, excludes)),
            vec![],
        )
    }

    pub fn document_add_fields(
        &mut self,
        includes: Vec<(String, RexNode)>,
        excludes: Vec<String>,
    ) -> &mut Self {
        self.push(
            LogicalDocumentProject(DocumentProject::extend(includes, excludes)),
            vec![],
        )
    }

    pub fn document_aggregate(
        &mut self,
        group: Option<RexNode>,
        calls: Vec<LaxAggregateCall>,
    ) -> &mut Self {
        self.push(
            LogicalDocumentAggregate(DocumentAggregate::new(group, calls)),
            vec![],
        )
    }

    pub fn document_sort(
        &mut self,
        keys: Vec<(RexNode, Direction)>,
        offset: Option<usize>,
        fetch: Option<usize>,
    ) -> &mut Self {
        self.push(
            LogicalDocumentSort(DocumentSort::new(keys, offset, fetch)),
            vec![],
        )
    }

    pub fn document_unwind<S: Into<String>>(&mut self, path: S) -> &mut Self {
        self.push(LogicalDocumentUnwind(DocumentUnwind::new(path)), vec![])
    }

    /// Consume current plan, but not rest state, e.g. plan node id.
    ///
    /// This is useful for building multi child plan, e.g. join.
    pub fn build(&mut self) -> Plan {
        let root = self
            .root
            .take()
            .expect("build requires at least one operator");
        Plan::new(root)
    }
}
