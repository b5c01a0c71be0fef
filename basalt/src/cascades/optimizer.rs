use std::collections::HashSet;

use log::debug;

use crate::cascades::memo::Memo;
use crate::cascades::task::{schedule, OptimizeGroupTask};
use crate::cascades::{Group, GroupExpr, GroupExprId, GroupId};
use crate::cost::CostModel;
use crate::error::BasaltResult;
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::plan::Plan;
use crate::properties::PhysicalPropertySet;
use crate::rules::RuleImpl;

/// Cost based optimizer searching all alternatives the rules produce.
pub struct CascadesOptimizer {
    pub(super) required_prop: PhysicalPropertySet,
    pub(super) rules: Vec<RuleImpl>,
    pub(super) memo: Memo,
    pub(super) context: OptimizerContext,
    pub(super) cost_model: CostModel,
    /// Groups and required properties an optimize task has been scheduled for.
    pub(super) started: HashSet<(GroupId, PhysicalPropertySet)>,
}

impl Optimizer for CascadesOptimizer {
    type GroupHandle = GroupId;
    type ExprHandle = GroupExprId;
    type Group = Group;
    type Expr = GroupExpr;

    fn context(&self) -> &OptimizerContext {
        &self.context
    }

    fn group_at(&self, group_handle: GroupId) -> &Group {
        &self.memo[group_handle]
    }

    fn expr_at(&self, expr_handle: GroupExprId) -> &GroupExpr {
        &self.memo[expr_handle]
    }

    fn find_best_plan(mut self) -> BasaltResult<Plan> {
        let root_task =
            OptimizeGroupTask::new(self.memo.root_group_id(), self.required_prop.clone()).into();

        schedule(&mut self, root_task)?;

        debug!("Memo after optimization: {:?}", self.memo);

        self.memo.best_plan(&self.required_prop)
    }
}

impl CascadesOptimizer {
    pub fn new(
        required_prop: PhysicalPropertySet,
        rules: Vec<RuleImpl>,
        plan: Plan,
        context: OptimizerContext,
    ) -> BasaltResult<Self> {
        let memo = Memo::new(&plan, &context)?;
        Ok(Self {
            required_prop,
            rules,
            memo,
            context,
            cost_model: CostModel::default(),
            started: HashSet::new(),
        })
    }
}
