use std::cmp::Reverse;
use std::mem::replace;

use enum_dispatch::enum_dispatch;
use itertools::Itertools;
use log::{debug, trace, warn};

use crate::cascades::binding::Binding;
use crate::cascades::memo::WinnerInput;
use crate::cascades::task::OptimizeInputsTaskState::{
    AfterOptimizeInput, BeforeOptimizeInput, Init, Invalid, OptimizeSelf,
};
use crate::cascades::task::TaskControl::{Done, Yield};
use crate::cascades::{CascadesOptimizer, GroupExprId, GroupId};
use crate::cost::Cost;
use crate::error::{BasaltError, BasaltResult};
use crate::operator::Operator::Physical;
use crate::operator::{DerivePropContext, DerivePropResult, PhysicalOperatorTrait};
use crate::optimizer::OptExpr;
use crate::properties::{PhysicalProp, PhysicalPropertySet};
use crate::rules::OptExprNode::GroupHandleNode;
use crate::rules::{Rule, RuleImpl, RuleResult};

#[enum_dispatch]
pub(super) enum TaskImpl {
    ApplyRuleTask,
    OptimizeExpressionTask,
    OptimizeInputsTask,
    ExploreGroupTask,
    OptimizeGroupTask,
}

enum TaskControl {
    /// Run `dependencies` first, then resume `this`.
    Yield {
        this: TaskImpl,
        dependencies: Vec<TaskImpl>,
    },
    Done {
        dependencies: Vec<TaskImpl>,
    },
}

impl TaskControl {
    fn done() -> Self {
        Done {
            dependencies: vec![],
        }
    }

    fn done_with_deps(deps: Vec<TaskImpl>) -> Self {
        Done { dependencies: deps }
    }

    fn resume(this: TaskImpl) -> Self {
        Yield {
            this,
            dependencies: vec![],
        }
    }
}

#[enum_dispatch(TaskImpl)]
trait Task {
    fn execute(self, ctx: &mut CascadesOptimizer) -> BasaltResult<TaskControl>;
}

/// Runs tasks on a stack until it's empty. Dependencies pushed last run first.
pub(super) fn schedule(ctx: &mut CascadesOptimizer, root: TaskImpl) -> BasaltResult<()> {
    let mut tasks = vec![root];
    let mut executed = 0usize;

    while let Some(cur_task) = tasks.pop() {
        executed += 1;
        match cur_task.execute(ctx)? {
            Yield {
                this,
                mut dependencies,
            } => {
                tasks.push(this);
                tasks.append(&mut dependencies);
            }
            Done { mut dependencies } => {
                tasks.append(&mut dependencies);
            }
        }
    }

    debug!("Cascades search finished after {} tasks", executed);
    Ok(())
}

pub(super) struct ApplyRuleTask {
    rule: RuleImpl,
    /// The logical group expression to apply rule to.
    group_expr_id: GroupExprId,
    required_prop: PhysicalPropertySet,
}

impl Task for ApplyRuleTask {
    fn execute(self, ctx: &mut CascadesOptimizer) -> BasaltResult<TaskControl> {
        if ctx.memo[self.group_expr_id].is_rule_applied(self.rule.rule_id()) {
            return Ok(TaskControl::done());
        }

        trace!(
            "Applying rule {:?} to group expression {}",
            self.rule,
            self.group_expr_id
        );

        let bindings = Binding::new(self.group_expr_id, self.rule.pattern(), &ctx.memo)
            .into_iter()
            .collect::<Vec<_>>();
        let target_group = self.group_expr_id.group_id();
        let mut other_tasks = Vec::new();

        for binding in bindings {
            if !self.rule.matches(&binding, &*ctx)? {
                continue;
            }

            let mut result = RuleResult::new();
            match self.rule.apply(binding, &*ctx, &mut result) {
                Ok(()) => {}
                Err(BasaltError::Unsupported(message)) => {
                    warn!("Skipped rule {:?}: {}", self.rule, message);
                    continue;
                }
                Err(e) => return Err(e),
            }

            for result_expr in result.results() {
                debug!(
                    "Result of applying rule {:?} to group expression {}: {:?}",
                    self.rule, self.group_expr_id, result_expr
                );
                if let GroupHandleNode(group_id) = result_expr.node() {
                    debug!("Group {} equals group {}, not merged", target_group, group_id);
                    continue;
                }

                let group_expr_id = ctx.memo.insert_opt_expression(
                    &result_expr,
                    Some(target_group),
                    &ctx.context,
                )?;
                if group_expr_id.group_id() != target_group {
                    continue;
                }

                if ctx.memo[group_expr_id].is_logical() {
                    other_tasks.push(
                        OptimizeExpressionTask {
                            group_expr_id,
                            required_prop: self.required_prop.clone(),
                        }
                        .into(),
                    );
                } else {
                    other_tasks.push(
                        OptimizeInputsTask::new(group_expr_id, self.required_prop.clone()).into(),
                    );
                }
            }
        }

        ctx.memo[self.group_expr_id].set_rule_applied(self.rule.rule_id());
        Ok(TaskControl::done_with_deps(other_tasks))
    }
}

/// Optimize a logical group expression by applying rules.
///
/// Inputs are explored before any rule runs on the expression itself.
pub(super) struct OptimizeExpressionTask {
    /// Logical group expression to be optimized.
    group_expr_id: GroupExprId,
    required_prop: PhysicalPropertySet,
}

impl Task for OptimizeExpressionTask {
    fn execute(self, ctx: &mut CascadesOptimizer) -> BasaltResult<TaskControl> {
        let group_expr = &ctx.memo[self.group_expr_id];
        // Popped from the end: higher promise first, then registration order.
        let apply_rule_tasks = ctx
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| !group_expr.is_rule_applied(rule.rule_id()))
            .sorted_by_key(|(idx, rule)| (rule.rule_promise(), Reverse(*idx)))
            .map(|(_, rule)| {
                ApplyRuleTask {
                    rule: rule.clone(),
                    group_expr_id: self.group_expr_id,
                    required_prop: self.required_prop.clone(),
                }
                .into()
            })
            .collect::<Vec<TaskImpl>>();

        let explore_input_group_tasks = group_expr.input_group_ids().map(|group_id| {
            TaskImpl::from(ExploreGroupTask {
                group_id,
                required_prop: self.required_prop.clone(),
            })
        });

        let mut tasks = apply_rule_tasks;
        tasks.extend(explore_input_group_tasks);
        Ok(TaskControl::done_with_deps(tasks))
    }
}

/// Optimize physical group expression for required property.
#[derive(Debug)]
pub(super) struct OptimizeInputsTask {
    /// Physical group expression id to be optimized.
    group_expr_id: GroupExprId,
    /// Required property
    required_prop: PhysicalPropertySet,
    state: OptimizeInputsTaskState,
}

#[derive(Debug)]
enum OptimizeInputsTaskState {
    Init,
    BeforeOptimizeInput {
        derive_results: Vec<DerivePropResult>,
        derive_idx: usize,
        input_idx: usize,
        accumulated_cost: Cost,
    },
    AfterOptimizeInput {
        derive_results: Vec<DerivePropResult>,
        derive_idx: usize,
        input_idx: usize,
        accumulated_cost: Cost,
    },
    OptimizeSelf {
        derive_results: Vec<DerivePropResult>,
        derive_idx: usize,
        accumulated_cost: Cost,
    },
    Invalid,
}

impl OptimizeInputsTask {
    fn new(group_expr_id: GroupExprId, required_prop: PhysicalPropertySet) -> Self {
        Self {
            group_expr_id,
            required_prop,
            state: Init,
        }
    }

    fn do_init(mut self, ctx: &mut CascadesOptimizer) -> BasaltResult<TaskControl> {
        trace!("Current state {:?} for OptimizeInputsTask", &self);
        let operator = match ctx.memo[self.group_expr_id].operator() {
            Physical(op) => op,
            op => bail_internal!("Can't optimize inputs of logical operator {}", op),
        };

        let derive_results = operator.derive_properties(DerivePropContext {
            required_prop: &self.required_prop,
            expr_handle: self.group_expr_id,
            optimizer: &*ctx,
        })?;
        if derive_results.is_empty() {
            return Ok(TaskControl::done());
        }

        self.state = self.first_state(derive_results, 0, ctx)?;
        Ok(TaskControl::resume(self.into()))
    }

    /// Starts derive result `derive_idx` from its first input.
    fn first_state(
        &self,
        derive_results: Vec<DerivePropResult>,
        derive_idx: usize,
        ctx: &CascadesOptimizer,
    ) -> BasaltResult<OptimizeInputsTaskState> {
        let accumulated_cost = self.operator_cost(ctx)?;
        if self.inputs_len(ctx) == 0 {
            Ok(OptimizeSelf {
                derive_results,
                derive_idx,
                accumulated_cost,
            })
        } else {
            Ok(BeforeOptimizeInput {
                derive_results,
                derive_idx,
                input_idx: 0,
                accumulated_cost,
            })
        }
    }

    fn do_before_optimize_input(mut self, ctx: &CascadesOptimizer) -> BasaltResult<TaskControl> {
        trace!("Current state {:?} for OptimizeInputsTask", &self);
        match replace(&mut self.state, Invalid) {
            BeforeOptimizeInput {
                derive_results,
                derive_idx,
                input_idx,
                accumulated_cost,
            } => {
                let task = OptimizeGroupTask::new(
                    ctx.memo[self.group_expr_id].input_at(input_idx, ctx),
                    derive_results[derive_idx].input_required_props[input_idx].clone(),
                )
                .into();

                self.state = AfterOptimizeInput {
                    derive_results,
                    derive_idx,
                    input_idx,
                    accumulated_cost,
                };

                Ok(Yield {
                    this: self.into(),
                    dependencies: vec![task],
                })
            }
            _ => bail_internal!("Unexpected state before optimizing input"),
        }
    }

    fn do_after_optimize_input(mut self, ctx: &CascadesOptimizer) -> BasaltResult<TaskControl> {
        trace!("Current state {:?} for OptimizeInputsTask", &self);
        match replace(&mut self.state, Invalid) {
            AfterOptimizeInput {
                derive_results,
                derive_idx,
                input_idx,
                mut accumulated_cost,
            } => {
                let input_group_id = ctx.memo[self.group_expr_id].input_at(input_idx, ctx);
                let input_required_prop =
                    &derive_results[derive_idx].input_required_props[input_idx];

                if let Some(winner) = ctx.memo[input_group_id].winner(input_required_prop) {
                    accumulated_cost += winner.lowest_cost;

                    self.state = if (input_idx + 1) == self.inputs_len(ctx) {
                        OptimizeSelf {
                            derive_results,
                            derive_idx,
                            accumulated_cost,
                        }
                    } else {
                        BeforeOptimizeInput {
                            derive_results,
                            derive_idx,
                            input_idx: input_idx + 1,
                            accumulated_cost,
                        }
                    };
                } else {
                    // No plan for this input, so move to next derive result.
                    trace!(
                        "No plan for {} in group {}",
                        input_required_prop,
                        input_group_id
                    );
                    if (derive_idx + 1) < derive_results.len() {
                        self.state = self.first_state(derive_results, derive_idx + 1, ctx)?;
                    }
                }

                if matches!(self.state, Invalid) {
                    Ok(TaskControl::done())
                } else {
                    Ok(TaskControl::resume(self.into()))
                }
            }
            _ => bail_internal!("Unexpected state after optimizing input"),
        }
    }

    fn do_optimize_self(mut self, ctx: &mut CascadesOptimizer) -> BasaltResult<TaskControl> {
        trace!("Current state {:?} for OptimizeInputsTask", &self);
        match replace(&mut self.state, Invalid) {
            OptimizeSelf {
                derive_results,
                derive_idx,
                accumulated_cost,
            } => {
                self.record_winner(&derive_results[derive_idx], accumulated_cost, ctx)?;

                if (derive_idx + 1) == derive_results.len() {
                    Ok(TaskControl::done())
                } else {
                    self.state = self.first_state(derive_results, derive_idx + 1, ctx)?;
                    Ok(TaskControl::resume(self.into()))
                }
            }
            _ => bail_internal!("Unexpected state when optimizing self"),
        }
    }

    /// Records this expression as a plan for the required property, through enforcers when its
    /// output doesn't satisfy it.
    fn record_winner(
        &self,
        derive_result: &DerivePropResult,
        cost: Cost,
        ctx: &mut CascadesOptimizer,
    ) -> BasaltResult<()> {
        let group_id = self.group_expr_id.group_id();
        let output_prop = derive_result.output_prop.clone();
        let winner_input = WinnerInput {
            lowest_cost: cost,
            output_prop: output_prop.clone(),
            input_props: derive_result.input_required_props.clone(),
        };

        if output_prop.satisfies(&self.required_prop) {
            ctx.memo[group_id].update_winner(self.group_expr_id, &self.required_prop, winner_input)?;
            return Ok(());
        }

        // The plan without enforcers is the best known one for what it delivers.
        ctx.memo[group_id].update_winner(self.group_expr_id, &output_prop, winner_input)?;

        let mut accumulated_cost = cost;
        let mut current_prop = output_prop;
        for enforcer in PhysicalPropertySet::append_enforcers(&self.required_prop, &current_prop) {
            let enforcer_id = ctx.memo.insert_enforcer(group_id, Physical(enforcer.operator));
            accumulated_cost += ctx
                .cost_model
                .estimate_cost::<CascadesOptimizer>(&ctx.memo[enforcer_id])?;

            let satisfied = enforcer.output_prop.satisfies(&self.required_prop);
            let recorded_prop = if satisfied {
                self.required_prop.clone()
            } else {
                enforcer.output_prop.clone()
            };
            ctx.memo[group_id].update_winner(
                enforcer_id,
                &recorded_prop,
                WinnerInput {
                    lowest_cost: accumulated_cost,
                    output_prop: enforcer.output_prop.clone(),
                    input_props: vec![current_prop],
                },
            )?;

            if satisfied {
                return Ok(());
            }
            current_prop = enforcer.output_prop;
        }

        trace!(
            "{} can't be enforced to deliver {}",
            self.group_expr_id,
            self.required_prop
        );
        Ok(())
    }

    fn operator_cost(&self, ctx: &CascadesOptimizer) -> BasaltResult<Cost> {
        ctx.cost_model
            .estimate_cost::<CascadesOptimizer>(&ctx.memo[self.group_expr_id])
    }

    fn inputs_len(&self, ctx: &CascadesOptimizer) -> usize {
        ctx.memo[self.group_expr_id].inputs_len(ctx)
    }
}

impl Task for OptimizeInputsTask {
    fn execute(self, ctx: &mut CascadesOptimizer) -> BasaltResult<TaskControl> {
        match self.state {
            Init => self.do_init(ctx),
            BeforeOptimizeInput { .. } => self.do_before_optimize_input(ctx),
            AfterOptimizeInput { .. } => self.do_after_optimize_input(ctx),
            OptimizeSelf { .. } => self.do_optimize_self(ctx),
            Invalid => bail_internal!("OptimizeInputsTask scheduled in invalid state"),
        }
    }
}

/// Optimizes a group for [`PhysicalPropertySet`].
pub(super) struct OptimizeGroupTask {
    group_id: GroupId,
    /// Required property
    required_prop: PhysicalPropertySet,
}

impl OptimizeGroupTask {
    pub(super) fn new(group_id: GroupId, required_prop: PhysicalPropertySet) -> Self {
        Self {
            group_id,
            required_prop,
        }
    }
}

impl Task for OptimizeGroupTask {
    fn execute(self, ctx: &mut CascadesOptimizer) -> BasaltResult<TaskControl> {
        let group = &ctx.memo[self.group_id];
        if let Some(result) = group.winner(&self.required_prop) {
            trace!(
                "Winner for {} in group {} found: {:?}",
                self.required_prop,
                self.group_id,
                result
            );
            return Ok(TaskControl::done());
        }

        // A group reachable from itself through alternatives would be optimized forever.
        if !ctx
            .started
            .insert((self.group_id, self.required_prop.clone()))
        {
            trace!(
                "Group {} is already optimized for {}",
                self.group_id,
                self.required_prop
            );
            return Ok(TaskControl::done());
        }

        debug!(
            "Optimizing group {} for physical property {}",
            self.group_id, self.required_prop
        );
        let mut tasks = Vec::<TaskImpl>::with_capacity(group.expr_count());

        for group_expr_id in group.logical_group_expr_ids() {
            tasks.push(
                OptimizeExpressionTask {
                    group_expr_id,
                    required_prop: self.required_prop.clone(),
                }
                .into(),
            );
        }

        // Physical expressions run first. Enforcers are costed with the expression below them.
        for group_expr_id in group.physical_group_expr_ids() {
            if group[group_expr_id].is_enforcer_of(self.group_id) {
                continue;
            }
            tasks.push(OptimizeInputsTask::new(group_expr_id, self.required_prop.clone()).into());
        }

        Ok(TaskControl::done_with_deps(tasks))
    }
}

/// Explores a group by applying rules to all of its logical expressions.
pub(super) struct ExploreGroupTask {
    group_id: GroupId,
    required_prop: PhysicalPropertySet,
}

impl Task for ExploreGroupTask {
    fn execute(self, ctx: &mut CascadesOptimizer) -> BasaltResult<TaskControl> {
        if ctx.memo[self.group_id].explored {
            return Ok(TaskControl::done());
        }

        let tasks = ctx.memo[self.group_id]
            .logical_group_expr_ids()
            .into_iter()
            .map(|group_expr_id| {
                OptimizeExpressionTask {
                    group_expr_id,
                    required_prop: self.required_prop.clone(),
                }
                .into()
            })
            .collect();

        // This is correct since currently we have only single thread scheduler.
        ctx.memo[self.group_id].explored = true;

        Ok(TaskControl::done_with_deps(tasks))
    }
}

#[cfg(test)]
mod tests {
    use crate::cascades::task::{ApplyRuleTask, Task};
    use crate::cascades::{CascadesOptimizer, GroupId};
    use crate::config::PlannerConfig;
    use crate::operator::LogicalOperator::{LogicalJoin, LogicalProject};
    use crate::operator::Operator::Logical;
    use crate::operator::JoinKind;
    use crate::plan::LogicalPlanBuilder;
    use crate::properties::PhysicalPropertySet;
    use crate::rex::{Kind, RexBuilder};
    use crate::rules::{CommutateJoinRule, EnumerableScanRule, RuleId, RuleImpl};
    use crate::test_utils::{binary, test_context, typed_ref};
    use crate::types::PolyType;

    fn emp_join_dept(threshold: usize) -> CascadesOptimizer {
        let dept = LogicalPlanBuilder::new().scan("public", "dept").build().root();
        let plan = LogicalPlanBuilder::new()
            .scan("public", "emp")
            .join(
                JoinKind::Inner,
                binary(
                    &RexBuilder::default(),
                    Kind::Equals,
                    typed_ref(2, PolyType::Integer, true),
                    typed_ref(4, PolyType::Integer, false),
                ),
                dept,
            )
            .build();
        let context = test_context()
            .with_config(PlannerConfig {
                join_reorder_threshold: threshold,
                ..PlannerConfig::default()
            })
            .unwrap();
        CascadesOptimizer::new(PhysicalPropertySet::default(), vec![], plan, context).unwrap()
    }

    #[test]
    fn test_apply_rule_task() {
        let mut optimizer = emp_join_dept(2);
        let root_group_id = optimizer.memo.root_group_id();
        let join_expr_id = optimizer.memo[root_group_id].logical_group_expr_ids()[0];

        let task = ApplyRuleTask {
            rule: CommutateJoinRule::new().into(),
            group_expr_id: join_expr_id,
            required_prop: PhysicalPropertySet::default(),
        };
        task.execute(&mut optimizer).unwrap();

        let root_group = &optimizer.memo[root_group_id];
        let group_expressions = root_group.logical_group_expr_ids();
        assert_eq!(2, group_expressions.len());

        // Original join
        assert!(matches!(
            optimizer.memo[group_expressions[0]].operator(),
            Logical(LogicalJoin(_))
        ));
        assert_eq!(
            &[GroupId(0), GroupId(1)],
            optimizer.memo[group_expressions[0]].inputs()
        );

        // Project restoring the field order over the swapped join
        let project = &optimizer.memo[group_expressions[1]];
        assert!(matches!(project.operator(), Logical(LogicalProject(_))));
        let swapped_group = &optimizer.memo[project.inputs()[0]];
        let swapped = &optimizer.memo[swapped_group.logical_group_expr_ids()[0]];
        assert!(matches!(swapped.operator(), Logical(LogicalJoin(_))));
        assert_eq!(&[GroupId(1), GroupId(0)], swapped.inputs());

        assert!(optimizer.memo[join_expr_id].is_rule_applied(RuleId::CommutateJoin));
    }

    #[test]
    fn test_rule_not_matching_adds_nothing() {
        let mut optimizer = emp_join_dept(3);
        let root_group_id = optimizer.memo.root_group_id();
        let join_expr_id = optimizer.memo[root_group_id].logical_group_expr_ids()[0];

        let rules: [RuleImpl; 2] = [
            CommutateJoinRule::new().into(),
            EnumerableScanRule::new().into(),
        ];
        for rule in rules {
            ApplyRuleTask {
                rule,
                group_expr_id: join_expr_id,
                required_prop: PhysicalPropertySet::default(),
            }
            .execute(&mut optimizer)
            .unwrap();
        }

        let root_group = &optimizer.memo[root_group_id];
        assert_eq!(1, root_group.logical_group_expr_ids().len());
        assert!(root_group.physical_group_expr_ids().is_empty());
        assert_eq!(3, optimizer.memo.group_count());
    }
}
