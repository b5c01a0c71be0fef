use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Display, Formatter};
use std::ops::{Index, IndexMut};
use std::sync::Arc;

use enumset::EnumSet;
use log::debug;
use prettytable::Table;

use crate::cascades::CascadesOptimizer;
use crate::cost::Cost;
use crate::error::{BasaltError, BasaltResult};
use crate::operator::{Operator, OperatorTrait};
use crate::optimizer::{OptExpr, OptExprHandle, OptGroup, OptGroupHandle, OptimizerContext};
use crate::plan::{Plan, PlanNodeBuilder, PlanNodeId, PlanNodeRef};
use crate::properties::{LogicalProperty, PhysicalPropertySet};
use crate::rules::OptExprNode::{ExprHandleNode, GroupHandleNode, OperatorNode};
use crate::rules::{OptExpression, Pattern, RuleId};

/// Dynamic programming table used for storing expression groups.
///
/// Groups are never merged. When a rule produces an expression already stored in another group,
/// the existing expression is reused and the two groups stay apart.
pub(super) struct Memo {
    /// Used to avoid insert duplicate group expression.
    group_exprs: HashMap<GroupExprKey, GroupExprId>,
    groups: Vec<Group>,
    root_group_id: GroupId,
}

impl Memo {
    /// Copies `plan` into a memo, one group per distinct subtree.
    pub(super) fn new(plan: &Plan, context: &OptimizerContext) -> BasaltResult<Self> {
        let mut memo = Memo {
            group_exprs: HashMap::new(),
            groups: vec![],
            root_group_id: GroupId(0),
        };
        memo.root_group_id = memo.insert_plan_node(&plan.root(), context)?;
        Ok(memo)
    }

    fn insert_plan_node(
        &mut self,
        node: &PlanNodeRef,
        context: &OptimizerContext,
    ) -> BasaltResult<GroupId> {
        let inputs = node
            .inputs()
            .iter()
            .map(|input| self.insert_plan_node(input, context))
            .collect::<BasaltResult<Vec<_>>>()?;
        let key = GroupExprKey {
            operator: node.operator().clone(),
            inputs,
        };
        Ok(self.insert_group_expression(key, None, context)?.group_id)
    }

    pub(super) fn root_group_id(&self) -> GroupId {
        self.root_group_id
    }

    pub(super) fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Find best plan from root group.
    pub(super) fn best_plan(&self, required_prop: &PhysicalPropertySet) -> BasaltResult<Plan> {
        let root_group = &self[self.root_group_id];
        if root_group.winner(required_prop).is_none() {
            return Err(BasaltError::CannotPlan {
                required: required_prop.to_string(),
                root: root_group.describe(),
            });
        }

        let mut next_plan_node_id = 0;
        root_group
            .best_plan_of(required_prop, self, &mut next_plan_node_id)
            .map(Plan::new)
    }

    /// Insert a rule result into memo and return group expression id.
    ///
    /// Subtrees kept from the binding are handles and are not inserted again. New operators
    /// without a target group open a new group.
    pub(super) fn insert_opt_expression(
        &mut self,
        opt_expr: &OptExpression<CascadesOptimizer>,
        target_group: Option<GroupId>,
        context: &OptimizerContext,
    ) -> BasaltResult<GroupExprId> {
        match opt_expr.node() {
            ExprHandleNode(group_expr_id) => Ok(*group_expr_id),
            OperatorNode(operator) => {
                let inputs = opt_expr
                    .inputs()
                    .iter()
                    .map(|input| match input.node() {
                        GroupHandleNode(group_id) => Ok(*group_id),
                        _ => Ok(self.insert_opt_expression(input, None, context)?.group_id),
                    })
                    .collect::<BasaltResult<Vec<_>>>()?;

                let key = GroupExprKey {
                    operator: operator.clone(),
                    inputs,
                };
                self.insert_group_expression(key, target_group, context)
            }
            GroupHandleNode(group_id) => {
                bail_internal!("Group handle {} can't be inserted as expression", group_id)
            }
        }
    }

    pub(super) fn insert_group_expression(
        &mut self,
        key: GroupExprKey,
        target_group: Option<GroupId>,
        context: &OptimizerContext,
    ) -> BasaltResult<GroupExprId> {
        if let Some(existing) = self.group_exprs.get(&key) {
            if let Some(target) = target_group.filter(|target| *target != existing.group_id) {
                debug!(
                    "Expression {} of group {} is already stored in group {}",
                    key.operator, target, existing.group_id
                );
            }
            return Ok(*existing);
        }

        let logical_prop = {
            let input_props = key
                .inputs
                .iter()
                .map(|group_id| &self[*group_id].logical_prop)
                .collect::<Vec<_>>();
            key.operator.derive_logical_prop(&input_props, context)?
        };

        let group_id = match target_group {
            Some(target) => {
                let expected = self[target].logical_prop.field_count();
                if logical_prop.field_count() != expected {
                    bail_internal!(
                        "{} produces {} fields, group {} has {}",
                        key.operator,
                        logical_prop.field_count(),
                        target,
                        expected
                    );
                }
                target
            }
            None => {
                let group_id = GroupId(self.groups.len());
                self.groups.push(Group::new(group_id, logical_prop));
                group_id
            }
        };

        let group_expr_id =
            self[group_id].insert_group_expr(GroupExpr::new(group_id, key.clone()));
        self.group_exprs.insert(key, group_expr_id);
        Ok(group_expr_id)
    }

    /// Adds `operator` over its own group.
    ///
    /// Enforcers are kept out of duplicate detection, the same operator over the same group may
    /// also be a regular expression of a parent group.
    pub(super) fn insert_enforcer(&mut self, group_id: GroupId, operator: Operator) -> GroupExprId {
        let key = GroupExprKey {
            operator,
            inputs: vec![group_id],
        };
        let group = &mut self[group_id];
        let existing = group
            .physical_group_exprs
            .iter()
            .find(|(_, group_expr)| group_expr.key == key)
            .map(|(group_expr_id, _)| *group_expr_id);
        match existing {
            Some(group_expr_id) => group_expr_id,
            None => group.insert_group_expr(GroupExpr::new(group_id, key)),
        }
    }
}

impl Index<GroupId> for Memo {
    type Output = Group;

    fn index(&self, index: GroupId) -> &Group {
        &self.groups[index.0]
    }
}

impl IndexMut<GroupId> for Memo {
    fn index_mut(&mut self, index: GroupId) -> &mut Self::Output {
        &mut self.groups[index.0]
    }
}

impl Index<GroupExprId> for Memo {
    type Output = GroupExpr;

    fn index(&self, index: GroupExprId) -> &Self::Output {
        &self[index.group_id][index]
    }
}

impl IndexMut<GroupExprId> for Memo {
    fn index_mut(&mut self, index: GroupExprId) -> &mut Self::Output {
        &mut self[index.group_id][index]
    }
}

impl Debug for Memo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Memo with root group {}:", self.root_group_id)?;
        for group in &self.groups {
            writeln!(f, "{:?}", group)?;
        }
        Ok(())
    }
}

/// A group id is an index of `groups` in `Memo`.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, Ord, PartialOrd)]
pub struct GroupId(pub usize);

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OptGroupHandle for GroupId {
    type O = CascadesOptimizer;
}

/// A group expression id is a key of `physical_group_exprs` or `logical_group_exprs` in `Group`.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, Ord, PartialOrd)]
pub struct GroupExprId {
    pub(super) group_id: GroupId,
    pub(super) expr_id: usize,
}

impl Display for GroupExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.group_id, self.expr_id)
    }
}

impl OptExprHandle for GroupExprId {
    type O = CascadesOptimizer;
}

impl GroupExprId {
    pub fn new(group_id: GroupId, expr_id: usize) -> Self {
        Self { group_id, expr_id }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }
}

/// A group contains a set of logically equivalent `GroupExpression`s.
pub struct Group {
    group_id: GroupId,
    /// Shared by all expressions, derived from the first one.
    logical_prop: LogicalProperty,
    pub(super) logical_group_exprs: BTreeMap<GroupExprId, GroupExpr>,
    pub(super) physical_group_exprs: BTreeMap<GroupExprId, GroupExpr>,

    /// Lowest cost plans for each required [`PhysicalPropertySet`].
    best_plans: HashMap<PhysicalPropertySet, OptimizationResult>,

    /// All logical expression has been explored.
    pub(super) explored: bool,

    next_expr_id: usize,
}

impl Debug for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Group {} {}:", self.group_id, self.logical_prop.row_type())?;

        let mut table = Table::new();
        table.add_row(row!["Group Expression Id", "Operator", "Inputs"]);
        for (group_expr_id, group_expr) in self
            .logical_group_exprs
            .iter()
            .chain(self.physical_group_exprs.iter())
        {
            table.add_row(row![
                group_expr_id,
                group_expr.key.operator,
                format!("{:?}", group_expr.key.inputs)
            ]);
        }

        writeln!(f, "{}", table)
    }
}

impl Index<GroupExprId> for Group {
    type Output = GroupExpr;

    fn index(&self, index: GroupExprId) -> &Self::Output {
        match self
            .logical_group_exprs
            .get(&index)
            .or_else(|| self.physical_group_exprs.get(&index))
        {
            Some(group_expr) => group_expr,
            None => panic!("Group expression {} not found in group {}", index, self.group_id),
        }
    }
}

impl IndexMut<GroupExprId> for Group {
    fn index_mut(&mut self, index: GroupExprId) -> &mut Self::Output {
        let group_id = self.group_id;
        match self.logical_group_exprs.get_mut(&index) {
            Some(group_expr) => group_expr,
            None => match self.physical_group_exprs.get_mut(&index) {
                Some(group_expr) => group_expr,
                None => panic!("Group expression {} not found in group {}", index, group_id),
            },
        }
    }
}

impl OptGroup for Group {
    fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }
}

impl Group {
    fn new(group_id: GroupId, logical_prop: LogicalProperty) -> Self {
        Self {
            group_id,
            logical_prop,
            logical_group_exprs: BTreeMap::new(),
            physical_group_exprs: BTreeMap::new(),
            best_plans: HashMap::new(),
            explored: false,
            next_expr_id: 0,
        }
    }

    pub(super) fn winner(
        &self,
        physical_prop_set: &PhysicalPropertySet,
    ) -> Option<&OptimizationResult> {
        self.best_plans.get(physical_prop_set)
    }

    pub(super) fn physical_group_expr_ids(&self) -> Vec<GroupExprId> {
        self.physical_group_exprs.keys().copied().collect()
    }

    pub(super) fn logical_group_expr_ids(&self) -> Vec<GroupExprId> {
        self.logical_group_exprs.keys().copied().collect()
    }

    /// Records `group_expr_id` as the plan for `required_prop` unless a plan at most as expensive
    /// is already known.
    pub(super) fn update_winner(
        &mut self,
        group_expr_id: GroupExprId,
        required_prop: &PhysicalPropertySet,
        winner_input: WinnerInput,
    ) -> BasaltResult<bool> {
        if let Some(winner) = self.winner(required_prop) {
            if winner.lowest_cost <= winner_input.lowest_cost {
                return Ok(false);
            }
        }

        debug!(
            "New winner {} for {} in group {} with cost {:?}",
            group_expr_id, required_prop, self.group_id, winner_input.lowest_cost
        );
        self.best_plans.insert(
            required_prop.clone(),
            OptimizationResult {
                lowest_cost: winner_input.lowest_cost,
                group_expr_id,
            },
        );

        match self.physical_group_exprs.get_mut(&group_expr_id) {
            Some(group_expr) => {
                group_expr
                    .output_prop_map
                    .insert(required_prop.clone(), winner_input);
                Ok(true)
            }
            None => bail_internal!("Winner {} is not a physical expression", group_expr_id),
        }
    }

    /// Number of group expressions.
    pub(super) fn expr_count(&self) -> usize {
        self.logical_group_exprs.len() + self.physical_group_exprs.len()
    }

    fn insert_group_expr(&mut self, group_expr: GroupExpr) -> GroupExprId {
        let group_expr_id = GroupExprId::new(self.group_id, self.next_expr_id);
        self.next_expr_id += 1;

        if group_expr.is_logical() {
            self.logical_group_exprs.insert(group_expr_id, group_expr);
        } else {
            self.physical_group_exprs.insert(group_expr_id, group_expr);
        }

        group_expr_id
    }

    /// First logical expression, used to name a group in errors.
    fn describe(&self) -> String {
        self.logical_group_exprs
            .values()
            .chain(self.physical_group_exprs.values())
            .next()
            .map(|group_expr| group_expr.operator().to_string())
            .unwrap_or_else(|| format!("group {}", self.group_id))
    }

    fn best_plan_of(
        &self,
        prop: &PhysicalPropertySet,
        memo: &Memo,
        next_plan_node_id: &mut PlanNodeId,
    ) -> BasaltResult<PlanNodeRef> {
        let winner = match self.winner(prop) {
            Some(winner) => winner,
            None => bail_internal!("Plan with property {} not found in group {}", prop, self.group_id),
        };
        let best_group_expr = &self[winner.group_expr_id];
        let winner_input = match best_group_expr.output_prop_map.get(prop) {
            Some(winner_input) => winner_input,
            None => bail_internal!("Inputs of winner {} not recorded", winner.group_expr_id),
        };

        let plan_node_id = *next_plan_node_id;
        *next_plan_node_id += 1;

        let input_plans = best_group_expr
            .key
            .inputs
            .iter()
            .zip(&winner_input.input_props)
            .map(|(group_id, input_prop)| {
                memo[*group_id].best_plan_of(input_prop, memo, next_plan_node_id)
            })
            .collect::<BasaltResult<Vec<_>>>()?;

        Ok(Arc::new(
            PlanNodeBuilder::new(plan_node_id, best_group_expr.operator())
                .add_inputs(input_plans)
                .with_logical_prop(Some(self.logical_prop.clone()))
                .with_physical_props(Some(winner_input.output_prop.clone()))
                .build(),
        ))
    }
}

/// Base group expression information.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub(super) struct GroupExprKey {
    pub(super) operator: Operator,
    pub(super) inputs: Vec<GroupId>,
}

pub struct GroupExpr {
    /// Group this expression belongs to.
    group_id: GroupId,

    /// Can be used to uniquely identify a group expression.
    ///
    /// It should not be changed after creation.
    key: GroupExprKey,

    /// Rules already applied to this group expression.
    applied_rules: EnumSet<RuleId>,

    /// Key is required property, while value is the winner sub plan's required properties and
    /// cost.
    output_prop_map: HashMap<PhysicalPropertySet, WinnerInput>,
}

impl OptExpr for GroupExpr {
    type O = CascadesOptimizer;
    type InputHandle = GroupId;

    fn operator(&self) -> &Operator {
        GroupExpr::operator(self)
    }

    fn inputs_len(&self, _opt: &CascadesOptimizer) -> usize {
        self.key.inputs.len()
    }

    fn input_at(&self, idx: usize, _opt: &CascadesOptimizer) -> GroupId {
        self.key.inputs[idx]
    }

    fn logical_prop<'a>(&'a self, opt: &'a CascadesOptimizer) -> &'a LogicalProperty {
        opt.memo[self.group_id].logical_prop()
    }
}

impl GroupExpr {
    pub(super) fn new(group_id: GroupId, key: GroupExprKey) -> Self {
        Self {
            group_id,
            key,
            applied_rules: EnumSet::new(),
            output_prop_map: HashMap::new(),
        }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub(super) fn is_rule_applied(&self, rule_id: RuleId) -> bool {
        self.applied_rules.contains(rule_id)
    }

    pub(super) fn set_rule_applied(&mut self, rule_id: RuleId) {
        self.applied_rules |= rule_id;
    }

    pub(super) fn input_group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.key.inputs.iter().copied()
    }

    pub(super) fn matches_without_children(&self, pattern: &Pattern) -> bool {
        pattern.matches(self.operator())
            && (pattern
                .children
                .as_ref()
                .map(|c| c.len() == self.key.inputs.len())
                .unwrap_or(true))
    }

    pub fn operator(&self) -> &Operator {
        &self.key.operator
    }

    pub fn is_logical(&self) -> bool {
        matches!(self.operator(), Operator::Logical(_))
    }

    pub(super) fn inputs(&self) -> &[GroupId] {
        &self.key.inputs
    }

    /// Enforcers are the only expressions reading their own group.
    pub(super) fn is_enforcer_of(&self, group_id: GroupId) -> bool {
        self.key.inputs.contains(&group_id)
    }
}

/// The result of finding the lowest cost physical group expression for [`PhysicalPropertySet`].
#[derive(Debug)]
pub(super) struct OptimizationResult {
    pub(super) lowest_cost: Cost,
    /// Id of lowest cost physical group expression.
    pub(super) group_expr_id: GroupExprId,
}

#[derive(Debug)]
pub(super) struct WinnerInput {
    pub(super) lowest_cost: Cost,
    /// Properties the winner delivers, they satisfy the required ones.
    pub(super) output_prop: PhysicalPropertySet,
    /// Required properties of inputs.
    pub(super) input_props: Vec<PhysicalPropertySet>,
}
