use crate::error::BasaltResult;
use crate::operator::JoinKind::Inner;
use crate::operator::LogicalOperator::{LogicalFilter, LogicalJoin, LogicalProject};
use crate::operator::Operator::Logical;
use crate::operator::{Filter, Join};
use crate::optimizer::Optimizer;
use crate::rules::RulePromise::Medium;
use crate::rules::{
    pattern, OptExpression, PatterBuilder, Pattern, Rule, RuleId, RulePromise, RuleResult,
};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref FILTER_MERGE_RULE_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalFilter(_))))
            .leaf(|op| matches!(op, Logical(LogicalFilter(_))))
        .finish()
    };
    static ref FILTER_PROJECT_TRANSPOSE_RULE_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalFilter(_))))
            .leaf(|op| matches!(op, Logical(LogicalProject(_))))
        .finish()
    };
    static ref FILTER_INTO_JOIN_RULE_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalFilter(_))))
            .leaf(|op| matches!(op, Logical(LogicalJoin(_))))
        .finish()
    };
}

/// Combines two adjacent filters into one with the conjunction of both conditions.
#[derive(Clone, Default)]
pub struct FilterMergeRule {}

impl FilterMergeRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for FilterMergeRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        if let (Logical(LogicalFilter(top)), Logical(LogicalFilter(bottom))) =
            (input.get_operator(ctx)?, input[0].get_operator(ctx)?)
        {
            let condition = ctx
                .context()
                .rex_builder()
                .and(vec![top.condition().clone(), bottom.condition().clone()])?;
            result.add(input[0].clone_with_inputs(Logical(LogicalFilter(Filter::new(condition)))));
            Ok(())
        } else {
            bail_internal!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &FILTER_MERGE_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::FilterMerge
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

/// Pushes a filter below a projection, rewriting the condition over the projection's input.
#[derive(Clone, Default)]
pub struct FilterProjectTransposeRule {}

impl FilterProjectTransposeRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for FilterProjectTransposeRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        if let (Logical(LogicalFilter(filter)), project @ Logical(LogicalProject(p))) =
            (input.get_operator(ctx)?, input[0].get_operator(ctx)?)
        {
            let condition = filter.condition().inline(p.exprs())?;
            let new_filter = input[0].clone_with_inputs(Logical(LogicalFilter(Filter::new(condition))));
            result.add(OptExpression::with_operator(project.clone(), vec![new_filter]));
            Ok(())
        } else {
            bail_internal!("Pattern miss matched")
        }
    }

    /// Correlated conditions stay where they are.
    fn matches<O: Optimizer>(&self, input: &OptExpression<O>, ctx: &O) -> BasaltResult<bool> {
        match input.get_operator(ctx)? {
            Logical(LogicalFilter(filter)) => Ok(!filter.condition().contains_correlation()),
            _ => Ok(false),
        }
    }

    fn pattern(&self) -> &Pattern {
        &FILTER_PROJECT_TRANSPOSE_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::FilterProjectTranspose
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

/// Moves a filter over an inner join into the join condition.
#[derive(Clone, Default)]
pub struct FilterIntoJoinRule {}

impl FilterIntoJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for FilterIntoJoinRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        if let (Logical(LogicalFilter(filter)), Logical(LogicalJoin(join))) =
            (input.get_operator(ctx)?, input[0].get_operator(ctx)?)
        {
            let conjunctions = join
                .condition()
                .conjunctions()
                .into_iter()
                .chain(filter.condition().conjunctions())
                .collect();
            let condition = ctx.context().rex_builder().and(conjunctions)?;
            result.add(input[0].clone_with_inputs(Logical(LogicalJoin(Join::new(Inner, condition)))));
            Ok(())
        } else {
            bail_internal!("Pattern miss matched")
        }
    }

    fn matches<O: Optimizer>(&self, input: &OptExpression<O>, ctx: &O) -> BasaltResult<bool> {
        Ok(matches!(
            input[0].get_operator(ctx)?,
            Logical(LogicalJoin(join)) if join.kind() == Inner
        ))
    }

    fn pattern(&self) -> &Pattern {
        &FILTER_INTO_JOIN_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::FilterIntoJoin
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}
