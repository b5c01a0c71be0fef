use crate::error::{BasaltError, BasaltResult};
use crate::operator::JoinKind::Inner;
use crate::operator::LogicalOperator::{LogicalJoin, LogicalProject};
use crate::operator::Operator::Logical;
use crate::operator::{Join, Project};
use crate::optimizer::Optimizer;
use crate::rex::RexNode;
use crate::rules::RulePromise::LOW;
use crate::rules::{
    pattern, OptExpression, PatterBuilder, Pattern, Rule, RuleId, RulePromise, RuleResult,
};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref COMMUTATE_JOIN_RULE_PATTERN: Pattern =
        Pattern::new_leaf(|op| matches!(op, Logical(LogicalJoin(_))));
    static ref JOIN_ASSOCIATE_RULE_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalJoin(_))))
            .leaf(|op| matches!(op, Logical(LogicalJoin(_))))
            .leaf(|_| true)
        .finish()
    };
}

/// Uncorrelated join covering enough relations to be reordered.
fn reorderable<O: Optimizer>(input: &OptExpression<O>, ctx: &O) -> BasaltResult<bool> {
    let covered = input.logical_prop(ctx)?.relation_count();
    Ok(covered >= ctx.context().config.join_reorder_threshold
        && matches!(
            input.get_operator(ctx)?,
            Logical(LogicalJoin(join)) if !join.condition().contains_correlation()
        ))
}

/// Only inner joins are reordered, an outer join would need its kind mirrored.
fn check_inner(join: &Join) -> BasaltResult<()> {
    if join.kind() != Inner {
        return Err(BasaltError::Unsupported(format!(
            "Reordering {:?} joins",
            join.kind()
        )));
    }
    Ok(())
}

/// Swaps the inputs of an inner join.
///
/// A projection on top restores the original field order.
#[derive(Clone, Default)]
pub struct CommutateJoinRule {}

impl CommutateJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for CommutateJoinRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        let join = match input.get_operator(ctx)? {
            Logical(LogicalJoin(join)) => join,
            _ => bail_internal!("Pattern miss matched"),
        };
        check_inner(join)?;
        let left_count = input.input_prop(0, ctx)?.field_count();
        let right_count = input.input_prop(1, ctx)?.field_count();
        let row_type = input.logical_prop(ctx)?.row_type();

        let condition = join.condition().map_input_refs(|idx| {
            if idx < left_count {
                idx + right_count
            } else {
                idx - left_count
            }
        })?;
        let builder = ctx.context().rex_builder();
        let exprs = row_type
            .fields()
            .iter()
            .map(|field| {
                let idx = field.index();
                let swapped = if idx < left_count {
                    idx + right_count
                } else {
                    idx - left_count
                };
                builder.make_input_ref(swapped, field.data_type().clone())
            })
            .collect::<Vec<RexNode>>();

        let swapped_join = OptExpression::with_operator(
            Logical(LogicalJoin(Join::new(Inner, condition))),
            vec![input[1].clone(), input[0].clone()],
        );
        let ret = OptExpression::new_builder(Logical(LogicalProject(Project::new(
            exprs,
            row_type.field_names(),
        ))))
        .add_child(swapped_join)
        .end_node();
        result.add(ret);
        Ok(())
    }

    fn matches<O: Optimizer>(&self, input: &OptExpression<O>, ctx: &O) -> BasaltResult<bool> {
        reorderable(input, ctx)
    }

    fn pattern(&self) -> &Pattern {
        &COMMUTATE_JOIN_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::CommutateJoin
    }

    fn rule_promise(&self) -> RulePromise {
        LOW
    }
}

/// Rotates `(A join B) join C` into `A join (B join C)`.
///
/// Conjuncts referencing only `B` and `C` move to the new bottom join, the field order of the
/// result is unchanged.
#[derive(Clone, Default)]
pub struct JoinAssociateRule {}

impl JoinAssociateRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for JoinAssociateRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        let (top, bottom) = match (input.get_operator(ctx)?, input[0].get_operator(ctx)?) {
            (Logical(LogicalJoin(top)), Logical(LogicalJoin(bottom))) => (top, bottom),
            _ => bail_internal!("Pattern miss matched"),
        };
        check_inner(top)?;
        check_inner(bottom)?;
        let a_count = input[0].input_prop(0, ctx)?.field_count();

        let (mut top_conjunctions, mut bottom_conjunctions) = (vec![], vec![]);
        for conjunct in top
            .condition()
            .conjunctions()
            .into_iter()
            .chain(bottom.condition().conjunctions())
        {
            let refs = conjunct.input_refs();
            if !refs.is_empty() && refs.iter().all(|idx| *idx >= a_count) {
                bottom_conjunctions.push(conjunct.shift(-(a_count as isize))?);
            } else {
                top_conjunctions.push(conjunct);
            }
        }

        let builder = ctx.context().rex_builder();
        let new_bottom = OptExpression::with_operator(
            Logical(LogicalJoin(Join::new(Inner, builder.and(bottom_conjunctions)?))),
            vec![input[0][1].clone(), input[1].clone()],
        );
        let ret = OptExpression::with_operator(
            Logical(LogicalJoin(Join::new(Inner, builder.and(top_conjunctions)?))),
            vec![input[0][0].clone(), new_bottom],
        );
        result.add(ret);
        Ok(())
    }

    fn matches<O: Optimizer>(&self, input: &OptExpression<O>, ctx: &O) -> BasaltResult<bool> {
        Ok(reorderable(input, ctx)?
            && matches!(
                input[0].get_operator(ctx)?,
                Logical(LogicalJoin(join)) if !join.condition().contains_correlation()
            ))
    }

    fn pattern(&self) -> &Pattern {
        &JOIN_ASSOCIATE_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::JoinAssociate
    }

    fn rule_promise(&self) -> RulePromise {
        LOW
    }
}
