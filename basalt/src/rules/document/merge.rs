use crate::error::BasaltResult;
use crate::operator::DocumentFilter;
use crate::operator::LogicalOperator::LogicalDocumentFilter;
use crate::operator::Operator::Logical;
use crate::optimizer::Optimizer;
use crate::rules::document::lowering::contains_geo_query;
use crate::rules::RulePromise::Medium;
use crate::rules::{
    pattern, OptExpression, PatterBuilder, Pattern, Rule, RuleId, RulePromise, RuleResult,
};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref MERGE_DOCUMENT_FILTER_RULE_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalDocumentFilter(_))))
            .leaf(|op| matches!(op, Logical(LogicalDocumentFilter(_))))
        .finish()
    };
}

/// Merges two adjacent document filters into one, the inner condition comes first.
///
/// Geo queries reorder their output and are left for the unwrap rules.
#[derive(Clone, Default)]
pub struct MergeDocumentFilterRule {}

impl MergeDocumentFilterRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for MergeDocumentFilterRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        if let (Logical(LogicalDocumentFilter(outer)), Logical(LogicalDocumentFilter(inner))) =
            (input.get_operator(ctx)?, input[0].get_operator(ctx)?)
        {
            let condition = ctx
                .context()
                .rex_builder()
                .and(vec![inner.condition().clone(), outer.condition().clone()])?;
            result.add(
                input[0].clone_with_inputs(Logical(LogicalDocumentFilter(DocumentFilter::new(
                    condition,
                )))),
            );
            Ok(())
        } else {
            bail_internal!("Pattern miss matched")
        }
    }

    fn matches<O: Optimizer>(&self, input: &OptExpression<O>, ctx: &O) -> BasaltResult<bool> {
        match (input.get_operator(ctx)?, input[0].get_operator(ctx)?) {
            (Logical(LogicalDocumentFilter(outer)), Logical(LogicalDocumentFilter(inner))) => Ok(
                !contains_geo_query(outer.condition()) && !contains_geo_query(inner.condition()),
            ),
            _ => Ok(false),
        }
    }

    fn pattern(&self) -> &Pattern {
        &MERGE_DOCUMENT_FILTER_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::MergeDocumentFilter
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}
