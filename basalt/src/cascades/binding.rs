use std::vec::IntoIter;

use itertools::Itertools;

use crate::cascades::memo::Memo;
use crate::cascades::{CascadesOptimizer, GroupExprId, GroupId};
use crate::rules::{OptExpression, Pattern};

type OptExpr = OptExpression<CascadesOptimizer>;

/// All ways `pattern` matches the memo rooted at one group expression.
///
/// Children patterns are matched against every logical expression of the input group, so one
/// group expression may produce many bindings. Leaves bind their inputs as group handles.
pub(super) struct Binding<'a, 'b> {
    group_expr_id: GroupExprId,
    memo: &'a Memo,
    pattern: &'b Pattern,
}

impl<'a, 'b> IntoIterator for Binding<'a, 'b> {
    type Item = OptExpr;
    type IntoIter = IntoIter<OptExpr>;

    fn into_iter(self) -> Self::IntoIter {
        bind_expr(self.memo, self.group_expr_id, self.pattern).into_iter()
    }
}

impl<'a, 'b> Binding<'a, 'b> {
    pub(super) fn new(group_expr_id: GroupExprId, pattern: &'b Pattern, memo: &'a Memo) -> Self {
        Self {
            group_expr_id,
            memo,
            pattern,
        }
    }
}

fn bind_expr(memo: &Memo, group_expr_id: GroupExprId, pattern: &Pattern) -> Vec<OptExpr> {
    let group_expr = &memo[group_expr_id];
    if !group_expr.matches_without_children(pattern) {
        return vec![];
    }

    match &pattern.children {
        Some(children_patterns) => children_patterns
            .iter()
            .zip(group_expr.input_group_ids())
            .map(|(pattern, group_id)| bind_group(memo, group_id, pattern).into_iter())
            .multi_cartesian_product()
            .map(|inputs| OptExpression::with_expr_handle(group_expr_id, inputs))
            .collect(),
        None => vec![OptExpression::with_expr_handle(
            group_expr_id,
            group_expr
                .input_group_ids()
                .map(OptExpr::with_group_handle)
                .collect::<Vec<_>>(),
        )],
    }
}

fn bind_group(memo: &Memo, group_id: GroupId, pattern: &Pattern) -> Vec<OptExpr> {
    memo[group_id]
        .logical_group_expr_ids()
        .into_iter()
        .flat_map(|group_expr_id| bind_expr(memo, group_expr_id, pattern))
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::cascades::binding::Binding;
    use crate::cascades::CascadesOptimizer;
    use crate::operator::LogicalOperator::{LogicalDocumentFilter, LogicalDocumentSort};
    use crate::operator::Operator::Logical;
    use crate::operator::DocumentFilter;
    use crate::plan::LogicalPlanBuilder;
    use crate::properties::{Direction, PhysicalPropertySet};
    use crate::rex::{QueryLanguage, RexBuilder, RexNode};
    use crate::rules::OptExprNode::GroupHandleNode;
    use crate::rules::{any, pattern, OptExpression, PatterBuilder};
    use crate::test_utils::{int_literal, test_context};

    fn amount_above(value: i64) -> RexNode {
        let builder = RexBuilder::default();
        builder
            .call(
                QueryLanguage::Mongo,
                "$gt",
                vec![builder.make_name_ref("amount"), int_literal(value)],
            )
            .unwrap()
    }

    fn create_optimizer() -> CascadesOptimizer {
        let plan = LogicalPlanBuilder::new()
            .scan("shop", "orders")
            .document_filter(amount_above(5))
            .document_sort(
                vec![(RexBuilder::default().make_name_ref("amount"), Direction::Ascending)],
                None,
                None,
            )
            .build();
        CascadesOptimizer::new(PhysicalPropertySet::default(), vec![], plan, test_context())
            .unwrap()
    }

    #[test]
    fn test_bind_one() {
        let optimizer = create_optimizer();
        let sort_pattern = pattern(|op| matches!(op, Logical(LogicalDocumentSort(_))))
            .leaf(any)
            .finish();

        let root_group_expr_id =
            optimizer.memo[optimizer.memo.root_group_id()].logical_group_expr_ids()[0];
        let mut bindings =
            Binding::new(root_group_expr_id, &sort_pattern, &optimizer.memo).into_iter();

        let opt_expr = bindings.next().unwrap();
        assert!(matches!(
            opt_expr.get_operator(&optimizer).unwrap(),
            Logical(LogicalDocumentSort(_))
        ));
        assert_eq!(1, opt_expr.inputs().len());
        assert_eq!(
            &Logical(LogicalDocumentFilter(DocumentFilter::new(amount_above(5)))),
            opt_expr[0].get_operator(&optimizer).unwrap()
        );
        assert!(matches!(opt_expr[0][0].node(), GroupHandleNode(_)));

        assert!(bindings.next().is_none());
    }

    #[test]
    fn test_bind_multi() {
        let mut optimizer = create_optimizer();
        let root_group_expr_id =
            optimizer.memo[optimizer.memo.root_group_id()].logical_group_expr_ids()[0];
        let filter_group_id = optimizer.memo[root_group_expr_id].inputs()[0];
        let filter_expr_id = optimizer.memo[filter_group_id].logical_group_expr_ids()[0];
        let scan_group_id = optimizer.memo[filter_expr_id].inputs()[0];

        // Alternative filter in the same group.
        let alternative = OptExpression::with_operator(
            Logical(LogicalDocumentFilter(DocumentFilter::new(amount_above(7)))),
            vec![OptExpression::with_group_handle(scan_group_id)],
        );
        optimizer
            .memo
            .insert_opt_expression(&alternative, Some(filter_group_id), &optimizer.context)
            .unwrap();

        let sort_pattern = pattern(|op| matches!(op, Logical(LogicalDocumentSort(_))))
            .leaf(|op| matches!(op, Logical(LogicalDocumentFilter(_))))
            .finish();
        let bindings = Binding::new(root_group_expr_id, &sort_pattern, &optimizer.memo)
            .into_iter()
            .collect::<Vec<_>>();

        assert_eq!(2, bindings.len());
        assert_eq!(
            &Logical(LogicalDocumentFilter(DocumentFilter::new(amount_above(5)))),
            bindings[0][0].get_operator(&optimizer).unwrap()
        );
        assert_eq!(
            &Logical(LogicalDocumentFilter(DocumentFilter::new(amount_above(7)))),
            bindings[1][0].get_operator(&optimizer).unwrap()
        );
        assert!(bindings
            .iter()
            .all(|binding| matches!(binding[0][0].node(), GroupHandleNode(_))));
    }
}
