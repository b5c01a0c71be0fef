use crate::error::BasaltResult;
use crate::operator::LogicalOperator::LogicalProject;
use crate::operator::Operator::Logical;
use crate::operator::Project;
use crate::optimizer::Optimizer;
use crate::rules::RulePromise::Medium;
use crate::rules::{
    pattern, OptExpression, PatterBuilder, Pattern, Rule, RuleId, RulePromise, RuleResult,
};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref PROJECT_MERGE_RULE_PATTERN: Pattern = {
        pattern(|op| matches!(op, Logical(LogicalProject(_))))
            .leaf(|op| matches!(op, Logical(LogicalProject(_))))
        .finish()
    };
    static ref PROJECT_REMOVE_RULE_PATTERN: Pattern =
        Pattern::new_leaf(|op| matches!(op, Logical(LogicalProject(_))));
}

/// Collapses two adjacent projections by inlining the bottom expressions into the top ones.
#[derive(Clone, Default)]
pub struct ProjectMergeRule {}

impl ProjectMergeRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for ProjectMergeRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        if let (Logical(LogicalProject(top)), Logical(LogicalProject(bottom))) =
            (input.get_operator(ctx)?, input[0].get_operator(ctx)?)
        {
            let exprs = top
                .exprs()
                .iter()
                .map(|expr| expr.inline(bottom.exprs()))
                .collect::<BasaltResult<Vec<_>>>()?;
            let merged = Project::new(exprs, top.names().to_vec());
            result.add(input[0].clone_with_inputs(Logical(LogicalProject(merged))));
            Ok(())
        } else {
            bail_internal!("Pattern miss matched")
        }
    }

    fn pattern(&self) -> &Pattern {
        &PROJECT_MERGE_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::ProjectMerge
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

/// Removes projections returning their input unchanged.
#[derive(Clone, Default)]
pub struct ProjectRemoveRule {}

impl ProjectRemoveRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for ProjectRemoveRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        _ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        result.add(input[0].clone());
        Ok(())
    }

    fn matches<O: Optimizer>(&self, input: &OptExpression<O>, ctx: &O) -> BasaltResult<bool> {
        match input.get_operator(ctx)? {
            Logical(LogicalProject(project)) => {
                Ok(project.is_identity(input.input_prop(0, ctx)?.row_type()))
            }
            _ => Ok(false),
        }
    }

    fn pattern(&self) -> &Pattern {
        &PROJECT_REMOVE_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::ProjectRemove
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

#[cfg(test)]
mod tests {
    use crate::heuristic::{Binding, HepOptimizer, MatchOrder};
    use crate::operator::LogicalOperator::{LogicalProject, LogicalScan};
    use crate::operator::Operator::Logical;
    use crate::optimizer::Optimizer;
    use crate::plan::LogicalPlanBuilder;
    use crate::rex::{Kind, RexBuilder};
    use crate::rules::{OptExprNode, ProjectMergeRule, ProjectRemoveRule, Rule, RuleResult};
    use crate::test_utils::{binary, build_hep_optimizer_for_test, int_literal, test_context, typed_ref};
    use crate::types::PolyType;

    #[test]
    fn test_project_merge() {
        let builder = RexBuilder::default();
        let plan = LogicalPlanBuilder::new()
            .scan("public", "emp")
            .project(vec![
                (typed_ref(3, PolyType::Integer, true), "salary"),
                (typed_ref(0, PolyType::Integer, false), "id"),
            ])
            .project(vec![(
                binary(&builder, Kind::Times, typed_ref(0, PolyType::Integer, true), int_literal(2)),
                "doubled",
            )])
            .build();
        let optimizer = build_hep_optimizer_for_test(plan);

        let rule = ProjectMergeRule::new();
        let opt_expr = Binding::new(optimizer.root_node_id(), rule.pattern(), &optimizer)
            .next()
            .unwrap();
        let mut result = RuleResult::new();
        rule.apply(opt_expr, &optimizer, &mut result).unwrap();

        let merged = result.results().next().unwrap();
        match merged.node() {
            OptExprNode::OperatorNode(Logical(LogicalProject(project))) => {
                assert_eq!("[*($3, 2)]", format!("{:?}", project.exprs()));
                assert_eq!(vec!["doubled".to_string()], project.names());
            }
            other => panic!("Unexpected node {:?}", other),
        }
        assert!(matches!(merged[0].node(), OptExprNode::GroupHandleNode(_)));
    }

    #[test]
    fn test_project_remove() {
        let identity = LogicalPlanBuilder::new()
            .scan("public", "location")
            .project(vec![
                (typed_ref(0, PolyType::Integer, false), "id"),
                (typed_ref(1, PolyType::Varchar, true), "city"),
            ])
            .build();
        let renamed = LogicalPlanBuilder::new()
            .scan("public", "location")
            .project(vec![
                (typed_ref(0, PolyType::Integer, false), "id"),
                (typed_ref(1, PolyType::Varchar, true), "town"),
            ])
            .build();

        let rule = ProjectRemoveRule::new();
        let optimizer = build_hep_optimizer_for_test(renamed);
        let opt_expr = Binding::new(optimizer.root_node_id(), rule.pattern(), &optimizer)
            .next()
            .unwrap();
        assert!(!rule.matches(&opt_expr, &optimizer).unwrap());

        let optimized = HepOptimizer::new(
            MatchOrder::TopDown,
            10,
            vec![rule.into()],
            identity,
            test_context(),
        )
        .unwrap()
        .find_best_plan()
        .unwrap();
        assert!(matches!(
            optimized.root().operator(),
            Logical(LogicalScan(_))
        ));
    }
}
