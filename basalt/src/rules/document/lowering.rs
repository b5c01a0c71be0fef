use crate::error::BasaltResult;
use crate::operator::LogicalOperator::{
    LogicalCalc, LogicalDocumentFilter, LogicalDocumentProject, LogicalDocumentSort,
    LogicalProject, LogicalSort,
};
use crate::operator::Operator::Logical;
use crate::operator::{Calc, Project, Sort};
use crate::optimizer::Optimizer;
use crate::properties::{Collation, FieldCollation, LogicalProperty};
use crate::rex::{
    Kind, LiteralValue, QueryLanguage, RexBuilder, RexNameRef, RexNode, RexShuttle,
};
use crate::rules::RulePromise::Medium;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};
use crate::types::{AlgDataType, PolyType};

pub(crate) const DOCUMENT_FIELD: &str = "d";

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref DOCUMENT_FILTER_TO_CALC_RULE_PATTERN: Pattern =
        Pattern::new_leaf(|op| matches!(op, Logical(LogicalDocumentFilter(_))));
    static ref DOCUMENT_PROJECT_TO_CALC_RULE_PATTERN: Pattern =
        Pattern::new_leaf(|op| matches!(op, Logical(LogicalDocumentProject(_))));
    static ref DOCUMENT_SORT_TO_SORT_RULE_PATTERN: Pattern =
        Pattern::new_leaf(|op| matches!(op, Logical(LogicalDocumentSort(_))));
}

/// Replaces path references by `MQL_QUERY_VALUE(doc, path)` calls on the document column.
struct NameRefLowering<'a> {
    builder: &'a RexBuilder,
    document: RexNode,
}

impl<'a> RexShuttle for NameRefLowering<'a> {
    fn visit_name_ref(&mut self, name_ref: &RexNameRef) -> BasaltResult<RexNode> {
        self.builder.call(
            QueryLanguage::Mongo,
            "MQL_QUERY_VALUE",
            vec![
                self.document.clone(),
                self.builder.make_path_literal(&name_ref.path()),
            ],
        )
    }
}

/// Reference to the document column of a document row.
pub(crate) fn document_ref(builder: &RexBuilder, input: &LogicalProperty) -> RexNode {
    let ty = input
        .row_type()
        .fields()
        .first()
        .map(|field| field.data_type().clone())
        .unwrap_or_else(|| AlgDataType::not_null(PolyType::Document));
    builder.make_input_ref(0, ty)
}

/// Rewrites path references of `expr` into positional extraction from the document column.
pub fn lower_name_refs(
    expr: &RexNode,
    builder: &RexBuilder,
    input: &LogicalProperty,
) -> BasaltResult<RexNode> {
    expr.accept(&mut NameRefLowering {
        builder,
        document: document_ref(builder, input),
    })
}

/// List literal of string values.
pub(crate) fn string_list<S: AsRef<str>>(builder: &RexBuilder, values: &[S]) -> RexNode {
    builder.make_literal(LiteralValue::List(
        values
            .iter()
            .map(|value| LiteralValue::String(value.as_ref().to_string()))
            .collect(),
    ))
}

/// Geo queries are unwrapped into several operators before the filter can be lowered.
pub(crate) fn contains_geo_query(condition: &RexNode) -> bool {
    let mut found = false;
    condition.walk(&mut |node| {
        if matches!(node.call_kind(), Some(Kind::MqlGeoNear) | Some(Kind::MqlNear)) {
            found = true;
        }
    });
    found
}

/// Lowers a document filter to a calc keeping the document column of passing rows.
#[derive(Clone, Default)]
pub struct DocumentFilterToCalcRule {}

impl DocumentFilterToCalcRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for DocumentFilterToCalcRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        let filter = match input.get_operator(ctx)? {
            Logical(LogicalDocumentFilter(filter)) => filter,
            _ => bail_internal!("Pattern miss matched"),
        };
        let builder = ctx.context().rex_builder();
        let input_prop = input.input_prop(0, ctx)?;
        let condition = lower_name_refs(filter.condition(), &builder, input_prop)?;

        let calc = Calc::new(
            vec![document_ref(&builder, input_prop)],
            vec![DOCUMENT_FIELD.to_string()],
            Some(condition),
        );
        result.add(input.clone_with_inputs(Logical(LogicalCalc(calc))));
        Ok(())
    }

    fn matches<O: Optimizer>(&self, input: &OptExpression<O>, ctx: &O) -> BasaltResult<bool> {
        match input.get_operator(ctx)? {
            Logical(LogicalDocumentFilter(filter)) => Ok(!contains_geo_query(filter.condition())),
            _ => Ok(false),
        }
    }

    fn pattern(&self) -> &Pattern {
        &DOCUMENT_FILTER_TO_CALC_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::DocumentFilterToCalc
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

/// Lowers a document projection to a calc computing the reshaped document.
///
/// * A replacing projection merges its includes into a new document.
/// * An extending projection adds its includes to the input document.
///
/// Excluded paths are then removed from the result.
#[derive(Clone, Default)]
pub struct DocumentProjectToCalcRule {}

impl DocumentProjectToCalcRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for DocumentProjectToCalcRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        let project = match input.get_operator(ctx)? {
            Logical(LogicalDocumentProject(project)) => project,
            _ => bail_internal!("Pattern miss matched"),
        };
        let builder = ctx.context().rex_builder();
        let input_prop = input.input_prop(0, ctx)?;
        let document = document_ref(&builder, input_prop);

        let names = project
            .includes()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();
        let values = project
            .includes()
            .iter()
            .map(|(_, expr)| lower_name_refs(expr, &builder, input_prop))
            .collect::<BasaltResult<Vec<_>>>()?;

        let mut reshaped = if project.is_extend() && !names.is_empty() {
            let mut operands = vec![document, string_list(&builder, &names)];
            operands.extend(values);
            builder.call(QueryLanguage::Mongo, "MQL_ADD_FIELDS", operands)?
        } else if !names.is_empty() {
            let mut operands = vec![string_list(&builder, &names)];
            operands.extend(values);
            builder.call(QueryLanguage::Mongo, "MQL_MERGE", operands)?
        } else {
            document
        };
        if !project.excludes().is_empty() {
            reshaped = builder.call(
                QueryLanguage::Mongo,
                "MQL_EXCLUDE",
                vec![reshaped, string_list(&builder, project.excludes())],
            )?;
        }

        let calc = Calc::new(vec![reshaped], vec![DOCUMENT_FIELD.to_string()], None);
        result.add(input.clone_with_inputs(Logical(LogicalCalc(calc))));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &DOCUMENT_PROJECT_TO_CALC_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::DocumentProjectToCalc
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

/// Lowers a document sort to a relational sort over extracted keys.
///
/// Keys are appended after the document column by a projection, sorted on, then projected
/// away.
#[derive(Clone, Default)]
pub struct DocumentSortToSortRule {}

impl DocumentSortToSortRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for DocumentSortToSortRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        let sort = match input.get_operator(ctx)? {
            Logical(LogicalDocumentSort(sort)) => sort,
            _ => bail_internal!("Pattern miss matched"),
        };
        let builder = ctx.context().rex_builder();
        let input_prop = input.input_prop(0, ctx)?;
        let document = document_ref(&builder, input_prop);

        let mut exprs = vec![document.clone()];
        let mut names = vec![DOCUMENT_FIELD.to_string()];
        let mut collations = Vec::with_capacity(sort.keys().len());
        for (idx, (key, direction)) in sort.keys().iter().enumerate() {
            exprs.push(lower_name_refs(key, &builder, input_prop)?);
            names.push(format!("k{}", idx));
            collations.push(FieldCollation {
                index: idx + 1,
                direction: *direction,
            });
        }

        let keyed = input.clone_with_inputs(Logical(LogicalProject(Project::new(exprs, names))));
        let sorted = OptExpression::with_operator(
            Logical(LogicalSort(Sort::new(
                Collation::new(collations),
                sort.offset(),
                sort.fetch(),
            ))),
            vec![keyed],
        );
        result.add(OptExpression::with_operator(
            Logical(LogicalProject(Project::new(
                vec![document],
                vec![DOCUMENT_FIELD.to_string()],
            ))),
            vec![sorted],
        ));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &DOCUMENT_SORT_TO_SORT_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::DocumentSortToSort
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

#[cfg(test)]
mod tests {
    use crate::heuristic::Binding;
    use crate::operator::LogicalOperator::{LogicalCalc, LogicalProject, LogicalSort};
    use crate::operator::Operator::Logical;
    use crate::plan::LogicalPlanBuilder;
    use crate::properties::Direction;
    use crate::rex::{LiteralValue, QueryLanguage, RexBuilder};
    use crate::rules::{
        DocumentFilterToCalcRule, DocumentProjectToCalcRule, DocumentSortToSortRule, OptExprNode,
        Rule, RuleResult,
    };
    use crate::test_utils::{build_hep_optimizer_for_test, int_literal, string_literal};

    #[test]
    fn test_document_filter_to_calc() {
        let builder = RexBuilder::default();
        let plan = LogicalPlanBuilder::new()
            .scan("shop", "orders")
            .document_filter(
                builder
                    .call(
                        QueryLanguage::Mongo,
                        "$gt",
                        vec![builder.make_name_ref("customer.id"), int_literal(1)],
                    )
                    .unwrap(),
            )
            .build();
        let optimizer = build_hep_optimizer_for_test(plan);

        let rule = DocumentFilterToCalcRule::new();
        let opt_expr = Binding::new(optimizer.root_node_id(), rule.pattern(), &optimizer)
            .next()
            .unwrap();
        assert!(rule.matches(&opt_expr, &optimizer).unwrap());
        let mut result = RuleResult::new();
        rule.apply(opt_expr, &optimizer, &mut result).unwrap();

        match result.results().next().unwrap().node() {
            OptExprNode::OperatorNode(Logical(LogicalCalc(calc))) => {
                assert_eq!("[$0]", format!("{:?}", calc.projects()));
                assert_eq!(
                    "$gt(MQL_QUERY_VALUE($0, ['customer', 'id']), 1)",
                    calc.condition().unwrap().to_string()
                );
            }
            other => panic!("Unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_geo_filter_not_lowered() {
        let builder = RexBuilder::default();
        let near = builder
            .call(
                QueryLanguage::Mongo,
                "$near",
                vec![
                    string_literal("loc"),
                    builder.make_literal(LiteralValue::List(vec![
                        LiteralValue::Double(0.0),
                        LiteralValue::Double(0.0),
                    ])),
                    builder.make_literal(LiteralValue::Double(-1.0)),
                    builder.make_literal(LiteralValue::Double(-1.0)),
                ],
            )
            .unwrap();
        let plan = LogicalPlanBuilder::new()
            .scan("shop", "orders")
            .document_filter(near)
            .build();
        let optimizer = build_hep_optimizer_for_test(plan);

        let rule = DocumentFilterToCalcRule::new();
        let opt_expr = Binding::new(optimizer.root_node_id(), rule.pattern(), &optimizer)
            .next()
            .unwrap();
        assert!(!rule.matches(&opt_expr, &optimizer).unwrap());
    }

    #[test]
    fn test_document_project_to_calc() {
        let builder = RexBuilder::default();
        let cases = vec![
            (
                false,
                vec![],
                "MQL_MERGE(['total', 'who'], MQL_QUERY_VALUE($0, ['amount']), 'me')",
            ),
            (
                true,
                vec!["customer.name".to_string()],
                "MQL_EXCLUDE(MQL_ADD_FIELDS($0, ['total', 'who'], MQL_QUERY_VALUE($0, ['amount']), 'me'), ['customer.name'])",
            ),
        ];

        for (extend, excludes, expected) in cases {
            let includes = vec![
                ("total".to_string(), builder.make_name_ref("amount")),
                ("who".to_string(), string_literal("me")),
            ];
            let mut plan_builder = LogicalPlanBuilder::new();
            plan_builder.scan("shop", "orders");
            if extend {
                plan_builder.document_add_fields(includes, excludes);
            } else {
                plan_builder.document_project(includes, excludes);
            }
            let optimizer = build_hep_optimizer_for_test(plan_builder.build());

            let rule = DocumentProjectToCalcRule::new();
            let opt_expr = Binding::new(optimizer.root_node_id(), rule.pattern(), &optimizer)
                .next()
                .unwrap();
            let mut result = RuleResult::new();
            rule.apply(opt_expr, &optimizer, &mut result).unwrap();

            match result.results().next().unwrap().node() {
                OptExprNode::OperatorNode(Logical(LogicalCalc(calc))) => {
                    assert_eq!(expected, calc.projects()[0].to_string());
                    assert_eq!(vec!["d".to_string()], calc.names());
                    assert!(calc.condition().is_none());
                }
                other => panic!("Unexpected node {:?}", other),
            }
        }
    }

    #[test]
    fn test_document_sort_to_sort() {
        let builder = RexBuilder::default();
        let plan = LogicalPlanBuilder::new()
            .scan("shop", "orders")
            .document_sort(
                vec![
                    (builder.make_name_ref("amount"), Direction::Descending),
                    (builder.make_name_ref("customer.id"), Direction::Ascending),
                ],
                Some(1),
                Some(5),
            )
            .build();
        let optimizer = build_hep_optimizer_for_test(plan);

        let rule = DocumentSortToSortRule::new();
        let opt_expr = Binding::new(optimizer.root_node_id(), rule.pattern(), &optimizer)
            .next()
            .unwrap();
        let mut result = RuleResult::new();
        rule.apply(opt_expr, &optimizer, &mut result).unwrap();

        let ret = result.results().next().unwrap();
        match ret.node() {
            OptExprNode::OperatorNode(Logical(LogicalProject(project))) => {
                assert_eq!("[$0]", format!("{:?}", project.exprs()))
            }
            other => panic!("Unexpected node {:?}", other),
        }
        match ret[0].node() {
            OptExprNode::OperatorNode(Logical(LogicalSort(sort))) => {
                assert_eq!("[1 DESC, 2 ASC]", sort.collation().to_string());
                assert_eq!(Some(1), sort.offset());
                assert_eq!(Some(5), sort.fetch());
            }
            other => panic!("Unexpected node {:?}", other),
        }
        match ret[0][0].node() {
            OptExprNode::OperatorNode(Logical(LogicalProject(project))) => {
                assert_eq!(
                    "[$0, MQL_QUERY_VALUE($0, ['amount']), MQL_QUERY_VALUE($0, ['customer', 'id'])]",
                    format!("{:?}", project.exprs())
                );
                assert_eq!(vec!["d", "k0", "k1"], project.names());
            }
            other => panic!("Unexpected node {:?}", other),
        }
        assert!(matches!(ret[0][0][0].node(), OptExprNode::GroupHandleNode(_)));
    }
}
