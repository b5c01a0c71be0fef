use crate::error::BasaltResult;
use crate::operator::LogicalOperator::{LogicalAggregate, LogicalDocumentAggregate, LogicalProject};
use crate::operator::Operator::Logical;
use crate::operator::{projection_type, Aggregate, AggregateCall, Project};
use crate::optimizer::Optimizer;
use crate::rex::QueryLanguage;
use crate::rules::document::lowering::{lower_name_refs, string_list, DOCUMENT_FIELD};
use crate::rules::RulePromise::Medium;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};

/// Name of the group key in documents produced by an aggregation.
pub const GROUP_KEY_FIELD: &str = "_id";

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref DOCUMENT_AGGREGATE_TO_AGGREGATE_RULE_PATTERN: Pattern =
        Pattern::new_leaf(|op| matches!(op, Logical(LogicalDocumentAggregate(_))));
}

/// Lowers a document aggregation to a relational one.
///
/// ```no
/// Project(MQL_MERGE(['_id', calls..], MQL_NOT_UNSET($0), $1..))
/// └─ Aggregate(group: [0], calls: [CALL($1), ..])
///    └─ Project(group key, call inputs..)
/// ```
/// Without a group key the aggregate has no group fields and `_id` is null.
#[derive(Clone, Default)]
pub struct DocumentAggregateToAggregateRule {}

impl DocumentAggregateToAggregateRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for DocumentAggregateToAggregateRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        let aggregate = match input.get_operator(ctx)? {
            Logical(LogicalDocumentAggregate(aggregate)) => aggregate,
            _ => bail_internal!("Pattern miss matched"),
        };
        let builder = ctx.context().rex_builder();
        let input_prop = input.input_prop(0, ctx)?;

        // Flat row of the group key followed by the extracted call inputs.
        let mut exprs = vec![];
        let mut names = vec![];
        if let Some(group) = aggregate.group() {
            exprs.push(lower_name_refs(group, &builder, input_prop)?);
            names.push(GROUP_KEY_FIELD.to_string());
        }
        let mut call_args = Vec::with_capacity(aggregate.calls().len());
        for call in aggregate.calls() {
            match call.input() {
                Some(arg) => {
                    call_args.push(vec![exprs.len()]);
                    exprs.push(lower_name_refs(arg, &builder, input_prop)?);
                    names.push(call.name().to_string());
                }
                None => call_args.push(vec![]),
            }
        }
        let flat_type = projection_type(&exprs, &names)?;

        let calls = aggregate
            .calls()
            .iter()
            .zip(call_args)
            .map(|(call, args)| {
                AggregateCall::create(
                    &builder,
                    call.operator().clone(),
                    args,
                    false,
                    call.name(),
                    &flat_type,
                )
            })
            .collect::<BasaltResult<Vec<_>>>()?;

        // Reassemble one document per group.
        let group_count = usize::from(aggregate.group().is_some());
        let group_key = match flat_type.fields().first() {
            Some(field) if group_count == 1 => builder.call(
                QueryLanguage::Mongo,
                "MQL_NOT_UNSET",
                vec![builder.make_input_ref(0, field.data_type().clone())],
            )?,
            _ => builder.make_null_literal(),
        };
        let mut merged_names = vec![GROUP_KEY_FIELD];
        merged_names.extend(calls.iter().map(|call| call.name()));
        let mut operands = vec![string_list(&builder, &merged_names), group_key];
        operands.extend(
            calls
                .iter()
                .enumerate()
                .map(|(idx, call)| builder.make_input_ref(group_count + idx, call.data_type().clone())),
        );
        let merged = builder.call(QueryLanguage::Mongo, "MQL_MERGE", operands)?;

        let flat = input.clone_with_inputs(Logical(LogicalProject(Project::new(exprs, names))));
        let aggregated = OptExpression::with_operator(
            Logical(LogicalAggregate(Aggregate::new((0..group_count).collect(), calls))),
            vec![flat],
        );
        result.add(OptExpression::with_operator(
            Logical(LogicalProject(Project::new(
                vec![merged],
                vec![DOCUMENT_FIELD.to_string()],
            ))),
            vec![aggregated],
        ));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &DOCUMENT_AGGREGATE_TO_AGGREGATE_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::DocumentAggregateToAggregate
    }

    fn rule_promise(&self) -> RulePromise {
        Medium
    }
}

#[cfg(test)]
mod tests {
    use crate::heuristic::{HepOptimizer, MatchOrder};
    use crate::operator::LaxAggregateCall;
    use crate::optimizer::Optimizer;
    use crate::plan::{explain_to_string, LogicalPlanBuilder};
    use crate::rex::{Kind, RexBuilder};
    use crate::rules::DocumentAggregateToAggregateRule;
    use crate::test_utils::test_context;

    fn lower(group: Option<&str>, calls: Vec<LaxAggregateCall>) -> String {
        let builder = RexBuilder::default();
        let plan = LogicalPlanBuilder::new()
            .scan("shop", "orders")
            .document_aggregate(group.map(|path| builder.make_name_ref(path)), calls)
            .build();
        let optimized = HepOptimizer::new(
            MatchOrder::TopDown,
            10,
            vec![DocumentAggregateToAggregateRule::new().into()],
            plan,
            test_context(),
        )
        .unwrap()
        .find_best_plan()
        .unwrap();
        explain_to_string(&optimized).unwrap()
    }

    #[test]
    fn test_grouped_aggregate() {
        let builder = RexBuilder::default();
        let sum = LaxAggregateCall::new(
            "total",
            builder.registry().get_by_kind(Kind::Sum).unwrap(),
            Some(builder.make_name_ref("amount")),
        );

        let expected = "\
LogicalProject { exprs: [MQL_MERGE(['_id', 'total'], MQL_NOT_UNSET($0), $1)], names: [\"d\"] }
└─ LogicalAggregate { group: [0], calls: [SUM($1) AS total] }
   └─ LogicalProject { exprs: [MQL_QUERY_VALUE($0, ['customer', 'id']), MQL_QUERY_VALUE($0, ['amount'])], names: [\"_id\", \"total\"] }
      └─ LogicalScan { namespace: \"shop\", table: \"orders\" }
";
        assert_eq!(expected, lower(Some("customer.id"), vec![sum]));
    }

    #[test]
    fn test_ungrouped_count() {
        let builder = RexBuilder::default();
        let count = LaxAggregateCall::new(
            "n",
            builder.registry().get_by_kind(Kind::Count).unwrap(),
            None,
        );
        let total = LaxAggregateCall::new(
            "top",
            builder.registry().get_by_kind(Kind::Sum).unwrap(),
            Some(builder.make_name_ref("amount")),
        );

        let expected = "\
LogicalProject { exprs: [MQL_MERGE(['_id', 'n', 'top'], null, $0, $1)], names: [\"d\"] }
└─ LogicalAggregate { group: [], calls: [COUNT() AS n, SUM($0) AS top] }
   └─ LogicalProject { exprs: [MQL_QUERY_VALUE($0, ['amount'])], names: [\"top\"] }
      └─ LogicalScan { namespace: \"shop\", table: \"orders\" }
";
        assert_eq!(expected, lower(None, vec![count, total]));
    }
}
