//! Implementation rules, converting logical operators to enumerable or jdbc operators.
use crate::catalog::TableSource;
use crate::error::BasaltResult;
use crate::operator::LogicalOperator::{
    LogicalAggregate, LogicalCalc, LogicalDocumentUnwind, LogicalFilter, LogicalJoin,
    LogicalProject, LogicalScan, LogicalSort,
};
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::{
    EnumerableAggregate, EnumerableCalc, EnumerableDocumentUnwind, EnumerableFilter,
    EnumerableHashJoin, EnumerableNestedLoopJoin, EnumerableProject, EnumerableScan,
    EnumerableSort, JdbcScan, JdbcToEnumerableConverter,
};
use crate::operator::{Converter, Join, LogicalOperator, PhysicalOperator};
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::properties::{Convention, LogicalProperty};
use crate::rex::{Kind, RexNode};
use crate::rules::RulePromise::High;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref SCAN_PATTERN: Pattern = Pattern::new_leaf(|op| matches!(op, Logical(LogicalScan(_))));
    static ref FILTER_PATTERN: Pattern =
        Pattern::new_leaf(|op| matches!(op, Logical(LogicalFilter(_))));
    static ref PROJECT_PATTERN: Pattern =
        Pattern::new_leaf(|op| matches!(op, Logical(LogicalProject(_))));
    static ref CALC_PATTERN: Pattern = Pattern::new_leaf(|op| matches!(op, Logical(LogicalCalc(_))));
    static ref AGGREGATE_PATTERN: Pattern =
        Pattern::new_leaf(|op| matches!(op, Logical(LogicalAggregate(_))));
    static ref SORT_PATTERN: Pattern = Pattern::new_leaf(|op| matches!(op, Logical(LogicalSort(_))));
    static ref JOIN_PATTERN: Pattern = Pattern::new_leaf(|op| matches!(op, Logical(LogicalJoin(_))));
    static ref DOCUMENT_UNWIND_PATTERN: Pattern =
        Pattern::new_leaf(|op| matches!(op, Logical(LogicalDocumentUnwind(_))));
}

/// Rule converting one logical operator to a physical one with the same inputs.
///
/// Inputs are bound as groups, the converted operator requests the conventions it needs from
/// them through [`PhysicalOperator::required_input_convention`].
pub trait ConverterRule {
    fn from_convention(&self) -> Convention {
        Convention::None
    }

    fn to_convention(&self) -> Convention;

    /// Physical counterpart of `operator`, `None` if this rule doesn't apply to it.
    fn convert(
        &self,
        operator: &LogicalOperator,
        inputs: &[&LogicalProperty],
        context: &OptimizerContext,
    ) -> BasaltResult<Option<PhysicalOperator>>;
}

/// Bound logical operator and the logical properties of its inputs.
fn bound_operator<'a, O: Optimizer>(
    input: &'a OptExpression<O>,
    ctx: &'a O,
) -> BasaltResult<Option<(&'a LogicalOperator, Vec<&'a LogicalProperty>)>> {
    let operator = match input.get_operator(ctx)? {
        Logical(op) => op,
        Physical(_) => return Ok(None),
    };
    let inputs = (0..input.inputs().len())
        .map(|idx| input.input_prop(idx, ctx))
        .collect::<BasaltResult<Vec<_>>>()?;
    Ok(Some((operator, inputs)))
}

macro_rules! converter_rule {
    ($rule:ident, $rule_id:ident, $pattern:ident) => {
        impl Rule for $rule {
            fn apply<O: Optimizer>(
                &self,
                input: OptExpression<O>,
                ctx: &O,
                result: &mut RuleResult<O>,
            ) -> BasaltResult<()> {
                if let Some((operator, inputs)) = bound_operator(&input, ctx)? {
                    if let Some(physical) = self.convert(operator, &inputs, ctx.context())? {
                        result.add(input.clone_with_inputs(Physical(physical)));
                    }
                }
                Ok(())
            }

            fn matches<O: Optimizer>(
                &self,
                input: &OptExpression<O>,
                ctx: &O,
            ) -> BasaltResult<bool> {
                Ok(input.get_operator(ctx)?.convention() == self.from_convention())
            }

            fn pattern(&self) -> &Pattern {
                &$pattern
            }

            fn rule_id(&self) -> RuleId {
                RuleId::$rule_id
            }

            fn rule_promise(&self) -> RulePromise {
                High
            }
        }
    };
}

/// Declares a converter rule mapping one logical variant to one physical variant.
macro_rules! simple_converter_rule {
    ($(#[$doc:meta])* $rule:ident, $rule_id:ident, $pattern:ident, $logical:ident => $physical:ident) => {
        $(#[$doc])*
        #[derive(Clone, Default)]
        pub struct $rule {}

        impl $rule {
            pub fn new() -> Self {
                Self {}
            }
        }

        impl ConverterRule for $rule {
            fn to_convention(&self) -> Convention {
                Convention::Enumerable
            }

            fn convert(
                &self,
                operator: &LogicalOperator,
                _inputs: &[&LogicalProperty],
                _context: &OptimizerContext,
            ) -> BasaltResult<Option<PhysicalOperator>> {
                match operator {
                    $logical(op) => Ok(Some($physical(op.clone()))),
                    _ => Ok(None),
                }
            }
        }

        converter_rule!($rule, $rule_id, $pattern);
    };
}

simple_converter_rule!(EnumerableFilterRule, EnumerableFilter, FILTER_PATTERN, LogicalFilter => EnumerableFilter);
simple_converter_rule!(EnumerableProjectRule, EnumerableProject, PROJECT_PATTERN, LogicalProject => EnumerableProject);
simple_converter_rule!(EnumerableCalcRule, EnumerableCalc, CALC_PATTERN, LogicalCalc => EnumerableCalc);
simple_converter_rule!(EnumerableAggregateRule, EnumerableAggregate, AGGREGATE_PATTERN, LogicalAggregate => EnumerableAggregate);
simple_converter_rule!(EnumerableSortRule, EnumerableSort, SORT_PATTERN, LogicalSort => EnumerableSort);
simple_converter_rule!(
    /// Unwinds in process, there is no relational counterpart.
    EnumerableDocumentUnwindRule,
    EnumerableDocumentUnwind,
    DOCUMENT_UNWIND_PATTERN,
    LogicalDocumentUnwind => EnumerableDocumentUnwind
);

/// Scans tables held by the engine.
#[derive(Clone, Default)]
pub struct EnumerableScanRule {}

impl EnumerableScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl ConverterRule for EnumerableScanRule {
    fn to_convention(&self) -> Convention {
        Convention::Enumerable
    }

    fn convert(
        &self,
        operator: &LogicalOperator,
        _inputs: &[&LogicalProperty],
        context: &OptimizerContext,
    ) -> BasaltResult<Option<PhysicalOperator>> {
        match operator {
            LogicalScan(scan) => {
                let table = context.catalog.table(scan.namespace(), scan.table())?;
                if table.source() == TableSource::Memory {
                    Ok(Some(EnumerableScan(scan.clone())))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }
}

converter_rule!(EnumerableScanRule, EnumerableScan, SCAN_PATTERN);

/// Scans tables of the jdbc store. The scan is wrapped in a converter, so its rows reach the
/// enumerable engine.
#[derive(Clone, Default)]
pub struct JdbcScanRule {}

impl JdbcScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl ConverterRule for JdbcScanRule {
    fn to_convention(&self) -> Convention {
        Convention::Jdbc
    }

    fn convert(
        &self,
        operator: &LogicalOperator,
        _inputs: &[&LogicalProperty],
        context: &OptimizerContext,
    ) -> BasaltResult<Option<PhysicalOperator>> {
        match operator {
            LogicalScan(scan) => {
                let table = context.catalog.table(scan.namespace(), scan.table())?;
                if table.source() == TableSource::Jdbc {
                    Ok(Some(JdbcScan(scan.clone())))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }
}

impl Rule for JdbcScanRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        if let Some((operator, inputs)) = bound_operator(&input, ctx)? {
            if let Some(scan) = self.convert(operator, &inputs, ctx.context())? {
                let converted =
                    OptExpression::new_builder(Physical(JdbcToEnumerableConverter(Converter::new())))
                        .leaf(Physical(scan))
                        .end_node();
                result.add(converted);
            }
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &SCAN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::JdbcScan
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }
}

/// Implements joins with an equality between both sides as hash joins, others as nested loops.
#[derive(Clone, Default)]
pub struct EnumerableJoinRule {}

impl EnumerableJoinRule {
    pub fn new() -> Self {
        Self {}
    }

    /// Whether `condition` has a conjunct `$l = $r` with `$l` from the left input and `$r` from
    /// the right one.
    pub fn is_equi_join(condition: &RexNode, left_field_count: usize) -> bool {
        condition.conjunctions().iter().any(|conjunct| {
            let call = match conjunct.as_call() {
                Some(call) if call.kind() == Kind::Equals => call,
                _ => return false,
            };
            match (call.operands()[0].as_input_ref(), call.operands()[1].as_input_ref()) {
                (Some(a), Some(b)) => {
                    (a.index() < left_field_count) != (b.index() < left_field_count)
                }
                _ => false,
            }
        })
    }

    fn implement(join: &Join, left: &LogicalProperty) -> PhysicalOperator {
        if Self::is_equi_join(join.condition(), left.field_count()) {
            EnumerableHashJoin(join.clone())
        } else {
            EnumerableNestedLoopJoin(join.clone())
        }
    }
}

impl ConverterRule for EnumerableJoinRule {
    fn to_convention(&self) -> Convention {
        Convention::Enumerable
    }

    fn convert(
        &self,
        operator: &LogicalOperator,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<Option<PhysicalOperator>> {
        match (operator, inputs.first()) {
            (LogicalJoin(join), Some(left)) => Ok(Some(Self::implement(join, left))),
            (LogicalJoin(_), None) => bail_internal!("Join bound without inputs"),
            _ => Ok(None),
        }
    }
}

converter_rule!(EnumerableJoinRule, EnumerableJoin, JOIN_PATTERN);

#[cfg(test)]
mod tests {
    use crate::heuristic::Binding;
    use crate::operator::Operator::Physical;
    use crate::operator::PhysicalOperator::{
        EnumerableHashJoin, EnumerableNestedLoopJoin, JdbcScan, JdbcToEnumerableConverter,
    };
    use crate::operator::JoinKind;
    use crate::plan::LogicalPlanBuilder;
    use crate::rex::Kind;
    use crate::rules::{
        EnumerableJoinRule, EnumerableScanRule, JdbcScanRule, OptExprNode, Rule, RuleResult,
    };
    use crate::test_utils::{binary, build_hep_optimizer_for_test, int_literal, test_context, typed_ref};
    use crate::types::PolyType;

    #[test]
    fn test_scan_by_source() {
        let plan = LogicalPlanBuilder::new().scan("public", "customer").build();
        let optimizer = build_hep_optimizer_for_test(plan);

        let rule = EnumerableScanRule::new();
        let opt_expr = Binding::new(optimizer.root_node_id(), rule.pattern(), &optimizer)
            .next()
            .unwrap();
        let mut result = RuleResult::new();
        rule.apply(opt_expr.clone(), &optimizer, &mut result).unwrap();
        assert!(result.is_empty());

        let rule = JdbcScanRule::new();
        let mut result = RuleResult::new();
        rule.apply(opt_expr, &optimizer, &mut result).unwrap();
        let converted = result.results().next().unwrap();
        assert!(matches!(
            converted.node(),
            OptExprNode::OperatorNode(Physical(JdbcToEnumerableConverter(_)))
        ));
        assert!(matches!(
            converted[0].node(),
            OptExprNode::OperatorNode(Physical(JdbcScan(_)))
        ));
    }

    #[test]
    fn test_join_algorithm() {
        let builder = test_context().rex_builder();
        // emp has 4 fields, dept starts at $4.
        let equi = binary(
            &builder,
            Kind::Equals,
            typed_ref(2, PolyType::Integer, true),
            typed_ref(4, PolyType::Integer, false),
        );
        let theta = binary(
            &builder,
            Kind::GreaterThan,
            typed_ref(3, PolyType::Integer, true),
            typed_ref(4, PolyType::Integer, false),
        );
        let same_side = binary(
            &builder,
            Kind::Equals,
            typed_ref(0, PolyType::Integer, false),
            typed_ref(2, PolyType::Integer, true),
        );
        assert!(EnumerableJoinRule::is_equi_join(&builder.and(vec![theta.clone(), equi.clone()]).unwrap(), 4));
        assert!(!EnumerableJoinRule::is_equi_join(&theta, 4));
        assert!(!EnumerableJoinRule::is_equi_join(&same_side, 4));
        assert!(!EnumerableJoinRule::is_equi_join(
            &binary(&builder, Kind::Equals, typed_ref(2, PolyType::Integer, true), int_literal(1)),
            4
        ));

        for (condition, hash) in [(equi, true), (theta, false)] {
            let dept = LogicalPlanBuilder::new().scan("public", "dept").build().root();
            let plan = LogicalPlanBuilder::new()
                .scan("public", "emp")
                .join(JoinKind::Inner, condition, dept)
                .build();
            let optimizer = build_hep_optimizer_for_test(plan);
            let rule = EnumerableJoinRule::new();
            let opt_expr = Binding::new(optimizer.root_node_id(), rule.pattern(), &optimizer)
                .next()
                .unwrap();
            let mut result = RuleResult::new();
            rule.apply(opt_expr, &optimizer, &mut result).unwrap();

            let joined = result.results().next().unwrap();
            match joined.node() {
                OptExprNode::OperatorNode(Physical(EnumerableHashJoin(_))) => assert!(hash),
                OptExprNode::OperatorNode(Physical(EnumerableNestedLoopJoin(_))) => assert!(!hash),
                other => panic!("Unexpected node {:?}", other),
            }
            assert_eq!(2, joined.inputs().len());
        }
    }
}
