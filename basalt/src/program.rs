//! Programs chain optimizer passes into a full compilation.
//!
//! Each [`Program`] runs one optimizer over one [`RuleSet`]. The standard sequence lowers document
//! operators, simplifies the relational plan and finally implements it in the enumerable
//! convention.
use std::fmt::{Display, Formatter};

use log::info;

use crate::cascades::CascadesOptimizer;
use crate::config::PlannerConfig;
use crate::error::{BasaltError, BasaltResult};
use crate::heuristic::{HepOptimizer, MatchOrder};
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::operator::Operator::{Logical, Physical};
use crate::plan::{Plan, PlanNodeRef};
use crate::properties::{Convention, PhysicalProp, PhysicalPropertySet};
use crate::rules::RuleSet;

/// One optimizer pass.
#[derive(Clone, Debug)]
pub enum Program {
    /// Rewrites to fixed point with the heuristic optimizer.
    Heuristic {
        rules: RuleSet,
        match_order: MatchOrder,
        match_limit: usize,
    },
    /// Searches the cheapest plan delivering the target traits.
    Cascades { rules: RuleSet },
}

impl Program {
    /// Heuristic pass with the match order and limit of `config`.
    pub fn heuristic(rules: RuleSet, config: &PlannerConfig) -> Self {
        Program::Heuristic {
            rules,
            match_order: config.match_order,
            match_limit: config.match_limit,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        match self {
            Program::Heuristic { rules, .. } | Program::Cascades { rules } => rules,
        }
    }

    fn run(
        &self,
        target: &PhysicalPropertySet,
        plan: Plan,
        context: &OptimizerContext,
    ) -> BasaltResult<Plan> {
        match self {
            Program::Heuristic {
                rules,
                match_order,
                match_limit,
            } => HepOptimizer::new(
                *match_order,
                *match_limit,
                rules.rules().to_vec(),
                plan,
                context.clone(),
            )?
            .find_best_plan(),
            Program::Cascades { rules } => CascadesOptimizer::new(
                target.clone(),
                rules.rules().to_vec(),
                plan,
                context.clone(),
            )?
            .find_best_plan(),
        }
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Program::Heuristic { rules, .. } => write!(f, "heuristic({})", rules.name()),
            Program::Cascades { rules } => write!(f, "cascades({})", rules.name()),
        }
    }
}

/// Ordered programs sharing one compilation context.
pub struct Programs {
    programs: Vec<Program>,
    context: OptimizerContext,
}

impl Programs {
    pub fn new(programs: Vec<Program>, context: OptimizerContext) -> Self {
        Self { programs, context }
    }

    /// Document lowering, relational rewrite, then implementation.
    ///
    /// Implementation runs the cascades search when `config.cascades` is set.
    pub fn standard(context: OptimizerContext) -> Self {
        let config = context.config.clone();
        let implementation = if config.cascades {
            Program::Cascades {
                rules: RuleSet::cascades(),
            }
        } else {
            Program::heuristic(RuleSet::enumerable_implementation(), &config)
        };

        Self::new(
            vec![
                Program::heuristic(RuleSet::document_lowering(), &config),
                Program::heuristic(RuleSet::relational_rewrite(), &config),
                implementation,
            ],
            context,
        )
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn context(&self) -> &OptimizerContext {
        &self.context
    }

    /// Runs program `index` and checks its result delivers `target`.
    pub fn transform(
        &self,
        index: usize,
        target: &PhysicalPropertySet,
        plan: Plan,
    ) -> BasaltResult<Plan> {
        let program = self.programs.get(index).ok_or_else(|| {
            BasaltError::Config(format!(
                "No program at index {}, {} registered",
                index,
                self.programs.len()
            ))
        })?;

        info!("Running program {} {} for {}", index, program, target);
        let result = program.run(target, plan, &self.context)?;

        let root = result.root();
        let unplanned = if !root.traits().satisfies(target) {
            Some(root)
        } else if target.convention() != Convention::None {
            find_unimplemented(&root)
        } else {
            None
        };
        match unplanned {
            Some(node) => Err(BasaltError::CannotPlan {
                required: target.to_string(),
                root: node.operator().to_string(),
            }),
            None => Ok(result),
        }
    }

    /// Runs all programs in order. Only the last one has to deliver `target`.
    pub fn optimize(&self, target: &PhysicalPropertySet, plan: Plan) -> BasaltResult<Plan> {
        let last = match self.programs.len().checked_sub(1) {
            Some(last) => last,
            None => return Ok(plan),
        };

        let mut plan = plan;
        for index in 0..last {
            plan = self.transform(index, &PhysicalPropertySet::default(), plan)?;
        }
        self.transform(last, target, plan)
    }

    /// Runs all programs requiring enumerable output.
    pub fn compile(&self, plan: Plan) -> BasaltResult<Plan> {
        self.optimize(&PhysicalPropertySet::with_convention(Convention::Enumerable), plan)
    }
}

/// First node in pre order that is still logical, or whose input does not deliver the
/// convention the node requires.
fn find_unimplemented(node: &PlanNodeRef) -> Option<PlanNodeRef> {
    let operator = match node.operator() {
        Logical(_) => return Some(node.clone()),
        Physical(op) => op,
    };
    for (idx, input) in node.inputs().iter().enumerate() {
        let required = operator.required_input_convention(idx);
        if !input.operator().is_logical() && !input.operator().convention().satisfies(&required) {
            return Some(node.clone());
        }
        if let Some(found) = find_unimplemented(input) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use crate::config::PlannerConfig;
    use crate::error::BasaltError;
    use crate::operator::JoinKind;
    use crate::plan::{explain_to_string, LogicalPlanBuilder, PhysicalPlanBuilder, Plan};
    use crate::program::{Program, Programs};
    use crate::properties::{Convention, Direction, PhysicalPropertySet};
    use crate::rex::{Kind, LiteralValue, QueryLanguage, RexBuilder, RexNode};
    use crate::rules::RuleSet;
    use crate::test_utils::{binary, int_literal, string_literal, test_context, typed_ref};
    use crate::types::PolyType;

    #[test]
    fn test_standard_programs_compile_document_filter() {
        let builder = RexBuilder::default();
        let plan = LogicalPlanBuilder::new()
            .scan("shop", "orders")
            .document_filter(
                builder
                    .call(
                        QueryLanguage::Mongo,
                        "$gt",
                        vec![builder.make_name_ref("amount"), int_literal(5)],
                    )
                    .unwrap(),
            )
            .build();

        let programs = Programs::standard(test_context());
        assert_eq!(
            vec![
                "heuristic(document_lowering)",
                "heuristic(relational_rewrite)",
                "heuristic(enumerable_implementation)",
            ],
            programs
                .programs()
                .iter()
                .map(|program| program.to_string())
                .collect::<Vec<_>>()
        );

        let compiled = programs.compile(plan).unwrap();
        let expected = "\
EnumerableCalc { projects: [$0], names: [\"d\"], condition: $gt(MQL_QUERY_VALUE($0, ['amount']), 5) }
└─ EnumerableScan { namespace: \"shop\", table: \"orders\" }
";
        assert_eq!(expected, explain_to_string(&compiled).unwrap());
    }

    #[test]
    fn test_cascades_implementation() {
        let condition = binary(
            &RexBuilder::default(),
            Kind::Equals,
            typed_ref(2, PolyType::Integer, true),
            typed_ref(4, PolyType::Integer, false),
        );
        let dept = LogicalPlanBuilder::new().scan("public", "dept").build().root();
        let plan = LogicalPlanBuilder::new()
            .scan("public", "emp")
            .join(JoinKind::Inner, condition.clone(), dept)
            .build();

        let context = test_context()
            .with_config(PlannerConfig {
                cascades: true,
                ..PlannerConfig::default()
            })
            .unwrap();
        let programs = Programs::standard(context);
        assert_eq!("cascades(cascades)", programs.programs()[2].to_string());

        let expected_plan = {
            let dept = PhysicalPlanBuilder::scan("public", "dept").build().root();
            PhysicalPlanBuilder::scan("public", "emp")
                .hash_join(JoinKind::Inner, condition, dept)
                .build()
        };
        assert_eq!(expected_plan, programs.compile(plan).unwrap());
    }

    #[test]
    fn test_transform_checks_target() {
        let programs = Programs::new(
            vec![Program::heuristic(
                RuleSet::enumerable_implementation(),
                &PlannerConfig::default(),
            )],
            test_context(),
        );
        let plan = LogicalPlanBuilder::new().scan("public", "emp").build();

        let result = programs.transform(
            0,
            &PhysicalPropertySet::with_convention(Convention::Jdbc),
            plan,
        );
        match result {
            Err(BasaltError::CannotPlan { required, root }) => {
                assert_eq!("JDBC.[]", required);
                assert_eq!(
                    "EnumerableScan { namespace: \"public\", table: \"emp\" }",
                    root
                );
            }
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_transform_unknown_index() {
        let programs = Programs::new(vec![], test_context());
        let plan = LogicalPlanBuilder::new().scan("public", "emp").build();

        match programs.transform(1, &PhysicalPropertySet::default(), plan) {
            Err(BasaltError::Config(message)) => {
                assert_eq!("No program at index 1, 0 registered", message)
            }
            other => panic!("Unexpected result {:?}", other),
        }
    }

    fn near(builder: &RexBuilder, key: &str) -> RexNode {
        let point = builder.make_literal(LiteralValue::List(vec![
            LiteralValue::Double(1.0),
            LiteralValue::Double(2.0),
        ]));
        builder
            .call(
                QueryLanguage::Mongo,
                "$near",
                vec![
                    string_literal(key),
                    point,
                    builder.make_literal(LiteralValue::Double(3.0)),
                    builder.make_literal(LiteralValue::Double(-1.0)),
                ],
            )
            .unwrap()
    }

    fn sorted_by_amount(condition: RexNode) -> Plan {
        let builder = RexBuilder::default();
        LogicalPlanBuilder::new()
            .scan("shop", "orders")
            .document_filter(condition)
            .document_sort(
                vec![(builder.make_name_ref("amount"), Direction::Ascending)],
                None,
                None,
            )
            .build()
    }

    #[test]
    fn test_compile_near_with_other_conjunct() {
        let builder = RexBuilder::default();
        let kind = builder
            .call(
                QueryLanguage::Mongo,
                "$eq",
                vec![builder.make_name_ref("kind"), int_literal(1)],
            )
            .unwrap();
        let condition = builder.and(vec![near(&builder, "loc"), kind]).unwrap();

        let compiled = Programs::standard(test_context())
            .compile(sorted_by_amount(condition))
            .unwrap();
        let explain = explain_to_string(&compiled).unwrap();
        assert!(!explain.contains("Logical"), "{}", explain);
        assert!(explain.contains("MQL_GEO_DISTANCE"), "{}", explain);
    }

    #[test]
    fn test_compile_rejects_logical_input() {
        let builder = RexBuilder::default();
        let condition = builder
            .and(vec![near(&builder, "loc"), near(&builder, "home")])
            .unwrap();

        match Programs::standard(test_context()).compile(sorted_by_amount(condition)) {
            Err(BasaltError::CannotPlan { required, root }) => {
                assert_eq!("ENUMERABLE.[]", required);
                assert!(root.starts_with("LogicalDocumentFilter"), "{}", root);
            }
            other => panic!("Unexpected result {:?}", other),
        }
    }
}
