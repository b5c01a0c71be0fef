use std::sync::Arc;

use basalt::catalog::TableSource;
use basalt::config::PlannerConfig;
use basalt::heuristic::MatchOrder;
use basalt::operator::JoinKind;
use basalt::optimizer::OptimizerContext;
use basalt::plan::{LogicalPlanBuilder, Plan};
use basalt::program::{Program, Programs};
use basalt::properties::PhysicalPropertySet;
use basalt::rex::{Kind, LiteralValue, RexBuilder};
use basalt::rules::RuleSet;
use basalt::types::{AlgDataType, PolyType, RecordTypeBuilder};
use basalt_integration::store::MemoryStore;
use serde_json::json;

use crate::utils::{to_logical_plan, TestCase};

mod utils;

fn store() -> Arc<MemoryStore> {
    let int = |nullable| AlgDataType::new(PolyType::Integer, nullable);
    let mut store = MemoryStore::new();
    store
        .add_table(
            "public",
            "emp",
            TableSource::Memory,
            RecordTypeBuilder::new()
                .add("id", int(false))
                .add("dept_id", int(true))
                .build()
                .unwrap(),
            vec![vec![json!(1), json!(10)]],
        )
        .unwrap();
    store
        .add_table(
            "public",
            "dept",
            TableSource::Memory,
            RecordTypeBuilder::new().add("id", int(false)).build().unwrap(),
            vec![vec![json!(10)]],
        )
        .unwrap();
    store
        .add_collection("shop", "orders", vec![json!({"amount": 10})])
        .unwrap();
    store.into_shared()
}

const DOCUMENT_PIPELINE: &str = r#"
name: pipeline
namespace: shop
collection: orders
documents: []
stages:
  - stage: filter
    conditions:
      - { op: $gt, path: amount, value: 5 }
  - stage: filter
    conditions:
      - { op: $lt, path: amount, value: 50 }
  - stage: add_fields
    include:
      - { name: paid, path: amount }
  - stage: sort
    keys:
      - { path: paid, descending: true }
  - stage: aggregate
    group: paid
    calls:
      - { name: n, function: COUNT }
  - stage: near
    near: [0.0, 0.0]
    key: loc
    max: 5.0
expected_documents: []
"#;

fn relational_plan() -> Plan {
    let builder = RexBuilder::default();
    let int = |nullable| AlgDataType::new(PolyType::Integer, nullable);
    let mut plan_builder = LogicalPlanBuilder::new();
    let dept = plan_builder.scan("public", "dept").build().root();
    plan_builder
        .scan("public", "emp")
        .join(
            JoinKind::Inner,
            builder
                .make_call_kind(
                    Kind::Equals,
                    vec![builder.make_input_ref(1, int(true)), builder.make_input_ref(2, int(false))],
                )
                .unwrap(),
            dept,
        )
        .filter(
            builder
                .make_call_kind(
                    Kind::GreaterThan,
                    vec![
                        builder.make_input_ref(0, int(false)),
                        builder.make_literal(LiteralValue::Integer(0)),
                    ],
                )
                .unwrap(),
        )
        .project(vec![
            (builder.make_input_ref(0, int(false)), "id"),
            (builder.make_input_ref(2, int(false)), "dept"),
        ])
        .project(vec![(builder.make_input_ref(1, int(false)), "dept")])
        .build()
}

/// Runs every standard rule set in turn, checking a second application of each changes nothing.
fn check_fixpoints(plan: Plan, config: PlannerConfig) {
    let context = OptimizerContext::new(store())
        .with_config(config.clone())
        .unwrap();
    let rule_sets = vec![
        RuleSet::document_lowering(),
        RuleSet::relational_rewrite(),
        RuleSet::enumerable_implementation(),
    ];

    let mut plan = plan;
    for rules in rule_sets {
        let name = rules.name().to_string();
        let programs = Programs::new(vec![Program::heuristic(rules, &config)], context.clone());
        let target = PhysicalPropertySet::default();

        let once = programs.transform(0, &target, plan).unwrap();
        let twice = programs
            .transform(0, &target, Plan::new(once.root()))
            .unwrap();
        assert_eq!(once, twice, "{} is not at a fixpoint:\n{}", name, once);
        plan = once;
    }
}

#[test]
fn test_rule_sets_reach_fixpoint() {
    let test_case: TestCase = serde_yaml::from_str(DOCUMENT_PIPELINE).unwrap();
    for match_order in [MatchOrder::TopDown, MatchOrder::BottomUp] {
        let config = PlannerConfig {
            match_order,
            ..PlannerConfig::default()
        };
        check_fixpoints(
            to_logical_plan(&test_case, &RexBuilder::default()),
            config.clone(),
        );
        check_fixpoints(relational_plan(), config);
    }
}
