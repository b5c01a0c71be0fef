use basalt::config::PlannerConfig;
use basalt::optimizer::OptimizerContext;
use basalt::plan::explain_to_string;
use basalt::program::{Program, Programs};
use basalt::properties::PhysicalPropertySet;
use basalt::rules::{RuleSet, UNBOUNDED_DISTANCE};
use basalt_integration::interpreter::Interpreter;
use basalt_integration::store::MemoryStore;
use serde_json::json;

use crate::utils::{canonical, to_logical_plan, Stage, TestCase, TestCaseRunner};

mod utils;

#[test]
fn test_geo_pipelines() {
    TestCaseRunner::new("resources/geo.yaml").run()
}

fn geo_near_case(max: Option<f64>, min: Option<f64>) -> TestCase {
    TestCase {
        name: "geo_near".to_string(),
        namespace: "maps".to_string(),
        collection: "places".to_string(),
        documents: vec![
            json!({"name": "a", "loc": [0, 0]}),
            json!({"name": "b", "loc": [3, 4]}),
            json!({"name": "c", "loc": [6, 8]}),
        ],
        stages: vec![Stage::GeoNear {
            near: [0.0, 0.0],
            distance_field: "dist".to_string(),
            key: "loc".to_string(),
            multiplier: None,
            include_locs: None,
            max,
            min,
        }],
        expected_plan: None,
        expected_documents: vec![],
        ordered: true,
    }
}

/// Explain of the plan after document lowering, and the documents the compiled plan returns.
fn lower_and_run(test_case: &TestCase) -> (String, Vec<String>) {
    let mut store = MemoryStore::new();
    store
        .add_collection("maps", "places", test_case.documents.clone())
        .unwrap();
    let store = store.into_shared();
    let context = OptimizerContext::new(store.clone());
    let plan = to_logical_plan(test_case, &context.rex_builder());

    let lowering = Programs::new(
        vec![Program::heuristic(
            RuleSet::document_lowering(),
            &PlannerConfig::default(),
        )],
        context.clone(),
    );
    let lowered = lowering
        .transform(0, &PhysicalPropertySet::default(), plan)
        .unwrap();
    let explain = explain_to_string(&lowered).unwrap();

    let compiled = Programs::standard(context).compile(lowered).unwrap();
    let rows = Interpreter::new(store).execute(&compiled).unwrap();
    (explain, canonical(rows, true))
}

#[test]
fn test_unbounded_sentinel_adds_no_bound() {
    let (explain, rows) = lower_and_run(&geo_near_case(
        Some(UNBOUNDED_DISTANCE),
        Some(UNBOUNDED_DISTANCE),
    ));
    assert!(!explain.contains("$gte"), "{}", explain);
    assert!(!explain.contains("$lte"), "{}", explain);

    let (omitted_explain, omitted_rows) = lower_and_run(&geo_near_case(None, None));
    assert_eq!(omitted_explain, explain);
    assert_eq!(omitted_rows, rows);
    assert_eq!(3, rows.len());
}

#[test]
fn test_single_bound() {
    let (explain, rows) = lower_and_run(&geo_near_case(Some(5.0), Some(UNBOUNDED_DISTANCE)));
    assert!(explain.contains("$lte"), "{}", explain);
    assert!(!explain.contains("$gte"), "{}", explain);
    assert_eq!(
        canonical(
            vec![
                vec![json!({"name": "a", "loc": [0, 0], "dist": 0})],
                vec![json!({"name": "b", "loc": [3, 4], "dist": 5})],
            ],
            true
        ),
        rows
    );

    let (explain, rows) = lower_and_run(&geo_near_case(None, Some(1.0)));
    assert!(explain.contains("$gte"), "{}", explain);
    assert!(!explain.contains("$lte"), "{}", explain);
    assert_eq!(2, rows.len());
}
