use std::fmt::Debug;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use basalt::config::PlannerConfig;
use basalt::operator::LaxAggregateCall;
use basalt::optimizer::OptimizerContext;
use basalt::plan::{explain_to_string, LogicalPlanBuilder, Plan};
use basalt::program::Programs;
use basalt::properties::Direction;
use basalt::rex::{LiteralValue, QueryLanguage, RexBuilder, RexNode};
use basalt_integration::interpreter::Interpreter;
use basalt_integration::store::MemoryStore;
use basalt_integration::value::{row_key, Row};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
pub struct TestCase {
    pub name: String,
    pub namespace: String,
    pub collection: String,
    pub documents: Vec<Value>,
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub expected_plan: Option<String>,
    pub expected_documents: Vec<Value>,
    /// Whether `expected_documents` are in output order.
    #[serde(default)]
    pub ordered: bool,
}

/// One stage of a document pipeline.
#[derive(Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    /// Conjunction of `conditions`.
    Filter { conditions: Vec<Condition> },
    Project {
        include: Vec<Field>,
        #[serde(default)]
        exclude: Vec<String>,
    },
    AddFields {
        include: Vec<Field>,
        #[serde(default)]
        exclude: Vec<String>,
    },
    Aggregate {
        #[serde(default)]
        group: Option<String>,
        calls: Vec<Call>,
    },
    Sort {
        keys: Vec<SortKey>,
        #[serde(default)]
        offset: Option<usize>,
        #[serde(default)]
        fetch: Option<usize>,
    },
    Unwind { path: String },
    GeoNear {
        near: [f64; 2],
        distance_field: String,
        key: String,
        #[serde(default)]
        multiplier: Option<f64>,
        #[serde(default)]
        include_locs: Option<String>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        min: Option<f64>,
    },
    Near {
        near: [f64; 2],
        key: String,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        min: Option<f64>,
    },
}

#[derive(Deserialize)]
pub struct Condition {
    pub op: String,
    pub path: String,
    pub value: Value,
}

#[derive(Deserialize)]
pub struct Field {
    pub name: String,
    pub path: String,
}

#[derive(Deserialize)]
pub struct Call {
    pub name: String,
    pub function: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Deserialize)]
pub struct SortKey {
    pub path: String,
    #[serde(default)]
    pub descending: bool,
}

/// Loads document pipeline cases and checks that each compiles to the expected plan, and that
/// the compiled plan returns the same documents as the pipeline it came from.
pub struct TestCaseRunner {
    /// Input file paths.
    pub paths: Vec<PathBuf>,
    pub config: PlannerConfig,
    /// Whether to compare explain output with `expected_plan`.
    pub check_plans: bool,
}

impl TestCaseRunner {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            paths: vec![path.into()],
            config: PlannerConfig::default(),
            check_plans: true,
        }
    }

    pub fn run(self) {
        for path in &self.paths {
            let file = File::options()
                .read(true)
                .open(path)
                .with_context(|| format!("Failed to open test case file: {:?}", &path))
                .unwrap();

            let test_cases: Vec<TestCase> = serde_yaml::from_reader(file)
                .with_context(|| format!("Failed to load test cases from file: {:?}", &path))
                .unwrap();

            for test_case in test_cases {
                self.run_case(path, test_case);
            }
        }
    }

    fn run_case<P: AsRef<Path> + Debug>(&self, path: &P, test_case: TestCase) {
        let mut store = MemoryStore::new();
        store
            .add_collection(
                test_case.namespace.as_str(),
                test_case.collection.as_str(),
                test_case.documents.clone(),
            )
            .unwrap();
        let store = store.into_shared();
        let interpreter = Interpreter::new(store.clone());
        let context = OptimizerContext::new(store)
            .with_config(self.config.clone())
            .unwrap();

        let plan = to_logical_plan(&test_case, &context.rex_builder());
        let compiled = Programs::standard(context)
            .compile(Plan::new(plan.root()))
            .with_context(|| format!("Failed to compile {} in {:?}", test_case.name, path))
            .unwrap();

        if let (true, Some(expected_plan)) = (self.check_plans, &test_case.expected_plan) {
            assert_eq!(
                expected_plan,
                &explain_to_string(&compiled).unwrap(),
                "Plan for {} in {:?} is different.",
                test_case.name,
                path
            );
        }

        let expected = canonical(
            test_case
                .expected_documents
                .iter()
                .map(|document| vec![document.clone()])
                .collect(),
            test_case.ordered,
        );

        // Geo queries only execute once unwrapped.
        if !has_geo_stage(&test_case) {
            let original = canonical(interpreter.execute(&plan).unwrap(), test_case.ordered);
            assert_eq!(
                expected, original,
                "Documents of {} in {:?} are different before planning.",
                test_case.name, path
            );
        }

        let actual = canonical(interpreter.execute(&compiled).unwrap(), test_case.ordered);
        assert_eq!(
            expected, actual,
            "Documents of {} in {:?} are different after planning.",
            test_case.name, path
        );
    }
}

/// Rows as canonical text, sorted unless the order is significant.
pub fn canonical(rows: Vec<Row>, ordered: bool) -> Vec<String> {
    let mut keys = rows.iter().map(|row| row_key(row)).collect::<Vec<_>>();
    if !ordered {
        keys.sort();
    }
    keys
}

fn has_geo_stage(test_case: &TestCase) -> bool {
    test_case
        .stages
        .iter()
        .any(|stage| matches!(stage, Stage::GeoNear { .. } | Stage::Near { .. }))
}

pub fn json_to_literal(value: &Value) -> LiteralValue {
    match value {
        Value::Null => LiteralValue::Null,
        Value::Bool(b) => LiteralValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => LiteralValue::Integer(i),
            None => LiteralValue::Double(n.as_f64().unwrap()),
        },
        Value::String(s) => LiteralValue::String(s.clone()),
        Value::Array(values) => LiteralValue::List(values.iter().map(json_to_literal).collect()),
        Value::Object(_) => panic!("Object literals are not supported: {}", value),
    }
}

fn distance(builder: &RexBuilder, bound: Option<f64>) -> RexNode {
    match bound {
        Some(bound) => builder.make_literal(LiteralValue::Double(bound)),
        None => builder.make_null_literal(),
    }
}

fn optional_string(builder: &RexBuilder, value: Option<&str>) -> RexNode {
    match value {
        Some(value) => builder.make_literal(LiteralValue::String(value.to_string())),
        None => builder.make_null_literal(),
    }
}

fn point(builder: &RexBuilder, near: [f64; 2]) -> RexNode {
    builder.make_literal(LiteralValue::List(vec![
        LiteralValue::Double(near[0]),
        LiteralValue::Double(near[1]),
    ]))
}

pub fn to_logical_plan(test_case: &TestCase, builder: &RexBuilder) -> Plan {
    let mut plan_builder = LogicalPlanBuilder::new();
    plan_builder.scan(test_case.namespace.as_str(), test_case.collection.as_str());

    for stage in &test_case.stages {
        match stage {
            Stage::Filter { conditions } => {
                let conditions = conditions
                    .iter()
                    .map(|condition| {
                        builder
                            .call(
                                QueryLanguage::Mongo,
                                &condition.op,
                                vec![
                                    builder.make_name_ref(&condition.path),
                                    builder.make_literal(json_to_literal(&condition.value)),
                                ],
                            )
                            .unwrap()
                    })
                    .collect::<Vec<_>>();
                plan_builder.document_filter(builder.and(conditions).unwrap());
            }
            Stage::Project { include, exclude } => {
                plan_builder.document_project(fields(builder, include), exclude.clone());
            }
            Stage::AddFields { include, exclude } => {
                plan_builder.document_add_fields(fields(builder, include), exclude.clone());
            }
            Stage::Aggregate { group, calls } => {
                let calls = calls
                    .iter()
                    .map(|call| {
                        LaxAggregateCall::new(
                            call.name.as_str(),
                            builder
                                .registry()
                                .get(QueryLanguage::Sql, &call.function)
                                .unwrap(),
                            call.path.as_deref().map(|path| builder.make_name_ref(path)),
                        )
                    })
                    .collect();
                plan_builder.document_aggregate(
                    group.as_deref().map(|path| builder.make_name_ref(path)),
                    calls,
                );
            }
            Stage::Sort {
                keys,
                offset,
                fetch,
            } => {
                let keys = keys
                    .iter()
                    .map(|key| {
                        let direction = if key.descending {
                            Direction::Descending
                        } else {
                            Direction::Ascending
                        };
                        (builder.make_name_ref(&key.path), direction)
                    })
                    .collect();
                plan_builder.document_sort(keys, *offset, *fetch);
            }
            Stage::Unwind { path } => {
                plan_builder.document_unwind(path.as_str());
            }
            Stage::GeoNear {
                near,
                distance_field,
                key,
                multiplier,
                include_locs,
                max,
                min,
            } => {
                let multiplier = match multiplier {
                    Some(multiplier) => builder.make_literal(LiteralValue::Double(*multiplier)),
                    None => builder.make_null_literal(),
                };
                let condition = builder
                    .call(
                        QueryLanguage::Mongo,
                        "$geoNear",
                        vec![
                            point(builder, *near),
                            optional_string(builder, Some(distance_field.as_str())),
                            multiplier,
                            optional_string(builder, include_locs.as_deref()),
                            optional_string(builder, Some(key.as_str())),
                            distance(builder, *max),
                            distance(builder, *min),
                            builder.make_null_literal(),
                        ],
                    )
                    .unwrap();
                plan_builder.document_filter(condition);
            }
            Stage::Near { near, key, max, min } => {
                let condition = builder
                    .call(
                        QueryLanguage::Mongo,
                        "$near",
                        vec![
                            optional_string(builder, Some(key.as_str())),
                            point(builder, *near),
                            distance(builder, *max),
                            distance(builder, *min),
                        ],
                    )
                    .unwrap();
                plan_builder.document_filter(condition);
            }
        }
    }

    plan_builder.build()
}

fn fields(builder: &RexBuilder, fields: &[Field]) -> Vec<(String, RexNode)> {
    fields
        .iter()
        .map(|field| (field.name.clone(), builder.make_name_ref(&field.path)))
        .collect()
}
