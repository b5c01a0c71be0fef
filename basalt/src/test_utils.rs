use std::sync::Arc;

use crate::catalog::{CatalogTable, MemoryCatalog, TableSource};
use crate::heuristic::{HepOptimizer, MatchOrder};
use crate::operator::JoinKind;
use crate::optimizer::OptimizerContext;
use crate::plan::{LogicalPlanBuilder, Plan};
use crate::rex::{Kind, LiteralValue, QueryLanguage, RexBuilder, RexNode};
use crate::types::{AlgDataType, PolyType, RecordTypeBuilder};

/// Catalog with relational tables `public.{emp, dept, location, customer}` and the document
/// collection `shop.orders`. `customer` lives in a jdbc store.
pub fn test_catalog() -> Arc<MemoryCatalog> {
    let mut catalog = MemoryCatalog::new();
    let int = |nullable| AlgDataType::new(PolyType::Integer, nullable);
    let varchar = AlgDataType::nullable(PolyType::Varchar);

    let tables = vec![
        CatalogTable::new(
            "public",
            "emp",
            TableSource::Memory,
            RecordTypeBuilder::new()
                .add("id", int(false))
                .add("name", varchar.clone())
                .add("dept_id", int(true))
                .add("salary", int(true))
                .build()
                .unwrap(),
        ),
        CatalogTable::new(
            "public",
            "dept",
            TableSource::Memory,
            RecordTypeBuilder::new()
                .add("id", int(false))
                .add("name", varchar.clone())
                .add("location_id", int(true))
                .build()
                .unwrap(),
        ),
        CatalogTable::new(
            "public",
            "location",
            TableSource::Memory,
            RecordTypeBuilder::new()
                .add("id", int(false))
                .add("city", varchar.clone())
                .build()
                .unwrap(),
        ),
        CatalogTable::new(
            "public",
            "customer",
            TableSource::Jdbc,
            RecordTypeBuilder::new()
                .add("id", int(false))
                .add("name", varchar)
                .build()
                .unwrap(),
        ),
        CatalogTable::collection("shop", "orders", TableSource::Memory),
    ];
    for table in tables {
        catalog.register_table(table).unwrap();
    }
    Arc::new(catalog)
}

pub fn test_context() -> OptimizerContext {
    OptimizerContext::new(test_catalog())
}

pub fn build_hep_optimizer_for_test(plan: Plan) -> HepOptimizer {
    HepOptimizer::new(MatchOrder::TopDown, usize::MAX, vec![], plan, test_context()).unwrap()
}

pub fn typed_ref(index: usize, poly_type: PolyType, nullable: bool) -> RexNode {
    RexBuilder::default().make_input_ref(index, AlgDataType::new(poly_type, nullable))
}

/// The document column of a document row.
pub fn doc_ref() -> RexNode {
    typed_ref(0, PolyType::Document, false)
}

pub fn int_literal(value: i64) -> RexNode {
    RexBuilder::default().make_literal(LiteralValue::Integer(value))
}

pub fn string_literal(value: &str) -> RexNode {
    RexBuilder::default().make_literal(LiteralValue::String(value.to_string()))
}

pub fn binary(builder: &RexBuilder, kind: Kind, left: RexNode, right: RexNode) -> RexNode {
    builder.make_call_kind(kind, vec![left, right]).unwrap()
}

/// `emp.dept_id = dept.id`, then `dept.location_id = location.id`.
pub fn emp_dept_location_conditions() -> (RexNode, RexNode) {
    let builder = RexBuilder::default();
    (
        binary(
            &builder,
            Kind::Equals,
            typed_ref(2, PolyType::Integer, true),
            typed_ref(4, PolyType::Integer, false),
        ),
        binary(
            &builder,
            Kind::Equals,
            typed_ref(6, PolyType::Integer, true),
            typed_ref(7, PolyType::Integer, false),
        ),
    )
}

/// `(emp join dept) join location`, both joins of `kind`.
pub fn emp_dept_location(kind: JoinKind) -> Plan {
    let (emp_dept, dept_location) = emp_dept_location_conditions();
    let mut builder = LogicalPlanBuilder::new();
    let location = builder.scan("public", "location").build().root();
    let dept = builder.scan("public", "dept").build().root();
    builder
        .scan("public", "emp")
        .join(kind, emp_dept, dept)
        .join(kind, dept_location, location)
        .build()
}

/// A `$near` query whose distance bound is not a number.
pub fn malformed_near() -> RexNode {
    let builder = RexBuilder::default();
    builder
        .call(
            QueryLanguage::Mongo,
            "$near",
            vec![
                string_literal("loc"),
                string_literal("here"),
                string_literal("far"),
                builder.make_null_literal(),
            ],
        )
        .unwrap()
}
