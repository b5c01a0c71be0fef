//! Row at a time execution of logical and enumerable plans.
//!
//! The interpreter is the reference semantics rewrites are checked against: a plan and its
//! optimized form must produce the same rows. It favours obviousness over speed, e.g. hash and
//! nested loop joins run the same loop.
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use basalt::error::{BasaltError, BasaltResult};
use basalt::operator::LogicalOperator::{
    LogicalAggregate, LogicalCalc, LogicalDocumentAggregate, LogicalDocumentFilter,
    LogicalDocumentProject, LogicalDocumentSort, LogicalDocumentUnwind, LogicalFilter,
    LogicalJoin, LogicalProject, LogicalScan, LogicalSort,
};
use basalt::operator::Operator::{Logical, Physical};
use basalt::operator::PhysicalOperator::{
    EnumerableAggregate, EnumerableCalc, EnumerableDocumentUnwind, EnumerableFilter,
    EnumerableHashJoin, EnumerableNestedLoopJoin, EnumerableProject, EnumerableScan,
    EnumerableSort, JdbcScan, JdbcToEnumerableConverter,
};
use basalt::operator::{
    Aggregate, Calc, DocumentAggregate, DocumentProject, DocumentSort, Join,
};
use basalt::optimizer::OptimizerContext;
use basalt::plan::{visit_bottom_up, Plan, PlanNodeRef, PlanVisitor};
use basalt::properties::{Collation, Direction};
use basalt::rex::{Kind, RexCall, RexNode};
use basalt::{bail_internal, internal_err};
use itertools::Itertools;
use log::{debug, trace};
use serde_json::{Map, Value};

use crate::mql;
use crate::store::MemoryStore;
use crate::value::{compare_values, double, literal_to_value, row_key, sql_compare, Row};

/// Executes plans against a [`MemoryStore`].
pub struct Interpreter {
    store: Arc<MemoryStore>,
    context: OptimizerContext,
    params: Vec<Value>,
}

impl Interpreter {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        let context = OptimizerContext::new(store.clone());
        Self {
            store,
            context,
            params: vec![],
        }
    }

    /// Values of dynamic parameters, `?0` is the first.
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Context planning against the same store.
    pub fn context(&self) -> &OptimizerContext {
        &self.context
    }

    pub fn execute(&self, plan: &Plan) -> BasaltResult<Vec<Row>> {
        let plan = plan.with_logical_props(&self.context)?;
        debug!("Executing plan:\n{}", plan);
        visit_bottom_up(&mut Executor { interpreter: self }, &plan.root())
    }

    /// Executes a plan over documents, returning the documents.
    pub fn execute_documents(&self, plan: &Plan) -> BasaltResult<Vec<Value>> {
        self.execute(plan)?
            .into_iter()
            .map(|row| match <[Value; 1]>::try_from(row) {
                Ok([document]) => Ok(document),
                Err(row) => Err(internal_err!("Expected a document row, got {:?}", row)),
            })
            .collect()
    }

    pub fn eval(&self, expr: &RexNode, row: &[Value]) -> BasaltResult<Value> {
        match expr {
            RexNode::Literal(literal) => Ok(literal_to_value(literal.value())),
            RexNode::InputRef(input_ref) => row.get(input_ref.index()).cloned().ok_or_else(|| {
                internal_err!("${} out of range of a {} field row", input_ref.index(), row.len())
            }),
            RexNode::NameRef(name_ref) => Ok(match row.first() {
                Some(document) => mql::query_value(document, name_ref.names()),
                None => Value::Null,
            }),
            RexNode::DynamicParam(param) => self.params.get(param.index()).cloned().ok_or_else(|| {
                BasaltError::Config(format!("No value bound to parameter ?{}", param.index()))
            }),
            RexNode::CorrelVariable(_) => Err(BasaltError::Unsupported(
                "Executing correlated variables".to_string(),
            )),
            RexNode::Call(call) => {
                let operands = call
                    .operands()
                    .iter()
                    .map(|operand| self.eval(operand, row))
                    .collect::<BasaltResult<Vec<_>>>()?;
                eval_call(call, operands)
            }
        }
    }

    fn is_true(&self, condition: &RexNode, row: &[Value]) -> BasaltResult<bool> {
        Ok(self.eval(condition, row)? == Value::Bool(true))
    }

    fn filter(&self, input: Vec<Row>, condition: &RexNode) -> BasaltResult<Vec<Row>> {
        let mut rows = Vec::with_capacity(input.len());
        for row in input {
            if self.is_true(condition, &row)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn project(&self, input: Vec<Row>, exprs: &[RexNode]) -> BasaltResult<Vec<Row>> {
        input
            .iter()
            .map(|row| exprs.iter().map(|expr| self.eval(expr, row)).collect())
            .collect()
    }

    fn calc(&self, input: Vec<Row>, calc: &Calc) -> BasaltResult<Vec<Row>> {
        let input = match calc.condition() {
            Some(condition) => self.filter(input, condition)?,
            None => input,
        };
        self.project(input, calc.projects())
    }

    fn aggregate(&self, input: Vec<Row>, aggregate: &Aggregate) -> BasaltResult<Vec<Row>> {
        let groups = group_rows(input, aggregate.group().is_empty(), |row| {
            aggregate
                .group()
                .iter()
                .map(|&idx| {
                    row.get(idx)
                        .cloned()
                        .ok_or_else(|| internal_err!("Group key ${} out of range", idx))
                })
                .collect()
        })?;

        let mut rows = Vec::with_capacity(groups.len());
        for (mut key, members) in groups {
            for call in aggregate.calls() {
                let args = members
                    .iter()
                    .map(|row| match call.args().first() {
                        Some(&idx) => row.get(idx).cloned().ok_or_else(|| {
                            internal_err!("Aggregate argument ${} out of range", idx)
                        }),
                        None => Ok(Value::Bool(true)),
                    })
                    .collect::<BasaltResult<Vec<_>>>()?;
                key.push(accumulate(call.operator().kind(), args, call.distinct())?);
            }
            rows.push(key);
        }
        Ok(rows)
    }

    fn sort(
        &self,
        input: Vec<Row>,
        collation: &Collation,
        offset: Option<usize>,
        fetch: Option<usize>,
    ) -> BasaltResult<Vec<Row>> {
        let keyed = input
            .into_iter()
            .map(|row| {
                let keys = collation
                    .fields()
                    .iter()
                    .map(|field| {
                        row.get(field.index)
                            .cloned()
                            .map(|key| (key, field.direction))
                            .ok_or_else(|| internal_err!("Sort key ${} out of range", field.index))
                    })
                    .collect::<BasaltResult<Vec<_>>>()?;
                Ok((keys, row))
            })
            .collect::<BasaltResult<Vec<_>>>()?;
        Ok(sort_keyed(keyed, offset, fetch))
    }

    fn join(
        &self,
        join: &Join,
        left: Vec<Row>,
        right: Vec<Row>,
        left_width: usize,
        right_width: usize,
    ) -> BasaltResult<Vec<Row>> {
        let mut rows = vec![];
        let mut right_matched = vec![false; right.len()];
        for left_row in &left {
            let mut matched = false;
            for (idx, right_row) in right.iter().enumerate() {
                let mut row = left_row.clone();
                row.extend(right_row.iter().cloned());
                if self.is_true(join.condition(), &row)? {
                    matched = true;
                    right_matched[idx] = true;
                    rows.push(row);
                }
            }
            if !matched && join.kind().generates_nulls_on_right() {
                let mut row = left_row.clone();
                row.extend(std::iter::repeat(Value::Null).take(right_width));
                rows.push(row);
            }
        }
        if join.kind().generates_nulls_on_left() {
            for (right_row, matched) in right.into_iter().zip(right_matched) {
                if !matched {
                    let mut row = vec![Value::Null; left_width];
                    row.extend(right_row);
                    rows.push(row);
                }
            }
        }
        Ok(rows)
    }

    fn document_project(&self, input: Vec<Row>, project: &DocumentProject) -> BasaltResult<Vec<Row>> {
        let keep_input = project.is_extend() || project.includes().is_empty();
        input
            .into_iter()
            .map(|row| {
                let values = project
                    .includes()
                    .iter()
                    .map(|(_, expr)| self.eval(expr, &row))
                    .collect::<BasaltResult<Vec<_>>>()?;
                let mut document = match row.into_iter().next() {
                    Some(document) if keep_input => document,
                    _ => Value::Object(Map::new()),
                };
                for ((name, _), value) in project.includes().iter().zip(values) {
                    mql::set_path(&mut document, name, value);
                }
                for path in project.excludes() {
                    mql::remove_path(&mut document, path);
                }
                Ok(vec![document])
            })
            .collect()
    }

    fn document_aggregate(
        &self,
        input: Vec<Row>,
        aggregate: &DocumentAggregate,
    ) -> BasaltResult<Vec<Row>> {
        let groups = group_rows(input, aggregate.group().is_none(), |row| {
            match aggregate.group() {
                Some(group) => Ok(vec![self.eval(group, row)?]),
                None => Ok(vec![]),
            }
        })?;

        let mut names = vec![GROUP_KEY.to_string()];
        names.extend(aggregate.calls().iter().map(|call| call.name().to_string()));

        let mut rows = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            let mut values = vec![key.into_iter().next().unwrap_or(Value::Null)];
            for call in aggregate.calls() {
                let args = members
                    .iter()
                    .map(|row| match call.input() {
                        Some(input) => self.eval(input, row),
                        None => Ok(Value::Bool(true)),
                    })
                    .collect::<BasaltResult<Vec<_>>>()?;
                values.push(accumulate(call.operator().kind(), args, false)?);
            }
            rows.push(vec![mql::merge(&names, values)]);
        }
        Ok(rows)
    }

    fn document_sort(&self, input: Vec<Row>, sort: &DocumentSort) -> BasaltResult<Vec<Row>> {
        let keyed = input
            .into_iter()
            .map(|row| {
                let keys = sort
                    .keys()
                    .iter()
                    .map(|(key, direction)| Ok((self.eval(key, &row)?, *direction)))
                    .collect::<BasaltResult<Vec<_>>>()?;
                Ok((keys, row))
            })
            .collect::<BasaltResult<Vec<_>>>()?;
        Ok(sort_keyed(keyed, sort.offset(), sort.fetch()))
    }

    fn document_unwind(&self, input: Vec<Row>, path: &str) -> Vec<Row> {
        let segments = path.split('.').collect::<Vec<_>>();
        let mut rows = vec![];
        for row in input {
            let document = match row.into_iter().next() {
                Some(document) => document,
                None => continue,
            };
            if let Value::Array(elements) = mql::query_value(&document, &segments) {
                for element in elements {
                    let mut unwound = document.clone();
                    mql::set_path(&mut unwound, path, element);
                    rows.push(vec![unwound]);
                }
            }
        }
        rows
    }
}

const GROUP_KEY: &str = "_id";

struct Executor<'a> {
    interpreter: &'a Interpreter,
}

impl<'a> Executor<'a> {
    fn width(node: &PlanNodeRef, idx: usize) -> BasaltResult<usize> {
        node.inputs()
            .get(idx)
            .and_then(|input| input.logical_prop())
            .map(|prop| prop.field_count())
            .ok_or_else(|| internal_err!("Input {} of {} has no logical property", idx, node.operator()))
    }
}

impl<'a> PlanVisitor for Executor<'a> {
    type Output = Vec<Row>;

    fn visit_node(&mut self, node: &PlanNodeRef, inputs: Vec<Vec<Row>>) -> BasaltResult<Vec<Row>> {
        let interpreter = self.interpreter;
        let expected_inputs = node.inputs().len();
        if inputs.len() != expected_inputs {
            bail_internal!("{} expects {} inputs, got {}", node.operator(), expected_inputs, inputs.len());
        }
        let mut inputs = inputs.into_iter();
        let mut input = || inputs.next().unwrap_or_default();

        let rows = match node.operator() {
            Logical(LogicalScan(scan)) | Physical(EnumerableScan(scan)) | Physical(JdbcScan(scan)) => {
                interpreter.store.rows(scan.namespace(), scan.table())?.to_vec()
            }
            Physical(JdbcToEnumerableConverter(_)) => input(),
            Logical(LogicalFilter(filter)) | Physical(EnumerableFilter(filter)) => {
                interpreter.filter(input(), filter.condition())?
            }
            Logical(LogicalProject(project)) | Physical(EnumerableProject(project)) => {
                interpreter.project(input(), project.exprs())?
            }
            Logical(LogicalCalc(calc)) | Physical(EnumerableCalc(calc)) => interpreter.calc(input(), calc)?,
            Logical(LogicalAggregate(aggregate)) | Physical(EnumerableAggregate(aggregate)) => {
                interpreter.aggregate(input(), aggregate)?
            }
            Logical(LogicalSort(sort)) | Physical(EnumerableSort(sort)) => {
                interpreter.sort(input(), sort.collation(), sort.offset(), sort.fetch())?
            }
            Logical(LogicalJoin(join))
            | Physical(EnumerableHashJoin(join))
            | Physical(EnumerableNestedLoopJoin(join)) => {
                let left = input();
                let right = input();
                interpreter.join(join, left, right, Self::width(node, 0)?, Self::width(node, 1)?)?
            }
            Logical(LogicalDocumentFilter(filter)) => interpreter.filter(input(), filter.condition())?,
            Logical(LogicalDocumentProject(project)) => interpreter.document_project(input(), project)?,
            Logical(LogicalDocumentAggregate(aggregate)) => {
                interpreter.document_aggregate(input(), aggregate)?
            }
            Logical(LogicalDocumentSort(sort)) => interpreter.document_sort(input(), sort)?,
            Logical(LogicalDocumentUnwind(unwind)) | Physical(EnumerableDocumentUnwind(unwind)) => {
                interpreter.document_unwind(input(), unwind.path())
            }
        };

        trace!("{} produced {} rows", node.operator(), rows.len());
        Ok(rows)
    }
}

/// Splits rows into groups keyed by `key`, in order of first appearance.
///
/// A `global` aggregation forms one group even without input rows.
fn group_rows<F>(input: Vec<Row>, global: bool, key: F) -> BasaltResult<Vec<(Row, Vec<Row>)>>
where
    F: Fn(&Row) -> BasaltResult<Row>,
{
    let mut groups: Vec<(Row, Vec<Row>)> = vec![];
    let mut index = HashMap::new();
    if global {
        groups.push((vec![], vec![]));
        index.insert(row_key(&[]), 0);
    }
    for row in input {
        let group_key = key(&row)?;
        let idx = *index.entry(row_key(&group_key)).or_insert_with(|| {
            groups.push((group_key, vec![]));
            groups.len() - 1
        });
        groups[idx].1.push(row);
    }
    Ok(groups)
}

fn sort_keyed(
    mut keyed: Vec<(Vec<(Value, Direction)>, Row)>,
    offset: Option<usize>,
    fetch: Option<usize>,
) -> Vec<Row> {
    keyed.sort_by(|(left, _), (right, _)| {
        left.iter()
            .zip(right.iter())
            .map(|((l, direction), (r, _))| match direction {
                Direction::Ascending => compare_values(l, r),
                Direction::Descending => compare_values(r, l),
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    keyed
        .into_iter()
        .map(|(_, row)| row)
        .skip(offset.unwrap_or(0))
        .take(fetch.unwrap_or(usize::MAX))
        .collect()
}

/// Folds the argument values of one group. Nulls are ignored except by a plain count.
fn accumulate(kind: Kind, args: Vec<Value>, distinct: bool) -> BasaltResult<Value> {
    let mut values = args.into_iter().filter(|value| !value.is_null()).collect::<Vec<_>>();
    if distinct {
        values = values.into_iter().unique_by(|value| row_key(std::slice::from_ref(value))).collect();
    }

    match kind {
        Kind::Count => Ok(Value::from(values.len() as i64)),
        Kind::Sum => Ok(sum(&values)),
        Kind::Avg => Ok(match (sum(&values).as_f64(), values.len()) {
            (Some(total), count) if count > 0 => double(total / count as f64),
            _ => Value::Null,
        }),
        Kind::Min => Ok(values.into_iter().min_by(compare_values).unwrap_or(Value::Null)),
        Kind::Max => Ok(values.into_iter().max_by(compare_values).unwrap_or(Value::Null)),
        other => Err(BasaltError::Unsupported(format!("Aggregate function {}", other))),
    }
}

fn sum(values: &[Value]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    let integers = values.iter().map(|value| value.as_i64()).collect::<Option<Vec<_>>>();
    match integers.and_then(|integers| integers.into_iter().try_fold(0i64, |acc, i| acc.checked_add(i))) {
        Some(total) => Value::from(total),
        None => double(values.iter().filter_map(|value| value.as_f64()).sum()),
    }
}

fn strings(call: &RexCall, value: &Value) -> BasaltResult<Vec<String>> {
    value
        .as_array()
        .and_then(|values| {
            values
                .iter()
                .map(|value| value.as_str().map(|s| s.to_string()))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| internal_err!("{} expects a list of names, got {}", call.operator().name(), value))
}

fn boolean(value: &Value) -> BasaltResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        other => Err(internal_err!("Expected a boolean, got {}", other)),
    }
}

fn option_bool(value: Option<bool>) -> Value {
    value.map(Value::Bool).unwrap_or(Value::Null)
}

fn arithmetic(kind: Kind, left: &Value, right: &Value) -> Value {
    if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
        let result = match kind {
            Kind::Plus => l.checked_add(r),
            Kind::Minus => l.checked_sub(r),
            Kind::Times => l.checked_mul(r),
            _ => l.checked_div(r),
        };
        if let Some(result) = result {
            return Value::from(result);
        }
    }
    match (left.as_f64(), right.as_f64()) {
        // Division by zero yields null.
        (Some(_), Some(r)) if kind == Kind::Divide && r == 0.0 => Value::Null,
        (Some(l), Some(r)) => double(match kind {
            Kind::Plus => l + r,
            Kind::Minus => l - r,
            Kind::Times => l * r,
            _ => l / r,
        }),
        _ => Value::Null,
    }
}

/// Sql `LIKE` with `%` and `_` wildcards.
fn like(value: &str, pattern: &str) -> bool {
    fn matches(value: &[char], pattern: &[char]) -> bool {
        match pattern.split_first() {
            None => value.is_empty(),
            Some((&'%', rest)) => (0..=value.len()).any(|skip| matches(&value[skip..], rest)),
            Some((&'_', rest)) => !value.is_empty() && matches(&value[1..], rest),
            Some((c, rest)) => value.first() == Some(c) && matches(&value[1..], rest),
        }
    }
    let value = value.chars().collect::<Vec<_>>();
    let pattern = pattern.chars().collect::<Vec<_>>();
    matches(&value, &pattern)
}

fn operand<'a>(call: &RexCall, operands: &'a [Value], idx: usize) -> BasaltResult<&'a Value> {
    operands
        .get(idx)
        .ok_or_else(|| internal_err!("{} has no operand {}", call.operator().name(), idx))
}

fn eval_call(call: &RexCall, operands: Vec<Value>) -> BasaltResult<Value> {
    let kind = call.kind();
    let arg = |idx| operand(call, &operands, idx);

    let value = match kind {
        Kind::And => {
            let values = operands.iter().map(boolean).collect::<BasaltResult<Vec<_>>>()?;
            if values.contains(&Some(false)) {
                Value::Bool(false)
            } else if values.contains(&None) {
                Value::Null
            } else {
                Value::Bool(true)
            }
        }
        Kind::Or => {
            let values = operands.iter().map(boolean).collect::<BasaltResult<Vec<_>>>()?;
            if values.contains(&Some(true)) {
                Value::Bool(true)
            } else if values.contains(&None) {
                Value::Null
            } else {
                Value::Bool(false)
            }
        }
        Kind::Not => option_bool(boolean(arg(0)?)?.map(|b| !b)),
        Kind::Equals
        | Kind::NotEquals
        | Kind::LessThan
        | Kind::LessThanOrEqual
        | Kind::GreaterThan
        | Kind::GreaterThanOrEqual => option_bool(sql_compare(arg(0)?, arg(1)?).map(|ordering| {
            match kind {
                Kind::Equals => ordering.is_eq(),
                Kind::NotEquals => ordering.is_ne(),
                Kind::LessThan => ordering.is_lt(),
                Kind::LessThanOrEqual => ordering.is_le(),
                Kind::GreaterThan => ordering.is_gt(),
                _ => ordering.is_ge(),
            }
        })),
        Kind::IsNull => Value::Bool(arg(0)?.is_null()),
        Kind::IsNotNull => Value::Bool(!arg(0)?.is_null()),
        Kind::Like => match (arg(0)?.as_str(), arg(1)?.as_str()) {
            (Some(value), Some(pattern)) => Value::Bool(like(value, pattern)),
            _ => Value::Null,
        },
        Kind::Plus | Kind::Minus | Kind::Times | Kind::Divide => arithmetic(kind, arg(0)?, arg(1)?),
        Kind::Sum | Kind::Count | Kind::Avg | Kind::Min | Kind::Max => {
            bail_internal!("Aggregate {} evaluated as a scalar", call.operator().name())
        }
        Kind::MqlQueryValue => mql::query_value(arg(0)?, &strings(call, arg(1)?)?),
        Kind::MqlExists => Value::Bool(mql::exists(arg(0)?, &strings(call, arg(1)?)?)),
        Kind::MqlMerge => {
            let names = strings(call, arg(0)?)?;
            mql::merge(&names, operands[1..].to_vec())
        }
        Kind::MqlAddFields => {
            let names = strings(call, arg(1)?)?;
            mql::add_fields(arg(0)?.clone(), &names, operands[2..].to_vec())
        }
        Kind::MqlExclude => mql::exclude(arg(0)?.clone(), &strings(call, arg(1)?)?),
        Kind::MqlNotUnset => mql::not_unset(arg(0)?.clone()),
        Kind::MqlEquals => Value::Bool(mql::mql_equals(arg(0)?, arg(1)?)),
        Kind::MqlGt | Kind::MqlGte | Kind::MqlLt | Kind::MqlLte => {
            Value::Bool(mql::mql_compare(arg(0)?, arg(1)?).map_or(false, |ordering| match kind {
                Kind::MqlGt => ordering.is_gt(),
                Kind::MqlGte => ordering.is_ge(),
                Kind::MqlLt => ordering.is_lt(),
                _ => ordering.is_le(),
            }))
        }
        Kind::MqlGeoDistance => mql::geo_distance(arg(0)?, arg(1)?),
        Kind::MqlGeoNear | Kind::MqlNear => {
            return Err(BasaltError::Unsupported(format!(
                "{} must be unwrapped before execution",
                call.operator().name()
            )))
        }
        Kind::CypherHasLabel => {
            let labels = mql::query_value(arg(0)?, &["labels"]);
            Value::Bool(match (labels.as_array(), arg(1)?) {
                (Some(labels), label) => labels.contains(label),
                (None, _) => false,
            })
        }
        Kind::CypherExtractProperty => match arg(1)?.as_str() {
            Some(key) => mql::query_value(arg(0)?, &["properties", key]),
            None => Value::Null,
        },
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use basalt::catalog::TableSource;
    use basalt::error::BasaltError;
    use basalt::operator::{AggregateCall, JoinKind, LaxAggregateCall};
    use basalt::plan::{LogicalPlanBuilder, PhysicalPlanBuilder};
    use basalt::properties::{Collation, Direction, FieldCollation};
    use basalt::rex::{Kind, LiteralValue, QueryLanguage, RexBuilder, RexNode};
    use basalt::types::{AlgDataType, PolyType, RecordTypeBuilder};
    use serde_json::json;

    use crate::interpreter::Interpreter;
    use crate::store::MemoryStore;
    use crate::value::sorted_rows;

    fn int() -> AlgDataType {
        AlgDataType::nullable(PolyType::Integer)
    }

    fn store() -> Arc<MemoryStore> {
        let mut store = MemoryStore::new();
        store
            .add_table(
                "public",
                "emp",
                TableSource::Memory,
                RecordTypeBuilder::new()
                    .add("id", AlgDataType::not_null(PolyType::Integer))
                    .add("dept_id", int())
                    .add("salary", int())
                    .build()
                    .unwrap(),
                vec![
                    vec![json!(1), json!(10), json!(100)],
                    vec![json!(2), json!(10), json!(300)],
                    vec![json!(3), json!(20), json!(200)],
                    vec![json!(4), json!(null), json!(50)],
                ],
            )
            .unwrap();
        store
            .add_table(
                "public",
                "dept",
                TableSource::Memory,
                RecordTypeBuilder::new()
                    .add("id", AlgDataType::not_null(PolyType::Integer))
                    .add("name", AlgDataType::not_null(PolyType::Varchar))
                    .build()
                    .unwrap(),
                vec![
                    vec![json!(10), json!("sales")],
                    vec![json!(30), json!("legal")],
                ],
            )
            .unwrap();
        store
            .add_collection(
                "shop",
                "orders",
                vec![
                    json!({"customer": {"id": 1}, "amount": 10, "tags": ["a", "b"]}),
                    json!({"customer": {"id": 1}, "amount": 5}),
                    json!({"customer": {"id": 2}, "amount": 7, "tags": "c"}),
                ],
            )
            .unwrap();
        store.into_shared()
    }

    fn input_ref(index: usize) -> RexNode {
        RexBuilder::default().make_input_ref(index, int())
    }

    fn int_literal(value: i64) -> RexNode {
        RexBuilder::default().make_literal(LiteralValue::Integer(value))
    }

    #[test]
    fn test_filter_project_sort() {
        let builder = RexBuilder::default();
        let plan = LogicalPlanBuilder::new()
            .scan("public", "emp")
            .filter(
                builder
                    .make_call_kind(Kind::GreaterThan, vec![input_ref(2), int_literal(60)])
                    .unwrap(),
            )
            .project(vec![(input_ref(0), "id"), (input_ref(2), "salary")])
            .sort(Collation::new(vec![FieldCollation::desc(1)]), Some(1), Some(1))
            .build();

        let rows = Interpreter::new(store()).execute(&plan).unwrap();
        assert_eq!(vec![vec![json!(3), json!(200)]], rows);
    }

    #[test]
    fn test_outer_join() {
        let builder = RexBuilder::default();
        let condition = builder
            .make_call_kind(Kind::Equals, vec![input_ref(1), input_ref(3)])
            .unwrap();
        let dept = PhysicalPlanBuilder::scan("public", "dept").build().root();
        let plan = PhysicalPlanBuilder::scan("public", "emp")
            .hash_join(JoinKind::Full, condition, dept)
            .build();

        let rows = Interpreter::new(store()).execute(&plan).unwrap();
        assert_eq!(
            sorted_rows(vec![
                vec![json!(1), json!(10), json!(100), json!(10), json!("sales")],
                vec![json!(2), json!(10), json!(300), json!(10), json!("sales")],
                vec![json!(3), json!(20), json!(200), json!(null), json!(null)],
                vec![json!(4), json!(null), json!(50), json!(null), json!(null)],
                vec![json!(null), json!(null), json!(null), json!(30), json!("legal")],
            ]),
            sorted_rows(rows)
        );
    }

    #[test]
    fn test_aggregate() {
        let builder = RexBuilder::default();
        let registry = builder.registry();
        let emp = LogicalPlanBuilder::new().scan("public", "emp").build();
        let interpreter = Interpreter::new(store());
        let input_type = emp
            .with_logical_props(interpreter.context())
            .unwrap()
            .root()
            .logical_prop()
            .unwrap()
            .row_type()
            .clone();
        let call = |kind: Kind, args: Vec<usize>| {
            AggregateCall::create(
                &builder,
                registry.get_by_kind(kind).unwrap(),
                args,
                false,
                kind.as_ref(),
                &input_type,
            )
            .unwrap()
        };

        let plan = LogicalPlanBuilder::new()
            .scan("public", "emp")
            .aggregate(
                vec![1],
                vec![call(Kind::Sum, vec![2]), call(Kind::Count, vec![]), call(Kind::Max, vec![2])],
            )
            .build();
        assert_eq!(
            vec![
                vec![json!(10), json!(400), json!(2), json!(300)],
                vec![json!(20), json!(200), json!(1), json!(200)],
                vec![json!(null), json!(50), json!(1), json!(50)],
            ],
            interpreter.execute(&plan).unwrap()
        );

        let empty = LogicalPlanBuilder::new()
            .scan("public", "emp")
            .filter(builder.make_bool_literal(false))
            .aggregate(vec![], vec![call(Kind::Sum, vec![2]), call(Kind::Count, vec![])])
            .build();
        assert_eq!(
            vec![vec![json!(null), json!(0)]],
            interpreter.execute(&empty).unwrap()
        );
    }

    #[test]
    fn test_document_operators() {
        let builder = RexBuilder::default();
        let registry = builder.registry();
        let plan = LogicalPlanBuilder::new()
            .scan("shop", "orders")
            .document_filter(
                builder
                    .call(
                        QueryLanguage::Mongo,
                        "$gte",
                        vec![builder.make_name_ref("amount"), int_literal(7)],
                    )
                    .unwrap(),
            )
            .document_aggregate(
                Some(builder.make_name_ref("customer.id")),
                vec![LaxAggregateCall::new(
                    "total",
                    registry.get_by_kind(Kind::Sum).unwrap(),
                    Some(builder.make_name_ref("amount")),
                )],
            )
            .document_sort(vec![(builder.make_name_ref("_id"), Direction::Descending)], None, None)
            .build();

        let documents = Interpreter::new(store()).execute_documents(&plan).unwrap();
        assert_eq!(
            vec![json!({"_id": 2, "total": 7}), json!({"_id": 1, "total": 10})],
            documents
        );
    }

    #[test]
    fn test_document_unwind_and_project() {
        let builder = RexBuilder::default();
        let plan = LogicalPlanBuilder::new()
            .scan("shop", "orders")
            .document_unwind("tags")
            .document_project(
                vec![("tag".to_string(), builder.make_name_ref("tags"))],
                vec![],
            )
            .build();

        let documents = Interpreter::new(store()).execute_documents(&plan).unwrap();
        assert_eq!(vec![json!({"tag": "a"}), json!({"tag": "b"})], documents);
    }

    #[test]
    fn test_geo_query_not_executable() {
        let builder = RexBuilder::default();
        let null = builder.make_null_literal();
        let plan = LogicalPlanBuilder::new()
            .scan("shop", "orders")
            .document_filter(
                builder
                    .call(
                        QueryLanguage::Mongo,
                        "$near",
                        vec![
                            builder.make_literal(LiteralValue::String("loc".to_string())),
                            builder.make_literal(LiteralValue::List(vec![
                                LiteralValue::Double(0.0),
                                LiteralValue::Double(0.0),
                            ])),
                            null.clone(),
                            null,
                        ],
                    )
                    .unwrap(),
            )
            .build();

        let result = Interpreter::new(store()).execute(&plan);
        assert!(matches!(result, Err(BasaltError::Unsupported(_))));
    }

    #[test]
    fn test_input_ref_out_of_range() {
        let interpreter = Interpreter::new(store());
        let expr = RexBuilder::default().make_input_ref(3, int());
        match interpreter.eval(&expr, &[json!(1)]) {
            Err(BasaltError::Internal(e)) => {
                assert_eq!("$3 out of range of a 1 field row", e.to_string())
            }
            other => panic!("Unexpected result {:?}", other),
        }
    }
}
