use crate::error::{BasaltError, BasaltResult};
use crate::operator::LogicalOperator::{LogicalDocumentFilter, LogicalDocumentProject, LogicalDocumentSort};
use crate::operator::Operator::Logical;
use crate::operator::{DocumentFilter, DocumentProject, DocumentSort};
use crate::optimizer::Optimizer;
use crate::properties::Direction;
use crate::rules::document::lowering::contains_geo_query;
use crate::rex::{Kind, LiteralValue, QueryLanguage, RexBuilder, RexCall, RexNode};
use crate::rules::RulePromise::High;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};

/// Distance bound meaning "no bound".
pub const UNBOUNDED_DISTANCE: f64 = -1.0;

/// Field holding the computed distance of a `$near` query, removed after sorting. Reserved in
/// documents queried with `$near`.
const NEAR_DISTANCE_FIELD: &str = "__near_distance";

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref DOCUMENT_GEO_NEAR_UNWRAP_RULE_PATTERN: Pattern =
        Pattern::new_leaf(|op| matches!(op, Logical(LogicalDocumentFilter(_))));
    static ref DOCUMENT_NEAR_UNWRAP_RULE_PATTERN: Pattern =
        Pattern::new_leaf(|op| matches!(op, Logical(LogicalDocumentFilter(_))));
}

/// The geo call of a filter condition and the conjuncts filtering next to it.
///
/// The call either is the whole condition or one operand of its top level AND. Conditions with
/// several geo queries are not unwrapped.
fn geo_call<O: Optimizer>(
    input: &OptExpression<O>,
    ctx: &O,
    kind: Kind,
) -> BasaltResult<Option<(RexCall, Vec<RexNode>)>> {
    let condition = match input.get_operator(ctx)? {
        Logical(LogicalDocumentFilter(filter)) => filter.condition().clone(),
        _ => return Ok(None),
    };
    let (mut geo, rest): (Vec<_>, Vec<_>) = condition
        .conjunctions()
        .into_iter()
        .partition(|conjunct| conjunct.call_kind() == Some(kind));
    if geo.len() != 1 || rest.iter().any(contains_geo_query) {
        return Ok(None);
    }
    match geo.pop() {
        Some(RexNode::Call(call)) => Ok(Some((call, rest))),
        _ => Ok(None),
    }
}

/// Filters `input` on the conjunction of `conditions`, if any.
fn pre_filter<O: Optimizer>(
    builder: &RexBuilder,
    conditions: Vec<RexNode>,
    input: OptExpression<O>,
) -> BasaltResult<OptExpression<O>> {
    if conditions.is_empty() {
        return Ok(input);
    }
    Ok(OptExpression::with_operator(
        Logical(LogicalDocumentFilter(DocumentFilter::new(builder.and(conditions)?))),
        vec![input],
    ))
}

fn literal_value<'a>(call: &'a RexCall, idx: usize, operand: &str) -> BasaltResult<&'a LiteralValue> {
    match call.operands().get(idx) {
        Some(RexNode::Literal(literal)) => Ok(literal.value()),
        Some(other) => bail_internal!(
            "{} operand {} must be a literal, got {}",
            call.operator().name(),
            operand,
            other
        ),
        None => bail_internal!("{} has no operand {}", call.operator().name(), operand),
    }
}

fn distance_operand(call: &RexCall, idx: usize, operand: &str) -> BasaltResult<f64> {
    match literal_value(call, idx, operand)? {
        LiteralValue::Null => Ok(UNBOUNDED_DISTANCE),
        value => value.as_f64().ok_or_else(|| {
            internal_err!(
                "{} operand {} must be numeric, got {}",
                call.operator().name(),
                operand,
                value
            )
        }),
    }
}

/// Path operand which may be omitted with a null literal.
fn optional_path(call: &RexCall, idx: usize, operand: &str) -> BasaltResult<Option<String>> {
    match literal_value(call, idx, operand)? {
        LiteralValue::Null => Ok(None),
        LiteralValue::String(path) => Ok(Some(path.clone())),
        value => bail_internal!(
            "{} operand {} must be a path, got {}",
            call.operator().name(),
            operand,
            value
        ),
    }
}

fn check_operand_count(call: &RexCall, expected: usize) -> BasaltResult<()> {
    if call.operands().len() != expected {
        bail_internal!(
            "{} expects {} operands, got {}",
            call.operator().name(),
            expected,
            call.operands().len()
        );
    }
    Ok(())
}

/// Operators computing, bounding and ordering by the distance to a point.
struct DistanceStages {
    distance_field: String,
    distance: RexNode,
    extra_fields: Vec<(String, RexNode)>,
    min_distance: f64,
    max_distance: f64,
}

impl DistanceStages {
    /// Chains `[project, bound filter, sort]` on top of `input`.
    fn build<O: Optimizer>(
        self,
        builder: &RexBuilder,
        input: OptExpression<O>,
    ) -> BasaltResult<OptExpression<O>> {
        let mut includes = vec![(self.distance_field.clone(), self.distance)];
        includes.extend(self.extra_fields);
        let mut ret = OptExpression::with_operator(
            Logical(LogicalDocumentProject(DocumentProject::extend(includes, vec![]))),
            vec![input],
        );

        let mut bounds = vec![];
        if self.min_distance != UNBOUNDED_DISTANCE {
            bounds.push(builder.call(
                QueryLanguage::Mongo,
                "$gte",
                vec![
                    builder.make_name_ref(&self.distance_field),
                    builder.make_literal(LiteralValue::Double(self.min_distance)),
                ],
            )?);
        }
        if self.max_distance != UNBOUNDED_DISTANCE {
            bounds.push(builder.call(
                QueryLanguage::Mongo,
                "$lte",
                vec![
                    builder.make_name_ref(&self.distance_field),
                    builder.make_literal(LiteralValue::Double(self.max_distance)),
                ],
            )?);
        }
        if !bounds.is_empty() {
            ret = OptExpression::with_operator(
                Logical(LogicalDocumentFilter(DocumentFilter::new(builder.and(bounds)?))),
                vec![ret],
            );
        }

        Ok(OptExpression::with_operator(
            Logical(LogicalDocumentSort(DocumentSort::new(
                vec![(builder.make_name_ref(&self.distance_field), Direction::Ascending)],
                None,
                None,
            ))),
            vec![ret],
        ))
    }
}

fn geo_distance(builder: &RexBuilder, key: &str, near: RexNode) -> BasaltResult<RexNode> {
    builder.call(
        QueryLanguage::Mongo,
        "MQL_GEO_DISTANCE",
        vec![builder.make_name_ref(key), near],
    )
}

/// Unwraps a `$geoNear` filter into
///
/// 1. a filter on its query and the other conjuncts of the condition, unless both are empty,
/// 2. a projection adding the distance field and the optional location field,
/// 3. a filter on the distance bounds which are not [`UNBOUNDED_DISTANCE`],
/// 4. an ascending sort on the distance field.
///
/// Operands are `near, distance_field, distance_multiplier, include_locs, key, max_distance,
/// min_distance, query`. The `key` is required since there's no index to infer it from.
#[derive(Clone, Default)]
pub struct DocumentGeoNearUnwrapRule {}

impl DocumentGeoNearUnwrapRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for DocumentGeoNearUnwrapRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        let (call, rest) = match geo_call(&input, ctx, Kind::MqlGeoNear)? {
            Some(found) => found,
            None => bail_internal!("Pattern miss matched"),
        };
        check_operand_count(&call, 8)?;
        let builder = ctx.context().rex_builder();

        let near = call.operands()[0].clone();
        let distance_field = optional_path(&call, 1, "distance_field")?.ok_or_else(|| {
            BasaltError::Config("$geoNear requires a distance field".to_string())
        })?;
        let multiplier = match literal_value(&call, 2, "distance_multiplier")? {
            LiteralValue::Null => 1.0,
            value => value
                .as_f64()
                .ok_or_else(|| internal_err!("$geoNear multiplier must be numeric, got {}", value))?,
        };
        let include_locs = optional_path(&call, 3, "include_locs")?;
        let key = optional_path(&call, 4, "key")?.ok_or_else(|| {
            BasaltError::Config("$geoNear requires a key when executed without an index".to_string())
        })?;
        let max_distance = distance_operand(&call, 5, "max_distance")?;
        let min_distance = distance_operand(&call, 6, "min_distance")?;
        let query = &call.operands()[7];

        let mut distance = geo_distance(&builder, &key, near)?;
        if multiplier != 1.0 {
            distance = builder.make_call_kind(
                Kind::Times,
                vec![distance, builder.make_literal(LiteralValue::Double(multiplier))],
            )?;
        }

        let mut conditions = match query {
            RexNode::Literal(literal) if matches!(literal.value(), LiteralValue::Null) => vec![],
            query => query.conjunctions(),
        };
        conditions.extend(rest);
        let ret = pre_filter(&builder, conditions, input[0].clone())?;

        let stages = DistanceStages {
            distance_field,
            distance,
            extra_fields: include_locs
                .into_iter()
                .map(|field| (field, builder.make_name_ref(&key)))
                .collect(),
            min_distance,
            max_distance,
        };
        result.add(stages.build(&builder, ret)?);
        Ok(())
    }

    fn matches<O: Optimizer>(&self, input: &OptExpression<O>, ctx: &O) -> BasaltResult<bool> {
        Ok(geo_call(input, ctx, Kind::MqlGeoNear)?.is_some())
    }

    fn pattern(&self) -> &Pattern {
        &DOCUMENT_GEO_NEAR_UNWRAP_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::DocumentGeoNearUnwrap
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }
}

/// Unwraps a `$near` filter like [`DocumentGeoNearUnwrapRule`], keeping the distance in a
/// hidden field which is removed again after sorting.
///
/// The hidden field name `__near_distance` is reserved, a document field of that name is
/// overwritten and does not appear in the output.
///
/// Operands are `key, near, max_distance, min_distance`.
#[derive(Clone, Default)]
pub struct DocumentNearUnwrapRule {}

impl DocumentNearUnwrapRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for DocumentNearUnwrapRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()> {
        let (call, rest) = match geo_call(&input, ctx, Kind::MqlNear)? {
            Some(found) => found,
            None => bail_internal!("Pattern miss matched"),
        };
        check_operand_count(&call, 4)?;
        let builder = ctx.context().rex_builder();

        let key = optional_path(&call, 0, "key")?.ok_or_else(|| {
            BasaltError::Config("$near requires a key when executed without an index".to_string())
        })?;
        let near = call.operands()[1].clone();
        let max_distance = distance_operand(&call, 2, "max_distance")?;
        let min_distance = distance_operand(&call, 3, "min_distance")?;

        let stages = DistanceStages {
            distance_field: NEAR_DISTANCE_FIELD.to_string(),
            distance: geo_distance(&builder, &key, near)?,
            extra_fields: vec![],
            min_distance,
            max_distance,
        };
        let sorted = stages.build(&builder, pre_filter(&builder, rest, input[0].clone())?)?;
        result.add(OptExpression::with_operator(
            Logical(LogicalDocumentProject(DocumentProject::extend(
                vec![],
                vec![NEAR_DISTANCE_FIELD.to_string()],
            ))),
            vec![sorted],
        ));
        Ok(())
    }

    fn matches<O: Optimizer>(&self, input: &OptExpression<O>, ctx: &O) -> BasaltResult<bool> {
        Ok(geo_call(input, ctx, Kind::MqlNear)?.is_some())
    }

    fn pattern(&self) -> &Pattern {
        &DOCUMENT_NEAR_UNWRAP_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::DocumentNearUnwrap
    }

    fn rule_promise(&self) -> RulePromise {
        High
    }
}
