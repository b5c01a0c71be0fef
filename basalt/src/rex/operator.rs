use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use strum_macros::{AsRefStr, Display};

use crate::error::{BasaltError, BasaltResult, LookupKind};
use crate::types::{
    AlgDataType, ComparableOperandTypeChecker, Comparability, CompositeOperandTypeChecker,
    CountOperandTypeChecker, FamilyOperandTypeChecker, OperandCountRange, OperandTypeCheck,
    OperandTypeChecker, PolyType, ReturnTypeInference, SameOperandTypeChecker, TypeFamily,
};

/// Namespace operators are registered in.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, AsRefStr, Display)]
pub enum QueryLanguage {
    Sql,
    Mongo,
    Cypher,
}

/// Kind tag of an operator.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    And,
    Or,
    Not,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    IsNull,
    IsNotNull,
    Like,
    Plus,
    Minus,
    Times,
    Divide,
    Sum,
    Count,
    Avg,
    Min,
    Max,
    MqlQueryValue,
    MqlMerge,
    MqlAddFields,
    MqlExclude,
    MqlNotUnset,
    MqlEquals,
    MqlGt,
    MqlGte,
    MqlLt,
    MqlLte,
    MqlExists,
    MqlGeoNear,
    MqlNear,
    MqlGeoDistance,
    CypherHasLabel,
    CypherExtractProperty,
}

impl Kind {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Kind::Equals
                | Kind::NotEquals
                | Kind::LessThan
                | Kind::LessThanOrEqual
                | Kind::GreaterThan
                | Kind::GreaterThanOrEqual
        )
    }
}

/// How an operator is written.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Syntax {
    Function,
    Binary,
    Prefix,
    Postfix,
    Aggregate,
}

/// Immutable descriptor of a callable symbol.
pub struct RexOperator {
    name: String,
    kind: Kind,
    language: QueryLanguage,
    syntax: Syntax,
    checker: OperandTypeChecker,
    inference: ReturnTypeInference,
}

impl RexOperator {
    pub fn new<S: Into<String>>(
        name: S,
        kind: Kind,
        language: QueryLanguage,
        syntax: Syntax,
        checker: OperandTypeChecker,
        inference: ReturnTypeInference,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            language,
            syntax,
            checker,
            inference,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn language(&self) -> QueryLanguage {
        self.language
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    pub fn is_aggregate(&self) -> bool {
        self.syntax == Syntax::Aggregate
    }

    pub fn checker(&self) -> &OperandTypeChecker {
        &self.checker
    }

    pub fn operand_count_range(&self) -> OperandCountRange {
        self.checker.operand_count_range()
    }

    pub fn signature(&self) -> String {
        self.checker.allowed_signatures(&self.name)
    }

    pub fn infer_return_type(&self, operand_types: &[AlgDataType]) -> BasaltResult<AlgDataType> {
        self.inference.infer(operand_types)
    }
}

impl PartialEq for RexOperator {
    fn eq(&self, other: &Self) -> bool {
        self.language == other.language && self.name == other.name && self.kind == other.kind
    }
}

impl Eq for RexOperator {}

impl Hash for RexOperator {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.language.hash(state);
        self.name.hash(state);
        self.kind.hash(state);
    }
}

impl Debug for RexOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Operators keyed by `(language, name)`.
///
/// A registry is populated before planning starts and only read afterwards, see [`registry`].
#[derive(Default)]
pub struct OperatorRegistry {
    operators: HashMap<(QueryLanguage, String), Arc<RexOperator>>,
    by_kind: HashMap<Kind, Arc<RexOperator>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in operator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for operator in builtin_operators() {
            registry.insert(operator);
        }
        registry
    }

    /// Registers an operator, failing if `(language, name)` is taken.
    pub fn register(&mut self, operator: RexOperator) -> BasaltResult<Arc<RexOperator>> {
        let key = (operator.language, operator.name.clone());
        if self.operators.contains_key(&key) {
            return Err(BasaltError::Config(format!(
                "Operator {} already registered for {}",
                operator.name, operator.language
            )));
        }
        Ok(self.insert(operator))
    }

    fn insert(&mut self, operator: RexOperator) -> Arc<RexOperator> {
        let operator = Arc::new(operator);
        self.by_kind
            .entry(operator.kind)
            .or_insert_with(|| operator.clone());
        self.operators
            .insert((operator.language, operator.name.clone()), operator.clone());
        operator
    }

    pub fn get(&self, language: QueryLanguage, name: &str) -> BasaltResult<Arc<RexOperator>> {
        self.operators
            .get(&(language, name.to_string()))
            .cloned()
            .ok_or_else(|| BasaltError::unknown(LookupKind::Operator, format!("{}:{}", language, name)))
    }

    /// First registered operator of `kind`.
    pub fn get_by_kind(&self, kind: Kind) -> BasaltResult<Arc<RexOperator>> {
        self.by_kind
            .get(&kind)
            .cloned()
            .ok_or_else(|| BasaltError::unknown(LookupKind::Operator, kind.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<OperatorRegistry> = Arc::new(OperatorRegistry::with_builtins());
}

/// Process wide registry with built-in operators, never mutated after creation.
pub fn registry() -> Arc<OperatorRegistry> {
    GLOBAL_REGISTRY.clone()
}

fn families<I: IntoIterator<Item = TypeFamily>>(families: I) -> OperandTypeChecker {
    FamilyOperandTypeChecker::new(families).into()
}

fn count(range: OperandCountRange) -> OperandTypeChecker {
    CountOperandTypeChecker::new(range).into()
}

fn explicit(poly_type: PolyType, nullable: bool) -> ReturnTypeInference {
    ReturnTypeInference::Explicit(AlgDataType::new(poly_type, nullable))
}

fn builtin_operators() -> Vec<RexOperator> {
    use QueryLanguage::{Cypher, Mongo, Sql};
    use ReturnTypeInference::{
        Arg0, Arg0ForceNullable, BooleanNullable, Count as CountType, LeastRestrictive,
    };

    let boolean_repeat = || -> OperandTypeChecker {
        CompositeOperandTypeChecker::repeat(
            OperandCountRange::from(2),
            families(vec![TypeFamily::Boolean]),
        )
        .into()
    };
    let comparable = |c| -> OperandTypeChecker { ComparableOperandTypeChecker::new(2, c).into() };
    let numeric_pair = || families(vec![TypeFamily::Numeric, TypeFamily::Numeric]);

    vec![
        RexOperator::new("AND", Kind::And, Sql, Syntax::Binary, boolean_repeat(), BooleanNullable),
        RexOperator::new("OR", Kind::Or, Sql, Syntax::Binary, boolean_repeat(), BooleanNullable),
        RexOperator::new("NOT", Kind::Not, Sql, Syntax::Prefix, families(vec![TypeFamily::Boolean]), Arg0),
        RexOperator::new("=", Kind::Equals, Sql, Syntax::Binary, comparable(Comparability::Unordered), BooleanNullable),
        RexOperator::new("<>", Kind::NotEquals, Sql, Syntax::Binary, comparable(Comparability::Unordered), BooleanNullable),
        RexOperator::new("<", Kind::LessThan, Sql, Syntax::Binary, comparable(Comparability::All), BooleanNullable),
        RexOperator::new("<=", Kind::LessThanOrEqual, Sql, Syntax::Binary, comparable(Comparability::All), BooleanNullable),
        RexOperator::new(">", Kind::GreaterThan, Sql, Syntax::Binary, comparable(Comparability::All), BooleanNullable),
        RexOperator::new(">=", Kind::GreaterThanOrEqual, Sql, Syntax::Binary, comparable(Comparability::All), BooleanNullable),
        RexOperator::new("IS NULL", Kind::IsNull, Sql, Syntax::Postfix, count(OperandCountRange::of(1)), explicit(PolyType::Boolean, false)),
        RexOperator::new("IS NOT NULL", Kind::IsNotNull, Sql, Syntax::Postfix, count(OperandCountRange::of(1)), explicit(PolyType::Boolean, false)),
        RexOperator::new("LIKE", Kind::Like, Sql, Syntax::Binary, families(vec![TypeFamily::String, TypeFamily::String]), BooleanNullable),
        RexOperator::new("+", Kind::Plus, Sql, Syntax::Binary, numeric_pair(), LeastRestrictive),
        RexOperator::new("-", Kind::Minus, Sql, Syntax::Binary, numeric_pair(), LeastRestrictive),
        RexOperator::new("*", Kind::Times, Sql, Syntax::Binary, numeric_pair(), LeastRestrictive),
        RexOperator::new("/", Kind::Divide, Sql, Syntax::Binary, numeric_pair(), LeastRestrictive),
        RexOperator::new("SUM", Kind::Sum, Sql, Syntax::Aggregate, families(vec![TypeFamily::Numeric]), Arg0ForceNullable),
        RexOperator::new("COUNT", Kind::Count, Sql, Syntax::Aggregate, count(OperandCountRange::between(0, 1)), CountType),
        RexOperator::new("AVG", Kind::Avg, Sql, Syntax::Aggregate, families(vec![TypeFamily::Numeric]), explicit(PolyType::Double, true)),
        RexOperator::new("MIN", Kind::Min, Sql, Syntax::Aggregate, ComparableOperandTypeChecker::new(1, Comparability::All).into(), Arg0ForceNullable),
        RexOperator::new("MAX", Kind::Max, Sql, Syntax::Aggregate, ComparableOperandTypeChecker::new(1, Comparability::All).into(), Arg0ForceNullable),
        RexOperator::new("MQL_QUERY_VALUE", Kind::MqlQueryValue, Mongo, Syntax::Function, families(vec![TypeFamily::Document, TypeFamily::Array]), explicit(PolyType::Any, true)),
        RexOperator::new("MQL_MERGE", Kind::MqlMerge, Mongo, Syntax::Function, count(OperandCountRange::from(1)), explicit(PolyType::Document, false)),
        RexOperator::new("MQL_ADD_FIELDS", Kind::MqlAddFields, Mongo, Syntax::Function, count(OperandCountRange::from(2)), explicit(PolyType::Document, false)),
        RexOperator::new("MQL_EXCLUDE", Kind::MqlExclude, Mongo, Syntax::Function, families(vec![TypeFamily::Document, TypeFamily::Array]), explicit(PolyType::Document, false)),
        RexOperator::new("MQL_NOT_UNSET", Kind::MqlNotUnset, Mongo, Syntax::Function, count(OperandCountRange::of(1)), Arg0ForceNullable),
        RexOperator::new("$eq", Kind::MqlEquals, Mongo, Syntax::Binary, count(OperandCountRange::of(2)), explicit(PolyType::Boolean, false)),
        RexOperator::new("$gt", Kind::MqlGt, Mongo, Syntax::Binary, count(OperandCountRange::of(2)), explicit(PolyType::Boolean, false)),
        RexOperator::new("$gte", Kind::MqlGte, Mongo, Syntax::Binary, count(OperandCountRange::of(2)), explicit(PolyType::Boolean, false)),
        RexOperator::new("$lt", Kind::MqlLt, Mongo, Syntax::Binary, count(OperandCountRange::of(2)), explicit(PolyType::Boolean, false)),
        RexOperator::new("$lte", Kind::MqlLte, Mongo, Syntax::Binary, count(OperandCountRange::of(2)), explicit(PolyType::Boolean, false)),
        RexOperator::new("$exists", Kind::MqlExists, Mongo, Syntax::Function, families(vec![TypeFamily::Document, TypeFamily::Array]), explicit(PolyType::Boolean, false)),
        RexOperator::new("$geoNear", Kind::MqlGeoNear, Mongo, Syntax::Function, count(OperandCountRange::of(8)), explicit(PolyType::Boolean, false)),
        RexOperator::new("$near", Kind::MqlNear, Mongo, Syntax::Function, count(OperandCountRange::of(4)), explicit(PolyType::Boolean, false)),
        RexOperator::new("MQL_GEO_DISTANCE", Kind::MqlGeoDistance, Mongo, Syntax::Function, SameOperandTypeChecker::new(Some(2)).into(), explicit(PolyType::Double, true)),
        RexOperator::new("CYPHER_HAS_LABEL", Kind::CypherHasLabel, Cypher, Syntax::Function, families(vec![TypeFamily::Any, TypeFamily::Character]), explicit(PolyType::Boolean, false)),
        RexOperator::new("CYPHER_EXTRACT_PROPERTY", Kind::CypherExtractProperty, Cypher, Syntax::Function, families(vec![TypeFamily::Any, TypeFamily::Character]), explicit(PolyType::Any, true)),
    ]
}
