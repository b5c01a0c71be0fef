//! Type system of values flowing through a plan.
//!
//! Every field of a row, every operand of a call and every call result is described by an
//! [`AlgDataType`]. Operators validate their operands with checkers from [`checker`] and compute
//! result types with [`ReturnTypeInference`].
mod checker;
pub use checker::*;
mod inference;
pub use inference::*;

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use strum_macros::{AsRefStr, EnumString};

use crate::error::{BasaltError, BasaltResult};

/// Closed set of type kinds.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PolyType {
    Boolean,
    Tinyint,
    Smallint,
    Integer,
    Bigint,
    Decimal,
    Real,
    Double,
    Char,
    Varchar,
    Binary,
    Date,
    Time,
    Timestamp,
    IntervalYearMonth,
    IntervalDayTime,
    Array,
    Multiset,
    Map,
    Document,
    Geometry,
    Any,
    Null,
    Row,
}

/// Groups of types accepted by operand checkers.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeFamily {
    Numeric,
    Integer,
    ExactNumeric,
    ApproximateNumeric,
    Character,
    String,
    Binary,
    Boolean,
    Datetime,
    Interval,
    Array,
    Multiset,
    Map,
    Document,
    Geo,
    Any,
    Null,
}

impl PolyType {
    pub fn families(&self) -> &'static [TypeFamily] {
        use TypeFamily as F;
        match self {
            PolyType::Boolean => &[F::Boolean],
            PolyType::Tinyint | PolyType::Smallint | PolyType::Integer | PolyType::Bigint => {
                &[F::Numeric, F::Integer, F::ExactNumeric]
            }
            PolyType::Decimal => &[F::Numeric, F::ExactNumeric],
            PolyType::Real | PolyType::Double => &[F::Numeric, F::ApproximateNumeric],
            PolyType::Char | PolyType::Varchar => &[F::Character, F::String],
            PolyType::Binary => &[F::Binary, F::String],
            PolyType::Date | PolyType::Time | PolyType::Timestamp => &[F::Datetime],
            PolyType::IntervalYearMonth | PolyType::IntervalDayTime => &[F::Interval],
            PolyType::Array => &[F::Array],
            PolyType::Multiset => &[F::Multiset],
            PolyType::Map => &[F::Map],
            PolyType::Document => &[F::Document],
            PolyType::Geometry => &[F::Geo],
            PolyType::Any => &[F::Any],
            PolyType::Null => &[F::Null],
            PolyType::Row => &[],
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.families().contains(&TypeFamily::Numeric)
    }

    pub fn is_character(&self) -> bool {
        self.families().contains(&TypeFamily::Character)
    }

    /// Rank used to widen numeric types, higher wins.
    fn numeric_rank(&self) -> Option<u8> {
        match self {
            PolyType::Tinyint => Some(1),
            PolyType::Smallint => Some(2),
            PolyType::Integer => Some(3),
            PolyType::Bigint => Some(4),
            PolyType::Decimal => Some(5),
            PolyType::Real => Some(6),
            PolyType::Double => Some(7),
            _ => None,
        }
    }
}

impl TypeFamily {
    /// Whether a value of `ty` belongs to this family.
    ///
    /// Values of type ANY are only known at runtime, e.g. a value extracted from a document, so
    /// they are accepted by every family.
    pub fn contains(&self, ty: &AlgDataType) -> bool {
        match (self, ty.poly_type()) {
            (TypeFamily::Any, _) | (_, PolyType::Any) => true,
            (TypeFamily::Null, PolyType::Null) => true,
            (_, PolyType::Null) => ty.is_nullable(),
            (family, poly_type) => poly_type.families().contains(family),
        }
    }
}

/// How values of a type can be compared.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, AsRefStr)]
pub enum Comparability {
    None,
    Unordered,
    All,
}

/// One field of a row type.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct AlgDataTypeField {
    name: String,
    index: usize,
    ty: AlgDataType,
}

impl AlgDataTypeField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn data_type(&self) -> &AlgDataType {
        &self.ty
    }
}

/// Shape of a value: its kind, nullability and, for structured kinds, its components.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct AlgDataType {
    poly_type: PolyType,
    nullable: bool,
    /// Element type of ARRAY/MULTISET, value type of MAP.
    component: Option<Arc<AlgDataType>>,
    /// Fields of ROW, empty otherwise.
    fields: Arc<Vec<AlgDataTypeField>>,
}

impl AlgDataType {
    pub fn new(poly_type: PolyType, nullable: bool) -> Self {
        Self {
            poly_type,
            nullable,
            component: None,
            fields: Arc::new(vec![]),
        }
    }

    pub fn not_null(poly_type: PolyType) -> Self {
        Self::new(poly_type, false)
    }

    pub fn nullable(poly_type: PolyType) -> Self {
        Self::new(poly_type, true)
    }

    pub fn array(component: AlgDataType, nullable: bool) -> Self {
        Self {
            poly_type: PolyType::Array,
            nullable,
            component: Some(Arc::new(component)),
            fields: Arc::new(vec![]),
        }
    }

    pub fn map(value: AlgDataType, nullable: bool) -> Self {
        Self {
            poly_type: PolyType::Map,
            nullable,
            component: Some(Arc::new(value)),
            fields: Arc::new(vec![]),
        }
    }

    /// Single column row used by every document operator.
    pub fn document_row() -> Self {
        RecordTypeBuilder::new()
            .add("d", AlgDataType::not_null(PolyType::Document))
            .build_unchecked()
    }

    pub fn poly_type(&self) -> PolyType {
        self.poly_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn with_nullable(&self, nullable: bool) -> Self {
        let mut ty = self.clone();
        ty.nullable = nullable;
        ty
    }

    pub fn component(&self) -> Option<&AlgDataType> {
        self.component.as_deref()
    }

    pub fn is_struct(&self) -> bool {
        self.poly_type == PolyType::Row
    }

    pub fn fields(&self) -> &[AlgDataTypeField] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, name: &str) -> Option<&AlgDataTypeField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn comparability(&self) -> Comparability {
        match self.poly_type {
            PolyType::Map | PolyType::Geometry | PolyType::Binary => Comparability::None,
            PolyType::Document | PolyType::Array | PolyType::Multiset => Comparability::Unordered,
            PolyType::Row => self
                .fields
                .iter()
                .map(|f| f.ty.comparability())
                .min()
                .unwrap_or(Comparability::All),
            _ => Comparability::All,
        }
    }

    /// Whether a value of `source` may be stored where `self` is expected.
    pub fn can_assign_from(&self, source: &AlgDataType) -> bool {
        let (target, from) = (self.poly_type, source.poly_type);
        if target == PolyType::Any || from == PolyType::Any || from == PolyType::Null {
            return true;
        }
        if target.is_numeric() && from.is_numeric() {
            return true;
        }
        if target.is_character() && from.is_character() {
            return true;
        }
        if target == PolyType::Row {
            return from == PolyType::Row
                && self.field_count() == source.field_count()
                && self
                    .fields
                    .iter()
                    .zip(source.fields.iter())
                    .all(|(t, s)| t.ty.can_assign_from(&s.ty));
        }
        target == from
    }

    /// Smallest type every input can be widened to, nullable if any input is nullable.
    pub fn least_restrictive(types: &[AlgDataType]) -> Option<AlgDataType> {
        let first = types.first()?;
        let nullable = types.iter().any(|t| t.nullable);
        let mut result = first.poly_type;
        for ty in &types[1..] {
            result = match (result, ty.poly_type) {
                (a, b) if a == b => a,
                (PolyType::Any, _) | (_, PolyType::Any) => PolyType::Any,
                (PolyType::Null, b) => b,
                (a, PolyType::Null) => a,
                (a, b) => match (a.numeric_rank(), b.numeric_rank()) {
                    (Some(ra), Some(rb)) => {
                        if ra >= rb {
                            a
                        } else {
                            b
                        }
                    }
                    _ if a.is_character() && b.is_character() => PolyType::Varchar,
                    _ => return None,
                },
            };
        }
        Some(AlgDataType::new(result, nullable))
    }

    /// Type with all fields of `self` followed by all fields of `other`, names are made unique.
    pub fn join(&self, other: &AlgDataType) -> AlgDataType {
        let mut builder = RecordTypeBuilder::new();
        for field in self.fields.iter().chain(other.fields.iter()) {
            builder = builder.add_unique(field.name(), field.data_type().clone());
        }
        builder.build_unchecked()
    }
}

impl Display for AlgDataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.poly_type {
            PolyType::Row => write!(
                f,
                "RecordType({})",
                self.fields
                    .iter()
                    .map(|field| format!("{} {}", field.ty, field.name))
                    .join(", ")
            )?,
            PolyType::Array | PolyType::Multiset | PolyType::Map => match &self.component {
                Some(component) => write!(f, "{} {}", component, self.poly_type.as_ref())?,
                None => write!(f, "{}", self.poly_type.as_ref())?,
            },
            _ => write!(f, "{}", self.poly_type.as_ref())?,
        }
        if !self.nullable && self.poly_type != PolyType::Row {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

/// Builds row types, keeping field indices contiguous.
#[derive(Default)]
pub struct RecordTypeBuilder {
    fields: Vec<(String, AlgDataType)>,
}

impl RecordTypeBuilder {
    pub fn new() -> Self {
        Self { fields: vec![] }
    }

    pub fn add<S: Into<String>>(mut self, name: S, ty: AlgDataType) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    /// Adds a field, renaming it with a numeric suffix if the name is already taken.
    pub fn add_unique<S: Into<String>>(mut self, name: S, ty: AlgDataType) -> Self {
        let base = name.into();
        let mut name = base.clone();
        let mut suffix = 0;
        while self.fields.iter().any(|(n, _)| n == &name) {
            name = format!("{}{}", base, suffix);
            suffix += 1;
        }
        self.fields.push((name, ty));
        self
    }

    pub fn build(self) -> BasaltResult<AlgDataType> {
        if let Some(duplicate) = self.fields.iter().map(|(n, _)| n).duplicates().next() {
            return Err(BasaltError::Validation {
                operator: "ROW".to_string(),
                message: format!("duplicate field name '{}'", duplicate),
                signature: "ROW(<name> <type>, ...)".to_string(),
            });
        }
        Ok(self.build_unchecked())
    }

    fn build_unchecked(self) -> AlgDataType {
        let fields = self
            .fields
            .into_iter()
            .enumerate()
            .map(|(index, (name, ty))| AlgDataTypeField { name, index, ty })
            .collect();
        AlgDataType {
            poly_type: PolyType::Row,
            nullable: false,
            component: None,
            fields: Arc::new(fields),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{AlgDataType, Comparability, PolyType, RecordTypeBuilder, TypeFamily};

    #[test]
    fn test_record_type_indices() {
        let row = RecordTypeBuilder::new()
            .add("id", AlgDataType::not_null(PolyType::Integer))
            .add("name", AlgDataType::nullable(PolyType::Varchar))
            .build()
            .unwrap();

        assert_eq!(2, row.field_count());
        assert_eq!(1, row.field("name").unwrap().index());
        assert_eq!(
            "RecordType(INTEGER NOT NULL id, VARCHAR name)",
            row.to_string()
        );
    }

    #[test]
    fn test_record_type_duplicate_name() {
        let result = RecordTypeBuilder::new()
            .add("id", AlgDataType::not_null(PolyType::Integer))
            .add("id", AlgDataType::not_null(PolyType::Varchar))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_join_renames_duplicates() {
        let left = RecordTypeBuilder::new()
            .add("id", AlgDataType::not_null(PolyType::Integer))
            .build()
            .unwrap();
        let joined = left.join(&left);
        assert_eq!(vec!["id", "id0"], joined.field_names());
        assert_eq!(1, joined.fields()[1].index());
    }

    #[test]
    fn test_comparability() {
        assert_eq!(
            Comparability::All,
            AlgDataType::not_null(PolyType::Integer).comparability()
        );
        assert_eq!(
            Comparability::Unordered,
            AlgDataType::not_null(PolyType::Document).comparability()
        );
        assert!(Comparability::None < Comparability::Unordered);
        assert_eq!(
            Comparability::Unordered,
            AlgDataType::document_row().comparability()
        );
    }

    #[test]
    fn test_family_membership() {
        let int = AlgDataType::not_null(PolyType::Integer);
        assert!(TypeFamily::Numeric.contains(&int));
        assert!(TypeFamily::Integer.contains(&int));
        assert!(!TypeFamily::String.contains(&int));
        assert!(TypeFamily::String.contains(&AlgDataType::nullable(PolyType::Any)));
    }

    #[test]
    fn test_least_restrictive() {
        let ty = AlgDataType::least_restrictive(&[
            AlgDataType::not_null(PolyType::Integer),
            AlgDataType::nullable(PolyType::Double),
        ])
        .unwrap();
        assert_eq!(AlgDataType::nullable(PolyType::Double), ty);
        assert!(AlgDataType::least_restrictive(&[
            AlgDataType::not_null(PolyType::Integer),
            AlgDataType::not_null(PolyType::Boolean),
        ])
        .is_none());
    }
}
