use std::cmp::{max, min};

use enum_dispatch::enum_dispatch;
use itertools::Itertools;
use strum_macros::AsRefStr;

use crate::error::{BasaltError, BasaltResult};
use crate::types::{AlgDataType, Comparability, TypeFamily};

/// How sub-checkers of a [`CompositeOperandTypeChecker`] are combined.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, AsRefStr)]
pub enum Composition {
    And,
    Or,
    Sequence,
    Repeat,
}

/// Set of valid operand counts of an operator.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum OperandCountRange {
    /// Every count in `min..=max`, `max` of `None` means unbounded.
    Between { min: usize, max: Option<usize> },
    /// Counts valid for all (`And`) or any (`Or`) of the ranges, used when the result is not a
    /// single interval.
    Composite {
        composition: Composition,
        ranges: Vec<OperandCountRange>,
    },
}

impl OperandCountRange {
    pub fn of(count: usize) -> Self {
        OperandCountRange::Between {
            min: count,
            max: Some(count),
        }
    }

    pub fn between(min: usize, max: usize) -> Self {
        OperandCountRange::Between {
            min,
            max: Some(max),
        }
    }

    pub fn from(min: usize) -> Self {
        OperandCountRange::Between { min, max: None }
    }

    pub fn is_valid_count(&self, count: usize) -> bool {
        match self {
            OperandCountRange::Between { min, max } => {
                count >= *min && max.map(|m| count <= m).unwrap_or(true)
            }
            OperandCountRange::Composite {
                composition: Composition::Or,
                ranges,
            } => ranges.iter().any(|r| r.is_valid_count(count)),
            OperandCountRange::Composite { ranges, .. } => {
                ranges.iter().all(|r| r.is_valid_count(count))
            }
        }
    }

    pub fn min(&self) -> usize {
        match self {
            OperandCountRange::Between { min, .. } => *min,
            OperandCountRange::Composite {
                composition: Composition::Or,
                ranges,
            } => ranges.iter().map(|r| r.min()).min().unwrap_or(0),
            OperandCountRange::Composite { ranges, .. } => {
                ranges.iter().map(|r| r.min()).max().unwrap_or(0)
            }
        }
    }

    /// `None` when unbounded.
    pub fn max(&self) -> Option<usize> {
        match self {
            OperandCountRange::Between { max, .. } => *max,
            OperandCountRange::Composite {
                composition: Composition::Or,
                ranges,
            } => ranges
                .iter()
                .map(|r| r.max())
                .fold(Some(0), |acc, m| match (acc, m) {
                    (Some(a), Some(b)) => Some(max(a, b)),
                    _ => None,
                }),
            OperandCountRange::Composite { ranges, .. } => {
                ranges.iter().filter_map(|r| r.max()).min()
            }
        }
    }

    /// Counts valid for every range.
    pub fn and(ranges: Vec<OperandCountRange>) -> Self {
        if ranges.len() == 1 {
            return ranges.into_iter().next().unwrap_or(OperandCountRange::from(0));
        }
        if ranges
            .iter()
            .all(|r| matches!(r, OperandCountRange::Between { .. }))
        {
            let lower = ranges.iter().map(|r| r.min()).max().unwrap_or(0);
            let upper = ranges.iter().filter_map(|r| r.max()).min();
            if upper.map(|u| lower <= u).unwrap_or(true) {
                return OperandCountRange::Between {
                    min: lower,
                    max: upper,
                };
            }
        }
        OperandCountRange::Composite {
            composition: Composition::And,
            ranges,
        }
    }

    /// Counts valid for any range.
    pub fn or(ranges: Vec<OperandCountRange>) -> Self {
        if ranges.len() == 1 {
            return ranges.into_iter().next().unwrap_or(OperandCountRange::from(0));
        }
        if ranges
            .iter()
            .all(|r| matches!(r, OperandCountRange::Between { .. }))
        {
            let sorted = ranges.iter().sorted_by_key(|r| r.min()).collect::<Vec<_>>();
            let mut lower = sorted[0].min();
            let mut upper = sorted[0].max();
            let mut contiguous = true;
            for range in &sorted[1..] {
                match upper {
                    None => {}
                    Some(u) if range.min() <= u + 1 => {
                        upper = range.max().map(|m| max(m, u));
                    }
                    Some(_) => {
                        contiguous = false;
                        break;
                    }
                }
                lower = min(lower, range.min());
            }
            if contiguous {
                return OperandCountRange::Between {
                    min: lower,
                    max: upper,
                };
            }
        }
        OperandCountRange::Composite {
            composition: Composition::Or,
            ranges,
        }
    }
}

/// Operand types of a call being validated.
pub struct CallBinding<'a> {
    operator_name: &'a str,
    operand_types: &'a [AlgDataType],
}

impl<'a> CallBinding<'a> {
    pub fn new(operator_name: &'a str, operand_types: &'a [AlgDataType]) -> Self {
        Self {
            operator_name,
            operand_types,
        }
    }

    pub fn operator_name(&self) -> &str {
        self.operator_name
    }

    pub fn operand_count(&self) -> usize {
        self.operand_types.len()
    }

    pub fn operand_type(&self, idx: usize) -> &AlgDataType {
        &self.operand_types[idx]
    }

    pub fn validation_error<S: Into<String>>(&self, message: S, signature: String) -> BasaltError {
        BasaltError::Validation {
            operator: self.operator_name.to_string(),
            message: message.into(),
            signature,
        }
    }
}

/// Strategy validating operand types of a call.
#[enum_dispatch(OperandTypeChecker)]
pub trait OperandTypeCheck {
    /// Returns `Ok(false)` on mismatch, or a validation error if `throw_on_failure` is set.
    fn check_operand_types(
        &self,
        binding: &CallBinding,
        throw_on_failure: bool,
    ) -> BasaltResult<bool>;

    /// Checks actual operand `actual` against formal operand `formal` of this checker.
    fn check_single_operand(
        &self,
        binding: &CallBinding,
        actual: usize,
        formal: usize,
        throw_on_failure: bool,
    ) -> BasaltResult<bool>;

    fn operand_count_range(&self) -> OperandCountRange;

    /// Human readable signatures of operator `op_name`, used in diagnostics.
    fn allowed_signatures(&self, op_name: &str) -> String;

    fn is_optional(&self, _idx: usize) -> bool {
        false
    }
}

#[enum_dispatch]
#[derive(Debug, Clone)]
pub enum OperandTypeChecker {
    FamilyOperandTypeChecker,
    CompositeOperandTypeChecker,
    CountOperandTypeChecker,
    ComparableOperandTypeChecker,
    SameOperandTypeChecker,
}

/// Checks every operand against a type family, trailing operands may be optional.
#[derive(Debug, Clone)]
pub struct FamilyOperandTypeChecker {
    families: Vec<TypeFamily>,
    optional: Vec<usize>,
}

impl FamilyOperandTypeChecker {
    pub fn new<I: IntoIterator<Item = TypeFamily>>(families: I) -> Self {
        Self {
            families: families.into_iter().collect(),
            optional: vec![],
        }
    }

    /// Operands at `optional` may be omitted, as long as every operand after them is omitted
    /// as well.
    pub fn with_optional<I, O>(families: I, optional: O) -> BasaltResult<Self>
    where
        I: IntoIterator<Item = TypeFamily>,
        O: IntoIterator<Item = usize>,
    {
        let families = families.into_iter().collect::<Vec<_>>();
        let optional = optional.into_iter().sorted().dedup().collect::<Vec<_>>();
        if let Some(idx) = optional.iter().find(|idx| **idx >= families.len()) {
            return Err(BasaltError::Config(format!(
                "Optional operand {} out of range for {} families",
                idx,
                families.len()
            )));
        }
        Ok(Self { families, optional })
    }
}

impl OperandTypeCheck for FamilyOperandTypeChecker {
    fn check_operand_types(
        &self,
        binding: &CallBinding,
        throw_on_failure: bool,
    ) -> BasaltResult<bool> {
        let count = binding.operand_count();
        if !self.operand_count_range().is_valid_count(count) {
            if throw_on_failure {
                return Err(binding.validation_error(
                    format!("wrong number of arguments: {}", count),
                    self.allowed_signatures(binding.operator_name()),
                ));
            }
            return Ok(false);
        }

        for idx in 0..count {
            if !self.check_single_operand(binding, idx, idx, throw_on_failure)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn check_single_operand(
        &self,
        binding: &CallBinding,
        actual: usize,
        formal: usize,
        throw_on_failure: bool,
    ) -> BasaltResult<bool> {
        let family = match self.families.get(formal) {
            Some(family) => family,
            None => bail_internal!(
                "Formal operand {} out of range for {:?}",
                formal,
                self.families
            ),
        };
        let ty = binding.operand_type(actual);
        if family.contains(ty) {
            return Ok(true);
        }
        if throw_on_failure {
            return Err(binding.validation_error(
                format!(
                    "operand {} has type {} but expected {}",
                    actual,
                    ty,
                    family.as_ref()
                ),
                self.allowed_signatures(binding.operator_name()),
            ));
        }
        Ok(false)
    }

    fn operand_count_range(&self) -> OperandCountRange {
        let max = self.families.len();
        let mut min = max;
        while min > 0 && self.is_optional(min - 1) {
            min -= 1;
        }
        OperandCountRange::between(min, max)
    }

    fn allowed_signatures(&self, op_name: &str) -> String {
        format!(
            "{}({})",
            op_name,
            self.families
                .iter()
                .enumerate()
                .map(|(idx, family)| if self.is_optional(idx) {
                    format!("[<{}>]", family.as_ref())
                } else {
                    format!("<{}>", family.as_ref())
                })
                .join(", ")
        )
    }

    fn is_optional(&self, idx: usize) -> bool {
        self.optional.contains(&idx)
    }
}

/// Combines several checkers.
#[derive(Debug, Clone)]
pub struct CompositeOperandTypeChecker {
    composition: Composition,
    checkers: Vec<OperandTypeChecker>,
    /// Only used by [`Composition::Repeat`].
    range: Option<OperandCountRange>,
}

impl CompositeOperandTypeChecker {
    pub fn and(checkers: Vec<OperandTypeChecker>) -> Self {
        Self {
            composition: Composition::And,
            checkers,
            range: None,
        }
    }

    pub fn or(checkers: Vec<OperandTypeChecker>) -> Self {
        Self {
            composition: Composition::Or,
            checkers,
            range: None,
        }
    }

    /// Operand `i` is checked by checker `i`.
    pub fn sequence(checkers: Vec<OperandTypeChecker>) -> Self {
        Self {
            composition: Composition::Sequence,
            checkers,
            range: None,
        }
    }

    /// Every operand is checked by `checker`, operand count must lie in `range`.
    pub fn repeat(range: OperandCountRange, checker: OperandTypeChecker) -> Self {
        Self {
            composition: Composition::Repeat,
            checkers: vec![checker],
            range: Some(range),
        }
    }

    pub fn composition(&self) -> Composition {
        self.composition
    }

    fn count_error(&self, binding: &CallBinding) -> BasaltError {
        binding.validation_error(
            format!("wrong number of arguments: {}", binding.operand_count()),
            self.allowed_signatures(binding.operator_name()),
        )
    }
}

impl OperandTypeCheck for CompositeOperandTypeChecker {
    fn check_operand_types(
        &self,
        binding: &CallBinding,
        throw_on_failure: bool,
    ) -> BasaltResult<bool> {
        if !self.operand_count_range().is_valid_count(binding.operand_count()) {
            if throw_on_failure {
                return Err(self.count_error(binding));
            }
            return Ok(false);
        }

        match self.composition {
            Composition::And => {
                for checker in &self.checkers {
                    if !checker.check_operand_types(binding, throw_on_failure)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Composition::Or => {
                for checker in &self.checkers {
                    if checker.check_operand_types(binding, false)? {
                        return Ok(true);
                    }
                }
                if !throw_on_failure {
                    return Ok(false);
                }
                // Re-run every alternative in throwing mode to surface its diagnostic.
                for checker in &self.checkers {
                    checker.check_operand_types(binding, true)?;
                }
                Err(binding.validation_error(
                    "no alternative accepts the arguments",
                    self.allowed_signatures(binding.operator_name()),
                ))
            }
            Composition::Sequence => {
                for (idx, checker) in self.checkers.iter().enumerate() {
                    if !checker.check_single_operand(binding, idx, 0, throw_on_failure)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Composition::Repeat => {
                let checker = match self.checkers.first() {
                    Some(checker) => checker,
                    None => bail_internal!("Repeat checker without pattern"),
                };
                for idx in 0..binding.operand_count() {
                    if !checker.check_single_operand(binding, idx, 0, throw_on_failure)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    fn check_single_operand(
        &self,
        binding: &CallBinding,
        actual: usize,
        formal: usize,
        throw_on_failure: bool,
    ) -> BasaltResult<bool> {
        match self.composition {
            Composition::And => {
                for checker in &self.checkers {
                    if !checker.check_single_operand(binding, actual, formal, throw_on_failure)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Composition::Or => {
                for checker in &self.checkers {
                    if checker.check_single_operand(binding, actual, formal, false)? {
                        return Ok(true);
                    }
                }
                if throw_on_failure {
                    for checker in &self.checkers {
                        checker.check_single_operand(binding, actual, formal, true)?;
                    }
                }
                Ok(false)
            }
            _ => bail_internal!(
                "{} checker cannot check a single operand",
                self.composition.as_ref()
            ),
        }
    }

    fn operand_count_range(&self) -> OperandCountRange {
        match self.composition {
            Composition::And => OperandCountRange::and(
                self.checkers
                    .iter()
                    .map(|c| c.operand_count_range())
                    .collect(),
            ),
            Composition::Or => OperandCountRange::or(
                self.checkers
                    .iter()
                    .map(|c| c.operand_count_range())
                    .collect(),
            ),
            Composition::Sequence => OperandCountRange::of(self.checkers.len()),
            Composition::Repeat => self.range.clone().unwrap_or(OperandCountRange::from(0)),
        }
    }

    fn allowed_signatures(&self, op_name: &str) -> String {
        match self.composition {
            Composition::And | Composition::Or => self
                .checkers
                .iter()
                .map(|c| c.allowed_signatures(op_name))
                .unique()
                .join(" | "),
            Composition::Sequence => format!(
                "{}({})",
                op_name,
                self.checkers
                    .iter()
                    .map(|c| single_signature(c))
                    .join(", ")
            ),
            Composition::Repeat => format!(
                "{}({}, ...)",
                op_name,
                self.checkers
                    .first()
                    .map(single_signature)
                    .unwrap_or_default()
            ),
        }
    }
}

fn single_signature(checker: &OperandTypeChecker) -> String {
    match checker {
        OperandTypeChecker::FamilyOperandTypeChecker(family) => family
            .families
            .first()
            .map(|f| format!("<{}>", f.as_ref()))
            .unwrap_or_default(),
        OperandTypeChecker::ComparableOperandTypeChecker(c) => {
            format!("<{}_COMPARABLE>", c.comparability.as_ref().to_uppercase())
        }
        _ => "<ANY>".to_string(),
    }
}

/// Only validates operand count, any type is accepted.
#[derive(Debug, Clone)]
pub struct CountOperandTypeChecker {
    range: OperandCountRange,
}

impl CountOperandTypeChecker {
    pub fn new(range: OperandCountRange) -> Self {
        Self { range }
    }
}

impl OperandTypeCheck for CountOperandTypeChecker {
    fn check_operand_types(
        &self,
        binding: &CallBinding,
        throw_on_failure: bool,
    ) -> BasaltResult<bool> {
        if self.range.is_valid_count(binding.operand_count()) {
            Ok(true)
        } else if throw_on_failure {
            Err(binding.validation_error(
                format!("wrong number of arguments: {}", binding.operand_count()),
                self.allowed_signatures(binding.operator_name()),
            ))
        } else {
            Ok(false)
        }
    }

    fn check_single_operand(
        &self,
        _binding: &CallBinding,
        _actual: usize,
        _formal: usize,
        _throw_on_failure: bool,
    ) -> BasaltResult<bool> {
        Ok(true)
    }

    fn operand_count_range(&self) -> OperandCountRange {
        self.range.clone()
    }

    fn allowed_signatures(&self, op_name: &str) -> String {
        format!("{}(...)", op_name)
    }
}

/// Requires operands to be at least as comparable as `comparability`.
#[derive(Debug, Clone)]
pub struct ComparableOperandTypeChecker {
    count: usize,
    comparability: Comparability,
}

impl ComparableOperandTypeChecker {
    pub fn new(count: usize, comparability: Comparability) -> Self {
        Self {
            count,
            comparability,
        }
    }
}

impl OperandTypeCheck for ComparableOperandTypeChecker {
    fn check_operand_types(
        &self,
        binding: &CallBinding,
        throw_on_failure: bool,
    ) -> BasaltResult<bool> {
        if binding.operand_count() != self.count {
            if throw_on_failure {
                return Err(binding.validation_error(
                    format!("wrong number of arguments: {}", binding.operand_count()),
                    self.allowed_signatures(binding.operator_name()),
                ));
            }
            return Ok(false);
        }
        for idx in 0..binding.operand_count() {
            if !self.check_single_operand(binding, idx, idx, throw_on_failure)? {
                return Ok(false);
            }
        }

        let types = (0..binding.operand_count())
            .map(|idx| binding.operand_type(idx).clone())
            .collect::<Vec<_>>();
        let compatible = types.iter().tuple_windows().all(|(a, b)| {
            a.can_assign_from(b) || AlgDataType::least_restrictive(&[a.clone(), b.clone()]).is_some()
        });
        if !compatible && throw_on_failure {
            return Err(binding.validation_error(
                format!(
                    "operands of types {} are not comparable",
                    types.iter().map(|t| t.to_string()).join(", ")
                ),
                self.allowed_signatures(binding.operator_name()),
            ));
        }
        Ok(compatible)
    }

    fn check_single_operand(
        &self,
        binding: &CallBinding,
        actual: usize,
        _formal: usize,
        throw_on_failure: bool,
    ) -> BasaltResult<bool> {
        let ty = binding.operand_type(actual);
        if ty.poly_type() == crate::types::PolyType::Any
            || ty.comparability() >= self.comparability
        {
            return Ok(true);
        }
        if throw_on_failure {
            return Err(binding.validation_error(
                format!("operand {} of type {} is not comparable", actual, ty),
                self.allowed_signatures(binding.operator_name()),
            ));
        }
        Ok(false)
    }

    fn operand_count_range(&self) -> OperandCountRange {
        OperandCountRange::of(self.count)
    }

    fn allowed_signatures(&self, op_name: &str) -> String {
        let operand = format!("<{}_COMPARABLE>", self.comparability.as_ref().to_uppercase());
        format!(
            "{}({})",
            op_name,
            std::iter::repeat(operand).take(self.count).join(", ")
        )
    }
}

/// Requires all operands to be mutually assignable.
#[derive(Debug, Clone)]
pub struct SameOperandTypeChecker {
    count: Option<usize>,
}

impl SameOperandTypeChecker {
    pub fn new(count: Option<usize>) -> Self {
        Self { count }
    }
}

impl OperandTypeCheck for SameOperandTypeChecker {
    fn check_operand_types(
        &self,
        binding: &CallBinding,
        throw_on_failure: bool,
    ) -> BasaltResult<bool> {
        if !self.operand_count_range().is_valid_count(binding.operand_count()) {
            if throw_on_failure {
                return Err(binding.validation_error(
                    format!("wrong number of arguments: {}", binding.operand_count()),
                    self.allowed_signatures(binding.operator_name()),
                ));
            }
            return Ok(false);
        }
        for idx in 1..binding.operand_count() {
            let (first, other) = (binding.operand_type(0), binding.operand_type(idx));
            if !(first.can_assign_from(other) && other.can_assign_from(first)) {
                if throw_on_failure {
                    return Err(binding.validation_error(
                        format!("operand {} of type {} differs from {}", idx, other, first),
                        self.allowed_signatures(binding.operator_name()),
                    ));
                }
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn check_single_operand(
        &self,
        _binding: &CallBinding,
        _actual: usize,
        _formal: usize,
        _throw_on_failure: bool,
    ) -> BasaltResult<bool> {
        Ok(true)
    }

    fn operand_count_range(&self) -> OperandCountRange {
        match self.count {
            Some(count) => OperandCountRange::of(count),
            None => OperandCountRange::from(1),
        }
    }

    fn allowed_signatures(&self, op_name: &str) -> String {
        format!("{}(<EQUIVALENT_TYPE>, ...)", op_name)
    }
}
