//! Optimization rules.
//!
//! A rule defines equivalent transformation of query plan. There are three kinds of rules:
//!
//! 1. Rewrite rule. It produces a transformation which is assumed to be better than original
//! plan. For example, [`FilterMergeRule`] which merges adjacent filters, or the document lowering
//! rules such as [`DocumentFilterToCalcRule`] which express document operators relationally.
//! 2. Exploration rule. It produces equivalent alternative logical plan, which is used in the
//! exploration phase of optimizer. For example, [`CommutateJoinRule`] just swaps the inputs of
//! inner join.
//! 3. Implementation rule. It transforms logical operator to physical operator to provide
//! physical implementation. For example, [`EnumerableJoinRule`] transforms an equi join to hash
//! join.
//!
//! ## Pattern
//!
//! A patten defines what expression the rule should operate on. With pattern definition, the
//! rule can avoid manipulating plan directly. This has several advantages:
//!
//! 1. Decouple rule and concrete optimizer implementation. This way we can apply rule to both
//! heuristic optimizer and cascades optimizer.
//! 2. Decouple rule application and iteration. This significantly simplifies rule
//! implementation, since rule should only care about defining equivalent transformations.
//!
//! Let use the [`FilterMergeRule`] to illustrate, its pattern is defined as following:
//! ```no
//! static ref FILTER_MERGE_RULE_PATTERN: Pattern = {
//!     pattern(|op| matches!(op, Logical(LogicalFilter(_))))
//!         .leaf(|op| matches!(op, Logical(LogicalFilter(_))))
//!     .finish()
//! };
//! ```
//!
//! When [`FilterMergeRule`] is invoked by optimizer, its input/output is [`OptExpression`]
//! rather plan.
//! ```no
//! [GroupExprId(0, 0) Filter(a)]                          [Operator Filter(AND(a, b))]
//!              |                                                     |
//!              |                                                     |
//!              |                   FilterMergeRule                   |
//! [GroupExprId(1, 0) Filter(b)]        -------->                 [GroupId (2)]
//!              |
//!              |
//!              |
//!         [GroupId(2)]
//! ```
//!
//! Instead of manipulating plan directly, the optimizer generates [`OptExpression`] using rule's
//! pattern, and the rule generates equivalent transformation. Optimizer uses generated
//! transformation to manipulate internal plan representation, e.g. memo in cascades optimizer or
//! graph in heuristic optimizer.
//!
//! Conditions which can't be expressed structurally, e.g. "the filter condition is not a geo
//! query", are checked by [`Rule::matches`] after binding.
mod pattern;
pub use pattern::*;
mod opt_expr;
pub use opt_expr::*;
mod rule_set;
pub use rule_set::*;
mod implementation;
pub use implementation::*;
mod relational;
pub use relational::*;
mod document;
pub use document::*;

use std::fmt::{Debug, Formatter};

use enum_dispatch::enum_dispatch;
use enumset::EnumSetType;
use strum_macros::AsRefStr;

use crate::error::BasaltResult;
use crate::optimizer::Optimizer;

pub type OptExprVec<O> = Vec<OptExpression<O>>;

pub struct RuleResult<O: Optimizer> {
    exprs: OptExprVec<O>,
}

impl<O: Optimizer> Default for RuleResult<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Optimizer> RuleResult<O> {
    pub fn new() -> Self {
        Self { exprs: vec![] }
    }

    pub fn add(&mut self, new_expr: OptExpression<O>) {
        self.exprs.push(new_expr);
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn results(self) -> impl Iterator<Item = OptExpression<O>> {
        self.exprs.into_iter()
    }
}

/// A rule should only focus on providing equivalent transformations of optimizer expressions.
#[enum_dispatch(RuleImpl)]
pub trait Rule {
    /// Apply a rule to match sub plan.
    ///
    /// Returning [`crate::error::BasaltError::Unsupported`] makes the optimizer skip this
    /// application, other errors abort optimization.
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        ctx: &O,
        result: &mut RuleResult<O>,
    ) -> BasaltResult<()>;

    /// Checks a bound expression beyond its structure.
    fn matches<O: Optimizer>(&self, _input: &OptExpression<O>, _ctx: &O) -> BasaltResult<bool> {
        Ok(true)
    }

    /// Pattern for rule.
    fn pattern(&self) -> &Pattern;

    /// Use to identify each rule.
    ///
    /// This is used to avoid applying same rule repeatedly to same group expression.
    fn rule_id(&self) -> RuleId;

    /// Use to identify applying order of rules.
    fn rule_promise(&self) -> RulePromise;

    /// Unique name of the rule inside a [`RuleSet`].
    fn description(&self) -> String {
        format!("{:?}Rule", self.rule_id())
    }
}

#[enum_dispatch]
#[derive(Clone, AsRefStr)]
pub enum RuleImpl {
    // Document lowering rules
    DocumentGeoNearUnwrapRule,
    DocumentNearUnwrapRule,
    MergeDocumentFilterRule,
    DocumentFilterToCalcRule,
    DocumentProjectToCalcRule,
    DocumentAggregateToAggregateRule,
    DocumentSortToSortRule,

    // Rewrite rules
    FilterMergeRule,
    FilterProjectTransposeRule,
    FilterIntoJoinRule,
    ProjectMergeRule,
    ProjectRemoveRule,

    // Exploring rules
    CommutateJoinRule,
    JoinAssociateRule,

    // Implementation rules
    EnumerableScanRule,
    JdbcScanRule,
    EnumerableFilterRule,
    EnumerableProjectRule,
    EnumerableCalcRule,
    EnumerableAggregateRule,
    EnumerableSortRule,
    EnumerableJoinRule,
    EnumerableDocumentUnwindRule,
}

#[derive(EnumSetType, Debug)]
pub enum RuleId {
    // Document lowering rules
    DocumentGeoNearUnwrap,
    DocumentNearUnwrap,
    MergeDocumentFilter,
    DocumentFilterToCalc,
    DocumentProjectToCalc,
    DocumentAggregateToAggregate,
    DocumentSortToSort,

    // Rewrite rules
    FilterMerge,
    FilterProjectTranspose,
    FilterIntoJoin,
    ProjectMerge,
    ProjectRemove,

    // Exploring rules
    CommutateJoin,
    JoinAssociate,

    // Implementation rules
    EnumerableScan,
    JdbcScan,
    EnumerableFilter,
    EnumerableProject,
    EnumerableCalc,
    EnumerableAggregate,
    EnumerableSort,
    EnumerableJoin,
    EnumerableDocumentUnwind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RulePromise {
    LOW = 1,
    Medium = 2,
    High = 3,
}

impl Debug for RuleImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use crate::cascades::{CascadesOptimizer, GroupExprId, GroupId};
    use crate::operator::LogicalOperator::{LogicalFilter, LogicalScan};
    use crate::operator::Operator::Logical;
    use crate::operator::{Filter, Scan};
    use crate::rules::{
        CommutateJoinRule, DocumentFilterToCalcRule, OptExpression, Rule, RuleImpl,
    };
    use crate::test_utils::{int_literal, binary, typed_ref};
    use crate::rex::{Kind, RexBuilder};
    use crate::types::PolyType;

    #[test]
    fn test_opt_expr_format() {
        let condition = binary(
            &RexBuilder::default(),
            Kind::Equals,
            typed_ref(0, PolyType::Integer, false),
            int_literal(3),
        );
        let scan = OptExpression::<CascadesOptimizer>::from(Logical(LogicalScan(Scan::new(
            "public", "emp",
        ))));
        let opt_expr = OptExpression::<CascadesOptimizer>::with_operator(
            Logical(LogicalFilter(Filter::new(condition))),
            vec![scan],
        );

        assert_eq!(
            "OperatorNode: LogicalFilter { condition: =($0, 3) }\n\
             --OperatorNode: LogicalScan { namespace: \"public\", table: \"emp\" }\n",
            format!("{:?}", opt_expr)
        );

        let handle = OptExpression::<CascadesOptimizer>::with_expr_handle(
            GroupExprId::new(GroupId(10), 4),
            vec![OptExpression::with_group_handle(GroupId(3))],
        );
        assert_eq!(
            "ExprHandleNode: GroupExprId { group_id: GroupId(10), expr_id: 4 }\n\
             --GroupHandleNode: GroupId(3)\n",
            format!("{:?}", handle)
        );
    }

    #[test]
    fn test_rule_names() {
        let rule = RuleImpl::from(CommutateJoinRule::new());
        assert_eq!("CommutateJoinRule", format!("{:?}", rule));
        assert_eq!("CommutateJoinRule", rule.description());
        assert_eq!(
            "DocumentFilterToCalcRule",
            RuleImpl::from(DocumentFilterToCalcRule::new()).description()
        );
    }
}
