//! Operators of the document model.
//!
//! Each row holds a single document, fields are addressed by dotted paths written as
//! [`crate::rex::RexNameRef`]s. All of them produce the document row type.
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use itertools::Itertools;

use crate::error::BasaltResult;
use crate::operator::{input_prop, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::{DataModel, Direction, LogicalProperty};
use crate::rex::{RexNode, RexOperator};
use crate::types::AlgDataType;

fn document_prop(operator: &str, inputs: &[&LogicalProperty]) -> BasaltResult<LogicalProperty> {
    let input = input_prop(operator, inputs, 1, 0)?;
    Ok(LogicalProperty::new(
        AlgDataType::document_row(),
        DataModel::Document,
        input.relation_count(),
    ))
}

/// Keeps documents matching `condition`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct DocumentFilter {
    condition: RexNode,
}

impl DocumentFilter {
    pub fn new(condition: RexNode) -> Self {
        Self { condition }
    }

    pub fn condition(&self) -> &RexNode {
        &self.condition
    }
}

impl OperatorTrait for DocumentFilter {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        document_prop("DocumentFilter", inputs)
    }
}

impl DisplayFields for DocumentFilter {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("")
            .field("condition", &self.condition)
            .finish()
    }
}

/// Reshapes documents.
///
/// A replacing projection builds new documents from `includes` only, an extending one adds
/// `includes` to the input document. `excludes` paths are removed afterwards.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct DocumentProject {
    includes: Vec<(String, RexNode)>,
    excludes: Vec<String>,
    extend: bool,
}

impl DocumentProject {
    pub fn new(includes: Vec<(String, RexNode)>, excludes: Vec<String>) -> Self {
        Self {
            includes,
            excludes,
            extend: false,
        }
    }

    pub fn extend(includes: Vec<(String, RexNode)>, excludes: Vec<String>) -> Self {
        Self {
            includes,
            excludes,
            extend: true,
        }
    }

    pub fn includes(&self) -> &[(String, RexNode)] {
        &self.includes
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    pub fn is_extend(&self) -> bool {
        self.extend
    }
}

impl OperatorTrait for DocumentProject {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        document_prop("DocumentProject", inputs)
    }
}

struct NamedExprs<'a>(&'a [(String, RexNode)]);

impl<'a> Debug for NamedExprs<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}]",
            self.0
                .iter()
                .map(|(name, expr)| format!("{}: {}", name, expr))
                .join(", ")
        )
    }
}

impl DisplayFields for DocumentProject {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("includes", &NamedExprs(&self.includes));
        if !self.excludes.is_empty() {
            s.field("excludes", &self.excludes);
        }
        if self.extend {
            s.field("extend", &self.extend);
        }
        s.finish()
    }
}

/// Aggregate call over a document path, `input` is absent for a plain count.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct LaxAggregateCall {
    name: String,
    operator: Arc<RexOperator>,
    input: Option<RexNode>,
}

impl LaxAggregateCall {
    pub fn new<S: Into<String>>(name: S, operator: Arc<RexOperator>, input: Option<RexNode>) -> Self {
        Self {
            name: name.into(),
            operator,
            input,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operator(&self) -> &Arc<RexOperator> {
        &self.operator
    }

    pub fn input(&self) -> Option<&RexNode> {
        self.input.as_ref()
    }
}

impl Debug for LaxAggregateCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.input {
            Some(input) => write!(f, "{}: {}({})", self.name, self.operator.name(), input),
            None => write!(f, "{}: {}()", self.name, self.operator.name()),
        }
    }
}

/// Groups documents by the value of `group` and outputs one document per group holding `_id`
/// and the results of `calls`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct DocumentAggregate {
    group: Option<RexNode>,
    calls: Vec<LaxAggregateCall>,
}

impl DocumentAggregate {
    pub fn new(group: Option<RexNode>, calls: Vec<LaxAggregateCall>) -> Self {
        Self { group, calls }
    }

    pub fn group(&self) -> Option<&RexNode> {
        self.group.as_ref()
    }

    pub fn calls(&self) -> &[LaxAggregateCall] {
        &self.calls
    }
}

impl OperatorTrait for DocumentAggregate {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        document_prop("DocumentAggregate", inputs)
    }
}

impl DisplayFields for DocumentAggregate {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        if let Some(group) = &self.group {
            s.field("group", group);
        }
        s.field("calls", &self.calls);
        s.finish()
    }
}

/// Orders documents by path values, then applies `offset` and `fetch`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct DocumentSort {
    keys: Vec<(RexNode, Direction)>,
    offset: Option<usize>,
    fetch: Option<usize>,
}

impl DocumentSort {
    pub fn new(keys: Vec<(RexNode, Direction)>, offset: Option<usize>, fetch: Option<usize>) -> Self {
        Self {
            keys,
            offset,
            fetch,
        }
    }

    pub fn keys(&self) -> &[(RexNode, Direction)] {
        &self.keys
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn fetch(&self) -> Option<usize> {
        self.fetch
    }
}

impl OperatorTrait for DocumentSort {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        document_prop("DocumentSort", inputs)
    }
}

impl DisplayFields for DocumentSort {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let keys = self
            .keys
            .iter()
            .map(|(key, direction)| format!("{} {}", key, direction.as_ref()))
            .join(", ");
        let mut s = f.debug_struct("");
        s.field("keys", &format_args!("[{}]", keys));
        if let Some(offset) = self.offset {
            s.field("offset", &offset);
        }
        if let Some(fetch) = self.fetch {
            s.field("fetch", &fetch);
        }
        s.finish()
    }
}

/// Outputs one document per element of the array at `path`, with the element in its place.
/// Documents whose path is missing or not an array are dropped.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct DocumentUnwind {
    path: String,
}

impl DocumentUnwind {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl OperatorTrait for DocumentUnwind {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        document_prop("DocumentUnwind", inputs)
    }
}

impl DisplayFields for DocumentUnwind {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("").field("path", &self.path).finish()
    }
}
