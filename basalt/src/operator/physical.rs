use std::fmt::{Display, Formatter};

use enum_as_inner::EnumAsInner;
use strum_macros::AsRefStr;

use crate::error::BasaltResult;
use crate::operator::{
    Aggregate, Calc, Converter, DisplayFields, DocumentUnwind, Filter, Join, OperatorTrait,
    Project, Scan, Sort,
};
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::properties::{Collation, Convention, LogicalProperty, PhysicalPropertySet};

/// Physical algebra operator.
///
/// Several implementations share one operator struct, e.g. both [`PhysicalOperator::JdbcScan`]
/// and [`PhysicalOperator::EnumerableScan`] carry a [`Scan`].
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner, AsRefStr)]
pub enum PhysicalOperator {
    EnumerableScan(Scan),
    EnumerableFilter(Filter),
    EnumerableProject(Project),
    EnumerableCalc(Calc),
    EnumerableAggregate(Aggregate),
    EnumerableSort(Sort),
    EnumerableHashJoin(Join),
    EnumerableNestedLoopJoin(Join),
    EnumerableDocumentUnwind(DocumentUnwind),
    JdbcScan(Scan),
    JdbcToEnumerableConverter(Converter),
}

pub struct DerivePropContext<'a, O: Optimizer> {
    pub required_prop: &'a PhysicalPropertySet,
    pub expr_handle: O::ExprHandle,
    pub optimizer: &'a O,
}

#[derive(Debug)]
pub struct DerivePropResult {
    pub output_prop: PhysicalPropertySet,
    pub input_required_props: Vec<PhysicalPropertySet>,
}

pub trait PhysicalOperatorTrait {
    /// Derive children's required properties with required properties of current node.
    fn derive_properties<O: Optimizer>(
        &self,
        context: DerivePropContext<O>,
    ) -> BasaltResult<Vec<DerivePropResult>>;
}

impl PhysicalOperator {
    /// Convention of rows produced by this operator.
    pub fn convention(&self) -> Convention {
        match self {
            PhysicalOperator::JdbcScan(_) => Convention::Jdbc,
            _ => Convention::Enumerable,
        }
    }

    /// Convention this operator requires from its input `idx`.
    pub fn required_input_convention(&self, _idx: usize) -> Convention {
        match self {
            PhysicalOperator::JdbcScan(_) | PhysicalOperator::EnumerableScan(_) => {
                Convention::None
            }
            PhysicalOperator::JdbcToEnumerableConverter(_) => Convention::Jdbc,
            _ => Convention::Enumerable,
        }
    }

    fn inner(&self) -> (&dyn OperatorTrait, &dyn DisplayFields) {
        use PhysicalOperator::*;
        match self {
            EnumerableScan(op) | JdbcScan(op) => (op, op),
            EnumerableFilter(op) => (op, op),
            EnumerableProject(op) => (op, op),
            EnumerableCalc(op) => (op, op),
            EnumerableAggregate(op) => (op, op),
            EnumerableSort(op) => (op, op),
            EnumerableHashJoin(op) | EnumerableNestedLoopJoin(op) => (op, op),
            EnumerableDocumentUnwind(op) => (op, op),
            JdbcToEnumerableConverter(op) => (op, op),
        }
    }
}

impl OperatorTrait for PhysicalOperator {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        self.inner().0.derive_logical_prop(inputs, context)
    }
}

impl DisplayFields for PhysicalOperator {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.inner().1.display(f)
    }
}

impl PhysicalOperatorTrait for PhysicalOperator {
    fn derive_properties<O: Optimizer>(
        &self,
        context: DerivePropContext<O>,
    ) -> BasaltResult<Vec<DerivePropResult>> {
        use PhysicalOperator::*;
        let enumerable = |collation: Collation| {
            PhysicalPropertySet::new(Convention::Enumerable, collation)
        };
        let unordered = || enumerable(Collation::default());

        let result = match self {
            EnumerableScan(_) => DerivePropResult {
                output_prop: unordered(),
                input_required_props: vec![],
            },
            JdbcScan(_) => DerivePropResult {
                output_prop: PhysicalPropertySet::with_convention(Convention::Jdbc),
                input_required_props: vec![],
            },
            JdbcToEnumerableConverter(_) => DerivePropResult {
                output_prop: unordered(),
                input_required_props: vec![PhysicalPropertySet::with_convention(
                    Convention::Jdbc,
                )],
            },
            // Filtering keeps the input order.
            EnumerableFilter(_) => {
                let collation = context.required_prop.collation().clone();
                DerivePropResult {
                    output_prop: enumerable(collation.clone()),
                    input_required_props: vec![enumerable(collation)],
                }
            }
            EnumerableSort(sort) => DerivePropResult {
                output_prop: enumerable(sort.collation().clone()),
                input_required_props: vec![unordered()],
            },
            EnumerableProject(_)
            | EnumerableCalc(_)
            | EnumerableAggregate(_)
            | EnumerableDocumentUnwind(_) => DerivePropResult {
                output_prop: unordered(),
                input_required_props: vec![unordered()],
            },
            EnumerableHashJoin(_) | EnumerableNestedLoopJoin(_) => DerivePropResult {
                output_prop: unordered(),
                input_required_props: vec![unordered(), unordered()],
            },
        };

        Ok(vec![result])
    }
}

impl Display for PhysicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())?;
        self.display(f)
    }
}
