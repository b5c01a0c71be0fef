use crate::cost::Cost;
use crate::error::BasaltResult;
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator;
use crate::optimizer::{OptExpr, Optimizer};

/// Fixed cost per operator, enough to prefer pushing work into external stores and hash joins
/// over nested loops.
#[derive(Default)]
pub struct SimpleCostModel {}

impl SimpleCostModel {
    pub(super) fn cost<O: Optimizer>(&self, expr: &O::Expr) -> BasaltResult<Cost> {
        match expr.operator() {
            Physical(op) => Ok(self.operator_cost(op)),
            Logical(op) => bail_internal!("No cost for logical operator {}", op.as_ref()),
        }
    }

    fn operator_cost(&self, operator: &PhysicalOperator) -> Cost {
        use PhysicalOperator::*;
        let cost = match operator {
            EnumerableScan(_) => 100.0,
            JdbcScan(_) => 50.0,
            JdbcToEnumerableConverter(_) => 10.0,
            EnumerableFilter(_) | EnumerableProject(_) | EnumerableCalc(_) => 1.0,
            EnumerableDocumentUnwind(_) => 2.0,
            EnumerableAggregate(_) => 10.0,
            EnumerableSort(_) => 20.0,
            EnumerableHashJoin(_) => 10.0,
            EnumerableNestedLoopJoin(_) => 100.0,
        };
        Cost::from(cost)
    }
}
