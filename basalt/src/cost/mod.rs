//! Defines cost model.
use derive_more::{Add, AddAssign, Sub, SubAssign, Sum};

use crate::error::BasaltResult;
use crate::optimizer::Optimizer;

mod simple;
pub use simple::*;

pub const INF: Cost = Cost(f64::INFINITY);

#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Add, Sub, Sum, AddAssign, SubAssign)]
pub struct Cost(f64);

impl From<f64> for Cost {
    fn from(c: f64) -> Self {
        Cost(c)
    }
}

impl Cost {
    pub fn value(&self) -> f64 {
        self.0
    }
}

#[derive(Default)]
pub struct CostModel {
    /// Actual strategy.
    inner: SimpleCostModel,
}

impl CostModel {
    /// Estimate cost of current operator without accumulating children's cost.
    pub fn estimate_cost<O: Optimizer>(&self, expr: &O::Expr) -> BasaltResult<Cost> {
        self.inner.cost::<O>(expr)
    }
}
