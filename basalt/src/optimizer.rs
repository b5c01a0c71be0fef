use std::fmt::Debug;
use std::sync::Arc;

use crate::catalog::{Catalog, MemoryCatalog};
use crate::config::PlannerConfig;
use crate::error::BasaltResult;
use crate::operator::Operator;
use crate::plan::{Plan, PlanNodeId, PlanNodeIdGen, PlanNodeRef};
use crate::properties::LogicalProperty;
use crate::rex::{registry, OperatorRegistry, RexBuilder};

/// Id of a correlated subtree, referenced by [`crate::rex::RexCorrelVariable`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CorrelationId(pub usize);

/// Correlated subtrees registered during one compilation.
#[derive(Clone, Default)]
pub struct CorrelationTable {
    subtrees: Vec<PlanNodeRef>,
}

impl CorrelationTable {
    pub fn register(&mut self, node: PlanNodeRef) -> CorrelationId {
        self.subtrees.push(node);
        CorrelationId(self.subtrees.len() - 1)
    }

    pub fn resolve(&self, id: CorrelationId) -> BasaltResult<&PlanNodeRef> {
        self.subtrees
            .get(id.0)
            .ok_or_else(|| internal_err!("Correlation $cor{} is not registered", id.0))
    }
}

/// Context for optimization. Includes access to catalog, operator registry and configuration.
#[derive(Clone)]
pub struct OptimizerContext {
    pub catalog: Arc<dyn Catalog>,
    pub registry: Arc<OperatorRegistry>,
    pub config: PlannerConfig,
    correlations: CorrelationTable,
    plan_node_gen: PlanNodeIdGen,
}

impl Default for OptimizerContext {
    fn default() -> Self {
        Self::new(Arc::new(MemoryCatalog::default()))
    }
}

impl OptimizerContext {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            registry: registry(),
            config: PlannerConfig::default(),
            correlations: CorrelationTable::default(),
            plan_node_gen: PlanNodeIdGen::default(),
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> BasaltResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_registry(mut self, registry: Arc<OperatorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn rex_builder(&self) -> RexBuilder {
        RexBuilder::new(self.registry.clone())
    }

    pub fn next_plan_node_id(&mut self) -> PlanNodeId {
        self.plan_node_gen.gen_next()
    }

    pub fn register_correlation(&mut self, node: PlanNodeRef) -> CorrelationId {
        self.correlations.register(node)
    }

    pub fn resolve_correlation(&self, id: CorrelationId) -> BasaltResult<&PlanNodeRef> {
        self.correlations.resolve(id)
    }
}

/// Optimizer interface.
///
/// All information required by optimizer, such as rule set, input plan, required property are
/// passed by optimizer in constructor, since different optimizer may require different information.
///
/// The concepts of `group` and `group expression` are borrowed from cascades optimizer. Each
/// `group` consists of several `group expressions`, and all group expressions represents
/// logically same plan, e.g. return same result set. In heuristic optimizer, they are same
/// thing, just a node in plan graph.
pub trait Optimizer {
    type GroupHandle: OptGroupHandle<O = Self>;
    type ExprHandle: OptExprHandle<O = Self>;
    type Group: OptGroup;
    type Expr: OptExpr<O = Self, InputHandle = Self::GroupHandle>;

    /// These methods are accessed by rules.
    fn context(&self) -> &OptimizerContext;
    fn group_at(&self, group_handle: Self::GroupHandle) -> &Self::Group;
    fn expr_at(&self, expr_handle: Self::ExprHandle) -> &Self::Expr;

    /// Entry point to drive optimization process.
    fn find_best_plan(self) -> BasaltResult<Plan>;
}

pub trait OptExpr {
    type O: Optimizer;
    type InputHandle: OptGroupHandle;

    fn operator(&self) -> &Operator;
    fn inputs_len(&self, opt: &Self::O) -> usize;
    fn input_at(&self, idx: usize, opt: &Self::O) -> Self::InputHandle;
    /// Logical property shared by the group this expression belongs to.
    fn logical_prop<'a>(&'a self, opt: &'a Self::O) -> &'a LogicalProperty;
}

pub trait OptGroup {
    fn logical_prop(&self) -> &LogicalProperty;
}

pub trait OptExprHandle: Clone + Debug + PartialEq + Eq {
    type O: Optimizer<ExprHandle = Self>;
}

pub trait OptGroupHandle: Clone + Debug + PartialEq + Eq {
    type O: Optimizer<GroupHandle = Self>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::optimizer::{CorrelationId, OptimizerContext};
    use crate::plan::{LogicalPlanBuilder, PlanNode};

    #[test]
    fn test_correlation_table() {
        let mut context = OptimizerContext::default();
        let plan = LogicalPlanBuilder::new().scan("shop", "orders").build();
        let node: Arc<PlanNode> = plan.root();

        let id = context.register_correlation(node.clone());
        assert_eq!(CorrelationId(0), id);
        assert_eq!(&node, context.resolve_correlation(id).unwrap());
        assert!(context.resolve_correlation(CorrelationId(3)).is_err());
    }
}
