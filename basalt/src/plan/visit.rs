use crate::error::BasaltResult;
use crate::plan::PlanNodeRef;

/// Bottom up fold over a plan.
pub trait PlanVisitor {
    type Output;

    /// Combines `node` with the results of its inputs, in input order.
    fn visit_node(
        &mut self,
        node: &PlanNodeRef,
        inputs: Vec<Self::Output>,
    ) -> BasaltResult<Self::Output>;
}

/// Visits inputs before their parent. Shared subtrees are visited once per parent.
pub fn visit_bottom_up<V: PlanVisitor>(
    visitor: &mut V,
    node: &PlanNodeRef,
) -> BasaltResult<V::Output> {
    let inputs = node
        .inputs()
        .iter()
        .map(|input| visit_bottom_up(visitor, input))
        .collect::<BasaltResult<Vec<_>>>()?;
    visitor.visit_node(node, inputs)
}
