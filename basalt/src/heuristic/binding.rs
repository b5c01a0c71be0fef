use crate::heuristic::{HepNodeId, HepOptimizer};
use crate::optimizer::{OptExpr, Optimizer};
use crate::rules::{OptExpression, Pattern};

/// Binds a pattern to the plan graph, at most one binding exists per node.
pub(crate) struct Binding<'a, 'b> {
    expr_handle: HepNodeId,
    pattern: &'a Pattern,
    optimizer: &'b HepOptimizer,
}

impl<'a, 'b> Binding<'a, 'b> {
    pub(crate) fn new(
        expr_handle: HepNodeId,
        pattern: &'a Pattern,
        optimizer: &'b HepOptimizer,
    ) -> Self {
        Self {
            expr_handle,
            pattern,
            optimizer,
        }
    }

    pub(crate) fn next(self) -> Option<OptExpression<HepOptimizer>> {
        let expr = self.optimizer.expr_at(self.expr_handle);
        if !self.pattern.matches(expr.operator()) {
            return None;
        }

        let inputs_len = expr.inputs_len(self.optimizer);
        let inputs = match &self.pattern.children {
            Some(children) => {
                if inputs_len != children.len() {
                    return None;
                }
                children
                    .iter()
                    .enumerate()
                    .map(|(idx, child)| {
                        Binding::new(expr.input_at(idx, self.optimizer), child, self.optimizer)
                            .next()
                    })
                    .collect::<Option<Vec<_>>>()?
            }
            // Inputs of leaf are bound as groups.
            None => (0..inputs_len)
                .map(|idx| OptExpression::with_group_handle(expr.input_at(idx, self.optimizer)))
                .collect(),
        };

        Some(OptExpression::with_expr_handle(self.expr_handle, inputs))
    }
}
