//! Implementation of heuristic optimizer.
//!
//! Heuristic optimizer optimizes query plan by applying a batch of rewrite rules to query plan
//! until some condition is met, e.g. max number of rule applications or reached fixed point. The
//! implementation is heavily inspired by [apache calcite](https://github.com/apache/calcite)'s
//! HepPlanner.
//!
//! It is used for the deterministic phases of planning: lowering document operators, simple
//! relational rewrites and implementing a plan without searching alternatives.
mod optimizer;
pub use optimizer::*;
mod graph;
pub use graph::*;
mod binding;
pub(crate) use binding::Binding;
