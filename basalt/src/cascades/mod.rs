//! Implementation of cascades optimizer.
//!
//! The search keeps all equivalent plans in a [`memo`](memo::Memo): each group holds logically
//! equal expressions, and each physical expression remembers the cheapest way to deliver a
//! required [`crate::properties::PhysicalPropertySet`]. Work is split into small tasks run from
//! a stack, following the columbia optimizer design also used by calcite's volcano planner.
mod binding;
mod memo;
pub use memo::*;
mod optimizer;
pub use optimizer::*;
mod task;
