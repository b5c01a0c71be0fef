//! Properties of plan operators.
//!
//! Currently we have two kinds of properties: [`LogicalProperty`] and [`PhysicalPropertySet`].
//! Logical properties are shared by logically equivalent plans, such as the row type and the data
//! model. Physical properties are the traits of one implementation: its calling convention and
//! the ordering of its output.
mod logical;
pub use logical::*;
mod convention;
pub use convention::*;
mod collation;
pub use collation::*;
mod physical;
pub use physical::*;

use std::fmt::Debug;
use std::hash::Hash;

pub trait PhysicalProp: Debug + Hash {
    /// Tests whether `self` satisfies `required`.
    fn satisfies(&self, required: &Self) -> bool;
}
