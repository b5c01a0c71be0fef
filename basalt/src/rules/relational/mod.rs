//! Rewrite and exploration rules over relational operators.
mod filter;
pub use filter::*;
mod project;
pub use project::*;
mod join;
pub use join::*;
