//! Rules rewriting document operators.
//!
//! Lowering rules express a document operator with relational ones working on the single
//! document column of the row. Path references are replaced by `MQL_QUERY_VALUE` calls on that
//! column, see [`lower_name_refs`].
mod lowering;
pub use lowering::*;
mod aggregate;
pub use aggregate::*;
mod geo;
pub use geo::*;
mod merge;
pub use merge::*;
