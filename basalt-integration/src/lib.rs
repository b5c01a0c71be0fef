//! Executes basalt plans over in memory data.
//!
//! [`interpreter::Interpreter`] runs logical and enumerable plans row at a time against a
//! [`store::MemoryStore`], which also serves as the catalog of the planner. Tests use it to check
//! that optimized plans return the same rows as the plans they were derived from.
pub mod interpreter;
pub mod mql;
pub mod store;
pub mod value;
