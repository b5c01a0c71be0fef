//! ## Background
//!
//! A multi model database accepts queries in several languages, relational sql as well as
//! document queries in the style of mongodb. Each query is translated into one algebra of
//! operators and row expressions, and this crate rewrites that algebra into an executable plan.
//!
//! Document operators address fields by path inside a single document column. They are lowered
//! into relational operators over calls like `MQL_QUERY_VALUE`, so the relational rewrite and
//! implementation rules apply to every query language alike.
//!
//! Planning runs as a sequence of [`program`]s. Each program applies one [`rules::RuleSet`] with
//! either the [`heuristic`] optimizer, which rewrites to a fix point, or the [`cascades`]
//! optimizer, which searches the cheapest plan delivering the required physical properties.
//!
//! ## Design
//!
//! * [`types`] Data types, operand checkers and return type inference.
//! * [`rex`] Row expressions, the operator registry and expression rewriting.
//! * [`operator`] Logical, document and physical operators.
//! * [`plan`] Plan trees, builders, visitors and explain output.
//! * [`properties`] Logical and physical properties, e.g. row type, convention and collation.
//! * [`rules`] Rule definitions, patterns and rule sets.
//! * [`heuristic`] Heuristic optimizer implementation.
//! * [`cascades`] Cascades style cost based optimizer.
//! * [`program`] Ordered optimizer passes.
//!
//! ## Reference
//!
//! 1. Graefe, G., 1995. The cascades framework for query optimization. IEEE Data Eng. Bull., 18(3),
//! pp.19-29.
//! 2. Begoli, E., Camacho-Rodríguez, J., Hyde, J., Mior, M.J. and Lemire, D., 2018. Apache
//! calcite: A foundational framework for optimized query processing over heterogeneous data
//! sources. In Proceedings of the 2018 International Conference on Management of Data
//! (pp. 221-230).
//! 3. Columnbia Project, https://github.com/yongwen/columbia

#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

#[macro_use]
pub mod error;

pub mod cascades;
pub mod catalog;
pub mod config;
pub mod cost;
pub mod heuristic;
pub mod operator;
pub mod optimizer;
pub mod plan;
pub mod program;
pub mod properties;
pub mod rex;
pub mod rules;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;
