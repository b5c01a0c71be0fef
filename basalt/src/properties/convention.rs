use strum_macros::{AsRefStr, Display};

use crate::properties::PhysicalProp;

/// Calling convention, e.g. which engine executes an operator.
#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq, Default, AsRefStr, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Convention {
    /// Not executable, carried by logical operators.
    #[default]
    None,
    /// Executed in process by the enumerable engine.
    Enumerable,
    /// Executed by an external relational store.
    Jdbc,
}

impl PhysicalProp for Convention {
    fn satisfies(&self, required: &Self) -> bool {
        *required == Convention::None || self == required
    }
}
