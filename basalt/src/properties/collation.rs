use std::fmt::{Display, Formatter};

use itertools::Itertools;
use strum_macros::AsRefStr;

use crate::properties::PhysicalProp;

#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq, AsRefStr)]
pub enum Direction {
    #[strum(serialize = "ASC")]
    Ascending,
    #[strum(serialize = "DESC")]
    Descending,
}

/// Ordering of one field. Nulls sort lowest.
#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq)]
pub struct FieldCollation {
    pub index: usize,
    pub direction: Direction,
}

impl FieldCollation {
    pub fn asc(index: usize) -> Self {
        Self {
            index,
            direction: Direction::Ascending,
        }
    }

    pub fn desc(index: usize) -> Self {
        Self {
            index,
            direction: Direction::Descending,
        }
    }
}

impl Display for FieldCollation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.index, self.direction.as_ref())
    }
}

/// Ordering property specification.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct Collation {
    fields: Vec<FieldCollation>,
}

impl Collation {
    pub fn new<I: IntoIterator<Item = FieldCollation>>(fields: I) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn fields(&self) -> &[FieldCollation] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PhysicalProp for Collation {
    /// Output sorted by `[a, b]` is also sorted by `[a]`.
    fn satisfies(&self, required: &Self) -> bool {
        self.fields.starts_with(&required.fields)
    }
}

impl Display for Collation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.fields.iter().join(", "))
    }
}
