use std::fmt::{Display, Formatter};

use crate::operator::{Converter, PhysicalOperator, Sort};
use crate::properties::{Collation, Convention, PhysicalProp};

/// All physical properties.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct PhysicalPropertySet {
    convention: Convention,
    collation: Collation,
}

pub(crate) struct Enforcer {
    pub(crate) operator: PhysicalOperator,
    pub(crate) output_prop: PhysicalPropertySet,
}

impl PhysicalPropertySet {
    pub fn new(convention: Convention, collation: Collation) -> Self {
        Self {
            convention,
            collation,
        }
    }

    /// Any ordering in `convention`.
    pub fn with_convention(convention: Convention) -> Self {
        Self::new(convention, Collation::default())
    }

    pub fn convention(&self) -> Convention {
        self.convention
    }

    pub fn collation(&self) -> &Collation {
        &self.collation
    }

    /// When `input_prop` doesn't meet requirements of `required_prop`, try to append enforcer
    /// physical operators to ensure requirements.
    ///
    /// Enforcers are returned bottom up. The last enforcer's output may still not satisfy
    /// `required_prop`, e.g. nothing converts enumerable rows back into a jdbc store.
    pub(crate) fn append_enforcers(
        required_prop: &PhysicalPropertySet,
        input_prop: &PhysicalPropertySet,
    ) -> Vec<Enforcer> {
        let mut enforcers = vec![];
        let needs_sort = !input_prop.collation.satisfies(&required_prop.collation);
        let mut current = input_prop.clone();

        if current.convention == Convention::Jdbc
            && (required_prop.convention == Convention::Enumerable
                || (needs_sort && required_prop.convention == Convention::None))
        {
            current = PhysicalPropertySet::new(Convention::Enumerable, current.collation);
            enforcers.push(Enforcer {
                operator: PhysicalOperator::JdbcToEnumerableConverter(Converter::new()),
                output_prop: current.clone(),
            });
        }

        if needs_sort && current.convention == Convention::Enumerable {
            enforcers.push(Enforcer {
                operator: PhysicalOperator::EnumerableSort(Sort::new(
                    required_prop.collation.clone(),
                    None,
                    None,
                )),
                output_prop: PhysicalPropertySet::new(
                    Convention::Enumerable,
                    required_prop.collation.clone(),
                ),
            });
        }

        enforcers
    }
}

impl PhysicalProp for PhysicalPropertySet {
    fn satisfies(&self, required: &Self) -> bool {
        self.convention.satisfies(&required.convention)
            && self.collation.satisfies(&required.collation)
    }
}

impl Display for PhysicalPropertySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.convention, self.collation)
    }
}
