use std::fmt::Formatter;

use crate::error::BasaltResult;
use crate::operator::{input_prop, DisplayFields, OperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::{Collation, LogicalProperty};

/// Orders rows by `collation`, then skips `offset` rows and returns at most `fetch` rows.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Sort {
    collation: Collation,
    offset: Option<usize>,
    fetch: Option<usize>,
}

impl Sort {
    pub fn new(collation: Collation, offset: Option<usize>, fetch: Option<usize>) -> Self {
        Self {
            collation,
            offset,
            fetch,
        }
    }

    pub fn collation(&self) -> &Collation {
        &self.collation
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn fetch(&self) -> Option<usize> {
        self.fetch
    }
}

impl OperatorTrait for Sort {
    fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        _context: &OptimizerContext,
    ) -> BasaltResult<LogicalProperty> {
        let input = input_prop("Sort", inputs, 1, 0)?;
        if let Some(field) = self
            .collation
            .fields()
            .iter()
            .find(|field| field.index >= input.field_count())
        {
            bail_internal!(
                "Sort key {} out of range of {} fields",
                field.index,
                input.field_count()
            );
        }
        Ok(input.clone())
    }
}

impl DisplayFields for Sort {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("collation", &format_args!("{}", self.collation));
        if let Some(offset) = self.offset {
            s.field("offset", &offset);
        }
        if let Some(fetch) = self.fetch {
            s.field("fetch", &fetch);
        }
        s.finish()
    }
}
