use std::collections::HashSet;

use crate::error::{BasaltError, BasaltResult};
use crate::rules::{
    CommutateJoinRule, DocumentAggregateToAggregateRule, DocumentFilterToCalcRule,
    DocumentGeoNearUnwrapRule, DocumentNearUnwrapRule, DocumentProjectToCalcRule,
    DocumentSortToSortRule, EnumerableAggregateRule, EnumerableCalcRule,
    EnumerableDocumentUnwindRule, EnumerableFilterRule, EnumerableJoinRule,
    EnumerableProjectRule, EnumerableScanRule, EnumerableSortRule, FilterIntoJoinRule,
    FilterMergeRule, FilterProjectTransposeRule, JdbcScanRule, JoinAssociateRule,
    MergeDocumentFilterRule, ProjectMergeRule, ProjectRemoveRule, Rule, RuleImpl,
};

/// Named, ordered collection of rules with distinct descriptions.
#[derive(Clone, Debug)]
pub struct RuleSet {
    name: String,
    rules: Vec<RuleImpl>,
}

impl RuleSet {
    pub fn new<S: Into<String>>(name: S, rules: Vec<RuleImpl>) -> BasaltResult<Self> {
        let name = name.into();
        let mut descriptions = HashSet::with_capacity(rules.len());
        for rule in &rules {
            if !descriptions.insert(rule.description()) {
                return Err(BasaltError::Config(format!(
                    "Rule {} registered twice in rule set {}",
                    rule.description(),
                    name
                )));
            }
        }
        Ok(Self { name, rules })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[RuleImpl] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<RuleImpl> {
        self.rules
    }

    /// Rewrites document operators into relational ones.
    ///
    /// Geo unwrapping comes first, the filter rules don't match geo conditions.
    pub fn document_lowering() -> Self {
        Self {
            name: "document_lowering".to_string(),
            rules: vec![
                DocumentGeoNearUnwrapRule::new().into(),
                DocumentNearUnwrapRule::new().into(),
                MergeDocumentFilterRule::new().into(),
                DocumentFilterToCalcRule::new().into(),
                DocumentProjectToCalcRule::new().into(),
                DocumentAggregateToAggregateRule::new().into(),
                DocumentSortToSortRule::new().into(),
            ],
        }
    }

    pub fn relational_rewrite() -> Self {
        Self {
            name: "relational_rewrite".to_string(),
            rules: vec![
                FilterMergeRule::new().into(),
                FilterProjectTransposeRule::new().into(),
                FilterIntoJoinRule::new().into(),
                ProjectMergeRule::new().into(),
                ProjectRemoveRule::new().into(),
            ],
        }
    }

    pub fn enumerable_implementation() -> Self {
        Self {
            name: "enumerable_implementation".to_string(),
            rules: Self::implementation_rules(),
        }
    }

    /// Implementation rules plus join reordering, for the cost based search.
    pub fn cascades() -> Self {
        let mut rules = Self::implementation_rules();
        rules.push(CommutateJoinRule::new().into());
        rules.push(JoinAssociateRule::new().into());
        Self {
            name: "cascades".to_string(),
            rules,
        }
    }

    fn implementation_rules() -> Vec<RuleImpl> {
        vec![
            EnumerableScanRule::new().into(),
            JdbcScanRule::new().into(),
            EnumerableFilterRule::new().into(),
            EnumerableProjectRule::new().into(),
            EnumerableCalcRule::new().into(),
            EnumerableAggregateRule::new().into(),
            EnumerableSortRule::new().into(),
            EnumerableJoinRule::new().into(),
            EnumerableDocumentUnwindRule::new().into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use crate::error::BasaltError;
    use crate::rules::{FilterMergeRule, ProjectMergeRule, Rule, RuleSet};

    #[test]
    fn test_duplicate_rule_rejected() {
        let result = RuleSet::new(
            "merge",
            vec![
                FilterMergeRule::new().into(),
                ProjectMergeRule::new().into(),
                FilterMergeRule::new().into(),
            ],
        );
        match result {
            Err(BasaltError::Config(message)) => {
                assert_eq!(
                    "Rule FilterMergeRule registered twice in rule set merge",
                    message
                )
            }
            other => panic!("Unexpected result {:?}", other.map(|s| s.name().to_string())),
        }
    }

    #[test]
    fn test_standard_sets_are_valid() {
        for set in [
            RuleSet::document_lowering(),
            RuleSet::relational_rewrite(),
            RuleSet::enumerable_implementation(),
            RuleSet::cascades(),
        ] {
            let name = set.name().to_string();
            let rebuilt = RuleSet::new(name.clone(), set.into_rules()).unwrap();
            assert_eq!(name, rebuilt.name());
        }

        let lowering = RuleSet::document_lowering();
        assert_eq!(
            "DocumentGeoNearUnwrapRule",
            lowering.rules()[0].description()
        );
        assert_eq!(11, RuleSet::cascades().rules().len());
    }
}
