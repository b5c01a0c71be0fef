//! Static limits and switches of the planner.
use serde::Deserialize;

use crate::error::{BasaltError, BasaltResult};
use crate::heuristic::MatchOrder;

/// Planner configuration, usually loaded from yaml.
///
/// ```yaml
/// match_order: top_down
/// match_limit: 1000
/// join_reorder_threshold: 3
/// cascades: false
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Order heuristic passes visit plan nodes in.
    pub match_order: MatchOrder,
    /// Maximum number of rule applications in one heuristic pass.
    pub match_limit: usize,
    /// Minimum number of relations a join tree must cover before it's reordered.
    pub join_reorder_threshold: usize,
    /// Implement with a cost based search instead of a heuristic pass.
    pub cascades: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            match_order: MatchOrder::TopDown,
            match_limit: 1000,
            join_reorder_threshold: 3,
            cascades: false,
        }
    }
}

impl PlannerConfig {
    pub fn from_yaml(yaml: &str) -> BasaltResult<Self> {
        let config: PlannerConfig = serde_yaml::from_str(yaml)
            .map_err(|e| BasaltError::Config(format!("Malformed planner config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BasaltResult<()> {
        if self.match_limit == 0 {
            return Err(BasaltError::Config(
                "match_limit must be positive".to_string(),
            ));
        }
        if self.join_reorder_threshold < 2 {
            return Err(BasaltError::Config(format!(
                "join_reorder_threshold must be at least 2, got {}",
                self.join_reorder_threshold
            )));
        }
        Ok(())
    }
}
