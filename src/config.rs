//! Engine tuning knobs.
//!
//! Thresholds are deployment-specific, so they live in a config struct
//! passed to the engine rather than in code. Every field has a serde
//! default, which keeps partial config files valid as knobs are added.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Minimum weighted similarity for a scored pair to count as a
    /// duplicate candidate. Inclusive.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Stricter threshold reserved for name-only comparisons. Not yet
    /// consulted by the scorer; kept so existing configs remain valid.
    #[serde(default = "default_name_similarity_threshold")]
    pub name_similarity_threshold: f32,
    /// Maximum hierarchy level. Also bounds the ancestor walk used for
    /// cycle detection, so a walk that runs out of budget reads as
    /// excessive depth.
    #[serde(default = "default_max_hierarchy_depth")]
    pub max_hierarchy_depth: usize,
}

fn default_similarity_threshold() -> f32 {
    0.7
}

fn default_name_similarity_threshold() -> f32 {
    0.8
}

fn default_max_hierarchy_depth() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            similarity_threshold: default_similarity_threshold(),
            name_similarity_threshold: default_name_similarity_threshold(),
            max_hierarchy_depth: default_max_hierarchy_depth(),
        }
    }
}
