use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Aggregate counters returned by every merge entry point.
///
/// Both merge drivers fill these with the same definitions, so a
/// relational merge and an object-graph merge of the same inputs report
/// identical numbers (apart from `duration_ms` and the driver tallies).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub scopes_matched: u64,
    pub scopes_added: u64,
    pub cover_items_matched: u64,
    pub cover_items_added: u64,
    /// Source items dropped because the target cannot represent their type.
    pub cover_items_skipped: u64,
    pub total_hits_added: u64,
    pub tests_merged: u64,
    pub history_nodes_merged: u64,
    pub duration_ms: u64,
    /// Sources merged through the set-based relational path.
    pub relational_merges: u64,
    /// Sources merged by walking the object graph.
    pub object_merges: u64,
}

impl MergeStats {
    /// Sum of matched and added cover items.
    pub fn cover_items_touched(&self) -> u64 {
        self.cover_items_matched + self.cover_items_added
    }

    /// Copy with the wall-clock field cleared, for comparisons and snapshots.
    pub fn without_timing(&self) -> Self {
        Self {
            duration_ms: 0,
            ..self.clone()
        }
    }

    /// Copy with timing and driver tallies cleared.
    pub fn counters(&self) -> Self {
        Self {
            duration_ms: 0,
            relational_merges: 0,
            object_merges: 0,
            ..self.clone()
        }
    }
}

impl AddAssign<&MergeStats> for MergeStats {
    fn add_assign(&mut self, rhs: &MergeStats) {
        self.scopes_matched += rhs.scopes_matched;
        self.scopes_added += rhs.scopes_added;
        self.cover_items_matched += rhs.cover_items_matched;
        self.cover_items_added += rhs.cover_items_added;
        self.cover_items_skipped += rhs.cover_items_skipped;
        self.total_hits_added = self.total_hits_added.wrapping_add(rhs.total_hits_added);
        self.tests_merged += rhs.tests_merged;
        self.history_nodes_merged += rhs.history_nodes_merged;
        self.duration_ms += rhs.duration_ms;
        self.relational_merges += rhs.relational_merges;
        self.object_merges += rhs.object_merges;
    }
}

/// Whether the set-based relational path may, must, or must not be used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationalMode {
    #[default]
    Auto,
    Disabled,
    Required,
}

impl std::str::FromStr for RelationalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(RelationalMode::Auto),
            "disabled" | "off" => Ok(RelationalMode::Disabled),
            "required" => Ok(RelationalMode::Required),
            other => Err(format!("unknown relational mode: {other}")),
        }
    }
}

/// Knobs shared by every merge entry point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    pub create_history: bool,
    pub squash_history: bool,
    pub relational: RelationalMode,
    /// Upper bound on level-by-level mapping passes (tree depth).
    pub max_mapping_iterations: u32,
    pub detach_retries: u32,
    pub detach_retry_delay_ms: u64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            create_history: true,
            squash_history: false,
            relational: RelationalMode::Auto,
            max_mapping_iterations: 4096,
            detach_retries: 3,
            detach_retry_delay_ms: 10,
        }
    }
}

impl MergeOptions {
    pub fn squashed() -> Self {
        Self {
            squash_history: true,
            ..Self::default()
        }
    }

    pub fn without_history() -> Self {
        Self {
            create_history: false,
            ..Self::default()
        }
    }

    pub fn with_relational(mut self, mode: RelationalMode) -> Self {
        self.relational = mode;
        self
    }
}
