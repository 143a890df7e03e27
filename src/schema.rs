use once_cell::sync::Lazy;

use crate::error::PipelineError;

/// Bumped whenever the tracked-statistic list or its order changes. Model
/// artifacts fitted against a different version must be refused, not
/// reinterpreted.
pub const SCHEMA_VERSION: u32 = 1;

/// Statistics tracked per team per game, in the exact order the scaler and
/// classifier were fitted on. Order is part of the contract: the matrix fed
/// to the model is built from this list, never from incidental column order.
const TRACKED_STATS: [&str; 14] = [
    "completions",
    "passing_yards",
    "passing_tds",
    "rushing_yards",
    "sacks_suffered",
    "rushing_tds",
    "completion_pct",
    "turnovers_offense",
    "turnovers_defense",
    "turnover_margin",
    "def_tackles_for_loss",
    "penalty_yards",
    "fg_pct",
    "pat_pct",
];

/// Raw box-score columns the aggregator needs. A source missing any of these
/// fails with a schema error before any derivation runs.
pub const RAW_REQUIRED: [&str; 17] = [
    "completions",
    "attempts",
    "passing_yards",
    "passing_tds",
    "passing_interceptions",
    "sack_fumbles_lost",
    "rushing_fumbles_lost",
    "receiving_fumbles_lost",
    "rushing_yards",
    "rushing_tds",
    "sacks_suffered",
    "def_interceptions",
    "def_fumbles",
    "def_tackles_for_loss",
    "penalty_yards",
    "fg_pct",
    "pat_pct",
];

#[derive(Debug)]
pub struct FeatureSchema {
    version: u32,
    stats: Vec<&'static str>,
}

static SCHEMA_V1: Lazy<FeatureSchema> = Lazy::new(|| FeatureSchema {
    version: SCHEMA_VERSION,
    stats: TRACKED_STATS.to_vec(),
});

impl FeatureSchema {
    pub fn current() -> &'static FeatureSchema {
        &SCHEMA_V1
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn stats(&self) -> &[&'static str] {
        &self.stats
    }

    pub fn index_of(&self, stat: &str) -> Option<usize> {
        self.stats.iter().position(|s| *s == stat)
    }

    /// Column name a smoothed statistic is exposed under.
    pub fn ewma_name(&self, idx: usize) -> String {
        format!("{}_ewma", self.stats[idx])
    }

    /// Column name a home-minus-away differential is exposed under. These are
    /// the feature names stored inside fitted scaler/model artifacts.
    pub fn diff_name(&self, idx: usize) -> String {
        format!("diff_{}", self.stats[idx])
    }

    pub fn diff_names(&self) -> Vec<String> {
        (0..self.stats.len()).map(|i| self.diff_name(i)).collect()
    }

    /// Byte-for-byte check of a fitted feature-name list against this schema.
    /// Any divergence in set, order, or spelling is fatal.
    pub fn validate_feature_names(&self, names: &[String]) -> Result<(), PipelineError> {
        let expected = self.diff_names();
        if names != expected.as_slice() {
            return Err(PipelineError::FeatureMismatch {
                expected: expected.join(","),
                actual: names.join(","),
            });
        }
        Ok(())
    }
}
