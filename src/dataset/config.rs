//! Loader configuration

use serde::{Deserialize, Serialize};

/// What to do with columns that are neither a declared feature nor the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExtraColumnPolicy {
    /// Leave them in the table; projection drops them
    #[default]
    Ignore,
    /// Fail with a schema error listing them
    Reject,
}

/// Settings for reading and cleaning the raw table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Cell value treated as missing
    pub missing_marker: String,
    /// Below this column count the comma parse is considered implausible
    pub min_plausible_columns: usize,
    /// Policy for columns outside the feature contract
    pub extra_columns: ExtraColumnPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            missing_marker: "?".to_string(),
            min_plausible_columns: 10,
            extra_columns: ExtraColumnPolicy::Ignore,
        }
    }
}

impl LoaderConfig {
    /// Set the missing-value marker
    pub fn with_missing_marker(mut self, marker: impl Into<String>) -> Self {
        self.missing_marker = marker.into();
        self
    }

    /// Set the plausibility threshold for the comma parse
    pub fn with_min_plausible_columns(mut self, n: usize) -> Self {
        self.min_plausible_columns = n;
        self
    }

    /// Set the extra-column policy
    pub fn with_extra_columns(mut self, policy: ExtraColumnPolicy) -> Self {
        self.extra_columns = policy;
        self
    }
}
