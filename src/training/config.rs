//! Training configuration

use crate::error::{CardioError, Result};
use super::decision_tree::Criterion;
use super::random_forest::MaxFeatures;
use serde::{Deserialize, Serialize};

/// Hyperparameters and split settings for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Seed for the split and every tree
    pub random_state: u64,
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    /// Keep class proportions in both splits
    pub stratify: bool,
    /// Maximum depth per tree (unbounded when `None`)
    pub max_depth: Option<usize>,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples in a leaf
    pub min_samples_leaf: usize,
    /// Features considered per split
    pub max_features: MaxFeatures,
    /// Split quality measure
    pub criterion: Criterion,
    /// Fit each tree on a bootstrap sample of the training rows
    pub bootstrap: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            random_state: 42,
            test_size: 0.2,
            stratify: true,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            criterion: Criterion::Gini,
            bootstrap: true,
        }
    }
}

impl TrainingConfig {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Reject settings the trainer cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", self.n_estimators, "must be at least 1"));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(invalid("test_size", self.test_size, "must lie strictly between 0 and 1"));
        }
        if self.min_samples_split < 2 {
            return Err(invalid("min_samples_split", self.min_samples_split, "must be at least 2"));
        }
        if self.min_samples_leaf == 0 {
            return Err(invalid("min_samples_leaf", self.min_samples_leaf, "must be at least 1"));
        }
        if self.max_depth == Some(0) {
            return Err(invalid("max_depth", 0, "must be at least 1"));
        }
        match self.max_features {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(invalid("max_features", f, "fraction must lie in (0, 1]"));
            }
            MaxFeatures::Fixed(0) => {
                return Err(invalid("max_features", 0, "must be at least 1"));
            }
            _ => {}
        }
        Ok(())
    }
}

fn invalid(name: &str, value: impl ToString, reason: &str) -> CardioError {
    CardioError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
