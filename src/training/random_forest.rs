//! Random Forest classifier

use crate::error::{CardioError, Result};
use super::decision_tree::{argmax, Criterion, DecisionTree};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Maximum features per split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
    /// Class labels, sorted ascending
    classes: Vec<f64>,
}

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    /// Features drawn per split for a table of `n_features` columns (at least 1)
    pub fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxFeatures::Sqrt => write!(f, "sqrt"),
            MaxFeatures::Log2 => write!(f, "log2"),
            MaxFeatures::Fraction(v) => write!(f, "{}", v),
            MaxFeatures::Fixed(n) => write!(f, "{}", n),
            MaxFeatures::All => write!(f, "all"),
        }
    }
}

/// Accepts `sqrt`, `log2`, `all`, an integer count, or a fraction in (0, 1].
impl FromStr for MaxFeatures {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqrt" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            "all" => Ok(MaxFeatures::All),
            other => {
                if let Ok(n) = other.parse::<usize>() {
                    return Ok(MaxFeatures::Fixed(n));
                }
                match other.parse::<f64>() {
                    Ok(v) if v > 0.0 && v <= 1.0 => Ok(MaxFeatures::Fraction(v)),
                    _ => Err(format!(
                        "invalid max features '{}' (expected sqrt, log2, all, a count or a fraction in (0, 1])",
                        other
                    )),
                }
            }
        }
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new_classifier(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            feature_importances: None,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set impurity criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Toggle bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the forest to training data.
    ///
    /// Tree `i` draws its bootstrap sample and split seed from
    /// `random_state + i`, and trees are collected in index order, so the
    /// fitted forest does not depend on thread scheduling.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(CardioError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(CardioError::InsufficientData(
                "cannot fit a forest on zero samples".to_string(),
            ));
        }
        if self.n_estimators == 0 {
            return Err(CardioError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        self.n_features = n_features;
        let max_features = self.max_features.resolve(n_features);

        let mut classes: Vec<f64> = y.iter().copied().collect();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        classes.dedup();
        self.classes = classes;

        let base_seed = self.random_state.unwrap_or(42);

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion)
                    .with_max_features(max_features)
                    .with_random_state(rng.next_u64())
                    .with_classes(self.classes.clone());

                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (total, &val) in total_importances.iter_mut().zip(imp.iter()) {
                    *total += val;
                }
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Mean of the per-tree class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(CardioError::ModelNotFitted);
        }

        let all_proba: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for p in &all_proba {
            proba += p;
        }
        proba /= self.trees.len() as f64;

        Ok(proba)
    }

    /// Class with the highest mean probability; ties go to the smaller label
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| self.classes[argmax(row)])
            .collect())
    }

    /// Fitted trees in seed order
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Class labels in probability-column order
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Number of features seen during fit
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Mean tree depth, 0 before fitting
    pub fn mean_depth(&self) -> f64 {
        self.mean_over_trees(DecisionTree::get_depth)
    }

    /// Mean leaf count per tree, 0 before fitting
    pub fn mean_n_leaves(&self) -> f64 {
        self.mean_over_trees(DecisionTree::get_n_leaves)
    }

    fn mean_over_trees(&self, stat: fn(&DecisionTree) -> usize) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(stat).sum::<usize>() as f64 / self.trees.len() as f64
    }
}
