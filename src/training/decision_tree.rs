//! Decision tree classifier

use crate::error::{CardioError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Gains at or below this are treated as no improvement
const MIN_GAIN: f64 = 1e-12;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with class proportions, indexed like the tree's classes
    Leaf {
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Shannon entropy
    Entropy,
}

impl Criterion {
    fn impurity(&self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        match self {
            Criterion::Gini => {
                1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
            }
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }
}

/// Midpoint between two consecutive sorted values.
///
/// Adjacent floats can have a midpoint that rounds up to `next`, which would
/// send `next` left; `current` is used instead in that case.
fn split_threshold(current: f64, next: f64) -> f64 {
    let mid = (current + next) / 2.0;
    if mid >= next {
        current
    } else {
        mid
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Gini => write!(f, "gini"),
            Criterion::Entropy => write!(f, "entropy"),
        }
    }
}

impl FromStr for Criterion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            other => Err(format!("unknown criterion '{}' (expected gini or entropy)", other)),
        }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random per split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for feature sampling
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Class labels, sorted ascending
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            feature_importances: None,
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

    /// Set number of features sampled per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fix the class list instead of deriving it from `y`.
    ///
    /// Used by ensembles so every member reports probabilities over the same
    /// classes even when a bootstrap sample misses one.
    pub fn with_classes(mut self, classes: Vec<f64>) -> Self {
        self.classes = classes;
        self
    }

    /// Fit the tree to training data
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
                "cannot fit a tree on zero samples".to_string(),
            ));
        }

        self.n_features = n_features;

        if self.classes.is_empty() {
            let mut classes: Vec<f64> = y.iter().copied().collect();
            classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            classes.dedup();
            self.classes = classes;
        }

        let y_idx: Vec<usize> = y
            .iter()
            .map(|label| {
                self.classes
                    .iter()
                    .position(|c| (c - label).abs() < 1e-9)
                    .ok_or_else(|| {
                        CardioError::TrainingError(format!("label {} is not a known class", label))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, &y_idx, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn class_counts(&self, y_idx: &[usize], indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes.len()];
        for &i in indices {
            counts[y_idx[i]] += 1;
        }
        counts
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y_idx: &[usize],
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = self.class_counts(y_idx, indices);
        let impurity = self.criterion.impurity(&counts, n_samples);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || counts.iter().filter(|&&c| c > 0).count() <= 1;

        if should_stop {
            return self.leaf(&counts, n_samples);
        }

        let Some((feature_idx, threshold, gain)) = self.find_best_split(x, y_idx, indices, impurity, rng) else {
            return self.leaf(&counts, n_samples);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        importances[feature_idx] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, y_idx, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y_idx, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn leaf(&self, counts: &[usize], n_samples: usize) -> TreeNode {
        let n = n_samples.max(1) as f64;
        TreeNode::Leaf {
            distribution: counts.iter().map(|&c| c as f64 / n).collect(),
            n_samples,
        }
    }

    /// Best (feature, threshold, gain) over a random feature subset.
    ///
    /// Each candidate feature is scanned once over its sorted values, moving
    /// samples from the right partition to the left.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y_idx: &[usize],
        indices: &[usize],
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, f64)> {
        let n_features = x.ncols();
        let k = self.max_features.unwrap_or(n_features).clamp(1, n_features);

        let mut candidates: Vec<usize> = if k < n_features {
            rand::seq::index::sample(rng, n_features, k).into_vec()
        } else {
            (0..n_features).collect()
        };
        candidates.sort_unstable();

        let n_classes = self.classes.len();
        let n = indices.len();
        let total_counts = self.class_counts(y_idx, indices);

        let feature_results: Vec<Option<(usize, f64, f64)>> = candidates
            .into_par_iter()
            .map(|feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| {
                    x[[a, feature_idx]]
                        .partial_cmp(&x[[b, feature_idx]])
                        .unwrap_or(Ordering::Equal)
                });

                let mut left_counts = vec![0usize; n_classes];
                let mut right_counts = total_counts.clone();
                let mut best: Option<(f64, f64)> = None;

                for pos in 0..n - 1 {
                    let class = y_idx[order[pos]];
                    left_counts[class] += 1;
                    right_counts[class] -= 1;

                    let current = x[[order[pos], feature_idx]];
                    let next = x[[order[pos + 1], feature_idx]];
                    if next <= current {
                        continue;
                    }

                    let n_left = pos + 1;
                    let n_right = n - n_left;
                    if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (n_left as f64 * self.criterion.impurity(&left_counts, n_left)
                        + n_right as f64 * self.criterion.impurity(&right_counts, n_right))
                        / n as f64;
                    let gain = parent_impurity - weighted;

                    if gain > MIN_GAIN && best.map_or(true, |(g, _)| gain > g) {
                        best = Some((gain, split_threshold(current, next)));
                    }
                }

                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        // First feature wins ties so results do not depend on scheduling
        feature_results
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<(usize, f64, f64)>, cand| match acc {
                Some(a) if a.2 >= cand.2 => Some(a),
                _ => Some(cand),
            })
    }

    /// Class probabilities, one column per entry of [`classes`](Self::classes)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root.as_ref().ok_or(CardioError::ModelNotFitted)?;
        self.check_width(x)?;

        let n_classes = self.classes.len();
        let mut proba = Array2::zeros((x.nrows(), n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let dist = Self::leaf_distribution(root, row);
            for (j, &p) in dist.iter().enumerate() {
                proba[[i, j]] = p;
            }
        }
        Ok(proba)
    }

    /// Predicted class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| self.classes[argmax(row)])
            .collect())
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features {
            return Err(CardioError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    fn leaf_distribution<'a>(node: &'a TreeNode, sample: ArrayView1<f64>) -> &'a [f64] {
        match node {
            TreeNode::Leaf { distribution, .. } => distribution,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    Self::leaf_distribution(left, sample)
                } else {
                    Self::leaf_distribution(right, sample)
                }
            }
        }
    }

    /// Root node, `None` before fitting
    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    /// Class labels in probability-column order
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Number of features seen during fit
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Split levels on the longest root-to-leaf path, matching `max_depth`
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, node_depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, count_leaves)
    }

    /// Total node count (splits and leaves)
    pub fn get_n_nodes(&self) -> usize {
        self.root.as_ref().map_or(0, count_nodes)
    }
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax(row: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (j, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = j;
        }
    }
    best
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 0,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn count_leaves(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
    }
}

fn count_nodes(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => 1 + count_nodes(left) + count_nodes(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_criterion_from_str() {
        assert_eq!("entropy".parse::<Criterion>().unwrap(), Criterion::Entropy);
        assert_eq!("Gini".parse::<Criterion>().unwrap(), Criterion::Gini);
        assert!("mse".parse::<Criterion>().is_err());
        assert_eq!(Criterion::Entropy.to_string(), "entropy");
    }

    #[test]
    fn test_entropy_tree_fits() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_criterion(Criterion::Entropy);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_depth(), 1);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_threshold_between_adjacent_floats() {
        let current = 1.0f64;
        let next = f64::from_bits(current.to_bits() + 1);
        let threshold = split_threshold(current, next);
        assert!(current <= threshold && threshold < next);
        assert_eq!(split_threshold(1.0, 3.0), 2.0);
    }

    #[test]
    fn test_adjacent_values_split_cleanly() {
        let next = f64::from_bits(1.0f64.to_bits() + 1);
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 1.0, next, next]).unwrap();
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_random_state(0);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_impurity_measures() {
        assert_eq!(Criterion::Gini.impurity(&[5, 0], 5), 0.0);
        assert!((Criterion::Gini.impurity(&[5, 5], 10) - 0.5).abs() < 1e-12);
        assert!((Criterion::Entropy.impurity(&[5, 5], 10) - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0], [5.0, 1.0], [6.0, 2.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_depth(), 2);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![0.0, 0.0, 1.0, 1.0, 0.0];

        let mut tree = DecisionTree::new().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        // second feature is constant
        assert!(importances[0] > importances[1]);
        assert_eq!(tree.get_n_leaves(), 2);
        assert_eq!(tree.get_n_nodes(), 3);
    }

    #[test]
    fn test_preset_classes_keep_width() {
        let x = array![[0.0], [1.0]];
        let y = array![1.0, 1.0];

        let mut tree = DecisionTree::new().with_classes(vec![0.0, 1.0]);
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        assert_eq!(proba[[0, 1]], 1.0);
    }

    #[test]
    fn test_unfitted() {
        let tree = DecisionTree::new();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(CardioError::ModelNotFitted)));
    }
}
