//! Two-stage classification pipeline: standardization, then a random forest.
//!
//! [`Pipeline`] is the unfitted form. Fitting consumes it and yields a
//! [`FittedPipeline`], which has no way to be fitted again.

use crate::dataset::FEATURE_COLUMNS;
use crate::error::{CardioError, Result};
use crate::preprocessing::StandardScaler;
use super::config::TrainingConfig;
use super::metrics::EvaluationReport;
use super::random_forest::RandomForest;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Unfitted pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: TrainingConfig,
    feature_names: Vec<String>,
}

impl Pipeline {
    /// Empty pipeline over the standard 13 features
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            feature_names: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Override the ordered input feature names
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = names;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit the scaler on `x`, then the forest on the scaled rows.
    pub fn fit(self, x: &Array2<f64>, y: &Array1<i64>) -> Result<FittedPipeline> {
        self.config.validate()?;

        if x.ncols() != self.feature_names.len() {
            return Err(CardioError::ShapeError {
                expected: format!("{} features", self.feature_names.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut scaler = StandardScaler::new();
        let x_scaled = scaler.fit_transform(x)?;
        debug!("Scaler fitted on {} rows", x.nrows());

        let mut forest = RandomForest::new_classifier(self.config.n_estimators)
            .with_random_state(self.config.random_state)
            .with_min_samples_split(self.config.min_samples_split)
            .with_min_samples_leaf(self.config.min_samples_leaf)
            .with_max_features(self.config.max_features)
            .with_criterion(self.config.criterion)
            .with_bootstrap(self.config.bootstrap);
        if let Some(depth) = self.config.max_depth {
            forest = forest.with_max_depth(depth);
        }

        let y_float: Array1<f64> = y.mapv(|v| v as f64);
        forest.fit(&x_scaled, &y_float)?;
        info!(
            "Random forest fitted: {} trees, {} classes, mean depth {:.1}, mean leaves {:.1}",
            forest.trees().len(),
            forest.classes().len(),
            forest.mean_depth(),
            forest.mean_n_leaves()
        );

        Ok(FittedPipeline {
            scaler,
            forest,
            feature_names: self.feature_names,
            config: self.config,
        })
    }
}

/// Borrowed view of one pipeline stage, in execution order
#[derive(Debug, Clone, Copy)]
pub enum Stage<'a> {
    Scaler(&'a StandardScaler),
    Classifier(&'a RandomForest),
}

impl Stage<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Scaler(_) => "scaler",
            Stage::Classifier(_) => "classifier",
        }
    }

    pub fn is_fitted(&self) -> bool {
        match self {
            Stage::Scaler(s) => s.is_fitted(),
            Stage::Classifier(f) => f.is_fitted(),
        }
    }
}

/// Fitted scaler and forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    scaler: StandardScaler,
    forest: RandomForest,
    feature_names: Vec<String>,
    config: TrainingConfig,
}

impl FittedPipeline {
    /// Class probabilities, columns ordered like [`classes`](Self::classes)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let x_scaled = self.scaler.transform(x)?;
        self.forest.predict_proba(&x_scaled)
    }

    /// Predicted label per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let x_scaled = self.scaler.transform(x)?;
        let labels = self.forest.predict(&x_scaled)?;
        Ok(labels.mapv(|v| v.round() as i64))
    }

    /// Predict `x` and score against `y`
    pub fn evaluate(&self, x: &Array2<f64>, y: &Array1<i64>, n_train: usize) -> Result<EvaluationReport> {
        let predictions = self.predict(x)?;
        EvaluationReport::compute(y, &predictions, n_train)
    }

    /// Stages in execution order
    pub fn stages(&self) -> [Stage<'_>; 2] {
        [Stage::Scaler(&self.scaler), Stage::Classifier(&self.forest)]
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Input column names, in matrix order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Class labels in probability-column order
    pub fn classes(&self) -> Vec<i64> {
        self.forest.classes().iter().map(|c| c.round() as i64).collect()
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Forest impurity importances paired with feature names, most important first
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let Some(importances) = self.forest.feature_importances() else {
            return Vec::new();
        };
        let mut ranked: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        // stable sort keeps feature order among equal scores
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}
