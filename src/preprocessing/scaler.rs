//! Standardization stage

use crate::error::{CardioError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Parameters for one fitted column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// Column mean
    pub center: f64,
    /// Population standard deviation, 1.0 for constant columns
    pub scale: f64,
}

/// Z-score scaler: (x - mean) / std, fitted column by column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    /// Create an unfitted scaler
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit per-column mean and variance (ddof = 0).
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(CardioError::InsufficientData(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }

        self.params = x
            .axis_iter(Axis(1))
            .map(|col| {
                let n = col.len() as f64;
                let mean = col.sum() / n;
                let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                ScalerParams {
                    center: mean,
                    scale: if std == 0.0 { 1.0 } else { std },
                }
            })
            .collect();

        self.is_fitted = true;
        Ok(self)
    }

    /// Standardize `x` with the fitted parameters.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(CardioError::ModelNotFitted);
        }
        if x.ncols() != self.params.len() {
            return Err(CardioError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.to_owned();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(&self.params) {
            col.mapv_inplace(|v| (v - p.center) / p.scale);
        }
        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Number of columns seen during fit
    pub fn n_features(&self) -> usize {
        self.params.len()
    }

    /// Per-column means
    pub fn means(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.center).collect()
    }

    /// Per-column scales (standard deviations)
    pub fn scales(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.scale).collect()
    }
}
