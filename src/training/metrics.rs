//! Classification metrics

use crate::error::{CardioError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Precision, recall and F1 for one class (or an average)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Held-out evaluation of a fitted pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Fraction of test rows predicted correctly
    pub accuracy: f64,
    /// Labels seen in truth or predictions, ascending
    pub classes: Vec<i64>,
    /// One entry per class, same order as `classes`
    pub per_class: Vec<ClassMetrics>,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    /// `confusion_matrix[i][j]`: rows of class `i` predicted as class `j`
    pub confusion_matrix: Vec<Vec<usize>>,
    pub n_train: usize,
    pub n_test: usize,
}

impl EvaluationReport {
    /// Compare predictions against the truth.
    ///
    /// Undefined ratios (no predicted or no true rows for a class) are 0.
    pub fn compute(y_true: &Array1<i64>, y_pred: &Array1<i64>, n_train: usize) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(CardioError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(CardioError::InsufficientData(
                "cannot evaluate on an empty test set".to_string(),
            ));
        }

        let mut classes: Vec<i64> = y_true.iter().chain(y_pred.iter()).copied().collect();
        classes.sort_unstable();
        classes.dedup();

        let k = classes.len();
        let mut confusion = vec![vec![0usize; k]; k];
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            // Both labels come from `classes`
            let (Ok(i), Ok(j)) = (classes.binary_search(t), classes.binary_search(p)) else {
                continue;
            };
            confusion[i][j] += 1;
        }

        let n = y_true.len();
        let correct: usize = (0..k).map(|i| confusion[i][i]).sum();

        let per_class: Vec<ClassMetrics> = (0..k)
            .map(|c| {
                let tp = confusion[c][c];
                let predicted: usize = (0..k).map(|r| confusion[r][c]).sum();
                let support: usize = confusion[c].iter().sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics { precision, recall, f1_score, support }
            })
            .collect();

        let macro_avg = average(&per_class, |_| 1.0 / k as f64, n);
        let weighted_avg = average(&per_class, |m| m.support as f64 / n as f64, n);

        Ok(Self {
            accuracy: correct as f64 / n as f64,
            classes,
            per_class,
            macro_avg,
            weighted_avg,
            confusion_matrix: confusion,
            n_train,
            n_test: n,
        })
    }

    /// Metrics for one label, if it appeared
    pub fn class(&self, label: i64) -> Option<&ClassMetrics> {
        self.classes
            .binary_search(&label)
            .ok()
            .map(|i| &self.per_class[i])
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn average(per_class: &[ClassMetrics], weight: impl Fn(&ClassMetrics) -> f64, support: usize) -> ClassMetrics {
    let mut avg = ClassMetrics { precision: 0.0, recall: 0.0, f1_score: 0.0, support };
    for m in per_class {
        let w = weight(m);
        avg.precision += w * m.precision;
        avg.recall += w * m.recall;
        avg.f1_score += w * m.f1_score;
    }
    avg
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for (label, m) in self.classes.iter().zip(&self.per_class) {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                label, m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>14} {:>10} {:>10} {:>10.2} {:>10}", "accuracy", "", "", self.accuracy, self.n_test)?;
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        Ok(())
    }
}
