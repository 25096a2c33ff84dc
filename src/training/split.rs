//! Train/test partitioning

use crate::error::{CardioError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Disjoint train and test partitions of one dataset
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<i64>,
    pub y_test: Array1<i64>,
    /// Source row of each training row, ascending
    pub train_indices: Vec<usize>,
    /// Source row of each test row, ascending
    pub test_indices: Vec<usize>,
}

impl TrainTestSplit {
    pub fn n_train(&self) -> usize {
        self.train_indices.len()
    }

    pub fn n_test(&self) -> usize {
        self.test_indices.len()
    }
}

/// Rows held out for a given `test_size`
pub fn test_count(n: usize, test_size: f64) -> usize {
    (test_size * n as f64).ceil() as usize
}

/// Split rows into train and test sets.
///
/// The test set has `ceil(test_size * n)` rows. With `stratify`, each class
/// contributes test rows in proportion to its size; remainders go to the
/// classes with the largest fractional share.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<i64>,
    test_size: f64,
    stratify: bool,
    random_state: u64,
) -> Result<TrainTestSplit> {
    let n = x.nrows();
    if n != y.len() {
        return Err(CardioError::ShapeError {
            expected: format!("y length = {}", n),
            actual: format!("y length = {}", y.len()),
        });
    }

    let n_test = test_count(n, test_size);
    if n_test == 0 || n_test >= n {
        return Err(CardioError::InsufficientData(format!(
            "{} rows cannot be split with test_size {}",
            n, test_size
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(random_state);

    let (mut train_indices, mut test_indices) = if stratify {
        stratified_indices(y, n_test, &mut rng)
    } else {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let train = order.split_off(n_test);
        (train, order)
    };

    train_indices.sort_unstable();
    test_indices.sort_unstable();

    let y_train = y.select(Axis(0), &train_indices);
    let y_test = y.select(Axis(0), &test_indices);

    for (name, part) in [("training", &y_train), ("test", &y_test)] {
        if n_distinct(part) < 2 {
            return Err(CardioError::InsufficientData(format!(
                "{} split has fewer than two classes",
                name
            )));
        }
    }

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_indices),
        x_test: x.select(Axis(0), &test_indices),
        y_train,
        y_test,
        train_indices,
        test_indices,
    })
}

fn stratified_indices(y: &Array1<i64>, n_test: usize, rng: &mut ChaCha8Rng) -> (Vec<usize>, Vec<usize>) {
    let n = y.len();

    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    // Largest-remainder allocation of the test quota
    let shares: Vec<f64> = by_class
        .values()
        .map(|rows| rows.len() as f64 * n_test as f64 / n as f64)
        .collect();
    let mut quotas: Vec<usize> = shares.iter().map(|s| s.floor() as usize).collect();
    let mut leftover = n_test - quotas.iter().sum::<usize>();

    let mut by_remainder: Vec<usize> = (0..shares.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let ra = shares[a] - shares[a].floor();
        let rb = shares[b] - shares[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });
    let sizes: Vec<usize> = by_class.values().map(Vec::len).collect();
    while leftover > 0 {
        let before = leftover;
        for &c in &by_remainder {
            if leftover == 0 {
                break;
            }
            if quotas[c] < sizes[c] {
                quotas[c] += 1;
                leftover -= 1;
            }
        }
        if leftover == before {
            break;
        }
    }

    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (rows, &quota) in by_class.into_values().zip(&quotas) {
        let mut rows = rows;
        rows.shuffle(rng);
        test.extend_from_slice(&rows[..quota]);
        train.extend_from_slice(&rows[quota..]);
    }

    (train, test)
}

fn n_distinct(y: &Array1<i64>) -> usize {
    let mut values: Vec<i64> = y.to_vec();
    values.sort_unstable();
    values.dedup();
    values.len()
}
