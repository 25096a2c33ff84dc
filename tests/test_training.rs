//! Integration test: splitting, pipeline fitting and evaluation

use cardiofit::training::{
    train_test_split, MaxFeatures, Pipeline, RandomForest, Stage, TrainingConfig,
};
use cardiofit::CardioError;
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Synthetic 13-feature table where the label depends on three features.
fn heart_like(n: usize, seed: u64) -> (Array2<f64>, Array1<i64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut x = Array2::zeros((n, 13));
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let label = i64::from(rng.gen_bool(0.45));
        for j in 0..13 {
            x[[i, j]] = rng.gen_range(0.0..10.0);
        }
        if label == 1 {
            x[[i, 2]] += 4.0;
            x[[i, 9]] += 3.0;
            x[[i, 12]] += 5.0;
        }
        y[i] = label;
    }
    (x, y)
}

#[test]
fn test_split_300_rows() {
    let (x, y) = heart_like(300, 1);
    let split = train_test_split(&x, &y, 0.2, true, 42).unwrap();

    assert_eq!(split.n_train(), 240);
    assert_eq!(split.n_test(), 60);
    assert_eq!(split.x_train.nrows(), 240);
    assert_eq!(split.x_test.nrows(), 60);
}

#[test]
fn test_pipeline_accuracy_in_range() {
    let (x, y) = heart_like(300, 2);
    let split = train_test_split(&x, &y, 0.2, true, 42).unwrap();

    let fitted = Pipeline::new(TrainingConfig::default().with_n_estimators(50))
        .fit(&split.x_train, &split.y_train)
        .unwrap();
    let report = fitted.evaluate(&split.x_test, &split.y_test, split.n_train()).unwrap();

    assert!((0.0..=1.0).contains(&report.accuracy));
    // the signal is strong enough for a forest to beat chance comfortably
    assert!(report.accuracy > 0.7, "accuracy {}", report.accuracy);
    assert_eq!(report.n_test, 60);
    assert_eq!(report.classes, vec![0, 1]);
}

#[test]
fn test_scaler_sees_training_rows_only() {
    let (x, y) = heart_like(200, 3);
    let split = train_test_split(&x, &y, 0.25, true, 42).unwrap();

    let fitted = Pipeline::new(TrainingConfig::default().with_n_estimators(5))
        .fit(&split.x_train, &split.y_train)
        .unwrap();

    let train_means = split.x_train.mean_axis(Axis(0)).unwrap();
    for (fitted_mean, expected) in fitted.scaler().means().iter().zip(train_means.iter()) {
        assert!((fitted_mean - expected).abs() < 1e-9);
    }
    let all_means = x.mean_axis(Axis(0)).unwrap();
    assert!(fitted
        .scaler()
        .means()
        .iter()
        .zip(all_means.iter())
        .any(|(a, b)| (a - b).abs() > 1e-9));
}

#[test]
fn test_refit_is_deterministic() {
    let (x, y) = heart_like(150, 4);
    let config = TrainingConfig::default().with_n_estimators(20);

    let a = Pipeline::new(config.clone()).fit(&x, &y).unwrap();
    let b = Pipeline::new(config).fit(&x, &y).unwrap();

    assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
}

#[test]
fn test_stage_order() {
    let (x, y) = heart_like(60, 5);
    let fitted = Pipeline::new(TrainingConfig::default().with_n_estimators(3))
        .fit(&x, &y)
        .unwrap();

    let stages = fitted.stages();
    assert!(matches!(stages[0], Stage::Scaler(_)));
    assert!(matches!(stages[1], Stage::Classifier(_)));
}

#[test]
fn test_forest_importances_favour_signal() {
    let (x, y) = heart_like(300, 6);
    let mut forest = RandomForest::new_classifier(40)
        .with_random_state(42)
        .with_max_depth(4)
        .with_max_features(MaxFeatures::Sqrt);
    forest.fit(&x, &y.mapv(|v| v as f64)).unwrap();

    let importances = forest.feature_importances().unwrap();
    assert!((importances.sum() - 1.0).abs() < 1e-9);
    let signal = importances[2] + importances[9] + importances[12];
    assert!(signal > 0.4, "signal importance {}", signal);
}

#[test]
fn test_single_class_is_insufficient() {
    let (x, _) = heart_like(50, 7);
    let y = Array1::zeros(50);

    let err = train_test_split(&x, &y, 0.2, true, 42).unwrap_err();
    assert!(matches!(err, CardioError::InsufficientData(_)));
}
