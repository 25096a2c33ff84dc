//! Model training module
//!
//! Provides the trainer half of the batch job:
//! - Decision trees and Random Forests
//! - Stratified train/test splitting
//! - The scaler + forest pipeline and its evaluation report
//! - `train_and_export`, which drives a full run

mod config;
mod engine;
mod metrics;
mod pipeline;
mod split;
pub mod decision_tree;
pub mod random_forest;

pub use config::TrainingConfig;
pub use engine::{TrainOutput, train_and_export};
pub use metrics::{ClassMetrics, EvaluationReport};
pub use pipeline::{Pipeline, FittedPipeline, Stage};
pub use split::{TrainTestSplit, train_test_split, test_count};
pub use decision_tree::{DecisionTree, TreeNode, Criterion};
pub use random_forest::{RandomForest, MaxFeatures};
