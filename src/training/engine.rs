//! Training engine: split, fit, evaluate, export

use crate::error::Result;
use crate::export::{
    encode_checkpoint, lower_pipeline, ArtifactSink, CheckpointMetadata, ExportConfig, ExportedGraph,
};
use super::config::TrainingConfig;
use super::metrics::EvaluationReport;
use super::pipeline::{FittedPipeline, Pipeline};
use super::split::train_test_split;
use ndarray::{Array1, Array2};
use std::time::Instant;
use tracing::info;

/// Everything one training run produces
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub pipeline: FittedPipeline,
    pub report: EvaluationReport,
    pub graph: ExportedGraph,
    /// Wall-clock seconds spent fitting
    pub training_time_secs: f64,
}

/// Run the whole batch job against prepared features and labels.
///
/// Order: validate config, split, fit on the training rows, evaluate on the
/// held-out rows, write the checkpoint, lower to ONNX, write the graph. The
/// checkpoint is written before lowering, so a failed export can leave a
/// checkpoint behind.
pub fn train_and_export(
    features: &Array2<f64>,
    labels: &Array1<i64>,
    training: &TrainingConfig,
    export: &ExportConfig,
    sink: &mut dyn ArtifactSink,
) -> Result<TrainOutput> {
    training.validate()?;

    let split = train_test_split(
        features,
        labels,
        training.test_size,
        training.stratify,
        training.random_state,
    )?;
    info!("Train/test split: {} / {} rows", split.n_train(), split.n_test());

    let start = Instant::now();
    let pipeline = Pipeline::new(training.clone()).fit(&split.x_train, &split.y_train)?;
    let training_time_secs = start.elapsed().as_secs_f64();
    info!("Pipeline fitted in {:.2}s", training_time_secs);

    let report = pipeline.evaluate(&split.x_test, &split.y_test, split.n_train())?;
    info!("Test accuracy: {:.4}", report.accuracy);

    let metadata = CheckpointMetadata::new(&pipeline, export.target_column.clone())
        .with_accuracy(report.accuracy);
    let checkpoint = encode_checkpoint(&pipeline, &metadata)?;
    sink.write_checkpoint(&checkpoint)?;

    let graph = lower_pipeline(&pipeline, export)?;
    sink.write_graph(graph.bytes())?;
    info!("Artifacts written to {}", sink.describe());

    Ok(TrainOutput {
        pipeline,
        report,
        graph,
        training_time_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CardioError;
    use crate::export::{Checkpoint, MemorySink};

    fn dataset(n: usize) -> (Array2<f64>, Array1<i64>) {
        let x = Array2::from_shape_fn((n, 13), |(i, j)| {
            let signal = if i % 2 == 0 { 1.0 } else { -1.0 };
            signal * (j as f64 + 1.0) + ((i * 7 + j * 3) % 11) as f64 * 0.1
        });
        let y = Array1::from_shape_fn(n, |i| (i % 2) as i64);
        (x, y)
    }

    #[test]
    fn test_train_and_export_to_memory() {
        let (x, y) = dataset(100);
        let mut sink = MemorySink::new();
        let config = TrainingConfig::default().with_n_estimators(10);

        let output = train_and_export(&x, &y, &config, &ExportConfig::default(), &mut sink).unwrap();

        assert_eq!(output.report.n_train, 80);
        assert_eq!(output.report.n_test, 20);
        assert!(output.report.accuracy >= 0.0 && output.report.accuracy <= 1.0);
        assert_eq!(sink.graph.as_deref(), Some(output.graph.bytes()));

        let checkpoint = Checkpoint::from_bytes(sink.checkpoint.as_deref().unwrap()).unwrap();
        assert_eq!(checkpoint.metadata.accuracy, Some(output.report.accuracy));
    }

    #[test]
    fn test_unstratified_split_sizes() {
        let (x, y) = dataset(50);
        let mut sink = MemorySink::new();
        let config = TrainingConfig::default()
            .with_n_estimators(5)
            .with_stratify(false);

        let output = train_and_export(&x, &y, &config, &ExportConfig::default(), &mut sink).unwrap();
        assert_eq!(output.report.n_train, 40);
        assert_eq!(output.report.n_test, 10);
        assert!(!output.pipeline.config().stratify);
    }

    #[test]
    fn test_invalid_config_writes_nothing() {
        let (x, y) = dataset(20);
        let mut sink = MemorySink::new();
        let config = TrainingConfig::default().with_test_size(1.5);

        let err = train_and_export(&x, &y, &config, &ExportConfig::default(), &mut sink).unwrap_err();
        assert!(matches!(err, CardioError::InvalidParameter { .. }));
        assert!(sink.checkpoint.is_none());
        assert!(sink.graph.is_none());
    }
}
