//! cardiofit CLI Module
//!
//! Command-line interface for training, batch prediction and graph inspection.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::AppConfig;
use crate::dataset::{self, ExtraColumnPolicy, LoadSummary};
use crate::error::CardioError;
use crate::export::{inspect_graph, load_checkpoint, FsArtifactSink, GraphSignature};
use crate::training::{train_and_export, Criterion, EvaluationReport, FittedPipeline, MaxFeatures};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<22} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
    let _ = std::io::stdout().flush();
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

/// Tag a library error with the stage it came from
fn staged<T>(result: crate::error::Result<T>) -> anyhow::Result<T> {
    result.map_err(|e: CardioError| {
        let stage = e.stage();
        anyhow::Error::new(e).context(format!("{} stage failed", stage))
    })
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cardiofit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and export a heart-disease classification pipeline")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load, train, evaluate and export (the default)
    Train(TrainArgs),

    /// Predict with a saved checkpoint
    Predict {
        /// Checkpoint written by `train`
        #[arg(short, long)]
        checkpoint: PathBuf,

        /// Table with the 13 feature columns
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Print the interface of an exported graph
    Inspect {
        /// Graph file written by `train`
        #[arg(short, long)]
        graph: PathBuf,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct TrainArgs {
    /// Input table [default: heart.csv]
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Checkpoint output path
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Graph output path
    #[arg(long)]
    pub graph: Option<PathBuf>,

    /// Number of trees
    #[arg(long)]
    pub n_estimators: Option<usize>,

    /// Seed for splitting and fitting
    #[arg(long)]
    pub random_state: Option<u64>,

    /// Held-out fraction
    #[arg(long)]
    pub test_size: Option<f64>,

    /// Split without preserving class proportions
    #[arg(long)]
    pub no_stratify: bool,

    /// Maximum tree depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Features tried per split: sqrt, log2, all, a count, or a fraction
    #[arg(long)]
    pub max_features: Option<MaxFeatures>,

    /// Split criterion: gini or entropy
    #[arg(long)]
    pub criterion: Option<Criterion>,

    /// Fit every tree on all training rows
    #[arg(long)]
    pub no_bootstrap: bool,

    /// Fail when the table has columns beyond the features and target
    #[arg(long)]
    pub reject_extra_columns: bool,
}

impl TrainArgs {
    /// Configuration file (or defaults) with flag overrides applied
    pub fn resolve_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => staged(AppConfig::from_json_file(path))?,
            None => AppConfig::default(),
        };

        if let Some(path) = &self.checkpoint {
            config.export.checkpoint_path = path.clone();
        }
        if let Some(path) = &self.graph {
            config.export.graph_path = path.clone();
        }
        if let Some(n) = self.n_estimators {
            config.training.n_estimators = n;
        }
        if let Some(seed) = self.random_state {
            config.training.random_state = seed;
        }
        if let Some(test_size) = self.test_size {
            config.training.test_size = test_size;
        }
        if self.no_stratify {
            config.training.stratify = false;
        }
        if let Some(depth) = self.max_depth {
            config.training.max_depth = Some(depth);
        }
        if let Some(max_features) = self.max_features {
            config.training.max_features = max_features;
        }
        if let Some(criterion) = self.criterion {
            config.training.criterion = criterion;
        }
        if self.no_bootstrap {
            config.training.bootstrap = false;
        }
        if self.reject_extra_columns {
            config.loader.extra_columns = ExtraColumnPolicy::Reject;
        }

        staged(config.validate())?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(args: &TrainArgs) -> anyhow::Result<()> {
    let config = args.resolve_config()?;
    let data_path = args.data.clone().unwrap_or_else(|| PathBuf::from("heart.csv"));

    section("Dataset");
    step_run(&format!("Loading {}", data_path.display()));
    let start = Instant::now();
    let data = staged(dataset::load_and_clean(&data_path, &config.loader))
        .with_context(|| format!("could not prepare {}", data_path.display()))?;
    step_done(&format!("{} rows in {:?}", data.n_rows(), start.elapsed()));
    print_load_summary(&data.summary);

    let mut export = config.export.clone();
    export.target_column = data.summary.schema.target_col.clone();

    section("Train");
    step_run(&format!(
        "Fitting scaler + {} trees",
        config.training.n_estimators.to_string().cyan()
    ));
    let mut sink = FsArtifactSink::from_config(&export);
    let output = staged(train_and_export(
        &data.features,
        &data.labels,
        &config.training,
        &export,
        &mut sink,
    ))?;
    step_done(&format!("{:.3}s", output.training_time_secs));
    print_forest(&output.pipeline);

    section("Evaluation");
    print_report(&output.report);

    section("Feature importance");
    print_importances(&output.pipeline);

    section("Artifacts");
    kv("Checkpoint", &sink.checkpoint_path().display().to_string());
    kv("Graph", &sink.graph_path().display().to_string());
    kv("Graph input", &output.graph.input().to_string());
    println!();

    Ok(())
}

pub fn cmd_predict(checkpoint_path: &Path, data_path: &Path) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading checkpoint");
    let checkpoint = staged(load_checkpoint(checkpoint_path))
        .with_context(|| format!("could not read {}", checkpoint_path.display()))?;
    step_done(&format!("target '{}'", checkpoint.metadata.target_column));

    step_run(&format!("Reading {}", data_path.display()));
    let loader = dataset::LoaderConfig::default();
    let (mut df, _) = staged(dataset::load_table(data_path, &loader))?;
    staged(dataset::normalize_column_names(&mut df))?;
    let cleaned = staged(dataset::clean_table(df, &loader.missing_marker))?;
    let features = staged(dataset::project_features(cleaned.frame()))?;
    step_done(&format!(
        "{} rows ({} dropped)",
        cleaned.rows_after(),
        cleaned.rows_before() - cleaned.rows_after()
    ));

    let pipeline = checkpoint.into_pipeline();
    let labels = staged(pipeline.predict(&features))?;
    let proba = staged(pipeline.predict_proba(&features))?;
    let positive = proba.ncols().saturating_sub(1);

    println!();
    println!("  {:>6}  {:>6}  {:>10}", muted("row"), muted("label"), muted("p(positive)"));
    for (i, label) in labels.iter().enumerate() {
        println!("  {:>6}  {:>6}  {:>10.4}", i, label, proba[[i, positive]]);
    }
    println!();

    Ok(())
}

pub fn cmd_inspect(graph_path: &Path) -> anyhow::Result<()> {
    section("Graph");
    let bytes = std::fs::read(graph_path)
        .with_context(|| format!("could not read {}", graph_path.display()))?;
    let signature = staged(inspect_graph(&bytes))?;
    print_signature(&signature);
    println!();
    Ok(())
}

// ─── Rendering ─────────────────────────────────────────────────────────────────

fn print_load_summary(summary: &LoadSummary) {
    let schema = &summary.schema;
    kv("Columns found", &summary.columns.join(", "));
    kv("Raw shape", &format!("{} × {}", summary.raw_shape.0, summary.raw_shape.1));
    kv("Delimiter", &schema.delimiter.to_string());
    kv(
        "After cleaning",
        &format!("{} rows ({} dropped)", summary.rows_after_cleaning, summary.raw_shape.0 - summary.rows_after_cleaning),
    );
    kv("Target column", &format!("{} ({})", schema.target_col, schema.target_source));
    if schema.needs_binarization {
        kv("Labels", &format!("{} distinct values binarized to 0/1", schema.target_distinct));
    }
    if !summary.extra_columns.is_empty() {
        kv("Ignored columns", &summary.extra_columns.join(", "));
    }
    kv("Class distribution", &format_distribution(&summary.class_distribution));
}

fn format_distribution(dist: &BTreeMap<i64, usize>) -> String {
    dist.iter()
        .map(|(label, count)| format!("{}: {}", label, count))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_report(report: &EvaluationReport) {
    println!(
        "  {:<22} {}",
        muted("Accuracy"),
        format!("{:.4}", report.accuracy).white().bold()
    );
    kv("Train / test rows", &format!("{} / {}", report.n_train, report.n_test));
    println!();
    for line in report.to_string().lines() {
        println!("  {}", line);
    }
    println!();
    println!("  {}", muted("Confusion matrix (rows: true, columns: predicted)"));
    for (label, row) in report.classes.iter().zip(&report.confusion_matrix) {
        let cells: Vec<String> = row.iter().map(|c| format!("{:>6}", c)).collect();
        println!("  {:>6} {}", label, cells.join(""));
    }
}

fn print_forest(pipeline: &FittedPipeline) {
    let config = pipeline.config();
    let forest = pipeline.forest();
    kv(
        "Forest",
        &format!(
            "{} trees, {} criterion, max_features {}{}",
            forest.trees().len(),
            config.criterion,
            config.max_features,
            if config.bootstrap { ", bootstrap" } else { "" }
        ),
    );
    kv(
        "Tree shape",
        &format!(
            "mean depth {:.1}, mean leaves {:.1}",
            forest.mean_depth(),
            forest.mean_n_leaves()
        ),
    );
}

fn print_importances(pipeline: &FittedPipeline) {
    for (name, score) in pipeline.feature_importances() {
        let bar = "█".repeat((score * 40.0).round() as usize);
        println!("  {:<10} {:>6.3} {}", muted(&name), score, accent(&bar));
    }
}

fn print_signature(signature: &GraphSignature) {
    kv("Producer", &signature.producer_name);
    for input in &signature.inputs {
        kv("Input", &input.to_string());
    }
    for output in &signature.outputs {
        kv("Output", &output.to_string());
    }
    kv("Operators", &signature.operators.join(" → "));
    let opsets: Vec<String> = signature
        .opsets
        .iter()
        .map(|(domain, version)| {
            let domain = if domain.is_empty() { "ai.onnx" } else { domain.as_str() };
            format!("{} v{}", domain, version)
        })
        .collect();
    kv("Opsets", &opsets.join(", "));
    if !signature.feature_names.is_empty() {
        kv("Feature order", &signature.feature_names.join(", "));
    }
    if let Some(target) = &signature.target_column {
        kv("Target column", target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_train_flags() {
        let cli = Cli::try_parse_from([
            "cardiofit", "train", "--data", "h.csv", "--n-estimators", "25", "--no-stratify",
        ])
        .unwrap();

        let Some(Commands::Train(args)) = cli.command else {
            panic!("expected train subcommand");
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.training.n_estimators, 25);
        assert!(!config.training.stratify);
        assert_eq!(args.data, Some(PathBuf::from("h.csv")));
    }

    #[test]
    fn test_cli_parses_forest_flags() {
        let cli = Cli::try_parse_from([
            "cardiofit", "train", "--max-features", "log2", "--criterion", "entropy",
            "--max-depth", "6", "--no-bootstrap",
        ])
        .unwrap();

        let Some(Commands::Train(args)) = cli.command else {
            panic!("expected train subcommand");
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.training.max_features, MaxFeatures::Log2);
        assert_eq!(config.training.criterion, Criterion::Entropy);
        assert_eq!(config.training.max_depth, Some(6));
        assert!(!config.training.bootstrap);

        let cli = Cli::try_parse_from(["cardiofit", "train", "--max-features", "0.4"]).unwrap();
        let Some(Commands::Train(args)) = cli.command else {
            panic!("expected train subcommand");
        };
        assert_eq!(args.max_features, Some(MaxFeatures::Fraction(0.4)));

        assert!(Cli::try_parse_from(["cardiofit", "train", "--criterion", "mse"]).is_err());
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["cardiofit"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_flag_validation() {
        let args = TrainArgs {
            test_size: Some(0.0),
            ..Default::default()
        };
        let err = args.resolve_config().unwrap_err();
        assert!(err.to_string().contains("config stage failed"));
    }

    #[test]
    fn test_format_distribution() {
        let dist = BTreeMap::from([(0, 160), (1, 137)]);
        assert_eq!(format_distribution(&dist), "0: 160, 1: 137");
    }
}
