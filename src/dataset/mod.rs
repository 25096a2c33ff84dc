//! Dataset loading and cleaning
//!
//! Turns a raw delimited table into an aligned feature matrix and label
//! vector:
//! - delimiter detection (comma first, whitespace fallback)
//! - column-name normalization
//! - missing-marker removal and incomplete-row dropping
//! - target resolution and label binarization
//! - projection onto the fixed 13-feature order

mod config;
mod reader;
mod schema;
mod cleaning;

pub use config::{LoaderConfig, ExtraColumnPolicy};
pub use reader::{Delimiter, load_table, parse_table};
pub use schema::{
    SchemaResolution, ResolvedSchema, TargetSource,
    normalize_column_name, normalize_column_names, resolve_target, resolve_schema, check_extra_columns,
};
pub use cleaning::{CleanedTable, mark_missing, clean_table, binarize_labels, extract_labels, project_features};

use crate::error::{CardioError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Ordered feature contract shared by training and the exported graph.
///
/// The position of each name is the column index of the graph input.
pub const FEATURE_COLUMNS: [&str; 13] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg",
    "thalach", "exang", "oldpeak", "slope", "ca", "thal",
];

/// Number of declared features
pub const N_FEATURES: usize = FEATURE_COLUMNS.len();

/// What the loader saw and decided, for console reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSummary {
    /// Column names after normalization
    pub columns: Vec<String>,
    /// (rows, columns) of the raw table
    pub raw_shape: (usize, usize),
    /// Rows left after dropping incomplete ones
    pub rows_after_cleaning: usize,
    pub schema: ResolvedSchema,
    /// Columns ignored by the projection
    pub extra_columns: Vec<String>,
    /// Label value -> row count
    pub class_distribution: BTreeMap<i64, usize>,
}

/// Feature matrix and labels, row aligned
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub features: Array2<f64>,
    pub labels: Array1<i64>,
    pub summary: LoadSummary,
}

impl LoadedDataset {
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn feature_names(&self) -> Vec<String> {
        FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect()
    }
}

/// Read, clean and label the table at `path`.
pub fn load_and_clean(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<LoadedDataset> {
    let path = path.as_ref();
    info!("Loading dataset from {}", path.display());
    let (df, delimiter) = load_table(path, config)?;
    prepare(df, delimiter, config)
}

/// Clean and label an already parsed raw table.
pub fn prepare(mut df: DataFrame, delimiter: Delimiter, config: &LoaderConfig) -> Result<LoadedDataset> {
    let columns = normalize_column_names(&mut df)?;
    let raw_shape = df.shape();
    info!("Columns found: {:?}", columns);
    info!("Dataset shape: {:?} ({} delimited)", raw_shape, delimiter);

    let cleaned = clean_table(df, &config.missing_marker)?;
    if cleaned.rows_after() == 0 {
        return Err(CardioError::InsufficientData(format!(
            "no complete rows left after removing missing values ({} rows before)",
            cleaned.rows_before()
        )));
    }
    let frame = cleaned.frame();

    let schema = resolve_schema(frame, delimiter).into_result()?;
    info!("Using column '{}' as target ({})", schema.target_col, schema.target_source);

    let extra_columns = check_extra_columns(&columns, &schema.target_col, config.extra_columns)?;
    if !extra_columns.is_empty() {
        info!("Ignoring {} extra column(s): {:?}", extra_columns.len(), extra_columns);
    }

    let features = project_features(frame)?;
    let labels = extract_labels(frame, &schema.target_col, schema.needs_binarization)?;

    if !schema.needs_binarization && labels.iter().any(|&l| l != 0 && l != 1) {
        warn!(
            "Target '{}' has {} distinct value(s) outside {{0, 1}}; labels kept as-is",
            schema.target_col, schema.target_distinct
        );
    }

    let class_distribution = class_distribution(&labels);
    info!("Class distribution: {:?}", class_distribution);

    Ok(LoadedDataset {
        features,
        labels,
        summary: LoadSummary {
            columns,
            raw_shape,
            rows_after_cleaning: cleaned.rows_after(),
            schema,
            extra_columns,
            class_distribution,
        },
    })
}

/// Count rows per label
pub fn class_distribution(labels: &Array1<i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}
