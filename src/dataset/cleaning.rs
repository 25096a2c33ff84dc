//! Missing-value removal, label binarization and feature projection

use crate::error::{CardioError, Result};
use super::FEATURE_COLUMNS;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::info;

/// Table with normalized names and no null cell
#[derive(Debug, Clone)]
pub struct CleanedTable {
    df: DataFrame,
    rows_before: usize,
}

impl CleanedTable {
    /// Underlying frame
    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    /// Row count before incomplete rows were dropped
    pub fn rows_before(&self) -> usize {
        self.rows_before
    }

    /// Row count after cleaning
    pub fn rows_after(&self) -> usize {
        self.df.height()
    }
}

/// Replace the missing marker with null in every string column.
///
/// String cells are trimmed on the way, so `" ? "` also counts as missing.
pub fn mark_missing(df: &DataFrame, marker: &str) -> Result<DataFrame> {
    let replacements: Vec<Series> = df
        .get_columns()
        .iter()
        .filter(|col| col.dtype() == &DataType::String)
        .map(|col| -> Result<Series> {
            let series = col.as_materialized_series();
            let ca = series.str()?;
            let cleaned: StringChunked = ca
                .into_iter()
                .map(|v| v.map(str::trim).filter(|s| *s != marker))
                .collect();
            Ok(cleaned.with_name(series.name().clone()).into_series())
        })
        .collect::<Result<Vec<_>>>()?;

    let mut result = df.clone();
    for series in replacements {
        result.with_column(series)?;
    }
    Ok(result)
}

/// Mark missing cells and drop every row holding a null.
pub fn clean_table(df: DataFrame, marker: &str) -> Result<CleanedTable> {
    let rows_before = df.height();
    let marked = mark_missing(&df, marker)?;
    let cleaned = marked.drop_nulls::<String>(None)?;

    info!(
        "Dropped {} incomplete row(s): {} -> {}",
        rows_before - cleaned.height(),
        rows_before,
        cleaned.height()
    );

    Ok(CleanedTable { df: cleaned, rows_before })
}

/// Collapse labels to {0, 1} when binarization is required.
///
/// With binarization any value above zero maps to 1 and everything else to 0;
/// without it values are truncated to integers unchanged.
pub fn binarize_labels(values: &[f64], needs_binarization: bool) -> Array1<i64> {
    if needs_binarization {
        values.iter().map(|&v| i64::from(v > 0.0)).collect()
    } else {
        values.iter().map(|&v| v as i64).collect()
    }
}

/// Read the target column as floats, then apply [`binarize_labels`].
pub fn extract_labels(df: &DataFrame, target_col: &str, needs_binarization: bool) -> Result<Array1<i64>> {
    let values = numeric_column(df, target_col)
        .map_err(|e| CardioError::SchemaError(format!("target column '{}': {}", target_col, e)))?;
    Ok(binarize_labels(&values, needs_binarization))
}

/// Project a table onto the declared feature order as `f64`.
///
/// Column order of the result is exactly [`FEATURE_COLUMNS`], whatever the
/// order in `df`. Absent or non-numeric features are feature errors.
pub fn project_features(df: &DataFrame) -> Result<Array2<f64>> {
    let missing: Vec<&str> = FEATURE_COLUMNS
        .iter()
        .copied()
        .filter(|name| df.column(name).is_err())
        .collect();
    if !missing.is_empty() {
        return Err(CardioError::FeatureError(format!(
            "declared feature(s) missing after cleaning: {:?}",
            missing
        )));
    }

    let columns: Vec<Vec<f64>> = FEATURE_COLUMNS
        .iter()
        .map(|name| {
            numeric_column(df, name).map_err(|e| {
                CardioError::FeatureError(format!("feature '{}' is not numeric: {}", name, e))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let n_rows = df.height();
    Ok(Array2::from_shape_fn((n_rows, FEATURE_COLUMNS.len()), |(i, j)| columns[j][i]))
}

fn numeric_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .strict_cast(&DataType::Float64)?;
    let ca = series.f64()?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}
