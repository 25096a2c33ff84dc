//! Column-name normalization and schema resolution
//!
//! Resolution is a pure decision over a cleaned table: it picks the target
//! column, records how it was picked, and decides whether the labels need
//! binarizing. Nothing here prints or touches the filesystem.

use crate::error::{CardioError, Result};
use super::{Delimiter, ExtraColumnPolicy, FEATURE_COLUMNS};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How the target column was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetSource {
    /// A column literally named `target`
    TargetColumn,
    /// A column named `num` (UCI naming)
    NumColumn,
    /// Fallback to the last column of the table
    LastColumn,
}

impl fmt::Display for TargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSource::TargetColumn => write!(f, "named 'target'"),
            TargetSource::NumColumn => write!(f, "named 'num'"),
            TargetSource::LastColumn => write!(f, "last column"),
        }
    }
}

/// Decisions taken for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSchema {
    pub delimiter: Delimiter,
    pub target_col: String,
    pub target_source: TargetSource,
    /// Distinct target values before binarization
    pub target_distinct: usize,
    pub needs_binarization: bool,
}

/// Outcome of [`resolve_schema`]
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaResolution {
    Resolved(ResolvedSchema),
    Failed { reason: String },
}

impl SchemaResolution {
    /// Convert a failed resolution into a schema error
    pub fn into_result(self) -> Result<ResolvedSchema> {
        match self {
            SchemaResolution::Resolved(schema) => Ok(schema),
            SchemaResolution::Failed { reason } => Err(CardioError::SchemaError(reason)),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, SchemaResolution::Resolved(_))
    }
}

/// Strip surrounding whitespace and drop every internal space.
///
/// Only the space character is removed from inside a name; tabs are kept.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().replace(' ', "")
}

/// Normalize every column name of `df` in place.
///
/// Empty names and names that collide after normalization are rejected.
pub fn normalize_column_names(df: &mut DataFrame) -> Result<Vec<String>> {
    let original: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let mut seen: HashMap<String, &str> = HashMap::with_capacity(original.len());
    let mut normalized = Vec::with_capacity(original.len());

    for raw in &original {
        let name = normalize_column_name(raw);
        if name.is_empty() {
            return Err(CardioError::SchemaError(format!(
                "column name {:?} is empty after normalization",
                raw
            )));
        }
        if let Some(prev) = seen.get(&name) {
            return Err(CardioError::SchemaError(format!(
                "columns {:?} and {:?} both normalize to '{}'",
                prev, raw, name
            )));
        }
        seen.insert(name.clone(), raw.as_str());
        normalized.push(name);
    }

    df.set_column_names(normalized.iter().map(|s| s.as_str()))?;
    Ok(normalized)
}

/// Pick the target column by priority: `target`, then `num`, then the last column.
pub fn resolve_target(columns: &[String]) -> Option<(String, TargetSource)> {
    if columns.iter().any(|c| c == "target") {
        Some(("target".to_string(), TargetSource::TargetColumn))
    } else if columns.iter().any(|c| c == "num") {
        Some(("num".to_string(), TargetSource::NumColumn))
    } else {
        columns.last().map(|c| (c.clone(), TargetSource::LastColumn))
    }
}

/// Resolve the target column and binarization decision against a cleaned table.
pub fn resolve_schema(df: &DataFrame, delimiter: Delimiter) -> SchemaResolution {
    let columns: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let Some((target_col, target_source)) = resolve_target(&columns) else {
        return SchemaResolution::Failed {
            reason: "table has no columns to use as target".to_string(),
        };
    };

    let target_distinct = match distinct_target_values(df, &target_col) {
        Ok(n) => n,
        Err(e) => {
            return SchemaResolution::Failed {
                reason: format!("target column '{}' is not numeric: {}", target_col, e),
            }
        }
    };

    SchemaResolution::Resolved(ResolvedSchema {
        delimiter,
        target_col,
        target_source,
        target_distinct,
        needs_binarization: target_distinct > 2,
    })
}

fn distinct_target_values(df: &DataFrame, target_col: &str) -> PolarsResult<usize> {
    let series = df
        .column(target_col)?
        .as_materialized_series()
        .strict_cast(&DataType::Float64)?;
    series.n_unique()
}

/// Columns outside the feature contract and the target.
///
/// Under [`ExtraColumnPolicy::Reject`] any such column is a schema error.
pub fn check_extra_columns(
    columns: &[String],
    target_col: &str,
    policy: ExtraColumnPolicy,
) -> Result<Vec<String>> {
    let extras: Vec<String> = columns
        .iter()
        .filter(|c| c.as_str() != target_col && !FEATURE_COLUMNS.contains(&c.as_str()))
        .cloned()
        .collect();

    if policy == ExtraColumnPolicy::Reject && !extras.is_empty() {
        return Err(CardioError::SchemaError(format!(
            "unexpected columns outside the feature set: {:?}",
            extras
        )));
    }
    Ok(extras)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("  rest ecg "), "restecg");
        assert_eq!(normalize_column_name("thal"), "thal");
        assert_eq!(normalize_column_name("\tca "), "ca");
        assert_eq!(normalize_column_name("rest\tecg"), "rest\tecg");
    }

    #[test]
    fn test_target_priority() {
        let (col, source) = resolve_target(&names(&["age", "target", "num"])).unwrap();
        assert_eq!(col, "target");
        assert_eq!(source, TargetSource::TargetColumn);

        let (col, source) = resolve_target(&names(&["age", "num", "other"])).unwrap();
        assert_eq!(col, "num");
        assert_eq!(source, TargetSource::NumColumn);

        let (col, source) = resolve_target(&names(&["age", "label"])).unwrap();
        assert_eq!(col, "label");
        assert_eq!(source, TargetSource::LastColumn);

        assert!(resolve_target(&[]).is_none());
    }

    #[test]
    fn test_name_collision_rejected() {
        let mut df = df!(
            "a b" => &[1.0],
            "ab" => &[2.0]
        )
        .unwrap();
        let err = normalize_column_names(&mut df).unwrap_err();
        assert!(matches!(err, CardioError::SchemaError(_)));
    }

    #[test]
    fn test_resolve_schema_binarization() {
        let df = df!(
            "age" => &[50.0, 60.0, 70.0],
            "num" => &[0i64, 2, 4]
        )
        .unwrap();
        let schema = resolve_schema(&df, Delimiter::Comma).into_result().unwrap();
        assert_eq!(schema.target_col, "num");
        assert_eq!(schema.target_distinct, 3);
        assert!(schema.needs_binarization);
    }

    #[test]
    fn test_resolve_schema_non_numeric_target() {
        let df = df!(
            "age" => &[50.0, 60.0],
            "target" => &["yes", "no"]
        )
        .unwrap();
        let resolution = resolve_schema(&df, Delimiter::Comma);
        assert!(!resolution.is_resolved());
        assert!(matches!(resolution.into_result(), Err(CardioError::SchemaError(_))));
    }

    #[test]
    fn test_extra_columns_policy() {
        let mut cols: Vec<String> = FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect();
        cols.push("patient_id".to_string());
        cols.push("target".to_string());

        let extras = check_extra_columns(&cols, "target", ExtraColumnPolicy::Ignore).unwrap();
        assert_eq!(extras, vec!["patient_id".to_string()]);

        let err = check_extra_columns(&cols, "target", ExtraColumnPolicy::Reject).unwrap_err();
        assert!(matches!(err, CardioError::SchemaError(_)));
    }
}
