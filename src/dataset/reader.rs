//! Delimited table reader with whitespace fallback

use crate::error::{CardioError, Result};
use super::LoaderConfig;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Delimiter strategy that produced the raw table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delimiter {
    /// Comma separated, the primary strategy
    Comma,
    /// Runs of spaces or tabs, the fallback
    Whitespace,
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Comma => write!(f, "comma"),
            Delimiter::Whitespace => write!(f, "whitespace"),
        }
    }
}

/// Read a delimited file from disk.
///
/// The file must be valid UTF-8. See [`parse_table`] for the delimiter policy.
pub fn load_table(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<(DataFrame, Delimiter)> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|e| {
        CardioError::SchemaError(format!("{} is not valid UTF-8: {}", path.display(), e))
    })?;
    parse_table(&text, config)
}

/// Parse delimited text into a raw table.
///
/// Comma parsing is tried first. A parse failure, or a result with fewer than
/// `min_plausible_columns` columns, falls back to whitespace parsing. If the
/// fallback fails the same way the input is rejected with a schema error.
pub fn parse_table(text: &str, config: &LoaderConfig) -> Result<(DataFrame, Delimiter)> {
    let min_cols = config.min_plausible_columns;

    let comma_outcome = match read_comma_separated(text.as_bytes().to_vec()) {
        Ok(df) if df.width() >= min_cols => return Ok((df, Delimiter::Comma)),
        Ok(df) => format!("comma parse produced {} column(s)", df.width()),
        Err(e) => format!("comma parse failed ({})", e),
    };
    debug!("{}, retrying with whitespace delimiter", comma_outcome);

    let rewritten = collapse_whitespace(text);
    match read_comma_separated(rewritten.into_bytes()) {
        Ok(df) if df.width() >= min_cols => Ok((df, Delimiter::Whitespace)),
        Ok(df) => Err(CardioError::SchemaError(format!(
            "{}; whitespace parse produced {} column(s), need at least {}",
            comma_outcome,
            df.width(),
            min_cols
        ))),
        Err(e) => Err(CardioError::SchemaError(format!(
            "{}; whitespace parse failed ({})",
            comma_outcome, e
        ))),
    }
}

/// Every column is read as text; typing happens after missing markers are
/// removed, so a marker anywhere in the file cannot break the parse.
fn read_comma_separated(bytes: Vec<u8>) -> PolarsResult<DataFrame> {
    let parse_opts = CsvParseOptions::default().with_separator(b',');

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(parse_opts)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
}

/// Rewrite whitespace-separated text as comma-separated, skipping blank lines.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "age,sex,cp,trestbps,chol,fbs,restecg,thalach,exang,oldpeak,slope,ca,thal,target";

    #[test]
    fn test_comma_table() {
        let text = format!("{}\n63,1,3,145,233,1,0,150,0,2.3,0,0,1,1\n", HEADER);
        let (df, delimiter) = parse_table(&text, &LoaderConfig::default()).unwrap();
        assert_eq!(delimiter, Delimiter::Comma);
        assert_eq!(df.width(), 14);
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn test_whitespace_fallback() {
        let text = format!(
            "{}\n63  1 3 145 233 1 0 150 0 2.3 0 0 1 1\n\n67\t1 4 160 286 0 2 108 1 1.5 1 3 3 2\n",
            HEADER.replace(',', " ")
        );
        let (df, delimiter) = parse_table(&text, &LoaderConfig::default()).unwrap();
        assert_eq!(delimiter, Delimiter::Whitespace);
        assert_eq!(df.width(), 14);
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_both_strategies_fail() {
        let text = "a b\n1 2\n";
        let err = parse_table(text, &LoaderConfig::default()).unwrap_err();
        assert!(matches!(err, CardioError::SchemaError(_)));
    }

    #[test]
    fn test_plausibility_threshold() {
        let text = "a,b,c\n1,2,3\n";
        let config = LoaderConfig::default().with_min_plausible_columns(3);
        let (df, delimiter) = parse_table(text, &config).unwrap();
        assert_eq!(delimiter, Delimiter::Comma);
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_columns_read_as_text() {
        let text = format!("{}\n63,1,3,145,233,1,0,150,0,2.3,0,?,1,1\n", HEADER);
        let (df, _) = parse_table(&text, &LoaderConfig::default()).unwrap();
        assert!(df.get_columns().iter().all(|c| c.dtype() == &DataType::String));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \t b  c\n\n d e \n"), "a,b,c\nd,e\n");
    }
}
