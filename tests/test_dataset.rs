//! Integration test: dataset loading and cleaning

use cardiofit::dataset::{
    load_and_clean, load_table, parse_table, prepare, Delimiter, ExtraColumnPolicy, LoaderConfig,
    TargetSource, FEATURE_COLUMNS,
};
use cardiofit::CardioError;
use polars::prelude::*;
use std::io::Write;

const HEADER: &str = "age,sex,cp,trestbps,chol,fbs,restecg,thalach,exang,oldpeak,slope,ca,thal";

fn row(i: usize) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{},{:.1},{},{},{}",
        40 + i % 30,
        i % 2,
        1 + i % 4,
        120 + i % 40,
        200 + i % 90,
        i % 2,
        i % 3,
        120 + i % 60,
        i % 2,
        (i % 5) as f64 * 0.5,
        1 + i % 3,
        i % 4,
        [3, 6, 7][i % 3]
    )
}

fn write_temp(contents: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_missing_markers_are_dropped() {
    let mut text = format!("{},target\n", HEADER);
    for i in 0..10 {
        let mut line = row(i);
        if i == 3 || i == 7 {
            // replace the `ca` value with the marker
            let mut fields: Vec<String> = line.split(',').map(str::to_string).collect();
            fields[11] = "?".to_string();
            line = fields.join(",");
        }
        text.push_str(&format!("{},{}\n", line, i % 2));
    }
    let file = write_temp(text.as_bytes());

    let data = load_and_clean(file.path(), &LoaderConfig::default()).unwrap();

    assert_eq!(data.n_rows(), 8);
    assert_eq!(data.summary.raw_shape.0, 10);
    assert_eq!(data.summary.rows_after_cleaning, 8);
    assert!(data.features.iter().all(|v| v.is_finite()));
    assert_eq!(data.labels.len(), data.features.nrows());
}

/// Long table whose row `late` has its `ca` field replaced with `value`.
fn long_table_with(late: usize, value: &str) -> String {
    let mut text = format!("{},target\n", HEADER);
    for i in 0..1500 {
        let mut fields: Vec<String> = row(i).split(',').map(str::to_string).collect();
        if i == late {
            fields[11] = value.to_string();
        }
        text.push_str(&format!("{},{}\n", fields.join(","), i % 2));
    }
    text
}

#[test]
fn test_late_missing_marker_in_long_table() {
    let file = write_temp(long_table_with(1200, "?").as_bytes());

    let data = load_and_clean(file.path(), &LoaderConfig::default()).unwrap();
    assert_eq!(data.summary.schema.delimiter, Delimiter::Comma);
    assert_eq!(data.summary.raw_shape.0, 1500);
    assert_eq!(data.n_rows(), 1499);
}

#[test]
fn test_late_float_in_integer_column() {
    let file = write_temp(long_table_with(1300, "2.5").as_bytes());

    let data = load_and_clean(file.path(), &LoaderConfig::default()).unwrap();
    assert_eq!(data.n_rows(), 1500);
    // ca is column 11 of the projected matrix
    assert_eq!(data.features[[1300, 11]], 2.5);
}

#[test]
fn test_whitespace_fallback() {
    let mut text = HEADER.replace(',', "   ") + "   num\n";
    for i in 0..6 {
        text.push_str(&format!("  {}\t{}\n", row(i).replace(',', "  "), i % 2));
    }
    let file = write_temp(text.as_bytes());

    let (df, delimiter) = load_table(file.path(), &LoaderConfig::default()).unwrap();
    assert_eq!(delimiter, Delimiter::Whitespace);
    assert_eq!(df.width(), 14);

    let data = load_and_clean(file.path(), &LoaderConfig::default()).unwrap();
    assert_eq!(data.summary.schema.delimiter, Delimiter::Whitespace);
    assert_eq!(data.summary.schema.target_col, "num");
    assert_eq!(data.n_rows(), 6);
}

#[test]
fn test_unparseable_input_is_schema_error() {
    let err = parse_table("a,b\n1,2\n", &LoaderConfig::default()).unwrap_err();
    assert!(matches!(err, CardioError::SchemaError(_)), "got {:?}", err);
}

#[test]
fn test_non_utf8_is_schema_error() {
    let file = write_temp(&[0xff, 0xfe, 0x00, 0x41]);
    let err = load_table(file.path(), &LoaderConfig::default()).unwrap_err();
    assert!(matches!(err, CardioError::SchemaError(_)));
}

fn table_with(extra: Vec<Column>) -> DataFrame {
    let mut columns: Vec<Column> = FEATURE_COLUMNS
        .iter()
        .enumerate()
        .map(|(j, name)| Column::new((*name).into(), (0..6).map(|i| (i * 13 + j) as f64).collect::<Vec<_>>()))
        .collect();
    columns.extend(extra);
    DataFrame::new(columns).unwrap()
}

#[test]
fn test_target_wins_over_num() {
    let df = table_with(vec![
        Column::new("num".into(), &[0i64, 3, 2, 0, 1, 4]),
        Column::new("target".into(), &[0i64, 1, 1, 0, 1, 0]),
    ]);
    let data = prepare(df, Delimiter::Comma, &LoaderConfig::default()).unwrap();

    assert_eq!(data.summary.schema.target_col, "target");
    assert_eq!(data.summary.schema.target_source, TargetSource::TargetColumn);
    assert_eq!(data.labels.to_vec(), vec![0, 1, 1, 0, 1, 0]);
    assert_eq!(data.summary.extra_columns, vec!["num".to_string()]);
}

#[test]
fn test_last_column_fallback() {
    let df = table_with(vec![Column::new("diagnosis".into(), &[1i64, 0, 1, 0, 1, 0])]);
    let data = prepare(df, Delimiter::Comma, &LoaderConfig::default()).unwrap();

    assert_eq!(data.summary.schema.target_col, "diagnosis");
    assert_eq!(data.summary.schema.target_source, TargetSource::LastColumn);
}

#[test]
fn test_multiclass_num_is_binarized() {
    let df = table_with(vec![Column::new("num".into(), &[0i64, 1, 2, 3, 4, 0])]);
    let data = prepare(df, Delimiter::Comma, &LoaderConfig::default()).unwrap();

    assert!(data.summary.schema.needs_binarization);
    assert_eq!(data.summary.schema.target_distinct, 5);
    assert_eq!(data.labels.to_vec(), vec![0, 1, 1, 1, 1, 0]);
    assert_eq!(data.summary.class_distribution.get(&1), Some(&4));
}

#[test]
fn test_missing_thal_is_feature_error() {
    let mut df = table_with(vec![Column::new("target".into(), &[0i64, 1, 0, 1, 0, 1])]);
    df = df.drop("thal").unwrap();

    let err = prepare(df, Delimiter::Comma, &LoaderConfig::default()).unwrap_err();
    assert!(matches!(err, CardioError::FeatureError(_)), "got {:?}", err);
    assert!(err.to_string().contains("thal"));
}

#[test]
fn test_zero_rows_after_cleaning() {
    let mut text = format!("{},target\n", HEADER);
    for i in 0..4 {
        text.push_str(&format!("{},?\n", row(i)));
    }
    let file = write_temp(text.as_bytes());

    let err = load_and_clean(file.path(), &LoaderConfig::default()).unwrap_err();
    assert!(matches!(err, CardioError::InsufficientData(_)), "got {:?}", err);
}

#[test]
fn test_reject_extra_columns() {
    let df = table_with(vec![
        Column::new("patient_id".into(), &[1i64, 2, 3, 4, 5, 6]),
        Column::new("target".into(), &[0i64, 1, 0, 1, 0, 1]),
    ]);
    let config = LoaderConfig::default().with_extra_columns(ExtraColumnPolicy::Reject);

    let err = prepare(df, Delimiter::Comma, &config).unwrap_err();
    assert!(matches!(err, CardioError::SchemaError(_)));
}

#[test]
fn test_colliding_names_are_schema_error() {
    let df = table_with(vec![
        Column::new("rest ecg".into(), &[0i64, 1, 0, 1, 0, 1]),
        Column::new("target".into(), &[0i64, 1, 0, 1, 0, 1]),
    ]);

    let err = prepare(df, Delimiter::Comma, &LoaderConfig::default()).unwrap_err();
    assert!(matches!(err, CardioError::SchemaError(_)));
}
