//! Application configuration
//!
//! One JSON document with optional `loader`, `training` and `export`
//! sections; anything omitted keeps its default.

use crate::dataset::LoaderConfig;
use crate::error::{CardioError, Result};
use crate::export::ExportConfig;
use crate::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub loader: LoaderConfig,
    pub training: TrainingConfig,
    pub export: ExportConfig,
}

impl AppConfig {
    /// Parse a JSON document
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(text)
            .map_err(|e| CardioError::ConfigError(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            CardioError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        if self.export.input_name.is_empty() {
            return Err(CardioError::ConfigError("export.input_name must not be empty".to_string()));
        }
        if self.loader.missing_marker.is_empty() {
            return Err(CardioError::ConfigError("loader.missing_marker must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = AppConfig::from_json_str(r#"{"training": {"n_estimators": 50}}"#).unwrap();
        assert_eq!(config.training.n_estimators, 50);
        assert_eq!(config.training.random_state, 42);
        assert_eq!(config.export.input_name, "float_input");
        assert_eq!(config.loader.missing_marker, "?");
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let text = config.to_json_pretty().unwrap();
        assert_eq!(AppConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(AppConfig::from_json_str(r#"{"training": {"test_size": 2.0}}"#).is_err());
        assert!(matches!(
            AppConfig::from_json_str("not json"),
            Err(CardioError::ConfigError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_json_file("/nonexistent/cardiofit.json").unwrap_err();
        assert!(matches!(err, CardioError::ConfigError(_)));
    }
}
