//! Export configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where artifacts go and how the graph is labelled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Native checkpoint location
    pub checkpoint_path: PathBuf,
    /// Portable graph location
    pub graph_path: PathBuf,
    /// Name of the graph's input tensor
    pub input_name: String,
    /// Default-domain opset
    pub opset_version: i64,
    /// `ai.onnx.ml` opset
    pub ml_opset_version: i64,
    pub producer_name: String,
    /// Label column recorded in artifact metadata
    pub target_column: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("ml/heart_pipeline.bin"),
            graph_path: PathBuf::from("backend/model/heart_model.onnx"),
            input_name: "float_input".to_string(),
            opset_version: 15,
            ml_opset_version: 1,
            producer_name: "cardiofit".to_string(),
            target_column: "target".to_string(),
        }
    }
}

impl ExportConfig {
    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    pub fn with_graph_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.graph_path = path.into();
        self
    }

    pub fn with_input_name(mut self, name: impl Into<String>) -> Self {
        self.input_name = name.into();
        self
    }

    pub fn with_target_column(mut self, name: impl Into<String>) -> Self {
        self.target_column = name.into();
        self
    }
}
