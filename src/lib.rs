//! cardiofit - heart-disease classifier training and export
//!
//! This crate runs a single-shot batch job:
//! - Load a delimited clinical table and clean it
//! - Train a standard scaler + random forest pipeline
//! - Evaluate on a held-out split
//! - Write a native checkpoint and a portable ONNX graph
//!
//! # Modules
//!
//! - [`dataset`] - Parsing, schema resolution, cleaning, feature projection
//! - [`preprocessing`] - Standardization stage
//! - [`training`] - Trees, forest, split, metrics, pipeline, engine
//! - [`export`] - Checkpoint, ONNX lowering, artifact sinks
//! - [`config`] - JSON application configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core modules
pub mod dataset;
pub mod preprocessing;
pub mod training;
pub mod export;

// Configuration and services
pub mod config;
pub mod cli;

pub use error::{CardioError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{CardioError, Result};

    // Configuration
    pub use crate::config::AppConfig;

    // Dataset
    pub use crate::dataset::{
        load_and_clean, prepare, LoadedDataset, LoadSummary, LoaderConfig, ExtraColumnPolicy,
        FEATURE_COLUMNS, N_FEATURES,
    };

    // Preprocessing
    pub use crate::preprocessing::StandardScaler;

    // Training
    pub use crate::training::{
        train_and_export, TrainOutput, TrainingConfig, Pipeline, FittedPipeline,
        EvaluationReport, RandomForest, MaxFeatures,
    };

    // Export
    pub use crate::export::{
        ArtifactSink, FsArtifactSink, MemorySink, ExportConfig, ExportedGraph,
        GraphSignature, inspect_graph, load_checkpoint,
    };
}
