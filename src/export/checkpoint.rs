//! Native checkpoint format
//!
//! A checkpoint is the bincode encoding of [`Checkpoint`]: four magic bytes,
//! a format version, metadata, then the fitted pipeline. It is only meant to
//! be read back by this crate.

use crate::error::{CardioError, Result};
use crate::training::{FittedPipeline, TrainingConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Magic bytes for checkpoint files
pub const CHECKPOINT_MAGIC: [u8; 4] = *b"CRDF";

/// Current checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// What was trained, on what, and how well
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Ordered input features
    pub feature_names: Vec<String>,
    pub target_column: String,
    pub training: TrainingConfig,
    /// Held-out accuracy at training time
    pub accuracy: Option<f64>,
    /// Crate version that wrote the checkpoint
    pub producer_version: String,
}

impl CheckpointMetadata {
    pub fn new(pipeline: &FittedPipeline, target_column: impl Into<String>) -> Self {
        Self {
            feature_names: pipeline.feature_names().to_vec(),
            target_column: target_column.into(),
            training: pipeline.config().clone(),
            accuracy: None,
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

/// Decoded checkpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Checkpoint {
    pub magic: [u8; 4],
    pub format_version: u32,
    pub metadata: CheckpointMetadata,
    pub pipeline: FittedPipeline,
}

#[derive(Serialize)]
struct CheckpointRef<'a> {
    magic: [u8; 4],
    format_version: u32,
    metadata: &'a CheckpointMetadata,
    pipeline: &'a FittedPipeline,
}

/// Encode a fitted pipeline and its metadata
pub fn encode_checkpoint(pipeline: &FittedPipeline, metadata: &CheckpointMetadata) -> Result<Vec<u8>> {
    let bytes = bincode::serialize(&CheckpointRef {
        magic: CHECKPOINT_MAGIC,
        format_version: CHECKPOINT_VERSION,
        metadata,
        pipeline,
    })?;
    Ok(bytes)
}

impl Checkpoint {
    /// Decode and validate checkpoint bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if !bytes.starts_with(&CHECKPOINT_MAGIC) {
            return Err(CardioError::SerializationError(
                "not a cardiofit checkpoint (bad magic bytes)".to_string(),
            ));
        }

        let checkpoint: Checkpoint = bincode::deserialize(bytes)?;
        if checkpoint.format_version != CHECKPOINT_VERSION {
            return Err(CardioError::SerializationError(format!(
                "unsupported checkpoint version {} (expected {})",
                checkpoint.format_version, CHECKPOINT_VERSION
            )));
        }
        Ok(checkpoint)
    }

    pub fn into_pipeline(self) -> FittedPipeline {
        self.pipeline
    }
}

/// Read a checkpoint from disk
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let bytes = fs::read(path.as_ref())?;
    Checkpoint::from_bytes(&bytes)
}
