//! Model export module
//!
//! Produces the two artifacts of a training run:
//! - Native checkpoint (bincode, reloadable by this crate only)
//! - Portable ONNX graph (standard scaler + tree ensemble classifier)
//!
//! Both are handed to an [`ArtifactSink`] rather than written directly.

mod config;
mod checkpoint;
pub mod proto;
mod onnx;
mod sink;

pub use config::ExportConfig;
pub use checkpoint::{
    Checkpoint, CheckpointMetadata, encode_checkpoint, load_checkpoint,
    CHECKPOINT_MAGIC, CHECKPOINT_VERSION,
};
pub use onnx::{Dimension, TensorSpec, ExportedGraph, GraphSignature, lower_pipeline, inspect_graph};
pub use sink::{ArtifactSink, FsArtifactSink, MemorySink};
