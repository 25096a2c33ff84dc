//! Artifact destinations

use crate::error::Result;
use super::config::ExportConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Receives the two artifacts a training run produces.
///
/// Training and lowering never touch the filesystem themselves; they hand
/// finished bytes to a sink.
pub trait ArtifactSink {
    /// Store the native checkpoint
    fn write_checkpoint(&mut self, bytes: &[u8]) -> Result<()>;

    /// Store the portable graph
    fn write_graph(&mut self, bytes: &[u8]) -> Result<()>;

    /// Human-readable destination, for logs
    fn describe(&self) -> String;
}

/// Writes artifacts to two files, creating parent directories and
/// replacing existing files.
#[derive(Debug, Clone)]
pub struct FsArtifactSink {
    checkpoint_path: PathBuf,
    graph_path: PathBuf,
}

impl FsArtifactSink {
    pub fn new(checkpoint_path: impl Into<PathBuf>, graph_path: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_path: checkpoint_path.into(),
            graph_path: graph_path.into(),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(&config.checkpoint_path, &config.graph_path)
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    pub fn graph_path(&self) -> &Path {
        &self.graph_path
    }

    fn write(path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        info!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

impl ArtifactSink for FsArtifactSink {
    fn write_checkpoint(&mut self, bytes: &[u8]) -> Result<()> {
        Self::write(&self.checkpoint_path, bytes)
    }

    fn write_graph(&mut self, bytes: &[u8]) -> Result<()> {
        Self::write(&self.graph_path, bytes)
    }

    fn describe(&self) -> String {
        format!(
            "checkpoint={} graph={}",
            self.checkpoint_path.display(),
            self.graph_path.display()
        )
    }
}

/// Keeps artifacts in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub checkpoint: Option<Vec<u8>>,
    pub graph: Option<Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactSink for MemorySink {
    fn write_checkpoint(&mut self, bytes: &[u8]) -> Result<()> {
        self.checkpoint = Some(bytes.to_vec());
        Ok(())
    }

    fn write_graph(&mut self, bytes: &[u8]) -> Result<()> {
        self.graph = Some(bytes.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
