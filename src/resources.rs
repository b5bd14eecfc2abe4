use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::error::{IntoRadioEditError, Result};

/// RAII wrapper for a per-run scratch directory that is removed on drop
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl ScratchDir {
    /// Create a fresh, uniquely named directory under the system temp dir
    pub fn create(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .with_context("Failed to create scratch directory")?;
        let path = dir.keep();
        debug!("Created scratch directory {}", path.display());
        Ok(Self::new(path))
    }

    /// Take ownership of an existing directory
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cleanup_on_drop: true,
        }
    }

    /// Get the path to the scratch directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the directory on drop when `keep` is set
    pub fn keep_if(mut self, keep: bool) -> Self {
        if keep {
            self.cleanup_on_drop = false;
        }
        self
    }

    /// Take ownership of the path and disable cleanup
    pub fn take_path(mut self) -> PathBuf {
        self.cleanup_on_drop = false;
        self.path.clone()
    }

    /// Manually remove the directory (consumes self)
    pub fn cleanup(mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_dir_all(&self.path).with_path(&self.path)?;
        }
        self.cleanup_on_drop = false;
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.cleanup_on_drop && self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("Failed to cleanup scratch directory {:?}: {}", self.path, e);
            }
        }
    }
}
