use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::DemucsModel;
use crate::error::{separation_error, IntoRadioEditError, RadioEditError, Result};

pub const VOCALS_FILE: &str = "vocals.wav";
pub const INSTRUMENTAL_FILE: &str = "no_vocals.wav";

/// The two stems a separation produces
#[derive(Debug, Clone, PartialEq)]
pub struct Stems {
    pub vocals: PathBuf,
    pub instrumental: PathBuf,
}

impl Stems {
    /// Stems laid out as `<dir>/vocals.wav` and `<dir>/no_vocals.wav`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            vocals: dir.join(VOCALS_FILE),
            instrumental: dir.join(INSTRUMENTAL_FILE),
        }
    }

    /// Reuse a cached stem directory if both stem files are still there
    pub fn locate(dir: &Path) -> Option<Self> {
        let stems = Self::in_dir(dir);
        stems.exist().then_some(stems)
    }

    pub fn exist(&self) -> bool {
        self.vocals.is_file() && self.instrumental.is_file()
    }

    /// Directory holding the stems
    pub fn dir(&self) -> Option<&Path> {
        self.vocals.parent()
    }
}

/// Splits a mixed track into vocals and everything else
#[async_trait]
pub trait StemSeparator: Send + Sync {
    fn name(&self) -> &str;

    async fn separate(&self, audio_path: &Path, output_dir: &Path) -> Result<Stems>;
}

/// Demucs run as a Python module in two-stem mode
#[derive(Debug, Clone)]
pub struct DemucsSeparator {
    model: DemucsModel,
    python: String,
}

impl DemucsSeparator {
    pub fn new(model: DemucsModel) -> Self {
        Self {
            model,
            python: "python3".to_string(),
        }
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    /// Where demucs writes stems: `<output_dir>/<model>/<track stem>/`
    pub fn stem_dir(&self, audio_path: &Path, output_dir: &Path) -> PathBuf {
        let track = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        output_dir.join(self.model.as_str()).join(track)
    }
}

#[async_trait]
impl StemSeparator for DemucsSeparator {
    fn name(&self) -> &str {
        self.model.as_str()
    }

    async fn separate(&self, audio_path: &Path, output_dir: &Path) -> Result<Stems> {
        if !audio_path.exists() {
            return Err(RadioEditError::InputNotFound {
                path: audio_path.to_path_buf(),
            });
        }
        tokio::fs::create_dir_all(output_dir).await.with_path(output_dir)?;

        info!("Separating stems using {}...", self.model.as_str());
        let args = [
            "-m".to_string(),
            "demucs".to_string(),
            "--two-stems".to_string(),
            "vocals".to_string(),
            "-n".to_string(),
            self.model.as_str().to_string(),
            "-o".to_string(),
            output_dir.to_string_lossy().into_owned(),
            audio_path.to_string_lossy().into_owned(),
        ];
        debug!("{} {}", self.python, args.join(" "));

        let output = Command::new(&self.python)
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                separation_error(
                    format!("Failed to spawn {}. Make sure demucs is installed: {}", self.python, e),
                    None,
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(separation_error(
                format!("demucs exited with {}", output.status),
                Some(stderr),
            ));
        }

        let stem_dir = self.stem_dir(audio_path, output_dir);
        let stems = Stems::locate(&stem_dir).ok_or_else(|| {
            separation_error(
                format!("Expected stem files not found in {}", stem_dir.display()),
                None,
            )
        })?;

        info!("Stems saved to {}", stem_dir.display());
        Ok(stems)
    }
}
