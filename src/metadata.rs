use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::audio::publish;
use crate::error::{export_error, IntoRadioEditError, Result};
use crate::transcript::TimedWord;

const LRC_WORDS_PER_LINE: usize = 10;

/// Post-export step that decorates the finished output.
///
/// Failures are reported but never undo the export.
#[async_trait]
pub trait MetadataWriter: Send + Sync {
    fn name(&self) -> &str;

    async fn write(&self, original: &Path, output: &Path, words: &[TimedWord]) -> Result<()>;
}

/// Copies container tags from the original file with an ffmpeg stream copy
#[derive(Debug, Clone, Default)]
pub struct FfmpegTagCopier;

#[async_trait]
impl MetadataWriter for FfmpegTagCopier {
    fn name(&self) -> &str {
        "tags"
    }

    async fn write(&self, original: &Path, output: &Path, _words: &[TimedWord]) -> Result<()> {
        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let suffix = output
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let staged = tempfile::Builder::new()
            .prefix(".radio-edit-tags-")
            .suffix(&suffix)
            .tempfile_in(parent)
            .with_path(parent)?
            .into_temp_path();

        let output_str = output.to_string_lossy();
        let original_str = original.to_string_lossy();
        let staged_str = staged.to_string_lossy();
        let args = [
            "-i",
            output_str.as_ref(),
            "-i",
            original_str.as_ref(),
            "-map",
            "0",
            "-map_metadata",
            "1",
            "-c",
            "copy",
            "-y",
            staged_str.as_ref(),
        ];
        debug!("ffmpeg {}", args.join(" "));

        let result = Command::new("ffmpeg")
            .args(args)
            .output()
            .await
            .map_err(|e| export_error(format!("Failed to execute ffmpeg: {}", e), None))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).into_owned();
            return Err(export_error("ffmpeg failed to copy tags", Some(stderr)));
        }

        publish(&staged, output).await?;
        info!("Copied tags from {}", original.display());
        Ok(())
    }
}

/// Writes `<output>.lrc` synced lyrics next to the output
#[derive(Debug, Clone, Default)]
pub struct LrcSidecar;

impl LrcSidecar {
    pub fn sidecar_path(output: &Path) -> PathBuf {
        let mut name = output.as_os_str().to_owned();
        name.push(".lrc");
        PathBuf::from(name)
    }
}

#[async_trait]
impl MetadataWriter for LrcSidecar {
    fn name(&self) -> &str {
        "lrc"
    }

    async fn write(&self, _original: &Path, output: &Path, words: &[TimedWord]) -> Result<()> {
        if words.is_empty() {
            debug!("No words to write as LRC");
            return Ok(());
        }
        let path = Self::sidecar_path(output);
        tokio::fs::write(&path, generate_lrc(words)).await.with_path(&path)?;
        info!("Saved LRC lyrics to {}", path.display());
        Ok(())
    }
}

fn lrc_timestamp(seconds: f64) -> String {
    let centis = (seconds.max(0.0) * 100.0).round() as u64;
    format!("[{:02}:{:02}.{:02}]", centis / 6000, (centis / 100) % 60, centis % 100)
}

/// Render words as LRC lines.
///
/// A line ends after a word with trailing `. ! ? ,` or once it holds ten words.
pub fn generate_lrc(words: &[TimedWord]) -> String {
    let mut lines = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut line_start = 0.0;

    for word in words {
        let text = word.text.trim();
        if current.is_empty() {
            line_start = word.start;
        }
        current.push(text);

        if text.ends_with(['.', '!', '?', ',']) || current.len() >= LRC_WORDS_PER_LINE {
            lines.push(format!("{}{}", lrc_timestamp(line_start), current.join(" ")));
            current.clear();
        }
    }

    if !current.is_empty() {
        lines.push(format!("{}{}", lrc_timestamp(line_start), current.join(" ")));
    }

    lines.join("\n")
}
