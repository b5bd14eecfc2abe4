use std::fmt;
use std::path::PathBuf;

/// Error types for radio-edit operations
#[derive(Debug)]
pub enum RadioEditError {
    /// The audio file handed to a workflow does not exist
    InputNotFound { path: PathBuf },

    /// Stem separation failed or produced no stems
    SeparationFailed { message: String, stderr: Option<String> },

    /// Speech-to-text failed or returned an unusable transcript
    TranscriptionFailed { message: String, stderr: Option<String> },

    /// A timestamp string could not be parsed
    MalformedTimestamp { value: String },

    /// An EDL file is not valid JSON or lacks a required field
    MalformedEdl { path: PathBuf, message: String },

    /// The EDL file to apply does not exist
    EdlNotFound { path: PathBuf },

    /// The user declined the preview
    Cancelled,

    /// Encoding or writing the final output failed
    ExportFailed { message: String, stderr: Option<String> },

    /// File system related errors
    FileSystem { source: std::io::Error, path: PathBuf },

    /// Configuration validation errors
    Config { field: String, message: String },

    /// Audio buffer processing errors
    AudioProcessing { message: String },

    /// Unsupported file format
    UnsupportedFormat { extension: String, supported: Vec<String> },

    /// Missing external dependency
    MissingDependency { name: String, suggestion: String },

    /// General processing error
    Processing { message: String },
}

/// Payload-free tag for [`RadioEditError`], for callers that only branch on the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputNotFound,
    SeparationFailed,
    TranscriptionFailed,
    MalformedTimestamp,
    MalformedEdl,
    EdlNotFound,
    Cancelled,
    ExportFailed,
    FileSystem,
    Config,
    AudioProcessing,
    UnsupportedFormat,
    MissingDependency,
    Processing,
}

impl RadioEditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RadioEditError::InputNotFound { .. } => ErrorKind::InputNotFound,
            RadioEditError::SeparationFailed { .. } => ErrorKind::SeparationFailed,
            RadioEditError::TranscriptionFailed { .. } => ErrorKind::TranscriptionFailed,
            RadioEditError::MalformedTimestamp { .. } => ErrorKind::MalformedTimestamp,
            RadioEditError::MalformedEdl { .. } => ErrorKind::MalformedEdl,
            RadioEditError::EdlNotFound { .. } => ErrorKind::EdlNotFound,
            RadioEditError::Cancelled => ErrorKind::Cancelled,
            RadioEditError::ExportFailed { .. } => ErrorKind::ExportFailed,
            RadioEditError::FileSystem { .. } => ErrorKind::FileSystem,
            RadioEditError::Config { .. } => ErrorKind::Config,
            RadioEditError::AudioProcessing { .. } => ErrorKind::AudioProcessing,
            RadioEditError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            RadioEditError::MissingDependency { .. } => ErrorKind::MissingDependency,
            RadioEditError::Processing { .. } => ErrorKind::Processing,
        }
    }
}

fn write_stderr(f: &mut fmt::Formatter<'_>, stderr: &Option<String>) -> fmt::Result {
    if let Some(stderr) = stderr {
        write!(f, "\nStderr: {}", stderr)?;
    }
    Ok(())
}

impl fmt::Display for RadioEditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioEditError::InputNotFound { path } => {
                write!(f, "Input file not found: {}", path.display())
            }
            RadioEditError::SeparationFailed { message, stderr } => {
                write!(f, "Stem separation failed: {}", message)?;
                write_stderr(f, stderr)
            }
            RadioEditError::TranscriptionFailed { message, stderr } => {
                write!(f, "Transcription failed: {}", message)?;
                write_stderr(f, stderr)
            }
            RadioEditError::MalformedTimestamp { value } => {
                write!(f, "Cannot parse timestamp: '{}'", value)
            }
            RadioEditError::MalformedEdl { path, message } => {
                write!(f, "Malformed EDL '{}': {}", path.display(), message)
            }
            RadioEditError::EdlNotFound { path } => {
                write!(f, "EDL file not found: {}", path.display())
            }
            RadioEditError::Cancelled => write!(f, "Cancelled by user"),
            RadioEditError::ExportFailed { message, stderr } => {
                write!(f, "Export failed: {}", message)?;
                write_stderr(f, stderr)
            }
            RadioEditError::FileSystem { source, path } => {
                write!(f, "File system error for '{}': {}", path.display(), source)
            }
            RadioEditError::Config { field, message } => {
                write!(f, "Configuration error in '{}': {}", field, message)
            }
            RadioEditError::AudioProcessing { message } => {
                write!(f, "Audio processing error: {}", message)
            }
            RadioEditError::UnsupportedFormat { extension, supported } => {
                write!(
                    f,
                    "Unsupported file format '{}'. Supported formats: {}",
                    extension,
                    supported.join(", ")
                )
            }
            RadioEditError::MissingDependency { name, suggestion } => {
                write!(f, "Missing dependency '{}': {}", name, suggestion)
            }
            RadioEditError::Processing { message } => {
                write!(f, "Processing error: {}", message)
            }
        }
    }
}

impl std::error::Error for RadioEditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RadioEditError::FileSystem { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for radio-edit operations
pub type Result<T> = std::result::Result<T, RadioEditError>;

pub fn separation_error(message: impl Into<String>, stderr: Option<String>) -> RadioEditError {
    RadioEditError::SeparationFailed {
        message: message.into(),
        stderr,
    }
}

pub fn transcription_error(message: impl Into<String>, stderr: Option<String>) -> RadioEditError {
    RadioEditError::TranscriptionFailed {
        message: message.into(),
        stderr,
    }
}

pub fn export_error(message: impl Into<String>, stderr: Option<String>) -> RadioEditError {
    RadioEditError::ExportFailed {
        message: message.into(),
        stderr,
    }
}

pub fn audio_error(message: impl Into<String>) -> RadioEditError {
    RadioEditError::AudioProcessing {
        message: message.into(),
    }
}

pub fn config_error(field: impl Into<String>, message: impl Into<String>) -> RadioEditError {
    RadioEditError::Config {
        field: field.into(),
        message: message.into(),
    }
}

pub fn fs_error(source: std::io::Error, path: PathBuf) -> RadioEditError {
    RadioEditError::FileSystem { source, path }
}

/// Attach a path or context message to `std::io` failures
pub trait IntoRadioEditError<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
    fn with_context(self, message: impl Into<String>) -> Result<T>;
}

impl<T> IntoRadioEditError<T> for std::result::Result<T, std::io::Error> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| fs_error(e, path.into()))
    }

    fn with_context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| RadioEditError::Processing {
            message: format!("{}: {}", message.into(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_stderr() {
        let err = separation_error("demucs exited with status 1", Some("CUDA OOM".to_string()));
        let text = err.to_string();
        assert!(text.contains("demucs exited with status 1"));
        assert!(text.contains("CUDA OOM"));
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(RadioEditError::Cancelled.kind(), ErrorKind::Cancelled);
        let err = RadioEditError::MalformedTimestamp { value: "abc".to_string() };
        assert_eq!(err.kind(), ErrorKind::MalformedTimestamp);
    }

    #[test]
    fn test_with_path_wraps_io_error() {
        let io: std::io::Result<()> = Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = io.with_path("/tmp/missing.wav").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileSystem);
        assert!(err.to_string().contains("/tmp/missing.wav"));
    }
}
