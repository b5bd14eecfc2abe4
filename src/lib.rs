// Core algorithms
pub mod alignment;
pub mod detector;
pub mod edl;
pub mod lexicon;
pub mod lyrics;
pub mod transcript;

// Audio and external collaborators
pub mod audio;
pub mod metadata;
pub mod separator;
pub mod whisper;

// Orchestration and ambient support
pub mod config;
pub mod config_file;
pub mod dependencies;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod resources;

// Re-export commonly used types
pub use alignment::AlignmentEngine;
pub use audio::{AudioBuffer, AudioEditor, Encoder, ExportSettings, FfmpegEncoder};
pub use config::{Config, ConfigBuilder, DemucsModel, WhisperModel};
pub use config_file::{ConfigFile, ProfileConfig};
pub use detector::{ProfanityDetector, ProfanityMatch};
pub use edl::{EditDecisionList, EditPoint};
pub use error::{ErrorKind, RadioEditError, Result};
pub use lexicon::Lexicon;
pub use metadata::{FfmpegTagCopier, LrcSidecar, MetadataWriter};
pub use pipeline::{BatchSummary, Detection, Pipeline, PipelineResult, PreviewGate, RunOptions, RunStatus, Stage, Workflow};
pub use progress::{ProgressOperation, ProgressTracker};
pub use resources::ScratchDir;
pub use separator::{DemucsSeparator, StemSeparator, Stems};
pub use transcript::{Provenance, TimedWord};
pub use whisper::{Transcriber, WhisperTranscriber};
