use log::{debug, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::alignment::AlignmentEngine;
use crate::audio::{publish, read_wav, write_wav, AudioEditor, Encoder, ExportSettings, FfmpegEncoder};
use crate::config::Config;
use crate::detector::{ProfanityDetector, ProfanityMatch};
use crate::edl::{EditDecisionList, EditPoint};
use crate::error::{ErrorKind, IntoRadioEditError, RadioEditError, Result};
use crate::lexicon::normalize_word;
use crate::lyrics::parse_lyrics;
use crate::metadata::{FfmpegTagCopier, LrcSidecar, MetadataWriter};
use crate::resources::ScratchDir;
use crate::separator::{DemucsSeparator, StemSeparator, Stems};
use crate::transcript::{ensure_ordered, TimedWord};
use crate::whisper::{Transcriber, WhisperTranscriber};

const SCRATCH_PREFIX: &str = "radio_edit_";
const MIX_FILE: &str = "mix.wav";

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Separating,
    Transcribing,
    Aligning,
    Detecting,
    Editing,
    Exporting,
    RecordingEdl,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Separating => "separating",
            Stage::Transcribing => "transcribing",
            Stage::Aligning => "aligning",
            Stage::Detecting => "detecting",
            Stage::Editing => "editing",
            Stage::Exporting => "exporting",
            Stage::RecordingEdl => "recording EDL",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Edits were found and acted on
    Completed,
    /// Processed successfully, nothing to edit
    NothingFound,
    /// The preview gate declined
    Cancelled,
    Failed,
}

/// What a run found, without the bookkeeping
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection<'a> {
    Found(&'a [ProfanityMatch]),
    NotFound,
    Error(ErrorKind),
}

/// Outcome of one workflow on one input file
#[derive(Debug)]
pub struct PipelineResult {
    pub input_path: PathBuf,
    /// Written file, `None` when nothing was exported
    pub output_path: Option<PathBuf>,
    pub matches: Vec<ProfanityMatch>,
    pub words: Vec<TimedWord>,
    pub success: bool,
    pub status: RunStatus,
    pub error: Option<RadioEditError>,
    /// Saved EDL, or the audit log of a full filter
    pub edl_path: Option<PathBuf>,
    /// Persistent stem directory referenced by a generated EDL
    pub cache_dir: Option<PathBuf>,
}

impl PipelineResult {
    fn new(input_path: &Path) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            output_path: None,
            matches: Vec::new(),
            words: Vec::new(),
            success: false,
            status: RunStatus::Failed,
            error: None,
            edl_path: None,
            cache_dir: None,
        }
    }

    pub fn detection(&self) -> Detection<'_> {
        match (&self.error, self.status) {
            (Some(error), _) => Detection::Error(error.kind()),
            (None, RunStatus::Completed) => Detection::Found(&self.matches),
            (None, RunStatus::NothingFound) => Detection::NotFound,
            (None, RunStatus::Cancelled) => Detection::Error(ErrorKind::Cancelled),
            (None, RunStatus::Failed) => Detection::Error(ErrorKind::Processing),
        }
    }

    fn finish(mut self, outcome: Result<RunStatus>) -> Self {
        match outcome {
            Ok(status) => {
                self.status = status;
                self.success = true;
            }
            Err(RadioEditError::Cancelled) => {
                self.status = RunStatus::Cancelled;
                self.success = false;
                self.error = Some(RadioEditError::Cancelled);
            }
            Err(e) => {
                warn!("{}: {}", self.input_path.display(), e);
                self.status = RunStatus::Failed;
                self.success = false;
                self.output_path = None;
                self.error = Some(e);
            }
        }
        self
    }
}

/// Which workflow a run performs
#[derive(Debug, Clone, PartialEq)]
pub enum Workflow {
    Filter,
    DetectOnly,
    GenerateEdl,
    /// Apply an EDL; `None` uses `<stem>.edl.json` next to each input
    ApplyEdl(Option<PathBuf>),
}

/// Per-run output choices
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Exact output file, overrides everything else
    pub output_path: Option<PathBuf>,
    /// Directory for outputs, EDLs and stems instead of the input's directory
    pub output_dir: Option<PathBuf>,
    /// Replace the input file instead of writing a `(clean)` copy
    pub overwrite: bool,
    /// Raw reference lyrics
    pub lyrics: Option<String>,
}

/// Confirms detected matches before any audio is edited
pub trait PreviewGate: Send + Sync {
    fn confirm(&self, input: &Path, matches: &[ProfanityMatch]) -> bool;
}

impl<F> PreviewGate for F
where
    F: Fn(&Path, &[ProfanityMatch]) -> bool + Send + Sync,
{
    fn confirm(&self, input: &Path, matches: &[ProfanityMatch]) -> bool {
        self(input, matches)
    }
}

pub type StageObserver = Arc<dyn Fn(&Path, Stage) + Send + Sync>;

/// Totals across a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub cancelled: usize,
    pub failed: usize,
    pub total_matches: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[PipelineResult]) -> Self {
        let mut summary = Self {
            processed: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status {
                RunStatus::Completed | RunStatus::NothingFound => summary.succeeded += 1,
                RunStatus::Cancelled => summary.cancelled += 1,
                RunStatus::Failed => summary.failed += 1,
            }
            summary.total_matches += result.matches.len();
        }
        summary
    }
}

struct Analysis {
    stems: Stems,
    words: Vec<TimedWord>,
    matches: Vec<ProfanityMatch>,
}

/// Orchestrates separation, transcription, alignment, detection and editing
pub struct Pipeline {
    config: Config,
    separator: Arc<dyn StemSeparator>,
    transcriber: Arc<dyn Transcriber>,
    encoder: Arc<dyn Encoder>,
    metadata: Vec<Arc<dyn MetadataWriter>>,
    detector: ProfanityDetector,
    aligner: AlignmentEngine,
    editor: AudioEditor,
    preview: Option<Arc<dyn PreviewGate>>,
    observer: Option<StageObserver>,
}

impl Pipeline {
    /// Build a pipeline with the Demucs, faster-whisper and ffmpeg collaborators
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let mut detector = ProfanityDetector::from_word_list(config.profanity_list.as_deref())?;
        detector.add_words(&config.extra_words);
        detector.remove_words(&config.allowed_words);

        Ok(Self {
            separator: Arc::new(DemucsSeparator::new(config.demucs_model)),
            transcriber: Arc::new(WhisperTranscriber::new(config.whisper_model, config.language.clone())),
            encoder: Arc::new(FfmpegEncoder),
            metadata: vec![Arc::new(FfmpegTagCopier), Arc::new(LrcSidecar)],
            detector,
            aligner: AlignmentEngine::new(config.insert_word_duration),
            editor: AudioEditor::new(config.fade_ms),
            preview: None,
            observer: None,
            config,
        })
    }

    pub fn with_separator(mut self, separator: Arc<dyn StemSeparator>) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_metadata_writers(mut self, writers: Vec<Arc<dyn MetadataWriter>>) -> Self {
        self.metadata = writers;
        self
    }

    pub fn with_detector(mut self, detector: ProfanityDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_preview(mut self, gate: Arc<dyn PreviewGate>) -> Self {
        self.preview = Some(gate);
        self
    }

    pub fn with_observer(mut self, observer: StageObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn detector(&self) -> &ProfanityDetector {
        &self.detector
    }

    fn enter(&self, input: &Path, stage: Stage) {
        debug!("{}: {}", input.display(), stage);
        if let Some(observer) = &self.observer {
            observer(input, stage);
        }
    }

    /// Dispatch one workflow
    pub async fn run(&self, input: &Path, workflow: &Workflow, options: &RunOptions) -> PipelineResult {
        match workflow {
            Workflow::Filter => self.filter(input, options).await,
            Workflow::DetectOnly => self.detect_only(input, options).await,
            Workflow::GenerateEdl => self.generate_edl(input, options).await,
            Workflow::ApplyEdl(edl_path) => self.apply_edl(input, edl_path.as_deref(), options).await,
        }
    }

    /// Separate, transcribe, detect, then mute and export when anything was found
    pub async fn filter(&self, input: &Path, options: &RunOptions) -> PipelineResult {
        let mut result = PipelineResult::new(input);
        let outcome = self.try_filter(input, options, &mut result).await;
        result.finish(outcome)
    }

    async fn try_filter(&self, input: &Path, options: &RunOptions, result: &mut PipelineResult) -> Result<RunStatus> {
        require_input(input)?;
        let output = output_path_for(input, options);
        let scratch = ScratchDir::create(SCRATCH_PREFIX)?.keep_if(self.config.keep_temp_files);

        let analysis = self
            .analyze(input, scratch.path(), options.lyrics.as_deref())
            .await?;
        result.words = analysis.words;
        result.matches = analysis.matches;

        if result.matches.is_empty() {
            info!("No profanity detected in {}", input.display());
            self.enter(input, Stage::Done);
            return Ok(RunStatus::NothingFound);
        }

        if let Some(gate) = &self.preview {
            if !gate.confirm(input, &result.matches) {
                info!("Cancelled {}", input.display());
                return Err(RadioEditError::Cancelled);
            }
        }

        let spans: Vec<(f64, f64)> = result.matches.iter().map(|m| (m.start, m.end)).collect();
        self.render_and_export(input, &output, &analysis.stems, spans, scratch.path(), &result.words)
            .await?;
        result.output_path = Some(output.clone());

        let audit = EditDecisionList::from_matches(input, &result.matches, None);
        let audit_path = audit_log_path(&output);
        match audit.save(&audit_path).await {
            Ok(()) => result.edl_path = Some(audit_path),
            Err(e) => warn!("Failed to write audit log: {}", e),
        }

        info!(
            "Cleaned {} profanities -> {}",
            result.matches.len(),
            output.display()
        );
        self.enter(input, Stage::Done);
        Ok(RunStatus::Completed)
    }

    /// Separate, transcribe and detect without touching any audio
    pub async fn detect_only(&self, input: &Path, options: &RunOptions) -> PipelineResult {
        let mut result = PipelineResult::new(input);
        let outcome = self.try_detect_only(input, options, &mut result).await;
        result.finish(outcome)
    }

    async fn try_detect_only(
        &self,
        input: &Path,
        options: &RunOptions,
        result: &mut PipelineResult,
    ) -> Result<RunStatus> {
        require_input(input)?;
        let scratch = ScratchDir::create(SCRATCH_PREFIX)?.keep_if(self.config.keep_temp_files);
        let analysis = self
            .analyze(input, scratch.path(), options.lyrics.as_deref())
            .await?;
        result.words = analysis.words;
        result.matches = analysis.matches;
        self.enter(input, Stage::Done);

        Ok(if result.matches.is_empty() {
            RunStatus::NothingFound
        } else {
            RunStatus::Completed
        })
    }

    /// Detect into a reviewable EDL, caching stems for a later `apply_edl`
    pub async fn generate_edl(&self, input: &Path, options: &RunOptions) -> PipelineResult {
        let mut result = PipelineResult::new(input);
        let outcome = self.try_generate_edl(input, options, &mut result).await;
        result.finish(outcome)
    }

    async fn try_generate_edl(
        &self,
        input: &Path,
        options: &RunOptions,
        result: &mut PipelineResult,
    ) -> Result<RunStatus> {
        require_input(input)?;

        if let Some(lyrics) = options.lyrics.as_deref() {
            let hits = self.detector.scan_text(lyrics);
            if hits.is_empty() {
                info!("Lyrics for {} contain no profanity, skipping analysis", input.display());
                self.enter(input, Stage::Done);
                return Ok(RunStatus::NothingFound);
            }
            debug!("Lyrics pre-check found: {:?}", hits);
        }

        let stems_dir = sibling_path(input, options, "stems");
        // An existing stems dir may back an earlier EDL; only remove what this run created
        let reused = stems_dir.is_dir();
        tokio::fs::create_dir_all(&stems_dir).await.with_path(&stems_dir)?;
        let stems_guard = ScratchDir::new(stems_dir).keep_if(self.config.keep_temp_files || reused);

        let analysis = self
            .analyze(input, stems_guard.path(), options.lyrics.as_deref())
            .await?;
        result.words = analysis.words;
        result.matches = analysis.matches;

        if result.matches.is_empty() {
            info!("No profanity found in {}, no EDL generated", input.display());
            if !reused {
                stems_guard.cleanup()?;
            }
            self.enter(input, Stage::Done);
            return Ok(RunStatus::NothingFound);
        }

        self.enter(input, Stage::RecordingEdl);
        let cache_dir = analysis
            .stems
            .dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| stems_guard.path().to_path_buf());
        let edl = EditDecisionList::from_matches(input, &result.matches, Some(cache_dir.clone()));
        let edl_path = edl_path_for(input, options);
        edl.save(&edl_path).await?;

        stems_guard.take_path();
        result.edl_path = Some(edl_path);
        result.cache_dir = Some(cache_dir);
        self.enter(input, Stage::Done);
        Ok(RunStatus::Completed)
    }

    /// Mute the spans of a (possibly hand-edited) EDL and export.
    ///
    /// Cached stems are reused when the EDL's cache directory still holds them.
    pub async fn apply_edl(&self, input: &Path, edl_path: Option<&Path>, options: &RunOptions) -> PipelineResult {
        let mut result = PipelineResult::new(input);
        let outcome = self.try_apply_edl(input, edl_path, options, &mut result).await;
        result.finish(outcome)
    }

    async fn try_apply_edl(
        &self,
        input: &Path,
        edl_path: Option<&Path>,
        options: &RunOptions,
        result: &mut PipelineResult,
    ) -> Result<RunStatus> {
        require_input(input)?;
        let edl_path = edl_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| edl_path_for(input, options));
        let edl = EditDecisionList::load(&edl_path).await?;
        result.edl_path = Some(edl_path);

        if edl.source_file != input {
            debug!(
                "EDL was generated for {}, applying to {}",
                edl.source_file.display(),
                input.display()
            );
        }

        result.matches = edl.edits.iter().map(match_from_edit).collect();
        if edl.edits.is_empty() {
            info!("No edits in EDL for {}", input.display());
            self.enter(input, Stage::Done);
            return Ok(RunStatus::NothingFound);
        }

        let scratch = ScratchDir::create(SCRATCH_PREFIX)?.keep_if(self.config.keep_temp_files);
        let cached = edl
            .cache_dir
            .as_deref()
            .and_then(|dir| Stems::locate(dir).map(|stems| (dir.to_path_buf(), stems)));
        let stems = match cached {
            Some((dir, stems)) => {
                info!("Reusing cached stems from {}", dir.display());
                result.cache_dir = Some(dir);
                stems
            }
            None => {
                self.enter(input, Stage::Separating);
                self.separator.separate(input, scratch.path()).await?
            }
        };

        let output = output_path_for(input, options);
        self.render_and_export(input, &output, &stems, edl.spans(), scratch.path(), &[])
            .await?;
        result.output_path = Some(output.clone());

        info!("Applied {} edits -> {}", edl.edits.len(), output.display());
        self.enter(input, Stage::Done);
        Ok(RunStatus::Completed)
    }

    /// Run one workflow over many inputs, at most `jobs` at a time.
    ///
    /// Results come back in input order and one failure never stops the rest.
    pub async fn run_batch(
        self: &Arc<Self>,
        inputs: &[PathBuf],
        workflow: Workflow,
        options: RunOptions,
    ) -> Vec<PipelineResult> {
        let permits = Arc::new(Semaphore::new(self.config.jobs.max(1)));
        let workflow = Arc::new(workflow);
        let options = Arc::new(options);
        let mut tasks = JoinSet::new();

        for (index, input) in inputs.iter().cloned().enumerate() {
            let pipeline = Arc::clone(self);
            let permits = Arc::clone(&permits);
            let workflow = Arc::clone(&workflow);
            let options = Arc::clone(&options);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let result = pipeline.run(&input, &workflow, &options).await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<PipelineResult>> = inputs.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!("Pipeline task failed: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(inputs)
            .map(|(slot, input)| {
                slot.unwrap_or_else(|| {
                    PipelineResult::new(input).finish(Err(RadioEditError::Processing {
                        message: "pipeline task aborted".to_string(),
                    }))
                })
            })
            .collect()
    }

    async fn analyze(&self, input: &Path, work_dir: &Path, lyrics: Option<&str>) -> Result<Analysis> {
        self.enter(input, Stage::Separating);
        let stems = self.separator.separate(input, work_dir).await?;

        self.enter(input, Stage::Transcribing);
        let transcript = self.transcriber.transcribe(&stems.vocals).await?;
        ensure_ordered(&transcript)?;

        self.enter(input, Stage::Aligning);
        let reference = lyrics.map(parse_lyrics);
        let words = self.aligner.reconcile(&transcript, reference.as_deref());

        self.enter(input, Stage::Detecting);
        let matches = self.detector.detect(&words);
        Ok(Analysis { stems, words, matches })
    }

    async fn render_and_export(
        &self,
        input: &Path,
        output: &Path,
        stems: &Stems,
        spans: Vec<(f64, f64)>,
        scratch: &Path,
        words: &[TimedWord],
    ) -> Result<()> {
        self.enter(input, Stage::Editing);
        let mix_path = scratch.join(MIX_FILE);
        let muted = self.render(stems, spans, mix_path.clone()).await?;
        debug!("Muted {} spans in {}", muted, stems.vocals.display());

        self.enter(input, Stage::Exporting);
        let settings = ExportSettings::for_output(output, self.config.output_bitrate.clone());
        let staged = scratch.join(format!("export.{}", settings.format));
        self.encoder.encode(&mix_path, &staged, &settings).await?;

        // Overwriting replaces the input, so tag copies need it preserved first
        let original = if input == output && !self.metadata.is_empty() {
            let extension = input.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default();
            let kept = scratch.join(format!("original.{}", extension));
            match tokio::fs::copy(input, &kept).await {
                Ok(_) => Some(kept),
                Err(e) => {
                    warn!("Could not preserve original for metadata: {}", e);
                    None
                }
            }
        } else {
            Some(input.to_path_buf())
        };

        publish(&staged, output).await?;

        if let Some(original) = original {
            for writer in &self.metadata {
                if let Err(e) = writer.write(&original, output, words).await {
                    warn!("{} metadata step failed for {}: {}", writer.name(), output.display(), e);
                }
            }
        }
        Ok(())
    }

    async fn render(&self, stems: &Stems, spans: Vec<(f64, f64)>, mix_path: PathBuf) -> Result<usize> {
        let editor = self.editor.clone();
        let vocals_path = stems.vocals.clone();
        let instrumental_path = stems.instrumental.clone();

        tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut vocals = read_wav(&vocals_path)?;
            let muted = editor.mute_in_place(&mut vocals, &spans);
            let instrumental = read_wav(&instrumental_path)?;
            let mixed = editor.combine(&vocals, &instrumental)?;
            write_wav(&mix_path, &mixed)?;
            Ok(muted)
        })
        .await
        .map_err(|e| RadioEditError::Processing {
            message: format!("Editing task failed: {}", e),
        })?
    }
}

fn require_input(input: &Path) -> Result<()> {
    if input.is_file() {
        Ok(())
    } else {
        Err(RadioEditError::InputNotFound {
            path: input.to_path_buf(),
        })
    }
}

fn match_from_edit(edit: &EditPoint) -> ProfanityMatch {
    ProfanityMatch {
        canonical_word: normalize_word(&edit.word),
        observed_word: edit.word.clone(),
        start: edit.start,
        end: edit.end,
        confidence: edit.confidence,
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string())
}

fn target_dir(input: &Path, options: &RunOptions) -> PathBuf {
    options
        .output_dir
        .clone()
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default()
}

/// `<dir>/<stem> (clean)<ext>`, or the input itself when overwriting in place
pub fn output_path_for(input: &Path, options: &RunOptions) -> PathBuf {
    if let Some(path) = &options.output_path {
        return path.clone();
    }
    if options.overwrite && options.output_dir.is_none() {
        return input.to_path_buf();
    }
    let extension = input
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    target_dir(input, options).join(format!("{} (clean){}", file_stem(input), extension))
}

/// `<dir>/<stem>.edl.json`, honoring the output directory override
pub fn edl_path_for(input: &Path, options: &RunOptions) -> PathBuf {
    match &options.output_dir {
        Some(dir) => dir.join(format!("{}.edl.json", file_stem(input))),
        None => EditDecisionList::default_path_for(input),
    }
}

fn sibling_path(input: &Path, options: &RunOptions, suffix: &str) -> PathBuf {
    target_dir(input, options).join(format!("{}.{}", file_stem(input), suffix))
}

/// `<output dir>/<output stem>.edits.json`
pub fn audit_log_path(output: &Path) -> PathBuf {
    output.with_file_name(format!("{}.edits.json", file_stem(output)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioBuffer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    const RATE: u32 = 1000;

    /// Writes constant-level stems: vocals at 0.5, instrumental at 0.25
    #[derive(Default)]
    struct FakeSeparator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StemSeparator for FakeSeparator {
        fn name(&self) -> &str {
            "fake"
        }

        async fn separate(&self, audio_path: &Path, output_dir: &Path) -> Result<Stems> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let dir = output_dir.join("fake").join(file_stem(audio_path));
            std::fs::create_dir_all(&dir).unwrap();
            let stems = Stems::in_dir(&dir);
            write_wav(&stems.vocals, &AudioBuffer::new(vec![0.5; RATE as usize], RATE, 1))?;
            write_wav(&stems.instrumental, &AudioBuffer::new(vec![0.25; RATE as usize], RATE, 1))?;
            Ok(stems)
        }
    }

    struct ScriptedTranscriber {
        words: Vec<TimedWord>,
    }

    #[async_trait]
    impl Transcriber for ScriptedTranscriber {
        async fn transcribe(&self, _audio_path: &Path) -> Result<Vec<TimedWord>> {
            Ok(self.words.clone())
        }
    }

    struct CopyEncoder;

    #[async_trait]
    impl Encoder for CopyEncoder {
        async fn encode(&self, wav_path: &Path, output_path: &Path, _settings: &ExportSettings) -> Result<()> {
            tokio::fs::copy(wav_path, output_path).await.with_path(output_path)?;
            Ok(())
        }
    }

    fn word(text: &str, start: f64, end: f64) -> TimedWord {
        TimedWord::transcribed(text, start, end, 0.9)
    }

    fn profane_words() -> Vec<TimedWord> {
        vec![word("what", 0.0, 0.2), word("fuck", 0.4, 0.6)]
    }

    fn pipeline(separator: Arc<FakeSeparator>, words: Vec<TimedWord>) -> Pipeline {
        Pipeline::new(Config::default())
            .unwrap()
            .with_separator(separator)
            .with_transcriber(Arc::new(ScriptedTranscriber { words }))
            .with_encoder(Arc::new(CopyEncoder))
            .with_metadata_writers(vec![Arc::new(LrcSidecar)])
    }

    fn input_in(dir: &Path, name: &str) -> PathBuf {
        let input = dir.join(name);
        std::fs::write(&input, b"not really audio").unwrap();
        input
    }

    #[tokio::test]
    async fn test_filter_mutes_and_exports() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        let pipeline = pipeline(Arc::new(FakeSeparator::default()), profane_words());

        let result = pipeline.filter(&input, &RunOptions::default()).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.status, RunStatus::Completed);
        assert!(matches!(result.detection(), Detection::Found(found) if found.len() == 1));

        let output = dir.path().join("song (clean).wav");
        assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
        let mixed = read_wav(&output).unwrap();
        assert!((mixed.samples()[100] - 0.75).abs() < 1e-6);
        assert!((mixed.samples()[500] - 0.25).abs() < 1e-6);
        assert!((mixed.samples()[900] - 0.75).abs() < 1e-6);

        let audit = dir.path().join("song (clean).edits.json");
        assert_eq!(result.edl_path.as_deref(), Some(audit.as_path()));
        let edl = EditDecisionList::load(&audit).await.unwrap();
        assert_eq!(edl.edits.len(), 1);
        assert_eq!(edl.edits[0].word, "fuck");

        assert!(dir.path().join("song (clean).wav.lrc").exists());
    }

    #[tokio::test]
    async fn test_filter_nothing_found_writes_nothing() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        let words = vec![word("good", 0.0, 0.3), word("morning", 0.3, 0.7)];
        let pipeline = pipeline(Arc::new(FakeSeparator::default()), words);

        let result = pipeline.filter(&input, &RunOptions::default()).await;
        assert!(result.success);
        assert_eq!(result.status, RunStatus::NothingFound);
        assert!(result.output_path.is_none());
        assert_eq!(result.words.len(), 2);
        assert!(!dir.path().join("song (clean).wav").exists());
    }

    #[tokio::test]
    async fn test_filter_cancelled_by_preview() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        let gate = |_: &Path, _: &[ProfanityMatch]| false;
        let pipeline = pipeline(Arc::new(FakeSeparator::default()), profane_words()).with_preview(Arc::new(gate));

        let result = pipeline.filter(&input, &RunOptions::default()).await;
        assert!(!result.success);
        assert_eq!(result.status, RunStatus::Cancelled);
        assert_eq!(result.detection(), Detection::Error(ErrorKind::Cancelled));
        assert_eq!(result.matches.len(), 1);
        assert!(!dir.path().join("song (clean).wav").exists());
    }

    #[tokio::test]
    async fn test_filter_aligns_against_lyrics() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        // Recognizer heard "duck"; lyrics say otherwise
        let words = vec![word("what", 0.0, 0.2), word("the", 0.2, 0.3), word("duck", 0.4, 0.6)];
        let pipeline = pipeline(Arc::new(FakeSeparator::default()), words);
        let options = RunOptions {
            lyrics: Some("[Chorus]\nwhat the fuck".to_string()),
            ..Default::default()
        };

        let result = pipeline.detect_only(&input, &options).await;
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].observed_word, "fuck");
        assert!((result.matches[0].start - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_config_word_overrides_reach_detector() {
        let config = Config::builder()
            .extra_words(vec!["Heck".to_string()])
            .allowed_words(vec!["fuck".to_string()])
            .build()
            .unwrap();
        let pipeline = Pipeline::new(config).unwrap();

        assert!(pipeline.detector().lexicon().contains("heck"));
        assert!(!pipeline.detector().lexicon().contains("fuck"));
    }

    #[tokio::test]
    async fn test_detect_only_never_exports() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        let pipeline = pipeline(Arc::new(FakeSeparator::default()), profane_words());

        let result = pipeline.detect_only(&input, &RunOptions::default()).await;
        assert!(result.success);
        assert_eq!(result.matches.len(), 1);
        assert!(result.output_path.is_none());
        assert!(!dir.path().join("song (clean).wav").exists());
    }

    #[tokio::test]
    async fn test_missing_input_fails() {
        let pipeline = pipeline(Arc::new(FakeSeparator::default()), profane_words());
        let result = pipeline
            .filter(Path::new("/nonexistent/song.mp3"), &RunOptions::default())
            .await;
        assert!(!result.success);
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.error.map(|e| e.kind()), Some(ErrorKind::InputNotFound));
    }

    #[tokio::test]
    async fn test_unordered_transcript_is_rejected() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        let words = vec![word("fuck", 0.5, 0.6), word("what", 0.0, 0.2)];
        let pipeline = pipeline(Arc::new(FakeSeparator::default()), words);

        let result = pipeline.filter(&input, &RunOptions::default()).await;
        assert_eq!(result.error.map(|e| e.kind()), Some(ErrorKind::TranscriptionFailed));
        assert!(!dir.path().join("song (clean).wav").exists());
    }

    #[tokio::test]
    async fn test_generate_edl_short_circuits_on_clean_lyrics() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        let separator = Arc::new(FakeSeparator::default());
        let pipeline = pipeline(Arc::clone(&separator), profane_words());
        let options = RunOptions {
            lyrics: Some("good morning sunshine".to_string()),
            ..Default::default()
        };

        let result = pipeline.generate_edl(&input, &options).await;
        assert!(result.success);
        assert_eq!(result.detection(), Detection::NotFound);
        assert!(result.matches.is_empty());
        assert_eq!(separator.calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("song.stems").exists());
        assert!(!dir.path().join("song.edl.json").exists());
    }

    #[tokio::test]
    async fn test_generate_edl_without_matches_removes_stems() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        let pipeline = pipeline(Arc::new(FakeSeparator::default()), vec![word("good", 0.0, 0.3)]);

        let result = pipeline.generate_edl(&input, &RunOptions::default()).await;
        assert_eq!(result.status, RunStatus::NothingFound);
        assert!(!dir.path().join("song.stems").exists());
    }

    #[tokio::test]
    async fn test_generate_edl_keeps_existing_stems_dir() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        let stems_dir = dir.path().join("song.stems");
        std::fs::create_dir(&stems_dir).unwrap();
        std::fs::write(stems_dir.join("earlier.txt"), b"cached").unwrap();

        let clean = pipeline(Arc::new(FakeSeparator::default()), vec![word("good", 0.0, 0.3)]);
        let result = clean.generate_edl(&input, &RunOptions::default()).await;
        assert_eq!(result.status, RunStatus::NothingFound);
        assert!(stems_dir.join("earlier.txt").exists());

        let failing = pipeline(Arc::new(FakeSeparator::default()), vec![word("b", 1.0, 1.5), word("a", 0.0, 0.5)]);
        let result = failing.generate_edl(&input, &RunOptions::default()).await;
        assert_eq!(result.status, RunStatus::Failed);
        assert!(stems_dir.join("earlier.txt").exists());
    }

    #[tokio::test]
    async fn test_generate_then_apply_reuses_stems() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        let separator = Arc::new(FakeSeparator::default());
        let pipeline = pipeline(Arc::clone(&separator), profane_words());

        let generated = pipeline.generate_edl(&input, &RunOptions::default()).await;
        assert_eq!(generated.status, RunStatus::Completed);
        let edl_path = dir.path().join("song.edl.json");
        assert_eq!(generated.edl_path.as_deref(), Some(edl_path.as_path()));
        let cache_dir = generated.cache_dir.unwrap();
        assert!(cache_dir.starts_with(dir.path().join("song.stems")));
        assert!(Stems::locate(&cache_dir).is_some());

        let first = RunOptions {
            output_path: Some(dir.path().join("first.wav")),
            ..Default::default()
        };
        let second = RunOptions {
            output_path: Some(dir.path().join("second.wav")),
            ..Default::default()
        };
        let a = pipeline.apply_edl(&input, None, &first).await;
        let b = pipeline.apply_edl(&input, None, &second).await;
        assert!(a.success && b.success);
        assert_eq!(a.cache_dir.as_deref(), Some(cache_dir.as_path()));
        assert_eq!(separator.calls.load(Ordering::SeqCst), 1);

        let first_bytes = std::fs::read(dir.path().join("first.wav")).unwrap();
        let second_bytes = std::fs::read(dir.path().join("second.wav")).unwrap();
        assert_eq!(first_bytes, second_bytes);
    }

    #[tokio::test]
    async fn test_apply_hand_edited_edl_without_cache() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        let edl_path = dir.path().join("edited.json");
        std::fs::write(
            &edl_path,
            r#"{
                "source_file": "song.wav",
                "generated_at": "2024-01-01T00:00:00",
                "cache_dir": "/nonexistent/stems",
                "edits": [
                    {"start": "0:00.10", "end": "0:00.20", "word": "added by hand"},
                    {"start": 0.7, "end": 0.8, "word": "fuck", "confidence": 0.9}
                ],
                "reviewer": "ignored"
            }"#,
        )
        .unwrap();

        let separator = Arc::new(FakeSeparator::default());
        let pipeline = pipeline(Arc::clone(&separator), Vec::new());
        let result = pipeline.apply_edl(&input, Some(&edl_path), &RunOptions::default()).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.matches.len(), 2);
        assert_eq!(separator.calls.load(Ordering::SeqCst), 1);

        let mixed = read_wav(&dir.path().join("song (clean).wav")).unwrap();
        assert!((mixed.samples()[150] - 0.25).abs() < 1e-6);
        assert!((mixed.samples()[500] - 0.75).abs() < 1e-6);
        assert!((mixed.samples()[750] - 0.25).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_apply_missing_edl() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        let pipeline = pipeline(Arc::new(FakeSeparator::default()), Vec::new());

        let result = pipeline.apply_edl(&input, None, &RunOptions::default()).await;
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.error.map(|e| e.kind()), Some(ErrorKind::EdlNotFound));
    }

    #[tokio::test]
    async fn test_observer_sees_stages_in_order() {
        let dir = tempdir().unwrap();
        let input = input_in(dir.path(), "song.wav");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let pipeline = pipeline(Arc::new(FakeSeparator::default()), profane_words())
            .with_observer(Arc::new(move |_: &Path, stage: Stage| sink.lock().unwrap().push(stage)));

        pipeline.filter(&input, &RunOptions::default()).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Stage::Separating,
                Stage::Transcribing,
                Stage::Aligning,
                Stage::Detecting,
                Stage::Editing,
                Stage::Exporting,
                Stage::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order() {
        let dir = tempdir().unwrap();
        let inputs = vec![
            dir.path().join("missing.wav"),
            input_in(dir.path(), "one.wav"),
            input_in(dir.path(), "two.wav"),
        ];
        let config = Config {
            jobs: 2,
            ..Default::default()
        };
        let pipeline = Arc::new(
            Pipeline::new(config)
                .unwrap()
                .with_separator(Arc::new(FakeSeparator::default()))
                .with_transcriber(Arc::new(ScriptedTranscriber { words: profane_words() }))
                .with_encoder(Arc::new(CopyEncoder))
                .with_metadata_writers(Vec::new()),
        );

        let results = pipeline
            .run_batch(&inputs, Workflow::DetectOnly, RunOptions::default())
            .await;
        let order: Vec<&Path> = results.iter().map(|r| r.input_path.as_path()).collect();
        assert_eq!(order, inputs.iter().map(PathBuf::as_path).collect::<Vec<_>>());
        assert_eq!(results[0].status, RunStatus::Failed);

        let summary = BatchSummary::from_results(&results);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_matches, 2);
    }

    #[test]
    fn test_output_paths() {
        let input = Path::new("/music/My Song.mp3");
        assert_eq!(
            output_path_for(input, &RunOptions::default()),
            PathBuf::from("/music/My Song (clean).mp3")
        );

        let overwrite = RunOptions {
            overwrite: true,
            ..Default::default()
        };
        assert_eq!(output_path_for(input, &overwrite), PathBuf::from("/music/My Song.mp3"));

        let redirected = RunOptions {
            output_dir: Some(PathBuf::from("/clean")),
            ..Default::default()
        };
        assert_eq!(output_path_for(input, &redirected), PathBuf::from("/clean/My Song (clean).mp3"));
        assert_eq!(edl_path_for(input, &redirected), PathBuf::from("/clean/My Song.edl.json"));
        assert_eq!(
            audit_log_path(Path::new("/clean/My Song (clean).mp3")),
            PathBuf::from("/clean/My Song (clean).edits.json")
        );
    }
}
