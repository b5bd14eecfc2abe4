use std::path::PathBuf;

use crate::alignment::DEFAULT_INSERT_WORD_DURATION;
use crate::audio::DEFAULT_FADE_MS;
use crate::error::{config_error, RadioEditError, Result};

const MAX_FADE_MS: u32 = 1000;
const MAX_JOBS: usize = 64;

/// Whisper model variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhisperModel {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl WhisperModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "tiny",
            WhisperModel::Base => "base",
            WhisperModel::Small => "small",
            WhisperModel::Medium => "medium",
            WhisperModel::Large => "large",
        }
    }
}

impl std::str::FromStr for WhisperModel {
    type Err = RadioEditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(WhisperModel::Tiny),
            "base" => Ok(WhisperModel::Base),
            "small" => Ok(WhisperModel::Small),
            "medium" => Ok(WhisperModel::Medium),
            "large" => Ok(WhisperModel::Large),
            _ => Err(config_error(
                "whisper_model",
                format!("Invalid model '{}'. Valid options: tiny, base, small, medium, large", s),
            )),
        }
    }
}

/// Demucs model variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemucsModel {
    Htdemucs,
    HtdemucsFt,
    MdxExtra,
}

impl DemucsModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemucsModel::Htdemucs => "htdemucs",
            DemucsModel::HtdemucsFt => "htdemucs_ft",
            DemucsModel::MdxExtra => "mdx_extra",
        }
    }
}

impl std::str::FromStr for DemucsModel {
    type Err = RadioEditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "htdemucs" => Ok(DemucsModel::Htdemucs),
            "htdemucs_ft" => Ok(DemucsModel::HtdemucsFt),
            "mdx_extra" => Ok(DemucsModel::MdxExtra),
            _ => Err(config_error(
                "demucs_model",
                format!("Invalid model '{}'. Valid options: htdemucs, htdemucs_ft, mdx_extra", s),
            )),
        }
    }
}

/// Runtime configuration shared by every pipeline run
#[derive(Debug, Clone)]
pub struct Config {
    pub whisper_model: WhisperModel,
    pub demucs_model: DemucsModel,
    pub language: String,
    pub profanity_list: Option<PathBuf>,
    /// Added to the lexicon after loading
    pub extra_words: Vec<String>,
    /// Removed from the lexicon after loading
    pub allowed_words: Vec<String>,
    pub fade_ms: u32,
    pub insert_word_duration: f64,
    pub output_bitrate: String,
    pub keep_temp_files: bool,
    pub jobs: usize,
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(ref list) = self.profanity_list {
            if !list.is_file() {
                return Err(config_error(
                    "profanity_list",
                    format!("Profanity word list not found: {}", list.display()),
                ));
            }
        }

        if self.fade_ms > MAX_FADE_MS {
            return Err(config_error(
                "fade_ms",
                format!("Fade margin must be at most {} ms, got {}", MAX_FADE_MS, self.fade_ms),
            ));
        }

        if !(self.insert_word_duration > 0.0 && self.insert_word_duration <= 5.0) {
            return Err(config_error(
                "insert_word_duration",
                format!(
                    "Insert word duration must be in (0, 5] seconds, got {}",
                    self.insert_word_duration
                ),
            ));
        }

        if self.language.trim().is_empty() {
            return Err(config_error("language", "Language cannot be empty"));
        }

        if !(1..=MAX_JOBS).contains(&self.jobs) {
            return Err(config_error(
                "jobs",
                format!("Jobs must be between 1 and {}, got {}", MAX_JOBS, self.jobs),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            whisper_model: WhisperModel::Base,
            demucs_model: DemucsModel::Htdemucs,
            language: "en".to_string(),
            profanity_list: None,
            extra_words: Vec::new(),
            allowed_words: Vec::new(),
            fade_ms: DEFAULT_FADE_MS,
            insert_word_duration: DEFAULT_INSERT_WORD_DURATION,
            output_bitrate: "320k".to_string(),
            keep_temp_files: false,
            jobs: 1,
        }
    }
}

/// Builder pattern for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    whisper_model: Option<WhisperModel>,
    demucs_model: Option<DemucsModel>,
    language: Option<String>,
    profanity_list: Option<PathBuf>,
    extra_words: Vec<String>,
    allowed_words: Vec<String>,
    fade_ms: Option<u32>,
    insert_word_duration: Option<f64>,
    output_bitrate: Option<String>,
    keep_temp_files: Option<bool>,
    jobs: Option<usize>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn whisper_model(mut self, model: WhisperModel) -> Self {
        self.whisper_model = Some(model);
        self
    }

    pub fn demucs_model(mut self, model: DemucsModel) -> Self {
        self.demucs_model = Some(model);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn profanity_list(mut self, path: PathBuf) -> Self {
        self.profanity_list = Some(path);
        self
    }

    pub fn extra_words(mut self, words: Vec<String>) -> Self {
        self.extra_words.extend(words);
        self
    }

    pub fn allowed_words(mut self, words: Vec<String>) -> Self {
        self.allowed_words.extend(words);
        self
    }

    pub fn fade_ms(mut self, fade_ms: u32) -> Result<Self> {
        if fade_ms > MAX_FADE_MS {
            return Err(config_error(
                "fade_ms",
                format!("Fade margin must be at most {} ms, got {}", MAX_FADE_MS, fade_ms),
            ));
        }
        self.fade_ms = Some(fade_ms);
        Ok(self)
    }

    pub fn insert_word_duration(mut self, seconds: f64) -> Result<Self> {
        if !(seconds > 0.0 && seconds <= 5.0) {
            return Err(config_error(
                "insert_word_duration",
                format!("Insert word duration must be in (0, 5] seconds, got {}", seconds),
            ));
        }
        self.insert_word_duration = Some(seconds);
        Ok(self)
    }

    pub fn output_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.output_bitrate = Some(bitrate.into());
        self
    }

    pub fn keep_temp_files(mut self, keep: bool) -> Self {
        self.keep_temp_files = Some(keep);
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Result<Self> {
        if !(1..=MAX_JOBS).contains(&jobs) {
            return Err(config_error(
                "jobs",
                format!("Jobs must be between 1 and {}, got {}", MAX_JOBS, jobs),
            ));
        }
        self.jobs = Some(jobs);
        Ok(self)
    }

    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();
        let config = Config {
            whisper_model: self.whisper_model.unwrap_or(defaults.whisper_model),
            demucs_model: self.demucs_model.unwrap_or(defaults.demucs_model),
            language: self.language.unwrap_or(defaults.language),
            profanity_list: self.profanity_list,
            extra_words: self.extra_words,
            allowed_words: self.allowed_words,
            fade_ms: self.fade_ms.unwrap_or(defaults.fade_ms),
            insert_word_duration: self.insert_word_duration.unwrap_or(defaults.insert_word_duration),
            output_bitrate: self.output_bitrate.unwrap_or(defaults.output_bitrate),
            keep_temp_files: self.keep_temp_files.unwrap_or(defaults.keep_temp_files),
            jobs: self.jobs.unwrap_or(defaults.jobs),
        };

        config.validate()?;
        Ok(config)
    }
}
