use crate::config::{ConfigBuilder, DemucsModel, WhisperModel};
use crate::error::{config_error, IntoRadioEditError, RadioEditError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file format that can be serialized to YAML/JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Default whisper model to use
    pub whisper_model: Option<String>,
    /// Default demucs model to use
    pub demucs_model: Option<String>,
    /// Transcription language
    pub language: Option<String>,
    /// Custom profanity word list file
    pub profanity_list: Option<PathBuf>,
    /// Words to flag in addition to the list
    pub extra_words: Option<Vec<String>>,
    /// Words never to flag
    pub allowed_words: Option<Vec<String>>,
    /// Silence margin around each muted word, in milliseconds
    pub fade_ms: Option<u32>,
    /// Duration estimate for lyric words the recognizer missed, in seconds
    pub insert_word_duration: Option<f64>,
    /// Bitrate for lossy outputs, e.g. "320k"
    pub output_bitrate: Option<String>,
    /// Default output directory
    pub output_directory: Option<PathBuf>,
    /// Keep scratch directories for debugging
    pub keep_temp_files: Option<bool>,
    /// Files processed concurrently
    pub jobs: Option<usize>,
    /// Enable progress indicators by default
    pub show_progress: Option<bool>,
    /// Custom profiles
    pub profiles: Option<BTreeMap<String, ProfileConfig>>,
}

/// Profile-specific configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub whisper_model: Option<String>,
    pub demucs_model: Option<String>,
    pub fade_ms: Option<u32>,
    pub insert_word_duration: Option<f64>,
    pub extra_words: Option<Vec<String>>,
    pub description: Option<String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();

        profiles.insert("fast".to_string(), ProfileConfig {
            whisper_model: Some("tiny".to_string()),
            description: Some("Quick pass with the smallest transcription model".to_string()),
            ..Default::default()
        });

        profiles.insert("accurate".to_string(), ProfileConfig {
            whisper_model: Some("medium".to_string()),
            demucs_model: Some("htdemucs_ft".to_string()),
            description: Some("Slower, more precise separation and transcription".to_string()),
            ..Default::default()
        });

        profiles.insert("strict".to_string(), ProfileConfig {
            fade_ms: Some(50),
            description: Some("Wider silence margin around every muted word".to_string()),
            ..Default::default()
        });

        Self {
            whisper_model: Some("base".to_string()),
            demucs_model: Some("htdemucs".to_string()),
            language: Some("en".to_string()),
            profanity_list: None,
            extra_words: None,
            allowed_words: None,
            fade_ms: Some(10),
            insert_word_duration: Some(0.3),
            output_bitrate: Some("320k".to_string()),
            output_directory: None,
            keep_temp_files: Some(false),
            jobs: Some(1),
            show_progress: Some(true),
            profiles: Some(profiles),
        }
    }
}

fn parse_error(format: &str, e: impl std::fmt::Display) -> RadioEditError {
    config_error("config_file", format!("Failed to parse {} config: {}", format, e))
}

impl ConfigFile {
    /// Load configuration from a YAML file
    pub async fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).await.with_path(path.as_ref())?;
        serde_yaml::from_str(&contents).map_err(|e| parse_error("YAML", e))
    }

    /// Load configuration from a JSON file
    pub async fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).await.with_path(path.as_ref())?;
        serde_json::from_str(&contents).map_err(|e| parse_error("JSON", e))
    }

    /// Auto-detect and load configuration file based on extension
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Self::load_yaml(path).await,
            Some("json") => Self::load_json(path).await,
            Some(ext) => Err(RadioEditError::UnsupportedFormat {
                extension: ext.to_string(),
                supported: vec!["yaml".to_string(), "yml".to_string(), "json".to_string()],
            }),
            None => Err(config_error(
                "config_file",
                "Config file must have .yaml, .yml, or .json extension",
            )),
        }
    }

    /// Save configuration to YAML file
    pub async fn save_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml_content = serde_yaml::to_string(self).map_err(|e| {
            config_error("config_file", format!("Failed to serialize config to YAML: {}", e))
        })?;
        fs::write(path.as_ref(), yaml_content).await.with_path(path.as_ref())
    }

    /// Save configuration to JSON file
    pub async fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json_content = serde_json::to_string_pretty(self).map_err(|e| {
            config_error("config_file", format!("Failed to serialize config to JSON: {}", e))
        })?;
        fs::write(path.as_ref(), json_content).await.with_path(path.as_ref())
    }

    /// Get default config file paths to search
    pub fn default_config_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from(".radio-edit.yaml"),
            PathBuf::from(".radio-edit.yml"),
            PathBuf::from(".radio-edit.json"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("radio-edit")
                .join("config.yaml"),
        ]
    }

    /// Try to load configuration from default locations
    pub async fn load_from_default_locations() -> Option<Self> {
        for path in Self::default_config_paths() {
            if path.exists() {
                match Self::load(&path).await {
                    Ok(config) => {
                        log::info!("Loaded configuration from: {}", path.display());
                        return Some(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }
        None
    }

    /// Apply this config file to a ConfigBuilder
    pub fn apply_to_builder(&self, mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
        if let Some(ref model) = self.whisper_model {
            builder = builder.whisper_model(model.parse::<WhisperModel>()?);
        }

        if let Some(ref model) = self.demucs_model {
            builder = builder.demucs_model(model.parse::<DemucsModel>()?);
        }

        if let Some(ref language) = self.language {
            builder = builder.language(language.clone());
        }

        if let Some(ref list) = self.profanity_list {
            builder = builder.profanity_list(list.clone());
        }

        if let Some(ref words) = self.extra_words {
            builder = builder.extra_words(words.clone());
        }

        if let Some(ref words) = self.allowed_words {
            builder = builder.allowed_words(words.clone());
        }

        if let Some(fade) = self.fade_ms {
            builder = builder.fade_ms(fade)?;
        }

        if let Some(duration) = self.insert_word_duration {
            builder = builder.insert_word_duration(duration)?;
        }

        if let Some(ref bitrate) = self.output_bitrate {
            builder = builder.output_bitrate(bitrate.clone());
        }

        if let Some(keep) = self.keep_temp_files {
            builder = builder.keep_temp_files(keep);
        }

        if let Some(jobs) = self.jobs {
            builder = builder.jobs(jobs)?;
        }

        Ok(builder)
    }

    /// Apply a specific profile to a ConfigBuilder
    pub fn apply_profile_to_builder(&self, profile_name: &str, builder: ConfigBuilder) -> Result<ConfigBuilder> {
        let profiles = self
            .profiles
            .as_ref()
            .ok_or_else(|| config_error("profiles", "No profiles defined"))?;

        let profile = profiles
            .get(profile_name)
            .ok_or_else(|| config_error("profile", format!("Profile '{}' not found", profile_name)))?;

        // First apply base config, then override with profile
        let mut builder = self.apply_to_builder(builder)?;

        if let Some(ref model) = profile.whisper_model {
            builder = builder.whisper_model(model.parse::<WhisperModel>()?);
        }

        if let Some(ref model) = profile.demucs_model {
            builder = builder.demucs_model(model.parse::<DemucsModel>()?);
        }

        if let Some(fade) = profile.fade_ms {
            builder = builder.fade_ms(fade)?;
        }

        if let Some(duration) = profile.insert_word_duration {
            builder = builder.insert_word_duration(duration)?;
        }

        if let Some(ref words) = profile.extra_words {
            builder = builder.extra_words(words.clone());
        }

        Ok(builder)
    }

    /// List available profiles
    pub fn list_profiles(&self) -> Vec<String> {
        self.profiles
            .as_ref()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn profile_description(&self, name: &str) -> Option<&str> {
        self.profiles
            .as_ref()
            .and_then(|p| p.get(name))
            .and_then(|p| p.description.as_deref())
    }
}
