use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::process::Command;

use crate::config::WhisperModel;
use crate::error::{transcription_error, IntoRadioEditError, RadioEditError, Result};
use crate::transcript::{Provenance, TimedWord};

/// Speech-to-text over an isolated vocal stem
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<TimedWord>>;
}

/// Whisper transcription segment
#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    words: Option<Vec<WhisperWord>>,
}

/// Individual word from Whisper with timing
#[derive(Debug, Deserialize)]
struct WhisperWord {
    word: String,
    start: f64,
    end: f64,
    #[serde(default = "unscored")]
    probability: f64,
}

/// faster-whisper omits the score on some words; treat those as certain
fn unscored() -> f64 {
    1.0
}

const WHISPER_SCRIPT: &str = r#"
import sys
import json
import os
from faster_whisper import WhisperModel

def transcribe_audio(model_size, language, audio_path):
    if not os.path.exists(audio_path):
        raise FileNotFoundError(f"Audio file not found: {audio_path}")

    print(f"Loading model: {model_size}", file=sys.stderr)
    model = WhisperModel(model_size, device="cpu", compute_type="int8")

    print(f"Transcribing: {audio_path}", file=sys.stderr)
    segments, info = model.transcribe(
        audio_path,
        word_timestamps=True,
        language=language
    )

    result = []
    for segment in segments:
        segment_data = {
            "start": segment.start,
            "end": segment.end,
            "text": segment.text,
            "words": None
        }

        if getattr(segment, "words", None):
            segment_data["words"] = [
                {
                    "word": word.word,
                    "start": word.start,
                    "end": word.end,
                    "probability": word.probability
                }
                for word in segment.words
            ]

        result.append(segment_data)

    print(f"Transcription complete: {len(result)} segments", file=sys.stderr)
    return result

if __name__ == "__main__":
    if len(sys.argv) != 4:
        print("Usage: python script.py <model_size> <language> <audio_path>", file=sys.stderr)
        sys.exit(2)

    try:
        result = transcribe_audio(sys.argv[1], sys.argv[2], sys.argv[3])
    except Exception as e:
        print(f"Error in transcription: {e}", file=sys.stderr)
        sys.exit(1)

    print(json.dumps(result))
"#;

/// faster-whisper run through an embedded Python script
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    model: WhisperModel,
    language: String,
    python: String,
}

impl WhisperTranscriber {
    pub fn new(model: WhisperModel, language: impl Into<String>) -> Self {
        Self {
            model,
            language: language.into(),
            python: "python3".to_string(),
        }
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    async fn run_script(&self, script: &NamedTempFile, audio_path: &Path) -> Result<String> {
        debug!(
            "Running whisper transcription: script={:?}, audio={:?}, model={}",
            script.path(),
            audio_path,
            self.model.as_str()
        );

        let child = Command::new(&self.python)
            .arg(script.path())
            .arg(self.model.as_str())
            .arg(&self.language)
            .arg(audio_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                transcription_error(
                    format!(
                        "Failed to spawn {}. Make sure Python 3 and faster-whisper are installed: {}",
                        self.python, e
                    ),
                    None,
                )
            })?;

        let output = child
            .wait_with_output()
            .await
            .with_context("Failed to wait for Python process")?;
        let status = output.status;
        let error_output = String::from_utf8_lossy(&output.stderr).into_owned();

        if !status.success() {
            return Err(transcription_error(
                format!("whisper script exited with {}", status),
                Some(error_output),
            ));
        }

        if !error_output.is_empty() {
            debug!("Whisper stderr output: {}", error_output.trim_end());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<TimedWord>> {
        if !audio_path.exists() {
            return Err(RadioEditError::InputNotFound {
                path: audio_path.to_path_buf(),
            });
        }

        info!("Transcribing vocals using faster-whisper model: {}", self.model.as_str());

        let mut script = NamedTempFile::new().with_context("Failed to create temporary Python script")?;
        script
            .write_all(WHISPER_SCRIPT.as_bytes())
            .with_context("Failed to write Python script")?;
        script.flush().with_context("Failed to flush Python script")?;

        let output = self.run_script(&script, audio_path).await?;
        let words = parse_transcription(&output)?;

        info!("Transcribed {} words", words.len());
        Ok(words)
    }
}

/// Flatten faster-whisper's JSON segments into a word sequence.
///
/// Segments without word timing are split evenly across their span.
pub fn parse_transcription(json: &str) -> Result<Vec<TimedWord>> {
    let segments: Vec<WhisperSegment> = serde_json::from_str(json).map_err(|e| {
        transcription_error(format!("Failed to parse whisper transcription results: {}", e), None)
    })?;

    let mut words = Vec::new();
    for segment in segments {
        match segment.words {
            Some(ref timed) if !timed.is_empty() => {
                for word in timed {
                    let text = word.word.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let end = word.end.max(word.start);
                    words.push(TimedWord::transcribed(text, word.start, end, word.probability));
                }
            }
            _ => {
                let tokens: Vec<&str> = segment.text.split_whitespace().collect();
                if tokens.is_empty() {
                    continue;
                }
                warn!(
                    "Segment {:.2}s-{:.2}s has no word timing, estimating",
                    segment.start, segment.end
                );
                let span = (segment.end - segment.start).max(0.0);
                let step = span / tokens.len() as f64;
                for (i, token) in tokens.into_iter().enumerate() {
                    words.push(TimedWord {
                        text: token.to_string(),
                        start: segment.start + step * i as f64,
                        end: segment.start + step * (i + 1) as f64,
                        provenance: Provenance::Interpolated,
                    });
                }
            }
        }
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_word_level_segments() {
        let json = r#"[
            {"start": 0.0, "end": 1.2, "text": " Hello there", "words": [
                {"word": " Hello", "start": 0.0, "end": 0.5, "probability": 0.92},
                {"word": " there", "start": 0.6, "end": 1.2, "probability": 0.81}
            ]}
        ]"#;

        let words = parse_transcription(json).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Hello");
        assert_eq!(words[1].text, "there");
        assert_eq!(words[1].provenance, Provenance::Transcribed(0.81));
    }

    #[test]
    fn test_word_without_probability_counts_as_certain() {
        let json = r#"[
            {"start": 0.0, "end": 0.5, "words": [{"word": " hey", "start": 0.0, "end": 0.5}]}
        ]"#;

        let words = parse_transcription(json).unwrap();
        assert_eq!(words[0].provenance, Provenance::Transcribed(1.0));
        assert!(words[0].confidence() > crate::transcript::INTERPOLATED_CONFIDENCE);
    }

    #[test]
    fn test_segment_fallback_interpolates() {
        let json = r#"[{"start": 2.0, "end": 3.0, "text": "one two", "words": null}]"#;

        let words = parse_transcription(json).unwrap();
        assert_eq!(words.len(), 2);
        assert!((words[0].start - 2.0).abs() < 1e-9);
        assert!((words[0].end - 2.5).abs() < 1e-9);
        assert!((words[1].end - 3.0).abs() < 1e-9);
        assert_eq!(words[1].provenance, Provenance::Interpolated);
    }

    #[test]
    fn test_empty_transcript() {
        assert!(parse_transcription("[]").unwrap().is_empty());
    }

    #[test]
    fn test_garbage_output_is_transcription_failure() {
        let err = parse_transcription("Traceback (most recent call last)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TranscriptionFailed);
    }

    #[tokio::test]
    async fn test_missing_python_is_transcription_failure() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("vocals.wav");
        std::fs::write(&audio, b"").unwrap();

        let transcriber = WhisperTranscriber::new(WhisperModel::Tiny, "en").with_python("/nonexistent/python");
        let err = transcriber.transcribe(&audio).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TranscriptionFailed);
    }
}
