//! Edit Decision Lists: human-editable records of the spans to mute.
//!
//! An EDL is written by the generate workflow, optionally corrected by hand,
//! and replayed by the apply workflow without re-running transcription.
//! Timestamps are stored as `M:SS.mm` (or `H:MM:SS.mm` past the hour) but
//! bare seconds are accepted on load. Unknown fields are ignored.

use chrono::Local;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::detector::ProfanityMatch;
use crate::error::{fs_error, IntoRadioEditError, RadioEditError, Result};

const DEFAULT_CONFIDENCE: f64 = 1.0;

fn centiseconds(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 100.0).round() as u64
}

/// Format seconds as `M:SS.mm`. Minutes are not zero-padded and are not
/// wrapped into hours.
pub fn format_timestamp(seconds: f64) -> String {
    let cs = centiseconds(seconds);
    format!("{}:{:02}.{:02}", cs / 6000, (cs % 6000) / 100, cs % 100)
}

/// Format seconds as `H:MM:SS.mm`
pub fn format_timestamp_hms(seconds: f64) -> String {
    let cs = centiseconds(seconds);
    format!(
        "{}:{:02}:{:02}.{:02}",
        cs / 360_000,
        (cs % 360_000) / 6000,
        (cs % 6000) / 100,
        cs % 100
    )
}

/// `M:SS.mm` below one hour, `H:MM:SS.mm` from there on
pub fn format_edl_timestamp(seconds: f64) -> String {
    if seconds >= 3600.0 {
        format_timestamp_hms(seconds)
    } else {
        format_timestamp(seconds)
    }
}

/// Parse `72.86`, `1:12.86`, `01:12.86` or `1:05:30.50` into seconds
pub fn parse_timestamp(text: &str) -> Result<f64> {
    let malformed = || RadioEditError::MalformedTimestamp {
        value: text.to_string(),
    };
    let trimmed = text.trim();

    let seconds_part = |s: &str| -> Result<f64> {
        let secs: f64 = s.parse().map_err(|_| malformed())?;
        if secs.is_finite() && secs >= 0.0 {
            Ok(secs)
        } else {
            Err(malformed())
        }
    };
    let whole_part = |s: &str| -> Result<f64> {
        s.parse::<u64>().map(|v| v as f64).map_err(|_| malformed())
    };

    if !trimmed.contains(':') {
        return seconds_part(trimmed);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    match parts.as_slice() {
        [minutes, secs] => Ok(whole_part(minutes)? * 60.0 + seconds_part(secs)?),
        [hours, minutes, secs] => {
            Ok(whole_part(hours)? * 3600.0 + whole_part(minutes)? * 60.0 + seconds_part(secs)?)
        }
        _ => Err(malformed()),
    }
}

/// A single span to mute
#[derive(Debug, Clone, PartialEq)]
pub struct EditPoint {
    pub start: f64,
    pub end: f64,
    pub word: String,
    pub confidence: f64,
}

impl From<&ProfanityMatch> for EditPoint {
    fn from(m: &ProfanityMatch) -> Self {
        Self {
            start: m.start,
            end: m.end,
            word: m.observed_word.clone(),
            confidence: m.confidence,
        }
    }
}

/// Edit Decision List for one source file
#[derive(Debug, Clone, PartialEq)]
pub struct EditDecisionList {
    pub source_file: PathBuf,
    pub generated_at: String,
    /// Directory holding separated stems that `apply` may reuse
    pub cache_dir: Option<PathBuf>,
    pub edits: Vec<EditPoint>,
}

#[derive(Serialize)]
struct EdlRecord<'a> {
    source_file: &'a Path,
    generated_at: &'a str,
    cache_dir: Option<&'a Path>,
    edits: Vec<EditRecord<'a>>,
}

#[derive(Serialize)]
struct EditRecord<'a> {
    start: String,
    end: String,
    word: &'a str,
    confidence: f64,
}

#[derive(Deserialize)]
struct RawEdl {
    source_file: PathBuf,
    #[serde(alias = "generated")]
    generated_at: String,
    #[serde(default, alias = "stems_dir")]
    cache_dir: Option<PathBuf>,
    edits: Vec<RawEdit>,
}

#[derive(Deserialize)]
struct RawEdit {
    start: RawTimestamp,
    end: RawTimestamp,
    word: String,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Seconds(f64),
    Text(String),
}

impl RawTimestamp {
    fn seconds(&self) -> Result<f64> {
        match self {
            RawTimestamp::Seconds(s) if s.is_finite() && *s >= 0.0 => Ok(*s),
            RawTimestamp::Seconds(s) => Err(RadioEditError::MalformedTimestamp {
                value: s.to_string(),
            }),
            RawTimestamp::Text(text) => parse_timestamp(text),
        }
    }
}

/// Confidence kept within [0, 1]; non-finite values count as unscored
fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        DEFAULT_CONFIDENCE
    }
}

fn round_confidence(confidence: f64) -> f64 {
    (clamp_confidence(confidence) * 1000.0).round() / 1000.0
}

impl EditDecisionList {
    pub fn new(source_file: impl Into<PathBuf>, edits: Vec<EditPoint>, cache_dir: Option<PathBuf>) -> Self {
        Self {
            source_file: source_file.into(),
            generated_at: Local::now().to_rfc3339(),
            cache_dir,
            edits,
        }
    }

    pub fn from_matches(
        source_file: impl Into<PathBuf>,
        matches: &[ProfanityMatch],
        cache_dir: Option<PathBuf>,
    ) -> Self {
        Self::new(source_file, matches.iter().map(EditPoint::from).collect(), cache_dir)
    }

    /// `<dir>/<stem>.edl.json` next to the audio file
    pub fn default_path_for(audio_path: &Path) -> PathBuf {
        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "track".to_string());
        audio_path.with_file_name(format!("{}.edl.json", stem))
    }

    /// Time ranges to mute, in file order
    pub fn spans(&self) -> Vec<(f64, f64)> {
        self.edits.iter().map(|e| (e.start, e.end)).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        let record = EdlRecord {
            source_file: &self.source_file,
            generated_at: &self.generated_at,
            cache_dir: self.cache_dir.as_deref(),
            edits: self
                .edits
                .iter()
                .map(|e| EditRecord {
                    start: format_edl_timestamp(e.start),
                    end: format_edl_timestamp(e.end),
                    word: &e.word,
                    confidence: round_confidence(e.confidence),
                })
                .collect(),
        };

        serde_json::to_string_pretty(&record).map_err(|e| RadioEditError::Processing {
            message: format!("Failed to serialize EDL: {}", e),
        })
    }

    /// Parse EDL JSON. `origin` is only used in error messages.
    pub fn from_json(contents: &str, origin: &Path) -> Result<Self> {
        let raw: RawEdl = serde_json::from_str(contents).map_err(|e| RadioEditError::MalformedEdl {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;

        let edits = raw
            .edits
            .into_iter()
            .map(|e| {
                Ok(EditPoint {
                    start: e.start.seconds()?,
                    end: e.end.seconds()?,
                    word: e.word,
                    confidence: e.confidence.map_or(DEFAULT_CONFIDENCE, clamp_confidence),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            source_file: raw.source_file,
            generated_at: raw.generated_at,
            cache_dir: raw.cache_dir,
            edits,
        })
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        tokio::fs::write(path, json).await.with_path(path)?;
        info!("EDL saved to: {}", path.display());
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RadioEditError::EdlNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                fs_error(e, path.to_path_buf())
            }
        })?;
        let edl = Self::from_json(&contents, path)?;
        info!("Loaded {} edits from {}", edl.edits.len(), path.display());
        Ok(edl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.5), "0:00.50");
        assert_eq!(format_timestamp(72.86), "1:12.86");
        assert_eq!(format_timestamp(185.5), "3:05.50");
        assert_eq!(format_timestamp(59.999), "1:00.00");
        assert_eq!(format_timestamp(-3.0), "0:00.00");
    }

    #[test]
    fn test_format_timestamp_hms() {
        assert_eq!(format_timestamp_hms(3930.5), "1:05:30.50");
        assert_eq!(format_edl_timestamp(3930.5), "1:05:30.50");
        assert_eq!(format_edl_timestamp(72.86), "1:12.86");
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert_close(parse_timestamp("1:12.86").unwrap(), 72.86, 1e-9);
        assert_close(parse_timestamp("01:12.86").unwrap(), 72.86, 1e-9);
        assert_close(parse_timestamp("1:05:30.50").unwrap(), 3930.5, 1e-9);
        assert_close(parse_timestamp("72.86").unwrap(), 72.86, 1e-9);
        assert_close(parse_timestamp(" 3 ").unwrap(), 3.0, 1e-9);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        for bad in ["", "abc", "1:2:3:4", "-1.0", "1:-5", "x:10.0", "NaN", "inf", "1.5:10"] {
            let err = parse_timestamp(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedTimestamp, "input {bad:?}");
        }
    }

    #[test]
    fn test_format_parse_round_trip() {
        let mut x = 0.0;
        while x < 3600.0 {
            let parsed = parse_timestamp(&format_timestamp(x)).unwrap();
            assert_close(parsed, x, 0.01);
            x += 7.777;
        }
        assert_close(parse_timestamp(&format_edl_timestamp(5000.123)).unwrap(), 5000.123, 0.01);
    }

    #[test]
    fn test_from_matches_copies_observed_word() {
        let m = ProfanityMatch {
            canonical_word: "shit".to_string(),
            observed_word: "Shit!".to_string(),
            start: 1.0,
            end: 1.4,
            confidence: 0.87,
        };
        let edl = EditDecisionList::from_matches("song.mp3", &[m], None);

        assert_eq!(edl.edits.len(), 1);
        assert_eq!(edl.edits[0].word, "Shit!");
        assert_eq!(edl.edits[0].confidence, 0.87);
        assert!(!edl.generated_at.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let edl = EditDecisionList::new(
            "song.mp3",
            vec![EditPoint { start: 72.86, end: 73.2, word: "damn".to_string(), confidence: 0.98765 }],
            None,
        );
        let value: serde_json::Value = serde_json::from_str(&edl.to_json().unwrap()).unwrap();

        assert_eq!(value["source_file"], "song.mp3");
        assert!(value["cache_dir"].is_null());
        assert_eq!(value["edits"][0]["start"], "1:12.86");
        assert_eq!(value["edits"][0]["end"], "1:13.20");
        assert_eq!(value["edits"][0]["confidence"], 0.988);
    }

    #[test]
    fn test_hand_edited_json_is_accepted() {
        let json = r#"{
            "source_file": "song.mp3",
            "generated": "2024-05-01T10:00:00",
            "stems_dir": "/tmp/stems",
            "reviewed_by": "someone",
            "edits": [
                {"start": 12.5, "end": "0:13.10", "word": "hell"},
                {"start": "1:05:30.50", "end": "1:05:31", "word": "damn", "confidence": 0.4, "note": "ok"}
            ]
        }"#;
        let edl = EditDecisionList::from_json(json, Path::new("song.edl.json")).unwrap();

        assert_eq!(edl.cache_dir, Some(PathBuf::from("/tmp/stems")));
        assert_eq!(edl.edits.len(), 2);
        assert_close(edl.edits[0].start, 12.5, 1e-9);
        assert_close(edl.edits[0].end, 13.1, 1e-9);
        assert_eq!(edl.edits[0].confidence, 1.0);
        assert_close(edl.edits[1].start, 3930.5, 1e-9);
    }

    #[test]
    fn test_confidence_is_kept_in_range() {
        let json = r#"{"source_file": "a", "generated_at": "b", "edits": [
            {"start": 1.0, "end": 1.2, "word": "x", "confidence": 5.0},
            {"start": 2.0, "end": 2.2, "word": "y", "confidence": -1}
        ]}"#;
        let edl = EditDecisionList::from_json(json, Path::new("x.json")).unwrap();
        assert_eq!(edl.edits[0].confidence, 1.0);
        assert_eq!(edl.edits[1].confidence, 0.0);

        let unscored = EditDecisionList::new(
            "song.mp3",
            vec![EditPoint { start: 1.0, end: 1.2, word: "x".to_string(), confidence: f64::NAN }],
            None,
        );
        let value: serde_json::Value = serde_json::from_str(&unscored.to_json().unwrap()).unwrap();
        assert_eq!(value["edits"][0]["confidence"], 1.0);
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let json = r#"{"source_file": "song.mp3", "edits": []}"#;
        let err = EditDecisionList::from_json(json, Path::new("x.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEdl);

        let json = r#"{"source_file": "a", "generated_at": "b", "edits": [{"start": "0:01.00", "word": "x"}]}"#;
        let err = EditDecisionList::from_json(json, Path::new("x.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEdl);
    }

    #[test]
    fn test_bad_timestamp_in_edl() {
        let json = r#"{"source_file": "a", "generated_at": "b", "edits": [{"start": "soon", "end": "1:00.00", "word": "x"}]}"#;
        let err = EditDecisionList::from_json(json, Path::new("x.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTimestamp);
    }

    #[test]
    fn test_default_path_for() {
        assert_eq!(
            EditDecisionList::default_path_for(Path::new("/music/Song Title.mp3")),
            PathBuf::from("/music/Song Title.edl.json")
        );
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.edl.json");
        let edl = EditDecisionList::new(
            "/music/song.mp3",
            vec![
                EditPoint { start: 10.123, end: 10.5, word: "Fuck".to_string(), confidence: 0.91234 },
                EditPoint { start: 65.0, end: 65.42, word: "shit,".to_string(), confidence: 0.3 },
            ],
            Some(dir.path().join("stems")),
        );

        edl.save(&path).await.unwrap();
        let loaded = EditDecisionList::load(&path).await.unwrap();

        assert_eq!(loaded.source_file, edl.source_file);
        assert_eq!(loaded.generated_at, edl.generated_at);
        assert_eq!(loaded.cache_dir, edl.cache_dir);
        assert_eq!(loaded.edits.len(), 2);
        for (a, b) in loaded.edits.iter().zip(&edl.edits) {
            assert_eq!(a.word, b.word);
            assert_close(a.start, b.start, 0.01);
            assert_close(a.end, b.end, 0.01);
            assert_eq!(a.confidence, round_confidence(b.confidence));
        }
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = EditDecisionList::load(Path::new("/nonexistent/song.edl.json")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EdlNotFound);
    }
}
