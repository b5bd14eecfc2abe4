use crate::error::{transcription_error, Result};

/// Confidence given to words whose timing was divided out of a replaced span
pub const INTERPOLATED_CONFIDENCE: f64 = 0.5;

/// Confidence given to reference words with no transcribed counterpart
pub const INSERTED_CONFIDENCE: f64 = 0.3;

/// Where a word's timing came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Provenance {
    /// Observed by the speech recognizer with the given probability
    Transcribed(f64),
    /// Evenly divided out of a known time span
    Interpolated,
    /// Chained after the previous word using a fixed duration estimate
    Inserted,
}

impl Provenance {
    pub fn confidence(&self) -> f64 {
        match self {
            Provenance::Transcribed(p) => *p,
            Provenance::Interpolated => INTERPOLATED_CONFIDENCE,
            Provenance::Inserted => INSERTED_CONFIDENCE,
        }
    }
}

/// A single word with timing information, in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct TimedWord {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub provenance: Provenance,
}

impl TimedWord {
    pub fn transcribed(text: impl Into<String>, start: f64, end: f64, confidence: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            provenance: Provenance::Transcribed(confidence.clamp(0.0, 1.0)),
        }
    }

    pub fn confidence(&self) -> f64 {
        self.provenance.confidence()
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Reject transcripts that downstream stages cannot rely on.
///
/// Every word must satisfy `end >= start` and starts must be non-decreasing.
pub fn ensure_ordered(words: &[TimedWord]) -> Result<()> {
    for (i, word) in words.iter().enumerate() {
        if !word.start.is_finite() || !word.end.is_finite() || word.end < word.start {
            return Err(transcription_error(
                format!(
                    "word {} ('{}') has an invalid span {:.3}s-{:.3}s",
                    i, word.text, word.start, word.end
                ),
                None,
            ));
        }
    }

    if let Some(pair) = words.windows(2).find(|pair| pair[1].start < pair[0].start) {
        return Err(transcription_error(
            format!(
                "words out of order: '{}' at {:.3}s follows '{}' at {:.3}s",
                pair[1].text, pair[1].start, pair[0].text, pair[0].start
            ),
            None,
        ));
    }

    Ok(())
}
