use log::{debug, info};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::Result;
use crate::lexicon::{normalize_word, Lexicon};
use crate::transcript::TimedWord;

/// A detected profanity with timing information
#[derive(Debug, Clone, PartialEq)]
pub struct ProfanityMatch {
    /// The lexicon entry that matched
    pub canonical_word: String,
    /// The word as transcribed, casing and punctuation intact
    pub observed_word: String,
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
}

/// Detects lexicon words in transcripts and raw text
#[derive(Debug, Clone, Default)]
pub struct ProfanityDetector {
    lexicon: Lexicon,
}

impl ProfanityDetector {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    /// Build a detector from an optional word list file
    pub fn from_word_list(path: Option<&Path>) -> Result<Self> {
        Ok(Self::new(Lexicon::load_or_default(path)?))
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn add_words<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lexicon.add_words(words);
    }

    pub fn remove_words<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lexicon.remove_words(words);
    }

    /// Scan a word sequence. Each word yields at most one match.
    pub fn detect(&self, words: &[TimedWord]) -> Vec<ProfanityMatch> {
        let matches: Vec<ProfanityMatch> = words
            .iter()
            .filter_map(|word| {
                let normalized = normalize_word(&word.text);
                let canonical = self.lexicon.find_match(&normalized)?;
                debug!(
                    "Matched '{}' as '{}' at {:.2}s-{:.2}s",
                    word.text, canonical, word.start, word.end
                );
                Some(ProfanityMatch {
                    canonical_word: canonical.to_string(),
                    observed_word: word.text.clone(),
                    start: word.start,
                    end: word.end,
                    confidence: word.confidence(),
                })
            })
            .collect();

        info!("Detected {} profanities in {} words", matches.len(), words.len());
        matches
    }

    /// Distinct canonical words found in raw, untimed text
    pub fn scan_text(&self, text: &str) -> BTreeSet<String> {
        text.split_whitespace()
            .filter_map(|token| self.lexicon.find_match(&normalize_word(token)))
            .map(str::to_string)
            .collect()
    }
}
