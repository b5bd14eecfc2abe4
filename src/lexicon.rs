use log::info;
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{IntoRadioEditError, Result};

/// Entries shorter than this only ever match a whole word.
pub const MIN_SUBSTRING_LEN: usize = 4;

/// Built-in word list used when no list file is supplied.
///
/// Deliberately small; real deployments should ship their own list.
const DEFAULT_WORDS: &[&str] = &[
    "fuck", "fucking", "fucked", "fucker", "fuckin",
    "shit", "shitty", "bullshit",
    "ass", "asshole", "asses",
    "bitch", "bitches", "bitching",
    "damn", "damned", "goddamn",
    "hell",
    "crap",
    "dick", "dicks",
    "cock", "cocks",
    "pussy", "pussies",
    "cunt", "cunts",
    "whore", "whores",
    "slut", "sluts",
    "bastard", "bastards",
    "piss", "pissed", "pissing",
];

/// Lowercase a word and strip every non-word character.
///
/// Word characters are Unicode alphanumerics and `_`.
pub fn normalize_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// The set of profane tokens plus the policy for matching them.
///
/// Entries are kept in a sorted set, so substring matching always tries
/// entries in lexicographic order and the first hit wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexicon {
    words: BTreeSet<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::from_words(DEFAULT_WORDS.iter().copied())
    }
}

impl Lexicon {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lexicon = Self {
            words: BTreeSet::new(),
        };
        lexicon.add_words(words);
        lexicon
    }

    /// Parse a line-oriented word list. Blank lines and `#` comments are skipped.
    pub fn parse(contents: &str) -> Self {
        let words = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        Self::from_words(words)
    }

    /// Load a word list file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).with_path(path)?;
        let lexicon = Self::parse(&contents);
        info!("Loaded {} profanity words from {}", lexicon.len(), path.display());
        Ok(lexicon)
    }

    /// Load `path` when given, otherwise fall back to the built-in list
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn add_words<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words {
            let word = word.as_ref().trim().to_lowercase();
            if !word.is_empty() {
                self.words.insert(word);
            }
        }
    }

    pub fn remove_words<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words {
            self.words.remove(&word.as_ref().trim().to_lowercase());
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    /// Find the canonical lexicon entry for an already-normalized word.
    ///
    /// An exact match returns the word itself. Otherwise the first entry (in
    /// sorted order) of at least [`MIN_SUBSTRING_LEN`] characters that occurs
    /// inside the word is returned, so compounds like "motherfucker" resolve
    /// to "fuck" rather than "fucker".
    pub fn find_match(&self, normalized: &str) -> Option<&str> {
        if normalized.is_empty() {
            return None;
        }

        if let Some(exact) = self.words.get(normalized) {
            return Some(exact.as_str());
        }

        self.words
            .iter()
            .filter(|entry| entry.chars().count() >= MIN_SUBSTRING_LEN)
            .find(|entry| normalized.contains(entry.as_str()))
            .map(String::as_str)
    }
}
