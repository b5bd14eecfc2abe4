use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{IntoRadioEditError, Result};

fn section_headers() -> &'static Regex {
    static HEADERS: OnceLock<Regex> = OnceLock::new();
    HEADERS.get_or_init(|| Regex::new(r"\[[^\]]*\]").expect("section header pattern is valid"))
}

/// Split reference lyrics into words, dropping section headers like `[Verse 1]`
pub fn parse_lyrics(text: &str) -> Vec<String> {
    section_headers()
        .replace_all(text, " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Read a lyrics file as UTF-8
pub async fn read_lyrics(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.with_path(path)
}
