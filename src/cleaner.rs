//! Turns the model's free-form answer into a caption and a hashtag list.

use once_cell::sync::Lazy;
use regex::Regex;

// Letters, any numeric (`²` included) and `_`. A combining mark ends the tag.
static INLINE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#[\p{L}\p{N}_]+").expect("inline hashtag pattern is valid"));

/// Lines starting with one of these (case-insensitive) are model chatter, not caption text.
const SKIPPED_PREFIXES: [&str; 4] = ["here's", "1.", "2.", "**"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedOutput {
    pub description: String,
    /// Tags as found, `#` included. Line-start tags first, then new inline ones.
    pub hashtags: Vec<String>,
    pub hashtags_clean: Vec<String>,
}

pub fn clean_output(text: &str) -> CleanedOutput {
    let mut description = String::new();
    let mut hashtags: Vec<String> = Vec::new();

    for line in text.split(is_line_break) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            hashtags.push(line.to_string());
        } else if !has_skipped_prefix(line) {
            description.push_str(line);
            description.push(' ');
        }
    }
    let description = description.trim().to_string();

    for tag in INLINE_TAG.find_iter(text) {
        let tag = tag.as_str();
        if !hashtags.iter().any(|h| h == tag) {
            hashtags.push(tag.to_string());
        }
    }

    let hashtags_clean = hashtags
        .iter()
        .map(|h| h.trim_start_matches('#').to_string())
        .collect();

    CleanedOutput {
        description,
        hashtags,
        hashtags_clean,
    }
}

/// Normalizes one line of a recommend answer: `#`, then `-`, then whitespace.
pub fn normalize_match_line(line: &str) -> String {
    let line = line.trim();
    let line = line.strip_prefix('#').unwrap_or(line);
    let line = line.strip_prefix('-').unwrap_or(line);
    line.trim().to_string()
}

/// Non-empty normalized lines of a recommend answer.
pub fn parse_match_lines(text: &str) -> Vec<String> {
    text.split(is_line_break)
        .filter(|l| !l.trim().is_empty())
        .map(normalize_match_line)
        .collect()
}

fn has_skipped_prefix(line: &str) -> bool {
    let lower = line.to_lowercase();
    SKIPPED_PREFIXES.iter().any(|p| lower.starts_with(p))
}

// Empty lines are dropped by every caller, so `\r\n` can split twice.
pub(crate) fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\u{0b}'
            | '\u{0c}'
            | '\u{1c}'
            | '\u{1d}'
            | '\u{1e}'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}
