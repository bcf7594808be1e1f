use std::path::Path;

use crate::analysis::{AnalysisResult, MediaType};
use crate::error::ServiceError;
use crate::prompts::quoted_list;

/// Console block for one analysis, also written to the output file.
pub fn render_summary(media_type: MediaType, result: &AnalysisResult) -> String {
    let count = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_else(|| "n/a".to_string());
    let usage = result.usage.unwrap_or_default();
    format!(
        "1\n{}\nDescription: {}\nHashtags: {}\nTokens used → Input: {}, Output: {}, Total: {}\n{}\n",
        capitalize(media_type.as_str()),
        result.description,
        quoted_list(&result.hashtags),
        count(usage.prompt_tokens),
        count(usage.candidate_tokens),
        count(usage.total_tokens),
        "-".repeat(50)
    )
}

/// Overwrites `path` with `summary`.
pub async fn write_summary(path: &Path, summary: &str) -> Result<(), ServiceError> {
    tokio::fs::write(path, summary).await?;
    Ok(())
}

/// First character upper-cased, the rest lower-cased.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
