use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cleaner::parse_match_lines;
use crate::error::ServiceError;
use crate::gemini::GenerativeApi;
use crate::prompts::recommend_prompt;
use crate::store::HashtagStore;

/// Input word -> matched hashtags, in input order.
pub type RecommendResults = IndexMap<String, Vec<String>>;

/// Candidates in precedence order: explicit list, override file, configured store.
pub async fn resolve_candidates(
    explicit: Option<Vec<String>>,
    override_path: Option<PathBuf>,
    default_store: &HashtagStore,
) -> Result<Vec<String>, ServiceError> {
    if let Some(list) = explicit {
        return Ok(list);
    }
    match override_path {
        Some(path) => HashtagStore::new(path).load().await,
        None => default_store.load().await,
    }
}

pub struct HashtagRecommender {
    backend: Arc<dyn GenerativeApi>,
}

impl HashtagRecommender {
    pub fn new(backend: Arc<dyn GenerativeApi>) -> Self {
        Self { backend }
    }

    /// One backend call per word, sequentially. A failed word gets a single
    /// `Error: ...` entry and the remaining words still run.
    pub async fn recommend(&self, words: &[String], hashtags: &[String]) -> RecommendResults {
        let mut results = RecommendResults::new();
        if hashtags.is_empty() {
            info!("No candidate hashtags; returning empty matches for {} words", words.len());
            for word in words {
                results.insert(word.clone(), Vec::new());
            }
            return results;
        }

        for word in words {
            let prompt = recommend_prompt(word, hashtags);
            let matches = match self.backend.generate_text(&prompt).await {
                Ok(text) => parse_match_lines(text.trim()),
                Err(e) => {
                    warn!("Hashtag lookup failed for '{}': {:#}", word, e);
                    vec![format!("Error: {:#}", e)]
                }
            };
            results.insert(word.clone(), matches);
        }
        results
    }
}
