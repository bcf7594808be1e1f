//! Interactive hashtag search against the saved hashtag file.

use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use tagline::config::{prompt_line, Config};
use tagline::error::ServiceError;
use tagline::gemini::{GeminiClient, GenerativeApi};
use tagline::prompts::quoted_list;
use tagline::recommend::HashtagRecommender;
use tagline::report::capitalize;
use tagline::store::HashtagStore;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// `Word: a b c` (prefix case-insensitive) -> `[a, b, c]`.
fn parse_word_line(line: &str) -> Option<Vec<String>> {
    let line = line.trim();
    if !line.to_lowercase().starts_with("word:") {
        return None;
    }
    let (_, rest) = line.split_once(':')?;
    Some(rest.split_whitespace().map(str::to_string).collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();
    let config = Config::from_env_or_prompt()?;

    let line = prompt_line("Enter words in format 'Word: word1 word2 word3 ...': ")?;
    let Some(words) = parse_word_line(&line) else {
        println!("Invalid format! Use: Word: word1 word2 word3 ...");
        return Ok(());
    };

    let store = HashtagStore::new(config.hashtags_path.clone());
    let hashtags = match store.read().await {
        Ok(tags) if !tags.is_empty() => tags,
        Ok(_) | Err(ServiceError::NotFound(_)) => {
            println!("No hashtags found in {}", store.path().display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let backend: Arc<dyn GenerativeApi> = Arc::new(GeminiClient::new(&config));
    let results = HashtagRecommender::new(backend)
        .recommend(&words, &hashtags)
        .await;

    println!("\nSearch Results:");
    for (word, matches) in &results {
        println!("\n{} → {}", capitalize(word), quoted_list(matches));
    }
    Ok(())
}
