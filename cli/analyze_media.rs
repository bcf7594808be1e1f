//! Interactive analysis of one image or video.
//! Prints the summary, overwrites the output file and appends the hashtags to the store.

use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use tagline::analysis::{MediaAnalysisService, MediaSource, MediaType};
use tagline::config::{prompt_line, Config};
use tagline::error::ServiceError;
use tagline::gemini::{GeminiClient, GenerativeApi};
use tagline::report::{render_summary, write_summary};
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

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();
    let config = Config::from_env_or_prompt()?;

    let input = prompt_line("Enter image/video path or URL: ")?;
    let media_type = match prompt_line("Is this an 'image' or 'video'? ")?.parse::<MediaType>() {
        Ok(m) => m,
        Err(_) => {
            println!("Invalid input! Please enter 'image' or 'video'.");
            return Ok(());
        }
    };

    println!("Sending to Gemini... please wait.");
    if let Err(e) = run(&config, &input, media_type).await {
        println!("Error: {}", e);
    }
    Ok(())
}

async fn run(config: &Config, input: &str, media_type: MediaType) -> Result<(), ServiceError> {
    let source = MediaSource::from_input(input)?;
    let backend: Arc<dyn GenerativeApi> = Arc::new(GeminiClient::new(config));
    let result = MediaAnalysisService::new(backend)
        .analyze(&source, media_type)
        .await?;

    let summary = render_summary(media_type, &result);
    println!("{}", summary);
    write_summary(&config.output_path, &summary).await?;
    let store = HashtagStore::new(config.hashtags_path.clone());
    store.append(&result.hashtags_clean).await?;
    Ok(())
}
