use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;

const FILE_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const FILE_POLL_ATTEMPTS: u32 = 30;

/// Media handed to the model next to the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    /// Remote link, passed through as text.
    Url(String),
    /// A file previously pushed through the Files API.
    Uploaded { uri: String, mime_type: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub candidate_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub usage: Option<Usage>,
}

#[async_trait]
pub trait GenerativeApi: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String>;
    async fn generate_from_media(&self, prompt: &str, media: &MediaRef) -> Result<Generation>;
    async fn upload_file(&self, path: &Path) -> Result<MediaRef>;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    poll_interval: Duration,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            poll_interval: FILE_POLL_INTERVAL,
        }
    }

    /// Delay between file status checks while an upload is processing.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn generate(&self, parts: Vec<Value>) -> Result<Generation> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        );
        let body = json!({ "contents": [{ "parts": parts }] });

        debug!("Calling Gemini model {}", self.model);
        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;
        let text = read_success(res, "Gemini generateContent").await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&text).context("Failed to parse Gemini response JSON")?;
        parsed.into_generation()
    }

    async fn get_file(&self, name: &str) -> Result<FileInfo> {
        let url = format!("{}/v1beta/{}", self.api_base, name);
        let res = self
            .client
            .get(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .send()
            .await
            .context("Gemini file status request failed")?;
        let text = read_success(res, "Gemini file status").await?;
        serde_json::from_str(&text).context("Failed to parse Gemini file status JSON")
    }

    async fn wait_until_active(&self, mut file: FileInfo) -> Result<FileInfo> {
        let mut attempts = 0;
        loop {
            match file.state.as_deref() {
                Some("PROCESSING") => {
                    if attempts >= FILE_POLL_ATTEMPTS {
                        return Err(anyhow!(
                            "Uploaded file {} still processing after {} checks",
                            file.name,
                            FILE_POLL_ATTEMPTS
                        ));
                    }
                    attempts += 1;
                    debug!("Waiting for {} to finish processing", file.name);
                    tokio::time::sleep(self.poll_interval).await;
                    file = self.get_file(&file.name).await?;
                }
                Some("FAILED") => {
                    return Err(anyhow!("Gemini could not process uploaded file {}", file.name));
                }
                _ => return Ok(file),
            }
        }
    }
}

#[async_trait]
impl GenerativeApi for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let generation = self.generate(vec![json!({ "text": prompt })]).await?;
        Ok(generation.text)
    }

    async fn generate_from_media(&self, prompt: &str, media: &MediaRef) -> Result<Generation> {
        self.generate(vec![json!({ "text": prompt }), media_part(media)])
            .await
    }

    async fn upload_file(&self, path: &Path) -> Result<MediaRef> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload");
        info!(
            "Uploading {} ({} bytes, {}) to Gemini",
            path.display(),
            bytes.len(),
            mime_type
        );

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.api_base))
            .header("x-goog-api-key", self.api_key.as_str())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type.as_str())
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .context("Gemini upload start failed")?;
        let start = ensure_success(start, "Gemini upload start").await?;
        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Gemini upload start returned no upload URL"))?;

        let res = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .context("Gemini upload failed")?;
        let text = read_success(res, "Gemini upload").await?;
        let uploaded: UploadResponse =
            serde_json::from_str(&text).context("Failed to parse Gemini upload JSON")?;

        let file = self.wait_until_active(uploaded.file).await?;
        info!("Uploaded {} as {}", path.display(), file.name);
        Ok(MediaRef::Uploaded {
            uri: file.uri,
            mime_type: file.mime_type.unwrap_or(mime_type),
        })
    }
}

fn media_part(media: &MediaRef) -> Value {
    match media {
        MediaRef::Url(url) => json!({ "text": url }),
        MediaRef::Uploaded { uri, mime_type } => json!({
            "file_data": { "mime_type": mime_type, "file_uri": uri }
        }),
    }
}

async fn ensure_success(res: Response, what: &str) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    warn!("{} returned {}", what, status);
    Err(anyhow!("{} HTTP error (status {}): {}", what, status, body))
}

async fn read_success(res: Response, what: &str) -> Result<String> {
    let res = ensure_success(res, what).await?;
    res.text()
        .await
        .with_context(|| format!("Failed to read {} body", what))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileInfo {
    name: String,
    uri: String,
    mime_type: Option<String>,
    state: Option<String>,
}

impl GenerateResponse {
    fn into_generation(self) -> Result<Generation> {
        let usage = self.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            candidate_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "unknown".to_string());
            return Err(anyhow!("Gemini returned no candidates (block reason: {})", reason));
        };

        let texts: Vec<String> = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        if texts.is_empty() {
            return Err(anyhow!(
                "Gemini returned no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ));
        }

        Ok(Generation {
            text: texts.concat(),
            usage,
        })
    }
}
