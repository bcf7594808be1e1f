use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cleaner::clean_output;
use crate::error::ServiceError;
use crate::gemini::{GenerativeApi, MediaRef, Usage};
use crate::prompts::analysis_prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            other => Err(ServiceError::invalid(format!(
                "Invalid mediaType '{}': expected 'image' or 'video'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Url(String),
    Path(PathBuf),
}

impl MediaSource {
    /// Request fields: a non-empty URL wins over a non-empty path.
    pub fn from_request(
        file_url: Option<&str>,
        file_path: Option<&str>,
    ) -> Result<Self, ServiceError> {
        let non_empty = |v: Option<&str>| v.filter(|s| !s.trim().is_empty()).map(str::to_string);
        if let Some(url) = non_empty(file_url) {
            return Ok(MediaSource::Url(url));
        }
        if let Some(path) = non_empty(file_path) {
            return Ok(MediaSource::Path(PathBuf::from(path)));
        }
        Err(ServiceError::invalid("Either fileUrl or filePath is required."))
    }

    /// Free-form console input: anything starting with `http` is a link.
    pub fn from_input(input: &str) -> Result<Self, ServiceError> {
        let input = input.trim();
        if input.is_empty() {
            return Self::from_request(None, None);
        }
        if input.starts_with("http") {
            Ok(MediaSource::Url(input.to_string()))
        } else {
            Ok(MediaSource::Path(PathBuf::from(input)))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub description: String,
    pub hashtags: Vec<String>,
    pub hashtags_clean: Vec<String>,
    pub usage: Option<Usage>,
    pub raw_text: String,
}

pub struct MediaAnalysisService {
    backend: Arc<dyn GenerativeApi>,
}

impl MediaAnalysisService {
    pub fn new(backend: Arc<dyn GenerativeApi>) -> Self {
        Self { backend }
    }

    pub async fn analyze(
        &self,
        source: &MediaSource,
        media_type: MediaType,
    ) -> Result<AnalysisResult, ServiceError> {
        let prompt = analysis_prompt(media_type);

        let media = match source {
            MediaSource::Url(url) => {
                info!("Analyzing {} from URL {}", media_type, url);
                MediaRef::Url(url.clone())
            }
            MediaSource::Path(path) => {
                info!("Analyzing {} from file {}", media_type, path.display());
                self.backend.upload_file(path).await?
            }
        };

        let generation = self.backend.generate_from_media(&prompt, &media).await?;
        let raw_text = generation.text.trim().to_string();
        let cleaned = clean_output(&raw_text);
        debug!(
            hashtags = cleaned.hashtags.len(),
            usage = ?generation.usage,
            "Analysis finished"
        );

        Ok(AnalysisResult {
            description: cleaned.description,
            hashtags: cleaned.hashtags,
            hashtags_clean: cleaned.hashtags_clean,
            usage: generation.usage,
            raw_text,
        })
    }
}
