use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cleaner::is_line_break;
use crate::error::ServiceError;

/// Newline-delimited hashtag file. Appends are serialized within this process only.
#[derive(Debug)]
pub struct HashtagStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HashtagStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Trimmed, lower-cased, non-empty lines. A missing file is `NotFound`.
    pub async fn read(&self) -> Result<Vec<String>, ServiceError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ServiceError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let tags: Vec<String> = content
            .split(is_line_break)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_lowercase)
            .collect();
        debug!("Loaded {} hashtags from {}", tags.len(), self.path.display());
        Ok(tags)
    }

    /// Like [`read`](Self::read), but a missing file is an empty list.
    pub async fn load(&self) -> Result<Vec<String>, ServiceError> {
        match self.read().await {
            Err(ServiceError::NotFound(path)) => {
                debug!("No hashtag file at {}", path.display());
                Ok(Vec::new())
            }
            other => other,
        }
    }

    pub async fn append(&self, tags: &[String]) -> Result<(), ServiceError> {
        if tags.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        for tag in tags {
            buf.push_str(tag);
            buf.push('\n');
        }

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        info!("Saved {} hashtags to {}", tags.len(), self.path.display());
        Ok(())
    }
}
