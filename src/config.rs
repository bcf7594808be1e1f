use anyhow::{anyhow, Context, Result};
use std::env;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_HASHTAGS_FILE: &str = "hashtags.txt";
pub const DEFAULT_OUTPUT_FILE: &str = "output.txt";

const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub bind_addr: SocketAddr,
    pub hashtags_path: PathBuf,
    pub output_path: PathBuf,
    pub persist_hashtags: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("bind_addr", &self.bind_addr)
            .field("hashtags_path", &self.hashtags_path)
            .field("output_path", &self.output_path)
            .field("persist_hashtags", &self.persist_hashtags)
            .finish()
    }
}

impl Config {
    /// Server configuration. A missing API key is fatal.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// CLI configuration. Asks for the API key on stdin when none is set.
    pub fn from_env_or_prompt() -> Result<Self> {
        match api_key_from(|key| env::var(key).ok()) {
            Some(_) => Self::from_env(),
            None => {
                let key = prompt_line("Enter your Gemini API key: ")?;
                if key.is_empty() {
                    return Err(anyhow!("No Gemini API key provided"));
                }
                Self::from_lookup(|name| match name {
                    "GEMINI_API_KEY" => Some(key.clone()),
                    other => env::var(other).ok(),
                })
            }
        }
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = api_key_from(&lookup)
            .ok_or_else(|| anyhow!("Missing GEMINI_API_KEY (or GOOGLE_API_KEY)"))?;
        let get = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let bind_addr = get("TAGLINE_ADDR", DEFAULT_ADDR);
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .with_context(|| format!("Invalid TAGLINE_ADDR '{}'", bind_addr))?;

        Ok(Self {
            api_key,
            model: get("GEMINI_MODEL", DEFAULT_MODEL),
            api_base: get("GEMINI_API_BASE", DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            bind_addr,
            hashtags_path: PathBuf::from(get("HASHTAGS_FILE", DEFAULT_HASHTAGS_FILE)),
            output_path: PathBuf::from(get("OUTPUT_FILE", DEFAULT_OUTPUT_FILE)),
            persist_hashtags: parse_flag(lookup("PERSIST_HASHTAGS").as_deref()),
        })
    }
}

fn api_key_from<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    API_KEY_VARS
        .iter()
        .filter_map(|&key| lookup(key))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// Prints `label` and reads one trimmed line from stdin.
pub fn prompt_line(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(label.as_bytes())?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}
