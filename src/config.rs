//! Service configuration, read from the environment (and `.env` via `dotenv`).

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::gemini::DEFAULT_BASE_URL;
use crate::services::PollPolicy;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1000 * 1024 * 1024;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

#[derive(Clone)]
pub struct Config {
    /// Gemini API key (`GOOGLE_API_KEY`), required
    pub api_key: String,
    /// Video-capable model id
    pub model: String,
    /// Gemini API root
    pub base_url: String,
    /// Scratch directory for uploads in flight
    pub upload_dir: PathBuf,
    /// Directory holding `index.html` and its assets
    pub static_dir: PathBuf,
    /// Request body cap
    pub max_upload_bytes: usize,
    pub poll_interval: Duration,
    pub max_polls: u32,
    /// Upper bound on upload + polling + generation for one request
    pub process_timeout: Duration,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, so tests don't have to touch
    /// the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = match lookup("GOOGLE_API_KEY") {
            Some(key) if !key.trim().is_empty() => key,
            _ => bail!("GOOGLE_API_KEY is not set; add it to the environment or a .env file"),
        };

        Ok(Self {
            api_key,
            model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: lookup("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            upload_dir: lookup("UPLOAD_FOLDER")
                .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string())
                .into(),
            static_dir: lookup("STATIC_DIR")
                .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())
                .into(),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            poll_interval: Duration::from_secs(parse_or(&lookup, "POLL_INTERVAL_SECS", 10)?),
            max_polls: parse_or(&lookup, "POLL_MAX_ATTEMPTS", 60)?,
            process_timeout: Duration::from_secs(parse_or(&lookup, "PROCESS_TIMEOUT_SECS", 900)?),
            bind_addr: parse_or(
                &lookup,
                "BIND_ADDR",
                SocketAddr::from_str(DEFAULT_BIND_ADDR)?,
            )?,
        })
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.poll_interval,
            max_polls: self.max_polls,
        }
    }
}

// Keeps the API key out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("upload_dir", &self.upload_dir)
            .field("static_dir", &self.static_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("poll_interval", &self.poll_interval)
            .field("max_polls", &self.max_polls)
            .field("process_timeout", &self.process_timeout)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {}: {:?} ({})", key, raw, e)),
        None => Ok(default),
    }
}
