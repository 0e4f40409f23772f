use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result, anyhow, bail};

use crate::client::DEFAULT_SERVER_URL;
use crate::state::{DEFAULT_GREETING, DEFAULT_MAX_INPUT_CHARS};

pub const SERVER_URL_ENV: &str = "RAG_CHAT_SERVER_URL";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub server_url: Option<String>,
    pub greeting: Option<String>,
    pub max_input_chars: Option<usize>,
    pub request_timeout_secs: Option<u64>,
}

/// Effective settings after CLI flags, environment and the config file
/// have been merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub greeting: String,
    pub max_input_chars: usize,
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn save_server_url(url: &str) -> Result<PathBuf> {
        let url = parse_server_url(url)?;
        let path = Self::get_config_path()?;
        let mut config = Self::load_from(&path).unwrap_or_else(|_| Self::new());
        config.server_url = Some(url);
        config.save_to(&path)?;
        Ok(path)
    }

    /// Merge order: explicit flag, then environment, then this file, then
    /// the built-in default. Blank values are skipped; a value that is not
    /// an http(s) URL is logged and replaced by the default.
    pub fn resolve(&self, server_flag: Option<&str>, server_env: Option<&str>) -> Settings {
        let candidate = [server_flag, server_env, self.server_url.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty());

        let server_url = match candidate.map(|raw| (raw, parse_server_url(raw))) {
            Some((_, Ok(url))) => url,
            Some((raw, Err(e))) => {
                tracing::warn!(
                    url = raw,
                    error = %e,
                    default = DEFAULT_SERVER_URL,
                    "ignoring invalid server URL"
                );
                DEFAULT_SERVER_URL.to_string()
            }
            None => DEFAULT_SERVER_URL.to_string(),
        };

        Settings {
            server_url,
            greeting: self
                .greeting
                .clone()
                .unwrap_or_else(|| DEFAULT_GREETING.to_string()),
            max_input_chars: self
                .max_input_chars
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_MAX_INPUT_CHARS),
            request_timeout: self
                .request_timeout_secs
                .filter(|&s| s > 0)
                .map(Duration::from_secs),
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("rag-chat").join("config.json"))
    }
}

/// Checks that `raw` is an absolute http(s) URL with a host and returns
/// it trimmed, without a trailing slash.
pub fn parse_server_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(trimmed)
        .with_context(|| format!("Invalid server URL {:?}", raw))?;

    if !matches!(url.scheme(), "http" | "https") {
        bail!(
            "Invalid server URL {:?}: expected http:// or https://, e.g. {}",
            raw,
            DEFAULT_SERVER_URL
        );
    }
    if url.host_str().map_or(true, str::is_empty) {
        bail!("Invalid server URL {:?}: missing host", raw);
    }

    Ok(trimmed.to_string())
}
