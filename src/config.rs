use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

/// Service configuration, read from `mailient.toml`. Secrets never live in
/// the file itself: the `*_env` fields name environment variables to read at
/// startup.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    pub workspace_dir: Option<PathBuf>,
    pub api: ApiConfig,
    pub llm: LlmConfig,
    pub mail: MailConfig,
    pub calendar: CalendarConfig,
    pub booking: BookingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8740,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "MAILIENT_LLM_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub search_url: String,
    pub service_token_env: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            search_url: "http://127.0.0.1:8741/api/emails/search".to_string(),
            service_token_env: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CalendarConfig {
    pub access_token_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BookingConfig {
    pub calcom_username: Option<String>,
}

fn read_env(var: &str) -> Option<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

impl ServiceConfig {
    /// Load from an explicit path, else `~/.mailient/mailient.toml`, else
    /// defaults when no file exists at all.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_workspace_dir().join("mailient.toml"),
        };
        if !path.exists() {
            warn!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace_dir
            .clone()
            .unwrap_or_else(default_workspace_dir)
    }

    pub fn llm_api_key(&self) -> Option<String> {
        read_env(&self.llm.api_key_env)
    }

    pub fn mail_service_token(&self) -> Option<String> {
        self.mail
            .service_token_env
            .as_deref()
            .and_then(read_env)
    }

    pub fn calendar_access_token(&self) -> Option<String> {
        self.calendar
            .access_token_env
            .as_deref()
            .and_then(read_env)
    }
}

fn default_workspace_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mailient")
}
