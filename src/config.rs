use std::time::Duration;

use anyhow::{Context, Result, anyhow};

const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.10;
const DEFAULT_REPLY_TIMEOUT_SECS: u64 = 30;

/// Environment-provided settings for the translation backend and the
/// disambiguation prompts.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub api_url: String,
    pub username: String,
    pub password: String,
    pub confidence_threshold: f64,
    pub reply_timeout: Duration,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        let api_url = require_env("TRANSLATE_API_URL")?;
        let username = require_env("TRANSLATE_API_USERNAME")?;
        let password = require_env("TRANSLATE_API_PASSWORD")?;

        let confidence_threshold = match get_env("TRANSLATE_CONFIDENCE_THRESHOLD") {
            Some(raw) => raw
                .parse::<f64>()
                .with_context(|| format!("invalid TRANSLATE_CONFIDENCE_THRESHOLD '{}'", raw))?,
            None => DEFAULT_CONFIDENCE_THRESHOLD,
        };

        let reply_timeout_secs = match get_env("TRANSLATE_REPLY_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("invalid TRANSLATE_REPLY_TIMEOUT_SECS '{}'", raw))?,
            None => DEFAULT_REPLY_TIMEOUT_SECS,
        };

        Ok(Self {
            api_url,
            username,
            password,
            confidence_threshold,
            reply_timeout: Duration::from_secs(reply_timeout_secs),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    get_env(key).ok_or_else(|| anyhow!("{} is not set", key))
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
