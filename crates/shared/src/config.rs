use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::composer::ComposerConfig;
use crate::generator::{DEFAULT_MAX_CONCURRENCY, DEFAULT_MESSAGES_URL, DEFAULT_MODEL};
use crate::signals::{hacker_news, CollectorConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub model: String,
    pub anthropic_url: String,
    pub signal_endpoint: String,
    pub collection_timeout: Duration,
    pub generation_timeout: Duration,
    pub max_signals: usize,
    pub max_citations: usize,
    pub idea_count: usize,
    pub generation_concurrency: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        let anthropic_api_key = env::var("ANTHROPIC_API_KEY").context(
            "ANTHROPIC_API_KEY not found.\n\n\
                To fix this, create ~/.config/latest-pulse/.env with:\n  \
                ANTHROPIC_API_KEY=your_key_here\n\n\
                Get your Anthropic API key from: https://console.anthropic.com/settings/keys",
        )?;

        Ok(Self {
            anthropic_api_key,
            model: string_or("PULSE_MODEL", DEFAULT_MODEL),
            anthropic_url: string_or("PULSE_ANTHROPIC_URL", DEFAULT_MESSAGES_URL),
            signal_endpoint: string_or("PULSE_SIGNAL_ENDPOINT", hacker_news::DEFAULT_ENDPOINT),
            collection_timeout: Duration::from_secs(parse_env(
                "PULSE_COLLECTION_TIMEOUT_SECS",
                12,
            )?),
            generation_timeout: Duration::from_secs(parse_env(
                "PULSE_GENERATION_TIMEOUT_SECS",
                90,
            )?),
            max_signals: parse_env("PULSE_MAX_SIGNALS", 10)?,
            max_citations: parse_env("PULSE_MAX_CITATIONS", 8)?,
            idea_count: parse_env("PULSE_IDEA_COUNT", 4)?,
            generation_concurrency: parse_env(
                "PULSE_GENERATION_CONCURRENCY",
                DEFAULT_MAX_CONCURRENCY,
            )?,
        })
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            max_signals: self.max_signals,
            timeout: self.collection_timeout,
            ..CollectorConfig::default()
        }
    }

    pub fn composer_config(&self) -> ComposerConfig {
        ComposerConfig {
            max_citations: self.max_citations,
            idea_count: self.idea_count,
            timeout: self.generation_timeout,
            ..ComposerConfig::default()
        }
    }

    fn try_load_dotenv() {
        // Variables already set in the process are never overridden

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/latest-pulse/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("latest-pulse").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }
    }
}

fn string_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Unset or blank means `default`; anything else must parse
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", key, raw)),
        _ => Ok(default),
    }
}
