//! Configuration loading from environment variables.

use anyhow::{Context, Result};
use std::time::Duration;

const API_URL_VAR: &str = "CALENDARIO_API_URL";
const TIMEOUT_VAR: &str = "CALENDARIO_HTTP_TIMEOUT_SECS";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Event store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Spreadsheet web app endpoint. Without one the app runs on local data only.
    pub api_url: Option<String>,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load settings from the environment.
    ///
    /// Reads `CALENDARIO_API_URL` and `CALENDARIO_HTTP_TIMEOUT_SECS`,
    /// either from the environment or from a `.env` file.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_vars(
            std::env::var(API_URL_VAR).ok(),
            std::env::var(TIMEOUT_VAR).ok(),
        )
    }

    fn from_vars(api_url: Option<String>, timeout: Option<String>) -> Result<Self> {
        let api_url = match api_url.map(|url| url.trim().to_string()) {
            Some(url) if !url.is_empty() => Some(validate_url(url)?),
            _ => None,
        };

        let http_timeout = match timeout {
            Some(secs) => Duration::from_secs(
                secs.trim()
                    .parse()
                    .with_context(|| format!("{} must be a whole number of seconds", TIMEOUT_VAR))?,
            ),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            api_url,
            http_timeout,
        })
    }

    /// Command line value wins over the environment
    pub fn with_api_url(mut self, api_url: Option<String>) -> Result<Self> {
        if let Some(url) = api_url {
            self.api_url = Some(validate_url(url)?);
        }
        Ok(self)
    }
}

fn validate_url(url: String) -> Result<String> {
    url::Url::parse(&url).with_context(|| format!("Invalid event store URL: {}", url))?;
    Ok(url)
}
