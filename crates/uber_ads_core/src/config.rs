//! Configuration for the Ads client
//!
//! Settings come from built-in defaults, an optional TOML file, and then the
//! environment. The binary applies CLI overrides last.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credential::BearerToken;
use crate::error::{AdsError, Result};
use crate::report::PollPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.uber.com/v1/ads";

/// Environment variable holding the default bearer token
pub const ENV_ACCESS_TOKEN: &str = "UBER_ADS_ACCESS_TOKEN";
/// Environment variable overriding the API base URL
pub const ENV_BASE_URL: &str = "UBER_ADS_BASE_URL";
/// Older name for the base URL variable, still honoured
pub const ENV_BASE_URL_LEGACY: &str = "UBER_BASE_URL";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsConfig {
    /// Root of the Ads API, e.g. `https://api.uber.com/v1/ads`
    pub base_url: String,

    /// Process-wide default credential, used when a call supplies none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<BearerToken>,

    /// Timeout for each Ads API call
    pub request_timeout_secs: u64,

    /// Timeout for downloading a finished report
    pub download_timeout_secs: u64,

    pub user_agent: String,

    /// Report polling settings
    pub report: ReportPollConfig,
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            request_timeout_secs: 30,
            download_timeout_secs: 30,
            user_agent: concat!("uber-ads-mcp/", env!("CARGO_PKG_VERSION")).to_string(),
            report: ReportPollConfig::default(),
        }
    }
}

/// Polling settings for report jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportPollConfig {
    /// Delay before the second poll
    pub poll_interval_secs: u64,

    /// Upper bound on status polls per report
    pub max_poll_attempts: u32,

    /// Wall-clock ceiling for the whole polling loop
    pub max_wait_secs: u64,

    /// Growth factor applied to the delay after each poll (1.0 = fixed)
    pub backoff_factor: f64,

    /// Cap on the delay between polls
    pub max_poll_interval_secs: u64,
}

impl Default for ReportPollConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            max_poll_attempts: 60,
            max_wait_secs: 300,
            backoff_factor: 1.0,
            max_poll_interval_secs: 30,
        }
    }
}

impl ReportPollConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_interval: Duration::from_secs(self.max_poll_interval_secs),
            backoff_factor: self.backoff_factor,
            max_attempts: self.max_poll_attempts,
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }
}

impl AdsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Overlay values from the environment.
    ///
    /// Takes a lookup function so callers (and tests) decide where values
    /// come from; [`AdsConfig::apply_process_env`] reads the real environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_BASE_URL).or_else(|| lookup(ENV_BASE_URL_LEGACY));
        if let Some(base_url) = base_url.filter(|v| !v.trim().is_empty()) {
            debug!(base_url = %base_url, "Base URL taken from environment");
            self.base_url = base_url;
        }

        if let Some(token) = lookup(ENV_ACCESS_TOKEN).filter(|v| !v.trim().is_empty()) {
            debug!("Default access token taken from environment");
            self.access_token = Some(BearerToken::new(token)?);
        }

        Ok(())
    }

    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Check the configuration for values that would make every call fail
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(self.base_url.trim())
            .map_err(|e| AdsError::config("base_url", format!("'{}' is not a URL: {e}", self.base_url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AdsError::config(
                "base_url",
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        if let Some(token) = &self.access_token {
            if token.expose().trim().is_empty() {
                return Err(AdsError::config("access_token", "must not be blank"));
            }
        }

        if self.request_timeout_secs == 0 || self.download_timeout_secs == 0 {
            return Err(AdsError::config("timeouts", "timeouts must be at least one second"));
        }

        let report = &self.report;
        if report.max_poll_attempts == 0 {
            return Err(AdsError::config("report.max_poll_attempts", "must be at least 1"));
        }
        if report.poll_interval_secs == 0 {
            return Err(AdsError::config("report.poll_interval_secs", "must be at least 1"));
        }
        if !report.backoff_factor.is_finite() || report.backoff_factor < 1.0 {
            return Err(AdsError::config("report.backoff_factor", "must be a number >= 1.0"));
        }
        if report.max_poll_interval_secs < report.poll_interval_secs {
            return Err(AdsError::config(
                "report.max_poll_interval_secs",
                "must not be smaller than poll_interval_secs",
            ));
        }

        Ok(())
    }
}

/// Load configuration from a TOML file
pub async fn load_config(path: &Path) -> Result<AdsConfig> {
    let location = path.display().to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AdsError::config(&location, format!("failed to read: {e}")))?;

    let config: AdsConfig = toml::from_str(&content)
        .map_err(|e| AdsError::config(&location, format!("failed to parse: {e}")))?;

    debug!(path = %location, "Loaded configuration file");
    Ok(config)
}
