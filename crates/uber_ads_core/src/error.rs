use miette::Diagnostic;
use thiserror::Error;

use crate::transport::HttpMethod;

#[derive(Error, Diagnostic, Debug)]
pub enum AdsError {
    #[error("Invalid request: {field} {message}")]
    #[diagnostic(
        code(uber_ads::validation),
        help("Fix the '{field}' argument and retry; nothing was sent to the Ads API")
    )]
    Validation { field: String, message: String },

    #[error("No bearer credential available")]
    #[diagnostic(
        code(uber_ads::missing_credential),
        help("Pass access_token with the call or set UBER_ADS_ACCESS_TOKEN / access_token in the config file")
    )]
    MissingCredential,

    #[error("Report submission for account {account_id} returned no report_id")]
    #[diagnostic(
        code(uber_ads::submission),
        help("The Ads API accepted the request but did not assign a report identifier")
    )]
    Submission {
        account_id: String,
        response: serde_json::Value,
    },

    #[error("{method} {url} failed before a response was received")]
    #[diagnostic(
        code(uber_ads::transport),
        help("Check network connectivity to the Ads API; the request may have timed out")
    )]
    Transport {
        method: HttpMethod,
        url: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Ads API error {status}: {message}")]
    #[diagnostic(
        code(uber_ads::remote),
        help("{method} {url} was rejected by the Ads API")
    )]
    Remote {
        status: u16,
        method: HttpMethod,
        url: String,
        message: String,
        body: String,
    },

    #[error("Could not decode response from {url}")]
    #[diagnostic(
        code(uber_ads::decode),
        help("The Ads API returned a body that is not valid JSON")
    )]
    Decode {
        url: String,
        #[source]
        cause: serde_json::Error,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(uber_ads::config), help("Check {path}"))]
    Config { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, AdsError>;

impl AdsError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn transport(
        method: HttpMethod,
        url: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            method,
            url: url.into(),
            cause: Box::new(cause),
        }
    }

    /// Build a remote failure, pulling `error.message` out of the Ads API
    /// error envelope when the body carries one.
    pub fn remote(status: u16, method: HttpMethod, url: impl Into<String>, body: String) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/error/message")
                    .or_else(|| value.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {status}")
                } else {
                    body.clone()
                }
            });

        Self::Remote {
            status,
            method,
            url: url.into(),
            message,
            body,
        }
    }

    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable name for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::MissingCredential => "missing_credential",
            Self::Submission { .. } => "submission",
            Self::Transport { .. } => "transport",
            Self::Remote { .. } => "remote",
            Self::Decode { .. } => "decode",
            Self::Config { .. } => "config",
        }
    }

    /// HTTP status of a remote failure
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}
