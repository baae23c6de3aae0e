//! HTTP transport for the Ads API
//!
//! [`AdsTransport`] is the seam between request handling and the network:
//! authenticated JSON calls against the API, plus an unauthenticated GET for
//! pre-signed report downloads. [`HttpTransport`] implements it with reqwest.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::AdsConfig;
use crate::credential::BearerToken;
use crate::error::{AdsError, Result};

/// Content types requested when downloading a report file
pub const REPORT_ACCEPT: &str = "text/csv, text/plain;q=0.9, */*;q=0.8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// An authenticated call against the Ads API
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path below the base URL; empty for the base itself
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub token: BearerToken,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>, token: BearerToken) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            token,
        }
    }

    pub fn get(path: impl Into<String>, token: BearerToken) -> Self {
        Self::new(HttpMethod::Get, path, token)
    }

    pub fn post(path: impl Into<String>, token: BearerToken, body: Value) -> Self {
        Self::new(HttpMethod::Post, path, token).with_body(body)
    }

    pub fn patch(path: impl Into<String>, token: BearerToken, body: Value) -> Self {
        Self::new(HttpMethod::Patch, path, token).with_body(body)
    }

    pub fn delete(path: impl Into<String>, token: BearerToken) -> Self {
        Self::new(HttpMethod::Delete, path, token)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

/// Network access used by the client and the report orchestrator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdsTransport: Send + Sync {
    /// Perform an authenticated JSON call; an empty body decodes to `{}`
    async fn send(&self, request: ApiRequest) -> Result<Value>;

    /// GET a pre-signed location and return the raw body
    async fn download(&self, url: &str) -> Result<String>;
}

/// Validate an identifier that is interpolated into a URL path
pub fn path_segment<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AdsError::validation(field, "must not be empty"));
    }
    if value.contains(['/', '?', '#']) || value.chars().any(char::is_whitespace) {
        return Err(AdsError::validation(
            field,
            format!("'{value}' is not a valid identifier"),
        ));
    }
    Ok(value)
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    download_client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &AdsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AdsError::config("http client", e.to_string()))?;

        let download_client = Client::builder()
            .timeout(config.download_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AdsError::config("download client", e.to_string()))?;

        Ok(Self {
            client,
            download_client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join a request path onto the base URL
    pub fn url_for(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn read_body(
        response: reqwest::Response,
        method: HttpMethod,
        url: &str,
    ) -> Result<String> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AdsError::transport(method, url, e))?;

        if !status.is_success() {
            return Err(AdsError::remote(status.as_u16(), method, url, text));
        }
        Ok(text)
    }
}

#[async_trait]
impl AdsTransport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        let url = self.url_for(&request.path);
        debug!(method = %request.method, url = %url, "Ads API request");

        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .header(AUTHORIZATION, request.token.header_value())
            .header(ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AdsError::transport(request.method, &url, e))?;
        let text = Self::read_body(response, request.method, &url).await?;

        if text.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&text).map_err(|cause| AdsError::Decode { url, cause })
    }

    async fn download(&self, url: &str) -> Result<String> {
        debug!(url = %url, "Downloading report file");

        let response = self
            .download_client
            .get(url)
            .header(ACCEPT, REPORT_ACCEPT)
            .send()
            .await
            .map_err(|e| AdsError::transport(HttpMethod::Get, url, e))?;

        Self::read_body(response, HttpMethod::Get, url).await
    }
}
