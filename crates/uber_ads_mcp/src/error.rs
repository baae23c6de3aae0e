use miette::Diagnostic;
use rmcp::model::ErrorData as McpError;
use serde_json::{Value, json};
use thiserror::Error;
use uber_ads_core::AdsError;

/// Failures that stop the server process
#[derive(Error, Diagnostic, Debug)]
pub enum ServeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Ads(#[from] AdsError),

    #[error("MCP stdio transport failed")]
    #[diagnostic(
        code(uber_ads_mcp::transport),
        help("The MCP client closed the connection or sent a malformed frame")
    )]
    Transport {
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T> = std::result::Result<T, ServeError>;

/// Translate a client failure into the protocol error returned to the caller.
///
/// Problems with the caller's arguments or credential become `invalid_params`;
/// everything the Ads API or the network did becomes `internal_error`.
pub fn to_mcp_error(tool: &str, error: &AdsError) -> McpError {
    let mut data = json!({
        "tool": tool,
        "kind": error.kind(),
    });

    match error {
        AdsError::Validation { field, message } => {
            data["field"] = json!(field);
            McpError::invalid_params(format!("Invalid '{field}': {message}"), Some(data))
        }
        AdsError::MissingCredential => McpError::invalid_params(
            "No access token: pass access_token or configure a default",
            Some(data),
        ),
        AdsError::Remote {
            status,
            method,
            url,
            body,
            ..
        } => {
            data["status_code"] = json!(status);
            data["method"] = json!(method);
            data["url"] = json!(url);
            if let Ok(parsed) = serde_json::from_str::<Value>(body) {
                data["body"] = parsed;
            } else if !body.is_empty() {
                data["body"] = json!(body);
            }
            McpError::internal_error(error.to_string(), Some(data))
        }
        AdsError::Transport { method, url, cause } => {
            data["method"] = json!(method);
            data["url"] = json!(url);
            data["details"] = json!(cause.to_string());
            McpError::internal_error(error.to_string(), Some(data))
        }
        AdsError::Submission { response, .. } => {
            data["response"] = response.clone();
            McpError::internal_error(error.to_string(), Some(data))
        }
        AdsError::Decode { url, cause } => {
            data["url"] = json!(url);
            data["details"] = json!(cause.to_string());
            McpError::internal_error(error.to_string(), Some(data))
        }
        AdsError::Config { path, .. } => {
            data["path"] = json!(path);
            McpError::internal_error(error.to_string(), Some(data))
        }
    }
}
