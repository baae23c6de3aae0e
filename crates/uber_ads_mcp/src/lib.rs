//! Uber Ads MCP - Model Context Protocol server for the Uber Ads API
//!
//! Exposes account, campaign, ad group, stats and report operations from
//! `uber_ads_core` as MCP tools served over stdio.

pub mod error;
pub mod params;
pub mod server;

pub use error::{Result, ServeError, to_mcp_error};
pub use server::AdsMcpServer;
