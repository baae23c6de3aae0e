use std::sync::Arc;

use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, ErrorData as McpError, Implementation, ServerCapabilities,
        ServerInfo,
    },
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use uber_ads_core::{
    AdsClient, AdsConfig, AdsError, AdsTransport, HttpTransport, JobOutcome, ReportJob,
    ReportOrchestrator,
};

use crate::error::{ServeError, to_mcp_error};
use crate::params::{
    CampaignParams, CreateCampaignParams, DownloadReportParams, GenerateReportParams,
    GetAdAccountsParams, GetAdGroupsParams, GetCampaignStatsParams, GetCampaignsParams,
    ReportStatusParams, UpdateCampaignParams,
};

const INSTRUCTIONS: &str = "Uber Ads API tools. List ad accounts first to find an \
    ad_account_id, then read or manage campaigns and ad groups, pull campaign stats, or \
    generate a performance report. generate_report waits until the report settles \
    (up to about five minutes) and returns the file contents when it completes. \
    Every tool accepts an optional access_token overriding the server default.";

/// Single poll of a report job, with its settled outcome if it has one
#[derive(Debug, Serialize)]
struct StatusSnapshot {
    #[serde(flatten)]
    job: ReportJob,
    settled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<JobOutcome>,
}

fn json_result<T: Serialize>(value: &T) -> std::result::Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(
            "Failed to serialize tool result",
            Some(json!({ "details": e.to_string() })),
        )
    })?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn failure(tool: &str, e: AdsError) -> McpError {
    error!(tool, kind = e.kind(), "Tool call failed: {}", e);
    to_mcp_error(tool, &e)
}

/// MCP server exposing the Ads API as tools
#[derive(Clone)]
pub struct AdsMcpServer {
    client: AdsClient,
    reports: ReportOrchestrator,
    tool_router: ToolRouter<Self>,
}

impl AdsMcpServer {
    pub fn new(client: AdsClient, reports: ReportOrchestrator) -> Self {
        Self {
            client,
            reports,
            tool_router: Self::tool_router(),
        }
    }

    /// Build the client and orchestrator over one shared transport
    pub fn with_transport(transport: Arc<dyn AdsTransport>, config: &AdsConfig) -> Self {
        let token = config.access_token.clone();
        let client = AdsClient::new(transport.clone(), token.clone());
        let reports = ReportOrchestrator::new(transport, token, config.report.policy());
        Self::new(client, reports)
    }

    pub fn from_config(config: &AdsConfig) -> crate::error::Result<Self> {
        let transport = HttpTransport::new(config)?;
        info!(base_url = %transport.base_url(), "Using Ads API");
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Serve over stdin/stdout until the client disconnects
    pub async fn serve_stdio(self) -> crate::error::Result<()> {
        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| ServeError::Transport { cause: Box::new(e) })?;
        info!("MCP server ready on stdio");

        let reason = service
            .waiting()
            .await
            .map_err(|e| ServeError::Transport { cause: Box::new(e) })?;
        info!(?reason, "MCP session ended");
        Ok(())
    }
}

#[tool_router]
impl AdsMcpServer {
    #[tool(description = "List the ad accounts the access token can see")]
    async fn get_ad_accounts(
        &self,
        Parameters(params): Parameters<GetAdAccountsParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let accounts = self
            .client
            .get_ad_accounts(params.access_token.as_deref())
            .await
            .map_err(|e| failure("get_ad_accounts", e))?;
        json_result(&accounts)
    }

    #[tool(
        description = "List campaigns in an ad account, with optional status filter, sorting and paging"
    )]
    async fn get_campaigns(
        &self,
        Parameters(params): Parameters<GetCampaignsParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let campaigns = self
            .client
            .get_campaigns(
                &params.ad_account_id,
                &params.query(),
                params.access_token.as_deref(),
            )
            .await
            .map_err(|e| failure("get_campaigns", e))?;
        json_result(&campaigns)
    }

    #[tool(description = "Get the full details of one campaign")]
    async fn get_campaign_details(
        &self,
        Parameters(params): Parameters<CampaignParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let campaign = self
            .client
            .get_campaign(
                &params.ad_account_id,
                &params.campaign_id,
                params.access_token.as_deref(),
            )
            .await
            .map_err(|e| failure("get_campaign_details", e))?;
        json_result(&campaign)
    }

    #[tool(description = "Create a campaign in an ad account")]
    async fn create_campaign(
        &self,
        Parameters(params): Parameters<CreateCampaignParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let created = self
            .client
            .create_campaign(
                &params.ad_account_id,
                &params.campaign,
                params.access_token.as_deref(),
            )
            .await
            .map_err(|e| failure("create_campaign", e))?;
        json_result(&created)
    }

    #[tool(description = "Update selected fields of a campaign")]
    async fn update_campaign(
        &self,
        Parameters(params): Parameters<UpdateCampaignParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let updated = self
            .client
            .update_campaign(
                &params.ad_account_id,
                &params.campaign_id,
                &params.updates,
                params.access_token.as_deref(),
            )
            .await
            .map_err(|e| failure("update_campaign", e))?;
        json_result(&updated)
    }

    #[tool(description = "Delete a campaign")]
    async fn delete_campaign(
        &self,
        Parameters(params): Parameters<CampaignParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let response = self
            .client
            .delete_campaign(
                &params.ad_account_id,
                &params.campaign_id,
                params.access_token.as_deref(),
            )
            .await
            .map_err(|e| failure("delete_campaign", e))?;
        json_result(&json!({
            "deleted": true,
            "campaign_id": params.campaign_id,
            "response": response,
        }))
    }

    #[tool(description = "List ad groups in an ad account, optionally for one campaign")]
    async fn get_ad_groups(
        &self,
        Parameters(params): Parameters<GetAdGroupsParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let groups = self
            .client
            .get_ad_groups(
                &params.ad_account_id,
                &params.query(),
                params.access_token.as_deref(),
            )
            .await
            .map_err(|e| failure("get_ad_groups", e))?;
        json_result(&groups)
    }

    #[tool(description = "Get performance statistics for campaigns over a date range")]
    async fn get_campaign_stats(
        &self,
        Parameters(params): Parameters<GetCampaignStatsParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let stats = self
            .client
            .get_campaign_stats(
                &params.ad_account_id,
                &params.query(),
                params.access_token.as_deref(),
            )
            .await
            .map_err(|e| failure("get_campaign_stats", e))?;
        json_result(&stats)
    }

    #[tool(
        description = "Generate a performance report: submits the job, waits for it to finish (up to about five minutes) and returns the report file"
    )]
    async fn generate_report(
        &self,
        Parameters(params): Parameters<GenerateReportParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let request = params.request();
        info!(
            account_id = %request.account_id,
            report_type = ?request.report_type,
            "Generating report"
        );

        let run = self
            .reports
            .run(&request, params.access_token.as_deref())
            .await
            .map_err(|e| failure("generate_report", e))?;
        json_result(&run)
    }

    #[tool(description = "Check the status of a submitted report once, without waiting")]
    async fn get_report_status(
        &self,
        Parameters(params): Parameters<ReportStatusParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let job = self
            .reports
            .check_status(
                &params.ad_account_id,
                &params.report_id,
                params.access_token.as_deref(),
            )
            .await
            .map_err(|e| failure("get_report_status", e))?;

        let outcome = job.terminal_outcome();
        json_result(&StatusSnapshot {
            settled: outcome.is_some(),
            outcome,
            job,
        })
    }

    #[tool(description = "Download the file of a completed report from its report_url")]
    async fn download_report(
        &self,
        Parameters(params): Parameters<DownloadReportParams>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = self.reports.fetch(&params.report_url).await;
        if result.success {
            return json_result(&result);
        }

        let text = serde_json::to_string_pretty(&result).unwrap_or_else(|_| {
            result
                .error
                .clone()
                .unwrap_or_else(|| "Failed to download report".to_string())
        });
        Ok(CallToolResult::error(vec![Content::text(text)]))
    }
}

#[tool_handler]
impl ServerHandler for AdsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rmcp::model::ErrorCode;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use uber_ads_core::{ApiRequest, BearerToken, HttpMethod};

    /// Transport answering from a queue and recording what was sent
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<uber_ads_core::Result<Value>>>,
        sent: Mutex<Vec<ApiRequest>>,
        file: Mutex<Option<uber_ads_core::Result<String>>>,
    }

    impl ScriptedTransport {
        fn replying(responses: Vec<uber_ads_core::Result<Value>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                ..Self::default()
            })
        }

        fn with_file(self: Arc<Self>, file: uber_ads_core::Result<String>) -> Arc<Self> {
            *self.file.lock().unwrap() = Some(file);
            self
        }

        fn sent(&self) -> Vec<ApiRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AdsTransport for ScriptedTransport {
        async fn send(&self, request: ApiRequest) -> uber_ads_core::Result<Value> {
            self.sent.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({})))
        }

        async fn download(&self, _url: &str) -> uber_ads_core::Result<String> {
            self.file
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn server(transport: Arc<ScriptedTransport>, token: Option<&str>) -> AdsMcpServer {
        let config = AdsConfig {
            access_token: token.map(|t| BearerToken::new(t).unwrap()),
            ..AdsConfig::default()
        };
        AdsMcpServer::with_transport(transport, &config)
    }

    fn text(result: &CallToolResult) -> String {
        result
            .content
            .first()
            .and_then(|content| content.as_text())
            .map(|content| content.text.clone())
            .unwrap_or_default()
    }

    fn report_params() -> GenerateReportParams {
        serde_json::from_value(json!({
            "ad_account_id": "acct-1",
            "report_type": "CAMPAIGN_PERFORMANCE",
            "start_time": "2024-03-01T00:00:00Z",
            "end_time": "2024-03-08T00:00:00Z",
            "columns": ["impressions", "clicks"],
            "time_unit": "DAILY",
        }))
        .unwrap()
    }

    #[test]
    fn test_all_tools_registered() {
        let mut names: Vec<String> = AdsMcpServer::tool_router()
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "create_campaign",
                "delete_campaign",
                "download_report",
                "generate_report",
                "get_ad_accounts",
                "get_ad_groups",
                "get_campaign_details",
                "get_campaign_stats",
                "get_campaigns",
                "get_report_status",
                "update_campaign",
            ]
        );
    }

    #[test]
    fn test_server_info_advertises_tools() {
        let info = server(ScriptedTransport::replying(vec![]), None).get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.unwrap().contains("generate_report"));
    }

    #[tokio::test]
    async fn test_get_campaigns_returns_list() {
        let transport =
            ScriptedTransport::replying(vec![Ok(json!({"data": [{"id": "c1"}, {"id": "c2"}]}))]);
        let server = server(transport.clone(), Some("default-token"));

        let params: GetCampaignsParams =
            serde_json::from_value(json!({"ad_account_id": "acct-1", "limit": 2})).unwrap();
        let result = server.get_campaigns(Parameters(params)).await.unwrap();

        let body: Value = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(body, json!([{"id": "c1"}, {"id": "c2"}]));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].path, "/acct-1/campaigns");
        assert!(sent[0].query.contains(&("limit".to_string(), "2".to_string())));
    }

    #[tokio::test]
    async fn test_missing_token_is_invalid_params() {
        let transport = ScriptedTransport::replying(vec![]);
        let server = server(transport.clone(), None);

        let error = server
            .get_ad_accounts(Parameters(GetAdAccountsParams::default()))
            .await
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_internal_error() {
        let transport = ScriptedTransport::replying(vec![Err(AdsError::remote(
            403,
            HttpMethod::Delete,
            "https://api.uber.com/v1/ads/acct-1/campaigns/c1",
            r#"{"error":{"message":"forbidden"}}"#.to_string(),
        ))]);
        let server = server(transport, Some("t"));

        let params: CampaignParams = serde_json::from_value(json!({
            "ad_account_id": "acct-1",
            "campaign_id": "c1",
        }))
        .unwrap();
        let error = server.delete_campaign(Parameters(params)).await.unwrap_err();

        assert_eq!(error.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(error.data.unwrap()["status_code"], 403);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_report_returns_completed_run_with_file() {
        let transport = ScriptedTransport::replying(vec![
            Ok(json!({"report_id": "r-9"})),
            Ok(json!({"status": "PENDING"})),
            Ok(json!({
                "status": "COMPLETED",
                "result": {"success_result": {"report_url": "https://files.example.com/r-9.csv"}}
            })),
        ])
        .with_file(Ok("date,clicks\n2024-03-01,4\n".to_string()));
        let server = server(transport.clone(), Some("t"));

        let result = server
            .generate_report(Parameters(report_params()))
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&text(&result)).unwrap();

        assert_eq!(body["report_id"], "r-9");
        assert_eq!(body["status"], "COMPLETED");
        assert_eq!(body["poll_attempts"], 2);
        assert_eq!(body["download"]["success"], true);
        assert_eq!(body["download"]["data"], "date,clicks\n2024-03-01,4\n");

        let sent = transport.sent();
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].path, "/acct-1/reporting/report");
        assert_eq!(sent[1].path, "/acct-1/reporting/r-9");
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_report_failure_is_a_result_not_an_error() {
        let transport = ScriptedTransport::replying(vec![
            Ok(json!({"report_id": "r-9"})),
            Ok(json!({"status": "WEIRD"})),
        ]);
        let server = server(transport, Some("t"));

        let result = server
            .generate_report(Parameters(report_params()))
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&text(&result)).unwrap();

        assert_eq!(result.is_error, Some(false));
        assert_eq!(body["status"], "FAILED");
        assert_eq!(body["reason"]["status"], "WEIRD");
        assert!(body.get("download").is_none());
    }

    #[tokio::test]
    async fn test_generate_report_rejects_empty_columns() {
        let transport = ScriptedTransport::replying(vec![]);
        let server = server(transport.clone(), Some("t"));

        let mut params = report_params();
        params.columns.clear();
        let error = server.generate_report(Parameters(params)).await.unwrap_err();

        assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_report_status_snapshot() {
        let transport = ScriptedTransport::replying(vec![Ok(json!({
            "data": {"status": "FAILED", "result": {"failure_result": {"reason": "quota"}}}
        }))]);
        let server = server(transport, Some("t"));

        let params: ReportStatusParams = serde_json::from_value(json!({
            "ad_account_id": "acct-1",
            "report_id": "r-9",
        }))
        .unwrap();
        let result = server.get_report_status(Parameters(params)).await.unwrap();
        let body: Value = serde_json::from_str(&text(&result)).unwrap();

        assert_eq!(body["status"], "FAILED");
        assert_eq!(body["settled"], true);
        assert_eq!(body["outcome"]["status"], "FAILED");
        assert_eq!(body["failure"], json!({"reason": "quota"}));
    }

    #[tokio::test]
    async fn test_download_failure_is_flagged() {
        let transport = ScriptedTransport::replying(vec![]).with_file(Err(AdsError::remote(
            403,
            HttpMethod::Get,
            "https://files.example.com/r-9.csv",
            "AccessDenied".to_string(),
        )));
        let server = server(transport, None);

        let params = DownloadReportParams {
            report_url: "https://files.example.com/r-9.csv".to_string(),
        };
        let result = server.download_report(Parameters(params)).await.unwrap();

        assert_eq!(result.is_error, Some(true));
        let body: Value = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["status_code"], 403);
    }
}
