//! Tool argument schemas
//!
//! Each struct is the JSON input of one tool. Every tool also accepts an
//! optional `access_token` that overrides the server's default credential.

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use uber_ads_core::{
    AdGroupQuery, CampaignDraft, CampaignQuery, CampaignUpdate, Metric, ReportRequest,
    ReportType, SortField, SortOrder, StatsQuery, StatusFilter, TimeUnit,
    campaign::DEFAULT_PAGE_SIZE,
};

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GetAdAccountsParams {
    /// Bearer token for this call; falls back to the server default
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetCampaignsParams {
    /// Ad account ID
    pub ad_account_id: String,
    /// Maximum number of campaigns to return (1-1000, default 50)
    pub limit: Option<u32>,
    /// Number of campaigns to skip
    pub offset: Option<u32>,
    /// Only return campaigns in this status
    pub status: Option<StatusFilter>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
    pub access_token: Option<String>,
}

impl GetCampaignsParams {
    pub fn query(&self) -> CampaignQuery {
        CampaignQuery {
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            offset: self.offset.unwrap_or(0),
            status: self.status,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        }
    }
}

/// Identifies a single campaign
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CampaignParams {
    /// Ad account ID
    pub ad_account_id: String,
    /// Campaign ID
    pub campaign_id: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateCampaignParams {
    /// Ad account ID
    pub ad_account_id: String,
    /// Campaign to create; `name` is required, unknown fields are passed through
    pub campaign: CampaignDraft,
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateCampaignParams {
    /// Ad account ID
    pub ad_account_id: String,
    /// Campaign ID
    pub campaign_id: String,
    /// Fields to change; at least one is required
    pub updates: CampaignUpdate,
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetAdGroupsParams {
    /// Ad account ID
    pub ad_account_id: String,
    /// Only return ad groups belonging to this campaign
    pub campaign_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub access_token: Option<String>,
}

impl GetAdGroupsParams {
    pub fn query(&self) -> AdGroupQuery {
        AdGroupQuery {
            campaign_id: self.campaign_id.clone(),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetCampaignStatsParams {
    /// Ad account ID
    pub ad_account_id: String,
    /// Campaign IDs to report on
    pub campaign_ids: Vec<String>,
    /// First day, YYYY-MM-DD
    pub start_date: NaiveDate,
    /// Last day, YYYY-MM-DD
    pub end_date: NaiveDate,
    /// Metrics to include; the API default set when omitted
    #[serde(default)]
    pub metrics: Vec<Metric>,
    pub access_token: Option<String>,
}

impl GetCampaignStatsParams {
    pub fn query(&self) -> StatsQuery {
        StatsQuery {
            campaign_ids: self.campaign_ids.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateReportParams {
    /// Ad account ID
    pub ad_account_id: String,
    pub report_type: ReportType,
    /// Start of the reporting window (RFC 3339)
    pub start_time: DateTime<Utc>,
    /// End of the reporting window (RFC 3339), after start_time
    pub end_time: DateTime<Utc>,
    /// Report columns, in output order
    pub columns: Vec<String>,
    pub time_unit: TimeUnit,
    pub access_token: Option<String>,
}

impl GenerateReportParams {
    pub fn request(&self) -> ReportRequest {
        ReportRequest {
            account_id: self.ad_account_id.clone(),
            report_type: self.report_type,
            start_time: self.start_time,
            end_time: self.end_time,
            columns: self.columns.clone(),
            time_unit: self.time_unit,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReportStatusParams {
    /// Ad account ID
    pub ad_account_id: String,
    /// Identifier returned when the report was submitted
    pub report_id: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DownloadReportParams {
    /// Pre-signed `report_url` from a completed report
    pub report_url: String,
}
