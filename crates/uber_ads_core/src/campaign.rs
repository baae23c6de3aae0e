//! Campaign, ad group, and statistics request types

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AdsError, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Active,
    Paused,
    Archived,
    Draft,
}

/// Status values accepted when listing campaigns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusFilter {
    Active,
    Paused,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Name,
    Spend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetType {
    Daily,
    Lifetime,
}

/// Metrics that can be requested from the campaign stats endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Impressions,
    Clicks,
    Spend,
    Conversions,
    Ctr,
    Cpm,
}

/// Render a unit enum the way serde names it on the wire
fn wire_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(name)) => name,
        _ => String::new(),
    }
}

fn check_limit(field: &str, limit: u32) -> Result<()> {
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(AdsError::validation(
            field,
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }
    Ok(())
}

fn check_budget(field: &str, amount: Option<f64>) -> Result<()> {
    match amount {
        Some(value) if !value.is_finite() || value <= 0.0 => Err(AdsError::validation(
            field,
            "must be a positive amount",
        )),
        _ => Ok(()),
    }
}

fn check_schedule(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if end <= start => {
            Err(AdsError::validation("end_time", "must be after start_time"))
        }
        _ => Ok(()),
    }
}

/// Filtering and paging for campaign listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignQuery {
    pub limit: u32,
    pub offset: u32,
    pub status: Option<StatusFilter>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
}

impl Default for CampaignQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
            status: None,
            sort_by: None,
            sort_order: None,
        }
    }
}

impl CampaignQuery {
    pub fn to_query(&self) -> Result<Vec<(String, String)>> {
        check_limit("limit", self.limit)?;

        let mut query = vec![
            ("limit".to_string(), self.limit.to_string()),
            ("offset".to_string(), self.offset.to_string()),
        ];
        if let Some(status) = &self.status {
            query.push(("status".to_string(), wire_name(status)));
        }
        if let Some(sort_by) = &self.sort_by {
            query.push(("sort_by".to_string(), wire_name(sort_by)));
        }
        if let Some(sort_order) = &self.sort_order {
            query.push(("sort_order".to_string(), wire_name(sort_order)));
        }
        Ok(query)
    }
}

/// Body for creating a campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CampaignDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CampaignStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_type: Option<BudgetType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifetime_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Additional API fields passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CampaignDraft {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AdsError::validation("name", "must not be empty"));
        }
        check_budget("daily_budget", self.daily_budget)?;
        check_budget("lifetime_budget", self.lifetime_budget)?;
        match self.budget_type {
            Some(BudgetType::Daily) if self.daily_budget.is_none() => {
                return Err(AdsError::validation(
                    "daily_budget",
                    "is required when budget_type is DAILY",
                ));
            }
            Some(BudgetType::Lifetime) if self.lifetime_budget.is_none() => {
                return Err(AdsError::validation(
                    "lifetime_budget",
                    "is required when budget_type is LIFETIME",
                ));
            }
            _ => {}
        }
        check_schedule(self.start_time, self.end_time)
    }
}

/// Partial update for a campaign; only supplied fields are sent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CampaignUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CampaignStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_type: Option<BudgetType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifetime_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CampaignUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.objective.is_none()
            && self.status.is_none()
            && self.budget_type.is_none()
            && self.daily_budget.is_none()
            && self.lifetime_budget.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.extra.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(AdsError::validation(
                "updates",
                "at least one field must be supplied",
            ));
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AdsError::validation("name", "must not be empty"));
            }
        }
        check_budget("daily_budget", self.daily_budget)?;
        check_budget("lifetime_budget", self.lifetime_budget)?;
        check_schedule(self.start_time, self.end_time)
    }
}

/// Filtering and paging for ad group listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdGroupQuery {
    pub campaign_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AdGroupQuery {
    pub fn to_query(&self) -> Result<Vec<(String, String)>> {
        let mut query = Vec::new();
        if let Some(campaign_id) = &self.campaign_id {
            let campaign_id = crate::transport::path_segment("campaign_id", campaign_id)?;
            query.push(("campaign_id".to_string(), campaign_id.to_string()));
        }
        if let Some(limit) = self.limit {
            check_limit("limit", limit)?;
            query.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            query.push(("offset".to_string(), offset.to_string()));
        }
        Ok(query)
    }
}

/// Campaign performance statistics over a date range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
    pub campaign_ids: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub metrics: Vec<Metric>,
}

impl StatsQuery {
    pub fn to_query(&self) -> Result<Vec<(String, String)>> {
        if self.campaign_ids.is_empty() {
            return Err(AdsError::validation("campaign_ids", "must not be empty"));
        }
        if self.end_date < self.start_date {
            return Err(AdsError::validation(
                "end_date",
                "must not be before start_date",
            ));
        }

        let mut query = vec![
            ("start_date".to_string(), self.start_date.format("%Y-%m-%d").to_string()),
            ("end_date".to_string(), self.end_date.format("%Y-%m-%d").to_string()),
        ];
        for id in &self.campaign_ids {
            let id = crate::transport::path_segment("campaign_ids", id)?;
            query.push(("campaign_ids".to_string(), id.to_string()));
        }
        for metric in &self.metrics {
            query.push(("metrics".to_string(), wire_name(metric)));
        }
        Ok(query)
    }
}
