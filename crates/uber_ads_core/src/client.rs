//! Pass-through client for accounts, campaigns, ad groups and stats

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::campaign::{AdGroupQuery, CampaignDraft, CampaignQuery, CampaignUpdate, StatsQuery};
use crate::credential::{self, BearerToken};
use crate::error::{AdsError, Result};
use crate::transport::{AdsTransport, ApiRequest, path_segment};

/// Strip the `{"data": ...}` envelope the Ads API wraps most payloads in
pub fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) => data,
            None => Value::Object(map),
        },
        other => other,
    }
}

/// Normalize a listing payload into an array.
///
/// Accepts a bare array, a `data` envelope, or a named listing such as
/// `{"campaigns": [...], "total": 2}`. Any other object is a single item.
pub fn into_list(value: Value) -> Vec<Value> {
    match unwrap_data(value) {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        Value::Object(mut map) => match listing_key(&map) {
            Some(key) => match map.remove(&key) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            None => vec![Value::Object(map)],
        },
        single => vec![single],
    }
}

/// The one array-valued field of an object that is not itself an entity
fn listing_key(map: &Map<String, Value>) -> Option<String> {
    if map.contains_key("id") {
        return None;
    }
    let mut arrays = map.iter().filter(|(_, value)| value.is_array());
    match (arrays.next(), arrays.next()) {
        (Some((key, _)), None) => Some(key.clone()),
        _ => None,
    }
}

/// Client for the CRUD and listing endpoints
#[derive(Clone)]
pub struct AdsClient {
    transport: Arc<dyn AdsTransport>,
    default_token: Option<BearerToken>,
}

impl AdsClient {
    pub fn new(transport: Arc<dyn AdsTransport>, default_token: Option<BearerToken>) -> Self {
        Self {
            transport,
            default_token,
        }
    }

    fn token(&self, per_call: Option<&str>) -> Result<BearerToken> {
        credential::resolve(per_call, self.default_token.as_ref())
    }

    fn campaigns_path(account_id: &str) -> Result<String> {
        Ok(format!(
            "/{}/campaigns",
            path_segment("ad_account_id", account_id)?
        ))
    }

    fn campaign_path(account_id: &str, campaign_id: &str) -> Result<String> {
        Ok(format!(
            "{}/{}",
            Self::campaigns_path(account_id)?,
            path_segment("campaign_id", campaign_id)?
        ))
    }

    /// All ad accounts visible to the credential
    pub async fn get_ad_accounts(&self, token: Option<&str>) -> Result<Vec<Value>> {
        let token = self.token(token)?;
        let accounts = into_list(self.transport.send(ApiRequest::get("", token)).await?);
        info!(count = accounts.len(), "Retrieved ad accounts");
        Ok(accounts)
    }

    pub async fn get_campaigns(
        &self,
        account_id: &str,
        query: &CampaignQuery,
        token: Option<&str>,
    ) -> Result<Vec<Value>> {
        let path = Self::campaigns_path(account_id)?;
        let query = query.to_query()?;
        let token = self.token(token)?;

        let request = ApiRequest::get(path, token).with_query(query);
        let campaigns = into_list(self.transport.send(request).await?);
        info!(account_id, count = campaigns.len(), "Retrieved campaigns");
        Ok(campaigns)
    }

    pub async fn get_campaign(
        &self,
        account_id: &str,
        campaign_id: &str,
        token: Option<&str>,
    ) -> Result<Value> {
        let path = Self::campaign_path(account_id, campaign_id)?;
        let token = self.token(token)?;
        let campaign = unwrap_data(self.transport.send(ApiRequest::get(path, token)).await?);
        debug!(account_id, campaign_id, "Retrieved campaign details");
        Ok(campaign)
    }

    pub async fn create_campaign(
        &self,
        account_id: &str,
        draft: &CampaignDraft,
        token: Option<&str>,
    ) -> Result<Value> {
        let path = Self::campaigns_path(account_id)?;
        draft.validate()?;
        let token = self.token(token)?;

        let body = serde_json::to_value(draft)
            .map_err(|e| AdsError::validation("campaign", e.to_string()))?;
        let created = unwrap_data(self.transport.send(ApiRequest::post(path, token, body)).await?);
        info!(account_id, name = %draft.name, "Created campaign");
        Ok(created)
    }

    pub async fn update_campaign(
        &self,
        account_id: &str,
        campaign_id: &str,
        update: &CampaignUpdate,
        token: Option<&str>,
    ) -> Result<Value> {
        let path = Self::campaign_path(account_id, campaign_id)?;
        update.validate()?;
        let token = self.token(token)?;

        let body = serde_json::to_value(update)
            .map_err(|e| AdsError::validation("updates", e.to_string()))?;
        let updated = unwrap_data(
            self.transport
                .send(ApiRequest::patch(path, token, body))
                .await?,
        );
        info!(account_id, campaign_id, "Updated campaign");
        Ok(updated)
    }

    pub async fn delete_campaign(
        &self,
        account_id: &str,
        campaign_id: &str,
        token: Option<&str>,
    ) -> Result<Value> {
        let path = Self::campaign_path(account_id, campaign_id)?;
        let token = self.token(token)?;
        let response = unwrap_data(self.transport.send(ApiRequest::delete(path, token)).await?);
        info!(account_id, campaign_id, "Deleted campaign");
        Ok(response)
    }

    pub async fn get_ad_groups(
        &self,
        account_id: &str,
        query: &AdGroupQuery,
        token: Option<&str>,
    ) -> Result<Vec<Value>> {
        let path = format!("/{}/ad_groups", path_segment("ad_account_id", account_id)?);
        let query = query.to_query()?;
        let token = self.token(token)?;

        let request = ApiRequest::get(path, token).with_query(query);
        let groups = into_list(self.transport.send(request).await?);
        info!(account_id, count = groups.len(), "Retrieved ad groups");
        Ok(groups)
    }

    pub async fn get_campaign_stats(
        &self,
        account_id: &str,
        query: &StatsQuery,
        token: Option<&str>,
    ) -> Result<Vec<Value>> {
        let path = format!(
            "/{}/reports/campaigns",
            path_segment("ad_account_id", account_id)?
        );
        let query = query.to_query()?;
        let token = self.token(token)?;

        let request = ApiRequest::get(path, token).with_query(query);
        let stats = into_list(self.transport.send(request).await?);
        info!(account_id, count = stats.len(), "Retrieved campaign stats");
        Ok(stats)
    }
}
