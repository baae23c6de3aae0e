//! Asynchronous report jobs
//!
//! A report is requested from the Ads API, polled until the job settles, and
//! its file is then downloaded from the pre-signed location the API hands
//! back. Expected end states (completed, failed, timed out, unrecognized
//! status) are values of [`JobOutcome`]; only malformed input and
//! transport/remote failures surface as [`AdsError`](crate::AdsError).

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{AdsError, Result};

pub mod orchestrator;
pub mod poll;

pub use orchestrator::ReportOrchestrator;
pub use poll::PollPolicy;

/// Kind of performance report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    CampaignPerformance,
    AdGroupPerformance,
    AdPerformance,
}

/// Time aggregation for report rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Summary,
}

/// A report to generate for one ad account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRequest {
    #[serde(skip)]
    pub account_id: String,
    pub report_type: ReportType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub columns: Vec<String>,
    pub time_unit: TimeUnit,
}

impl ReportRequest {
    pub fn validate(&self) -> Result<()> {
        crate::transport::path_segment("ad_account_id", &self.account_id)?;
        if self.start_time >= self.end_time {
            return Err(AdsError::validation(
                "start_time",
                "must be earlier than end_time",
            ));
        }
        if self.columns.is_empty() {
            return Err(AdsError::validation("columns", "must not be empty"));
        }
        if let Some(position) = self.columns.iter().position(|c| c.trim().is_empty()) {
            return Err(AdsError::validation(
                "columns",
                format!("entry {position} is blank"),
            ));
        }
        Ok(())
    }
}

/// Status reported by the Ads API for a report job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Any value outside the known set, kept verbatim
    Unknown(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PENDING" => Self::Pending,
            "PROCESSING" => Self::Processing,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether polling should continue
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(raw) => Self::parse(&raw),
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// Accepts `url_expires_at` as either a timestamp string or epoch seconds
fn lenient_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts `file_size` as either a JSON number or a numeric string
fn lenient_size<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SuccessResult {
    #[serde(default)]
    report_url: Option<String>,
    #[serde(default)]
    report_schema: Option<Value>,
    #[serde(default, deserialize_with = "lenient_size")]
    file_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_text")]
    url_expires_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ResultEnvelope {
    #[serde(default)]
    success_result: Option<SuccessResult>,
    #[serde(default)]
    failure_result: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct StatusBody {
    status: JobStatus,
    #[serde(default)]
    result: Option<ResultEnvelope>,
}

/// Snapshot of a report job as of the latest poll
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportJob {
    pub report_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Value>,
}

impl ReportJob {
    /// Decode a status response (already stripped of any `data` envelope)
    pub fn from_status_body(
        report_id: impl Into<String>,
        body: Value,
    ) -> std::result::Result<Self, serde_json::Error> {
        let body: StatusBody = serde_json::from_value(body)?;
        let result = body.result.unwrap_or_default();
        let success = result.success_result.unwrap_or_default();

        Ok(Self {
            report_id: report_id.into(),
            status: body.status,
            report_url: success.report_url,
            report_schema: success.report_schema,
            file_size: success.file_size,
            url_expires_at: success.url_expires_at,
            failure: result.failure_result,
        })
    }

    /// The outcome this snapshot settles on, or `None` while still running
    pub fn terminal_outcome(&self) -> Option<JobOutcome> {
        if self.status.is_in_progress() {
            return None;
        }
        match &self.status {
            JobStatus::Pending | JobStatus::Processing => None,
            JobStatus::Completed => Some(match self.usable_location() {
                Some(url) => JobOutcome::Completed(CompletedReport {
                    report_url: url.to_string(),
                    report_schema: self.report_schema.clone(),
                    file_size: self.file_size,
                    url_expires_at: self.url_expires_at.clone(),
                }),
                None => JobOutcome::CompletedWithoutResult {
                    message: "report completed but no download location was returned"
                        .to_string(),
                },
            }),
            JobStatus::Failed => Some(JobOutcome::Failed {
                reason: FailureReason::Reported {
                    details: self.failure.clone(),
                },
            }),
            JobStatus::Unknown(raw) => Some(JobOutcome::Failed {
                reason: FailureReason::UnknownStatus {
                    status: raw.clone(),
                },
            }),
        }
    }

    fn usable_location(&self) -> Option<&str> {
        self.report_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Location and metadata of a finished report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedReport {
    pub report_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_expires_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The Ads API reported FAILED
    Reported {
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    /// The Ads API reported a status outside the known set
    UnknownStatus { status: String },
}

/// Terminal state of a report job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobOutcome {
    Completed(CompletedReport),
    CompletedWithoutResult {
        message: String,
    },
    Failed {
        reason: FailureReason,
    },
    TimedOut {
        attempts: u32,
        waited_secs: u64,
        last_status: JobStatus,
    },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        match self {
            Self::Completed(report) => format!("completed; file at {}", report.report_url),
            Self::CompletedWithoutResult { message } => message.clone(),
            Self::Failed {
                reason: FailureReason::Reported { .. },
            } => "report generation failed".to_string(),
            Self::Failed {
                reason: FailureReason::UnknownStatus { status },
            } => format!("report entered unrecognized status '{status}'"),
            Self::TimedOut {
                attempts,
                waited_secs,
                last_status,
            } => format!(
                "report still {last_status} after {attempts} polls over {waited_secs}s"
            ),
        }
    }
}

/// Result of downloading a finished report file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ReportResult {
    pub fn downloaded(data: String) -> Self {
        Self {
            success: true,
            bytes: Some(data.len()),
            data: Some(data),
            error: None,
            status_code: None,
        }
    }

    pub fn failed(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            success: false,
            data: None,
            bytes: None,
            error: Some(message.into()),
            status_code,
        }
    }

    pub fn from_error(error: &AdsError) -> Self {
        match error {
            AdsError::Remote {
                status, message, ..
            } => Self::failed(
                format!("Failed to download report: HTTP {status}: {message}"),
                Some(*status),
            ),
            other => Self::failed(format!("Failed to download report: {other}"), None),
        }
    }
}

/// Everything observed while generating one report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRun {
    pub report_id: String,
    #[serde(flatten)]
    pub outcome: JobOutcome,
    pub poll_attempts: u32,
    /// Present only when the job completed with a download location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<ReportResult>,
}
