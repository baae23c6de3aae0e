//! Uber Ads Core - Ads API client and report job orchestration
//!
//! This crate wraps the Uber Ads REST API: pass-through calls for accounts,
//! campaigns, ad groups and stats, plus the asynchronous report workflow
//! (submit, poll until settled, download).

pub mod campaign;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod report;
pub mod transport;

pub use campaign::{
    AdGroupQuery, BudgetType, CampaignDraft, CampaignQuery, CampaignStatus, CampaignUpdate,
    Metric, SortField, SortOrder, StatsQuery, StatusFilter,
};
pub use client::AdsClient;
pub use config::{AdsConfig, ReportPollConfig, load_config};
pub use credential::BearerToken;
pub use error::{AdsError, Result};
pub use report::{
    CompletedReport, FailureReason, JobOutcome, JobStatus, PollPolicy, ReportJob,
    ReportOrchestrator, ReportRequest, ReportResult, ReportRun, ReportType, TimeUnit,
};
pub use transport::{AdsTransport, ApiRequest, HttpMethod, HttpTransport};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        AdsClient, AdsConfig, AdsError, AdsTransport, BearerToken, HttpTransport, JobOutcome,
        PollPolicy, ReportOrchestrator, ReportRequest, ReportRun, Result,
    };
}
