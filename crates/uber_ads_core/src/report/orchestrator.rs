use std::sync::Arc;

use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::{JobOutcome, JobStatus, PollPolicy, ReportJob, ReportRequest, ReportResult, ReportRun};
use crate::client::unwrap_data;
use crate::credential::{self, BearerToken};
use crate::error::{AdsError, Result};
use crate::transport::{AdsTransport, ApiRequest, path_segment};

/// Drives report jobs from submission to a downloaded file.
///
/// Holds no per-job state, so one orchestrator can serve any number of
/// concurrent runs.
#[derive(Clone)]
pub struct ReportOrchestrator {
    transport: Arc<dyn AdsTransport>,
    default_token: Option<BearerToken>,
    policy: PollPolicy,
}

impl ReportOrchestrator {
    pub fn new(
        transport: Arc<dyn AdsTransport>,
        default_token: Option<BearerToken>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            transport,
            default_token,
            policy,
        }
    }

    fn token(&self, per_call: Option<&str>) -> Result<BearerToken> {
        credential::resolve(per_call, self.default_token.as_ref())
    }

    /// Submit a report request and return the identifier the API assigned
    pub async fn submit(&self, request: &ReportRequest, token: Option<&str>) -> Result<String> {
        request.validate()?;
        let token = self.token(token)?;
        self.submit_with(request, token).await
    }

    async fn submit_with(&self, request: &ReportRequest, token: BearerToken) -> Result<String> {
        let account_id = path_segment("ad_account_id", &request.account_id)?;
        let body = serde_json::to_value(request)
            .map_err(|e| AdsError::validation("report", e.to_string()))?;

        let response = unwrap_data(
            self.transport
                .send(ApiRequest::post(
                    format!("/{account_id}/reporting/report"),
                    token,
                    body,
                ))
                .await?,
        );

        let report_id = match response.get("report_id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(AdsError::Submission {
                    account_id: account_id.to_string(),
                    response,
                });
            }
        };

        info!(
            account_id,
            report_id = %report_id,
            report_type = ?request.report_type,
            "Submitted report job"
        );
        Ok(report_id)
    }

    /// Read the current state of a report job once, without waiting
    pub async fn check_status(
        &self,
        account_id: &str,
        report_id: &str,
        token: Option<&str>,
    ) -> Result<ReportJob> {
        let token = self.token(token)?;
        self.poll_once(account_id, report_id, token).await
    }

    async fn poll_once(
        &self,
        account_id: &str,
        report_id: &str,
        token: BearerToken,
    ) -> Result<ReportJob> {
        let path = format!(
            "/{}/reporting/{}",
            path_segment("ad_account_id", account_id)?,
            path_segment("report_id", report_id)?
        );
        let body = unwrap_data(self.transport.send(ApiRequest::get(&path, token)).await?);
        ReportJob::from_status_body(report_id, body).map_err(|cause| AdsError::Decode {
            url: path,
            cause,
        })
    }

    /// Poll a submitted job until it settles or the polling budget runs out
    pub async fn await_completion(
        &self,
        account_id: &str,
        report_id: &str,
        token: Option<&str>,
    ) -> Result<JobOutcome> {
        let token = self.token(token)?;
        let (outcome, _) = self.poll_until_settled(account_id, report_id, &token).await?;
        Ok(outcome)
    }

    async fn poll_until_settled(
        &self,
        account_id: &str,
        report_id: &str,
        token: &BearerToken,
    ) -> Result<(JobOutcome, u32)> {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts;
        let mut attempts = 0;
        let mut last_status = JobStatus::Pending;
        let mut last_transport_error = None;

        while attempts < max_attempts {
            attempts += 1;

            match self.poll_once(account_id, report_id, token.clone()).await {
                Ok(job) => {
                    last_transport_error = None;
                    debug!(report_id, attempt = attempts, status = %job.status, "Polled report status");
                    if let Some(outcome) = job.terminal_outcome() {
                        info!(report_id, attempts, outcome = %outcome.summary(), "Report job settled");
                        return Ok((outcome, attempts));
                    }
                    last_status = job.status;
                }
                Err(error @ AdsError::Transport { .. }) => {
                    warn!(
                        report_id,
                        attempt = attempts,
                        max_attempts,
                        error = %error,
                        "Report status poll failed, will retry"
                    );
                    last_transport_error = Some(error);
                }
                Err(error) => return Err(error),
            }

            if attempts >= max_attempts {
                break;
            }
            let delay = self.policy.delay_after(attempts);
            if started.elapsed() + delay > self.policy.max_wait {
                debug!(report_id, attempts, "Polling deadline reached");
                break;
            }
            sleep(delay).await;
        }

        if let Some(error) = last_transport_error {
            return Err(error);
        }

        let waited_secs = started.elapsed().as_secs();
        warn!(report_id, attempts, waited_secs, status = %last_status, "Report job did not settle in time");
        Ok((
            JobOutcome::TimedOut {
                attempts,
                waited_secs,
                last_status,
            },
            attempts,
        ))
    }

    /// Download a finished report. Failures are reported in the result,
    /// never as an error.
    pub async fn fetch(&self, location: &str) -> ReportResult {
        let location = location.trim();
        match url::Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return ReportResult::failed(
                    format!("Failed to download report: '{location}' is not an http(s) URL"),
                    None,
                );
            }
        }

        match self.transport.download(location).await {
            Ok(data) => {
                info!(bytes = data.len(), "Downloaded report file");
                ReportResult::downloaded(data)
            }
            Err(error) => {
                warn!(error = %error, "Report download failed");
                ReportResult::from_error(&error)
            }
        }
    }

    /// Submit, wait for, and download a report
    pub async fn run(&self, request: &ReportRequest, token: Option<&str>) -> Result<ReportRun> {
        request.validate()?;
        let token = self.token(token)?;

        let report_id = self.submit_with(request, token.clone()).await?;
        let (outcome, poll_attempts) = self
            .poll_until_settled(&request.account_id, &report_id, &token)
            .await?;

        let download = match &outcome {
            JobOutcome::Completed(report) => Some(self.fetch(&report.report_url).await),
            _ => None,
        };

        Ok(ReportRun {
            report_id,
            outcome,
            poll_attempts,
            download,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CompletedReport, FailureReason, ReportType, TimeUnit};
    use crate::transport::{HttpMethod, MockAdsTransport};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    const REPORT_URL: &str = "https://files.example.com/r-42.csv?sig=abc";

    fn request() -> ReportRequest {
        ReportRequest {
            account_id: "acct-1".to_string(),
            report_type: ReportType::CampaignPerformance,
            start_time: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap(),
            columns: vec!["impressions".to_string(), "clicks".to_string()],
            time_unit: TimeUnit::Daily,
        }
    }

    fn orchestrator(transport: MockAdsTransport) -> ReportOrchestrator {
        ReportOrchestrator::new(
            Arc::new(transport),
            Some(BearerToken::new("default-token").unwrap()),
            PollPolicy::default(),
        )
    }

    fn status(value: &str) -> Result<Value> {
        Ok(json!({"status": value}))
    }

    fn completed() -> Result<Value> {
        Ok(json!({
            "status": "COMPLETED",
            "result": {"success_result": {
                "report_url": REPORT_URL,
                "file_size": 18,
            }}
        }))
    }

    fn timeout_error() -> AdsError {
        AdsError::transport(
            HttpMethod::Get,
            "https://api.uber.com/v1/ads/acct-1/reporting/r-42",
            std::io::Error::new(std::io::ErrorKind::TimedOut, "operation timed out"),
        )
    }

    /// Expect status polls for r-42, answered in order from `responses`
    fn expect_polls(transport: &mut MockAdsTransport, responses: Vec<Result<Value>>) {
        let calls = responses.len();
        let queue = Mutex::new(VecDeque::from(responses));
        transport
            .expect_send()
            .withf(|request| {
                request.method == HttpMethod::Get && request.path == "/acct-1/reporting/r-42"
            })
            .times(calls)
            .returning(move |_| {
                queue
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| status("PROCESSING"))
            });
    }

    fn expect_submit(transport: &mut MockAdsTransport) {
        transport
            .expect_send()
            .withf(|request| {
                request.method == HttpMethod::Post && request.path == "/acct-1/reporting/report"
            })
            .times(1)
            .returning(|_| Ok(json!({"report_id": "r-42"})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_processing_completed_takes_three_polls() {
        let mut transport = MockAdsTransport::new();
        expect_polls(
            &mut transport,
            vec![status("PENDING"), status("PROCESSING"), completed()],
        );

        let started = Instant::now();
        let outcome = orchestrator(transport)
            .await_completion("acct-1", "r-42", None)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Completed(CompletedReport {
                report_url: REPORT_URL.to_string(),
                report_schema: None,
                file_size: Some(18),
                url_expires_at: None,
            })
        );
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stops_after_one_poll() {
        let mut transport = MockAdsTransport::new();
        expect_polls(&mut transport, vec![status("FAILED")]);

        let started = Instant::now();
        let outcome = orchestrator(transport)
            .await_completion("acct-1", "r-42", None)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Failed {
                reason: FailureReason::Reported { details: None }
            }
        );
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_settling_times_out_after_sixty_polls() {
        let mut transport = MockAdsTransport::new();
        expect_polls(
            &mut transport,
            (0..60).map(|_| status("PROCESSING")).collect(),
        );

        let started = Instant::now();
        let outcome = orchestrator(transport)
            .await_completion("acct-1", "r-42", None)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            JobOutcome::TimedOut {
                attempts: 60,
                waited_secs: 295,
                last_status: JobStatus::Processing,
            }
        );
        // 59 gaps of 5s between 60 polls, no sleep after the last one
        assert_eq!(started.elapsed(), Duration::from_secs(295));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_fails_verbatim_after_one_poll() {
        let mut transport = MockAdsTransport::new();
        expect_polls(&mut transport, vec![status("WEIRD")]);

        let outcome = orchestrator(transport)
            .await_completion("acct-1", "r-42", None)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Failed {
                reason: FailureReason::UnknownStatus {
                    status: "WEIRD".to_string()
                }
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_without_location_is_not_a_failure() {
        let mut transport = MockAdsTransport::new();
        expect_polls(
            &mut transport,
            vec![Ok(json!({"status": "COMPLETED", "result": {"success_result": {}}}))],
        );

        let outcome = orchestrator(transport)
            .await_completion("acct-1", "r-42", None)
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::CompletedWithoutResult { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_transport_errors_consume_attempts() {
        let mut transport = MockAdsTransport::new();
        expect_polls(
            &mut transport,
            vec![Err(timeout_error()), status("PROCESSING"), completed()],
        );

        let outcome = orchestrator(transport)
            .await_completion("acct-1", "r-42", None)
            .await
            .unwrap();
        assert!(outcome.is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_by_transport_errors_surfaces_error() {
        let mut transport = MockAdsTransport::new();
        expect_polls(&mut transport, (0..60).map(|_| Err(timeout_error())).collect());

        let result = orchestrator(transport)
            .await_completion("acct-1", "r-42", None)
            .await;
        assert!(matches!(result, Err(AdsError::Transport { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_while_polling_is_not_retried() {
        let mut transport = MockAdsTransport::new();
        expect_polls(
            &mut transport,
            vec![Err(AdsError::remote(
                401,
                HttpMethod::Get,
                "u",
                r#"{"error":{"message":"token expired"}}"#.to_string(),
            ))],
        );

        let result = orchestrator(transport)
            .await_completion("acct-1", "r-42", None)
            .await;
        assert!(matches!(result, Err(AdsError::Remote { status: 401, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_ceiling_bounds_backoff() {
        let mut transport = MockAdsTransport::new();
        // 5 + 10 + 20 + 30 * 8 = 275s of delays fit before the 300s ceiling
        expect_polls(&mut transport, (0..12).map(|_| status("PENDING")).collect());

        let policy = PollPolicy {
            backoff_factor: 2.0,
            ..PollPolicy::default()
        };
        let orchestrator = ReportOrchestrator::new(
            Arc::new(transport),
            Some(BearerToken::new("t").unwrap()),
            policy,
        );

        let outcome = orchestrator
            .await_completion("acct-1", "r-42", None)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            JobOutcome::TimedOut {
                attempts: 12,
                waited_secs: 275,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_columns_before_any_call() {
        let transport = MockAdsTransport::new();
        let mut empty = request();
        empty.columns.clear();

        let result = orchestrator(transport).submit(&empty, None).await;
        assert!(matches!(
            result,
            Err(AdsError::Validation { field, .. }) if field == "columns"
        ));
    }

    #[tokio::test]
    async fn test_submit_without_report_id_is_submission_error() {
        let mut transport = MockAdsTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(json!({"data": {"status": "ACCEPTED"}})));

        let result = orchestrator(transport).submit(&request(), None).await;
        match result {
            Err(AdsError::Submission {
                account_id,
                response,
            }) => {
                assert_eq!(account_id, "acct-1");
                assert_eq!(response, json!({"status": "ACCEPTED"}));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_posts_request_body() {
        let mut transport = MockAdsTransport::new();
        transport
            .expect_send()
            .withf(|request| {
                request.path == "/acct-1/reporting/report"
                    && request.token.expose() == "caller"
                    && request
                        .body
                        .as_ref()
                        .is_some_and(|b| b["columns"] == json!(["impressions", "clicks"]))
            })
            .times(1)
            .returning(|_| Ok(json!({"data": {"report_id": "r-42"}})));

        let report_id = orchestrator(transport)
            .submit(&request(), Some("caller"))
            .await
            .unwrap();
        assert_eq!(report_id, "r-42");
    }

    #[tokio::test]
    async fn test_submit_transport_error_is_not_retried() {
        let mut transport = MockAdsTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(timeout_error()));

        let result = orchestrator(transport).submit(&request(), None).await;
        assert!(matches!(result, Err(AdsError::Transport { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_downloads_completed_report() {
        let mut transport = MockAdsTransport::new();
        expect_submit(&mut transport);
        expect_polls(&mut transport, vec![status("PROCESSING"), completed()]);
        transport
            .expect_download()
            .withf(|url| url == REPORT_URL)
            .times(1)
            .returning(|_| Ok("date,impressions\n2024-03-01,10\n".to_string()));

        let run = orchestrator(transport).run(&request(), None).await.unwrap();

        assert_eq!(run.report_id, "r-42");
        assert_eq!(run.poll_attempts, 2);
        assert!(run.outcome.is_completed());
        let download = run.download.unwrap();
        assert!(download.success);
        assert_eq!(
            download.data.as_deref(),
            Some("date,impressions\n2024-03-01,10\n")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_completion_when_download_forbidden() {
        let mut transport = MockAdsTransport::new();
        expect_submit(&mut transport);
        expect_polls(&mut transport, vec![completed()]);
        transport.expect_download().times(1).returning(|url| {
            Err(AdsError::remote(
                403,
                HttpMethod::Get,
                url,
                "<Error><Code>AccessDenied</Code></Error>".to_string(),
            ))
        });

        let run = orchestrator(transport).run(&request(), None).await.unwrap();

        assert!(run.outcome.is_completed());
        let download = run.download.unwrap();
        assert!(!download.success);
        assert_eq!(download.status_code, Some(403));
        assert!(download.error.unwrap().contains("HTTP 403"));

        let value = serde_json::to_value(ReportRun {
            report_id: "r-42".to_string(),
            outcome: run.outcome,
            poll_attempts: run.poll_attempts,
            download: None,
        })
        .unwrap();
        assert_eq!(value["status"], "COMPLETED");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_skips_download_when_job_failed() {
        let mut transport = MockAdsTransport::new();
        expect_submit(&mut transport);
        expect_polls(&mut transport, vec![status("FAILED")]);
        transport.expect_download().times(0);

        let run = orchestrator(transport).run(&request(), None).await.unwrap();
        assert!(matches!(run.outcome, JobOutcome::Failed { .. }));
        assert!(run.download.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_skips_download_when_completed_without_location() {
        let mut transport = MockAdsTransport::new();
        expect_submit(&mut transport);
        expect_polls(
            &mut transport,
            vec![Ok(json!({"status": "COMPLETED", "result": {"success_result": {"report_url": ""}}}))],
        );
        transport.expect_download().times(0);

        let run = orchestrator(transport).run(&request(), None).await.unwrap();
        assert!(matches!(
            run.outcome,
            JobOutcome::CompletedWithoutResult { .. }
        ));
        assert_eq!(run.poll_attempts, 1);
        assert!(run.download.is_none());
    }

    #[tokio::test]
    async fn test_fetch_transport_error_has_no_status_code() {
        let mut transport = MockAdsTransport::new();
        transport.expect_download().times(1).returning(|url| {
            Err(AdsError::transport(
                HttpMethod::Get,
                url,
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
            ))
        });

        let result = orchestrator(transport).fetch(REPORT_URL).await;
        assert!(!result.success);
        assert_eq!(result.status_code, None);
        assert!(result.data.is_none());
        assert!(
            result
                .error
                .unwrap()
                .starts_with("Failed to download report: GET")
        );
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http_location() {
        let transport = MockAdsTransport::new();
        let result = orchestrator(transport).fetch("file:///etc/passwd").await;
        assert!(!result.success);
        assert_eq!(result.status_code, None);
    }

    #[tokio::test]
    async fn test_check_status_returns_snapshot() {
        let mut transport = MockAdsTransport::new();
        expect_polls(&mut transport, vec![status("PROCESSING")]);

        let job = orchestrator(transport)
            .check_status("acct-1", "r-42", None)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.terminal_outcome(), None);
    }
}
