//! Remote generation jobs: submission, status, and bounded polling.
//!
//! A batch of requested items can run on the backend as an asynchronous job
//! instead of inline generation. The job's lifecycle is
//! `Queued → Running → {Completed | Failed}` — transitions are monotonic and
//! the client ignores observed regressions. The poller adds a client-side
//! pseudo-outcome, [`PollOutcome::TimedOut`], when its own wait budget runs
//! out first; the remote job's true eventual outcome is not awaited further.
//! Whatever such an orphaned job later persists is picked up by the next
//! gap-analysis pass reading actual store counts.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

use quizsmith_shared::{CoverageKey, QuizsmithError, Result};

/// User-Agent string for job API requests.
const USER_AGENT: &str = concat!("Quizsmith/", env!("CARGO_PKG_VERSION"));

/// Request timeout for one job API call.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Bounded retry for job submission.
const MAX_SUBMIT_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

// ---------------------------------------------------------------------------
// Job state
// ---------------------------------------------------------------------------

/// Backend-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the job has finished (successfully or not).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position in the monotonic lifecycle; never decreases for a real job.
    fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed => 2,
        }
    }
}

/// One observation of a job's state.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRecord {
    pub status: JobStatus,
    #[serde(default)]
    pub completed_count: u64,
    #[serde(default)]
    pub failed_count: u64,
}

/// Final outcome of polling one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The job reached `Completed` within the budget.
    Completed { completed: u64, failed: u64 },
    /// The job reached `Failed` within the budget.
    Failed { completed: u64, failed: u64 },
    /// The wait budget ran out first. A client-side judgment, not a state
    /// the job itself enters; every outstanding item counts as failed.
    TimedOut,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    skill_node: &'a str,
    difficulty: u8,
    question_type: &'a str,
    language: &'a str,
    requested_count: u32,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: JobId,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Configuration for [`JobClient`].
#[derive(Debug, Clone)]
pub struct JobClientConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Client for the backend's job submission and status endpoints.
pub struct JobClient {
    client: reqwest::Client,
    jobs_url: Url,
    api_key: String,
}

impl JobClient {
    pub fn new(config: JobClientConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            QuizsmithError::config(format!("invalid backend base URL '{}': {e}", config.base_url))
        })?;
        let jobs_url = base
            .join("v1/jobs")
            .map_err(|e| QuizsmithError::config(format!("backend URL: {e}")))?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| QuizsmithError::Backend(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            jobs_url,
            api_key: config.api_key,
        })
    }

    /// Submit one work item as a remote job, with bounded retry.
    #[instrument(skip_all, fields(key = %key, requested))]
    pub async fn submit(&self, key: &CoverageKey, requested: u32) -> Result<JobId> {
        let request = SubmitRequest {
            skill_node: &key.skill_node,
            difficulty: key.difficulty.value(),
            question_type: key.question_type.as_str(),
            language: &key.language,
            requested_count: requested,
        };

        let mut attempt = 1;
        loop {
            match self.submit_once(&request).await {
                Ok(job_id) => {
                    debug!(%job_id, "job submitted");
                    return Ok(job_id);
                }
                Err(e) if e.is_retryable() && attempt < MAX_SUBMIT_ATTEMPTS => {
                    let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1);
                    warn!(attempt, delay_ms = delay, error = %e, "job submission failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn submit_once(&self, request: &SubmitRequest<'_>) -> Result<JobId> {
        let response = self
            .client
            .post(self.jobs_url.clone())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| QuizsmithError::Backend(format!("{}: {e}", self.jobs_url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuizsmithError::Backend(format!(
                "{}: HTTP {status}",
                self.jobs_url
            )));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| QuizsmithError::Backend(format!("submit response: {e}")))?;
        Ok(body.job_id)
    }

    /// Fetch a job's current state.
    pub async fn status(&self, job_id: &JobId) -> Result<JobRecord> {
        let url = self
            .jobs_url
            .join(&format!("jobs/{}", job_id.0))
            .map_err(|e| QuizsmithError::Backend(format!("job URL: {e}")))?;

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| QuizsmithError::Backend(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuizsmithError::Backend(format!("{url}: HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| QuizsmithError::Backend(format!("status response: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Polling cadence and wall-clock budget for one job.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Sleep between status polls.
    pub interval: Duration,
    /// Budget before the client gives up and reports [`PollOutcome::TimedOut`].
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(180),
        }
    }
}

/// Poll a job until it reaches a terminal state or a budget runs out.
///
/// Transport errors are retried silently on the next interval; the job
/// timeout is the only bound on them. `deadline` is the scheduler's own
/// cutoff, checked before each poll iteration like any other unit of work.
#[instrument(skip_all, fields(job_id = %job_id))]
pub async fn poll_to_completion(
    client: &JobClient,
    job_id: &JobId,
    config: &PollConfig,
    deadline: Option<Instant>,
) -> PollOutcome {
    let started = Instant::now();
    let mut last_rank = 0u8;

    loop {
        if started.elapsed() >= config.timeout {
            warn!(waited_secs = started.elapsed().as_secs(), "job poll budget exhausted");
            return PollOutcome::TimedOut;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                warn!("scheduler deadline reached while polling");
                return PollOutcome::TimedOut;
            }
        }

        match client.status(job_id).await {
            Ok(record) => {
                let rank = record.status.rank();
                if rank < last_rank {
                    // A real job never moves backwards; distrust the reading.
                    warn!(?record.status, "job status regressed, ignoring");
                } else {
                    last_rank = rank;
                    match record.status {
                        JobStatus::Completed => {
                            return PollOutcome::Completed {
                                completed: record.completed_count,
                                failed: record.failed_count,
                            };
                        }
                        JobStatus::Failed => {
                            return PollOutcome::Failed {
                                completed: record.completed_count,
                                failed: record.failed_count,
                            };
                        }
                        JobStatus::Queued | JobStatus::Running => {
                            debug!(?record.status, "job still in flight");
                        }
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "status poll failed, will retry");
            }
        }

        tokio::time::sleep(config.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizsmith_shared::{Difficulty, QuestionType};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_key() -> CoverageKey {
        CoverageKey {
            skill_node: "algebra-linear-equations".into(),
            difficulty: Difficulty::clamp(3),
            question_type: QuestionType::MultipleChoice,
            language: "en".into(),
        }
    }

    fn client(base_url: &str) -> JobClient {
        JobClient::new(JobClientConfig {
            base_url: base_url.into(),
            api_key: "test-key".into(),
        })
        .unwrap()
    }

    fn fast_poll(timeout_ms: u64) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(10),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[test]
    fn status_lifecycle() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());

        assert!(JobStatus::Queued.rank() < JobStatus::Running.rank());
        assert!(JobStatus::Running.rank() < JobStatus::Failed.rank());
        assert_eq!(JobStatus::Completed.rank(), JobStatus::Failed.rank());
    }

    #[tokio::test]
    async fn submit_returns_job_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/jobs"))
            .and(body_partial_json(serde_json::json!({
                "skill_node": "algebra-linear-equations",
                "difficulty": 3,
                "question_type": "multiple_choice",
                "language": "en",
                "requested_count": 2,
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "job_id": "job-42" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let job_id = client(&server.uri())
            .submit(&sample_key(), 2)
            .await
            .expect("submit");
        assert_eq!(job_id, JobId("job-42".into()));
    }

    #[tokio::test]
    async fn submit_retries_transport_failures() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/jobs"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/jobs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "job_id": "job-43" })),
            )
            .mount(&server)
            .await;

        let job_id = client(&server.uri())
            .submit(&sample_key(), 1)
            .await
            .expect("succeeds on third attempt");
        assert_eq!(job_id.0, "job-43");
    }

    #[tokio::test]
    async fn completed_job_reports_counts() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/jobs/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "completed",
                "completed_count": 5,
                "failed_count": 0,
            })))
            .mount(&server)
            .await;

        let outcome = poll_to_completion(
            &client(&server.uri()),
            &JobId("job-1".into()),
            &fast_poll(1000),
            None,
        )
        .await;

        assert_eq!(
            outcome,
            PollOutcome::Completed {
                completed: 5,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn running_then_completed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/jobs/job-2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "running" })),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/jobs/job-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "completed",
                "completed_count": 3,
                "failed_count": 1,
            })))
            .mount(&server)
            .await;

        let outcome = poll_to_completion(
            &client(&server.uri()),
            &JobId("job-2".into()),
            &fast_poll(2000),
            None,
        )
        .await;

        assert_eq!(
            outcome,
            PollOutcome::Completed {
                completed: 3,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn never_terminal_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/jobs/job-3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "running" })),
            )
            .mount(&server)
            .await;

        let outcome = poll_to_completion(
            &client(&server.uri()),
            &JobId("job-3".into()),
            &fast_poll(80),
            None,
        )
        .await;

        assert_eq!(outcome, PollOutcome::TimedOut);
    }

    #[tokio::test]
    async fn transport_errors_are_retried_silently() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/jobs/job-4"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/jobs/job-4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "failed",
                "completed_count": 0,
                "failed_count": 2,
            })))
            .mount(&server)
            .await;

        let outcome = poll_to_completion(
            &client(&server.uri()),
            &JobId("job-4".into()),
            &fast_poll(2000),
            None,
        )
        .await;

        assert_eq!(
            outcome,
            PollOutcome::Failed {
                completed: 0,
                failed: 2
            }
        );
    }

    #[tokio::test]
    async fn external_deadline_cuts_polling_short() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/jobs/job-5"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "queued" })),
            )
            .mount(&server)
            .await;

        let deadline = Instant::now() + Duration::from_millis(50);
        let outcome = poll_to_completion(
            &client(&server.uri()),
            &JobId("job-5".into()),
            &fast_poll(60_000),
            Some(deadline),
        )
        .await;

        assert_eq!(outcome, PollOutcome::TimedOut);
    }
}
