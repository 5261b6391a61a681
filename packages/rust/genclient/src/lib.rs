//! HTTP client for the external text-generation backend.
//!
//! One request per work item: a rendered prompt, an output-length budget,
//! and a temperature chosen by task — low/deterministic for calibration
//! scoring, higher for open-ended generation so repeated fills of the same
//! bucket stay varied. Transport failures retry with bounded backoff;
//! a response with no parseable object fails the item without retry.

pub mod extract;
pub mod prompts;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use quizsmith_shared::{ContentCandidate, CoverageKey, Difficulty, QuizsmithError, Result};

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("Quizsmith/", env!("CARGO_PKG_VERSION"));

/// Request timeout for one generation call.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Bounded retry for transport-level failures.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Request body for the backend's `/v1/generate` endpoint.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

/// Response body: free text expected to embed one JSON object.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Configuration for [`GenerationClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the generation service.
    pub base_url: String,
    /// Bearer credential.
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model_id: String,
    /// Output-length budget per request, in tokens.
    pub max_output_tokens: u32,
    /// Temperature for open-ended content generation.
    pub generation_temperature: f32,
    /// Temperature for calibration-style scoring.
    pub calibration_temperature: f32,
}

/// Client for the generation backend.
#[derive(Debug)]
pub struct GenerationClient {
    client: reqwest::Client,
    generate_url: Url,
    api_key: String,
    model_id: String,
    max_output_tokens: u32,
    generation_temperature: f32,
    calibration_temperature: f32,
}

impl GenerationClient {
    /// Build a client. Fails on an unparseable base URL.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            QuizsmithError::config(format!("invalid backend base URL '{}': {e}", config.base_url))
        })?;
        let generate_url = base
            .join("v1/generate")
            .map_err(|e| QuizsmithError::config(format!("backend URL: {e}")))?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| QuizsmithError::Backend(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            generate_url,
            api_key: config.api_key,
            model_id: config.model_id,
            max_output_tokens: config.max_output_tokens,
            generation_temperature: config.generation_temperature,
            calibration_temperature: config.calibration_temperature,
        })
    }

    /// Model identifier this client generates with.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Generate one candidate for a coverage bucket.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn generate_candidate(
        &self,
        key: &CoverageKey,
        skill_title: &str,
    ) -> Result<ContentCandidate> {
        let prompt = prompts::render_generation_prompt(key, skill_title);
        let text = self.complete(&prompt, self.generation_temperature).await?;
        let value = extract::extract_json_object(&text)?;
        ContentCandidate::from_value(key.question_type, &value)
    }

    /// Score an existing question's difficulty with the deterministic
    /// calibration temperature.
    #[instrument(skip_all)]
    pub async fn score_difficulty(&self, question_text: &str) -> Result<Difficulty> {
        let prompt = prompts::render_calibration_prompt(question_text);
        let text = self.complete(&prompt, self.calibration_temperature).await?;
        let value = extract::extract_json_object(&text)?;

        let raw = value
            .get("difficulty")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| {
                QuizsmithError::malformed("calibration response missing numeric 'difficulty'")
            })?;
        Ok(Difficulty::clamp(raw))
    }

    /// One completion round-trip, retrying transport failures with backoff.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self.complete_once(prompt, temperature).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1);
                    warn!(attempt, delay_ms = delay, error = %e, "backend call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn complete_once(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model_id,
            prompt,
            max_tokens: self.max_output_tokens,
            temperature,
        };

        let response = self
            .client
            .post(self.generate_url.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| QuizsmithError::Backend(format!("{}: {e}", self.generate_url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuizsmithError::Backend(format!(
                "{}: HTTP {status}",
                self.generate_url
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| QuizsmithError::Backend(format!("response body: {e}")))?;

        debug!(chars = body.text.len(), "generation response received");
        Ok(body.text)
    }
}
