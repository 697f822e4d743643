//! The generation capability consumed by every pipeline stage.
//!
//! The pipeline never talks to a vendor API directly. Stages build a
//! [`CompletionRequest`] and hand it to a [`GenerationClient`], an
//! object-safe async trait with exactly one method. Everything above the
//! trait is vendor-neutral: retry with backoff lives in
//! [`complete_with_retry`], and typed structured-output parsing (with
//! corrective re-prompts) lives in [`structured`].
//!
//! # Agent labels
//!
//! Each request carries a stable agent label naming the role that issued
//! it (`event_seed`, `weaver`, `writer`, ...). Labels drive log scoping and
//! let tests assert which stages ran without inspecting prompt text.

use std::time::Duration;

use async_trait::async_trait;
use miette::Diagnostic;
use rand::Rng;
use thiserror::Error;
use tracing::warn;

pub mod openai;
pub mod structured;

pub use openai::OpenAiCompatClient;
pub use structured::{request_structured, request_structured_list};

/// Stable agent labels used across the pipeline.
pub mod agents {
    pub const EVENT_SEED: &str = "event_seed";
    pub const EVENT_VALIDATOR: &str = "event_validator";
    pub const EVENT_REVISER: &str = "event_reviser";
    pub const COMPLETENESS: &str = "completeness";
    pub const SUBTASKER: &str = "subtasker";
    pub const WEAVER: &str = "weaver";
    pub const WRITER: &str = "writer";
    pub const REVISER: &str = "reviser";
}

/// A structured prompt for one generation call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Stable label of the requesting agent role (see [`agents`]).
    pub agent: String,
    /// System instructions framing the role.
    pub system: String,
    /// Task-specific user content.
    pub user: String,
}

impl CompletionRequest {
    pub fn new(agent: &str, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            agent: agent.to_string(),
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Object-safe request/response interface to a text-generation capability.
///
/// Implementations must be cheap to share (`Arc<dyn GenerationClient>`) and
/// must not retain per-call state; retries may re-send an identical request.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Run one completion and return the raw text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

/// Bounded retry configuration for generation calls.
///
/// `max_attempts` bounds transport/API retries (exponential backoff with
/// jitter); `max_schema_retries` bounds corrective re-prompts when a
/// structured reply fails to parse. Both exhaustions are fatal for the
/// current unit only.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_schema_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            max_schema_retries: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (attempt 1 = first retry).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        // Up to 25% jitter keeps concurrent decompositions from thundering.
        let jitter = rand::rng().random_range(0.0..=0.25);
        capped.mul_f64(1.0 + jitter)
    }
}

/// Run a completion with bounded retries and exponential backoff.
///
/// Transport and API failures (including timeouts) are retried; an empty
/// completion counts as a failure. After `max_attempts` the last failure is
/// wrapped in [`GenerationError::Exhausted`].
pub async fn complete_with_retry(
    client: &dyn GenerationClient,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<String, GenerationError> {
    let mut last: Option<GenerationError> = None;
    for attempt in 0..policy.max_attempts.max(1) {
        if attempt > 0 {
            tokio::time::sleep(policy.delay_for(attempt)).await;
        }
        match client.complete(request).await {
            Ok(text) if !text.trim().is_empty() => return Ok(text),
            Ok(_) => {
                warn!(agent = %request.agent, attempt, "empty completion");
                last = Some(GenerationError::EmptyCompletion {
                    agent: request.agent.clone(),
                });
            }
            Err(err) => {
                warn!(agent = %request.agent, attempt, %err, "generation call failed");
                last = Some(err);
            }
        }
    }
    Err(GenerationError::Exhausted {
        agent: request.agent.clone(),
        attempts: policy.max_attempts.max(1),
        source: Box::new(last.unwrap_or(GenerationError::EmptyCompletion {
            agent: request.agent.clone(),
        })),
    })
}

/// Errors surfaced by the generation capability.
///
/// `Transport`, `Api` and `EmptyCompletion` are the retryable generation
/// failures; `Schema` is a structured reply that never matched its expected
/// shape; `Exhausted` wraps the last failure after retries ran out.
#[derive(Debug, Error, Diagnostic)]
pub enum GenerationError {
    /// Network-level failure reaching the capability.
    #[error("transport failure calling {agent}: {message}")]
    #[diagnostic(
        code(storyloom::client::transport),
        help("Check connectivity and the configured base URL.")
    )]
    Transport { agent: String, message: String },

    /// The capability returned a non-success status.
    #[error("API error for {agent} (status {status}): {message}")]
    #[diagnostic(code(storyloom::client::api))]
    Api {
        agent: String,
        status: u16,
        message: String,
    },

    /// The capability returned an empty completion.
    #[error("empty completion from {agent}")]
    #[diagnostic(code(storyloom::client::empty))]
    EmptyCompletion { agent: String },

    /// A structured reply did not match the expected shape, even after
    /// corrective re-prompts.
    #[error("structured output from {agent} did not match the expected shape: {detail}")]
    #[diagnostic(
        code(storyloom::client::schema),
        help("The model reply lacked a parseable JSON payload of the expected shape.")
    )]
    Schema { agent: String, detail: String },

    /// Retries for a single call were exhausted.
    #[error("generation failed for {agent} after {attempts} attempts")]
    #[diagnostic(
        code(storyloom::client::exhausted),
        help("Retry later or raise RetryPolicy::max_attempts.")
    )]
    Exhausted {
        agent: String,
        attempts: u32,
        #[source]
        source: Box<GenerationError>,
    },

    /// No API key available when constructing a concrete client.
    #[error("API key not configured")]
    #[diagnostic(
        code(storyloom::client::no_api_key),
        help("Set STORYLOOM_API_KEY (or pass a key explicitly).")
    )]
    NoApiKey,
}
