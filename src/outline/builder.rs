//! The outline building loop.
//!
//! The builder grows the event graph iteratively: check completeness, seed
//! candidate events, validate each candidate, fold accepted ones into the
//! graph and send the rest back for revision, until the completeness agent
//! is satisfied or the event budget is hit. The finished graph is then held
//! to the outline contract; a cyclic result is rejected wholesale and the
//! loop regenerates, bounded by [`OutlineConfig::max_outline_attempts`].

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, info, instrument, warn};

use super::{Completeness, Event, EventValidation, Outline, OutlineError};
use crate::client::{
    CompletionRequest, GenerationClient, RetryPolicy, agents, request_structured,
    request_structured_list,
};
use crate::prompts;

/// Knobs for the outline stage.
#[derive(Clone, Debug)]
pub struct OutlineConfig {
    /// Candidate events requested per seeding round.
    pub k_candidates: usize,
    /// Validation/revision rounds per batch of candidates.
    pub max_revise: u32,
    /// Hard ceiling on accepted events.
    pub max_events: usize,
    /// Whole-outline regeneration attempts when the graph is cyclic.
    pub max_outline_attempts: u32,
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            k_candidates: 3,
            max_revise: 2,
            max_events: 30,
            max_outline_attempts: 2,
        }
    }
}

/// Grows a premise into a validated causal event graph.
pub struct OutlineBuilder {
    client: Arc<dyn GenerationClient>,
    config: OutlineConfig,
    retry: RetryPolicy,
}

impl OutlineBuilder {
    pub fn new(client: Arc<dyn GenerationClient>, config: OutlineConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }

    /// Build and validate the outline, regenerating on cyclic or dangling
    /// results up to the configured bound.
    #[instrument(skip(self, premise))]
    pub async fn build_outline(&self, premise: &str) -> Result<Outline, OutlineError> {
        let mut last_rejection = None;
        for attempt in 1..=self.config.max_outline_attempts.max(1) {
            let outline = self.generate(premise).await?;
            match outline.validate() {
                Ok(()) => {
                    info!(events = outline.len(), attempt, "outline accepted");
                    return Ok(outline);
                }
                Err(
                    err @ (OutlineError::CycleDetected { .. }
                    | OutlineError::UnknownRelationTarget { .. }),
                ) => {
                    warn!(attempt, %err, "outline rejected, regenerating");
                    last_rejection = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_rejection.unwrap_or(OutlineError::Empty))
    }

    /// One full pass of the completeness/seed/validate/revise loop.
    async fn generate(&self, premise: &str) -> Result<Outline, OutlineError> {
        let mut outline = Outline::new();
        let max_total_iters = (self.config.max_events as u32) * self.config.max_revise.max(1) * 2;
        for gen_iter in 0..max_total_iters {
            if outline.len() >= self.config.max_events {
                info!(events = outline.len(), "event budget reached");
                break;
            }

            let completeness = self.check_completeness(premise, &outline).await?;
            if completeness.complete && !outline.is_empty() {
                info!(reason = %completeness.reason, "outline complete");
                break;
            }
            debug!(iter = gen_iter, reason = %completeness.reason, "outline incomplete");

            let mut candidates = self.seed_candidates(premise, &outline, &completeness).await?;
            if candidates.is_empty() {
                warn!("no event candidates generated, stopping");
                break;
            }

            for revise_iter in 0..self.config.max_revise.max(1) {
                let validations = self.validate_candidates(premise, &outline, &candidates).await?;
                let verdicts: FxHashMap<&str, &EventValidation> = validations
                    .iter()
                    .map(|v| (v.event_id.as_str(), v))
                    .collect();

                let mut rejected = Vec::new();
                let mut feedback = Vec::new();
                for candidate in candidates {
                    match verdicts.get(candidate.event_id.as_str()) {
                        Some(verdict) if verdict.valid => {
                            let id = outline.push_resolving_id(candidate);
                            debug!(event_id = %id, "event accepted");
                        }
                        Some(verdict) => {
                            feedback.push((*verdict).clone());
                            rejected.push(candidate);
                        }
                        None => {
                            warn!(event_id = %candidate.event_id, "candidate was not validated, dropping");
                        }
                    }
                }
                info!(
                    accepted = outline.len(),
                    rejected = rejected.len(),
                    revise_iter,
                    "validation round finished"
                );

                if rejected.is_empty() {
                    break;
                }
                candidates = self
                    .revise_candidates(premise, &outline, &rejected, &feedback)
                    .await?;
                if candidates.is_empty() {
                    break;
                }
            }
        }

        if outline.is_empty() {
            return Err(OutlineError::Empty);
        }
        Ok(outline)
    }

    async fn check_completeness(
        &self,
        premise: &str,
        outline: &Outline,
    ) -> Result<Completeness, OutlineError> {
        let request = CompletionRequest::new(
            agents::COMPLETENESS,
            prompts::COMPLETENESS_SYSTEM,
            prompts::completeness_user(premise, &graph_json(outline)),
        );
        Ok(request_structured(self.client.as_ref(), &request, &self.retry).await?)
    }

    async fn seed_candidates(
        &self,
        premise: &str,
        outline: &Outline,
        completeness: &Completeness,
    ) -> Result<Vec<Event>, OutlineError> {
        let request = CompletionRequest::new(
            agents::EVENT_SEED,
            prompts::EVENT_SEED_SYSTEM,
            prompts::event_seed_user(
                premise,
                &graph_json(outline),
                self.config.k_candidates,
                &completeness.reason,
                &completeness.missing_elements,
            ),
        );
        Ok(request_structured_list(self.client.as_ref(), &request, &self.retry).await?)
    }

    async fn validate_candidates(
        &self,
        premise: &str,
        outline: &Outline,
        candidates: &[Event],
    ) -> Result<Vec<EventValidation>, OutlineError> {
        let request = CompletionRequest::new(
            agents::EVENT_VALIDATOR,
            prompts::EVENT_VALIDATOR_SYSTEM,
            prompts::event_validator_user(premise, &graph_json(outline), &to_json(candidates)),
        );
        Ok(request_structured_list(self.client.as_ref(), &request, &self.retry).await?)
    }

    async fn revise_candidates(
        &self,
        premise: &str,
        outline: &Outline,
        rejected: &[Event],
        feedback: &[EventValidation],
    ) -> Result<Vec<Event>, OutlineError> {
        let request = CompletionRequest::new(
            agents::EVENT_REVISER,
            prompts::EVENT_REVISER_SYSTEM,
            prompts::event_reviser_user(
                premise,
                &graph_json(outline),
                &to_json(rejected),
                &to_json(feedback),
            ),
        );
        Ok(request_structured_list(self.client.as_ref(), &request, &self.retry).await?)
    }
}

fn graph_json(outline: &Outline) -> String {
    to_json(&outline.events)
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    // Prompt embedding only; a value that cannot serialize is a programming
    // error in the serde derives, not a runtime condition.
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}
