//! Event decomposition: one event into an ordered list of sub-events.
//!
//! Independent events decompose concurrently; nothing is shared between
//! calls because sub-event ids are reassigned deterministically from the
//! parent id (`{event_id}_S{index}`), so the namespace is collision-free
//! without coordination. Causal ranks are assigned afterwards in a single
//! pass over the parent events' topological order.

use std::sync::Arc;

use futures_util::future::try_join_all;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{PlanError, SubEvent};
use crate::client::{
    CompletionRequest, GenerationClient, RetryPolicy, agents, request_structured_list,
};
use crate::outline::{Event, Outline};
use crate::prompts;

/// Shape the subtasker agent replies with; ids and ranks are ours to assign.
#[derive(Debug, Deserialize)]
struct RawSubEvent {
    #[serde(default)]
    title: String,
    summary: String,
}

/// Decomposes every outline event into sub-events.
pub struct EventDecomposer {
    client: Arc<dyn GenerationClient>,
    retry: RetryPolicy,
}

impl EventDecomposer {
    pub fn new(client: Arc<dyn GenerationClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Decompose all events concurrently and return the sub-events with
    /// causal ranks assigned: parent events in topological order, then
    /// intra-event index.
    #[instrument(skip_all, fields(events = outline.len()))]
    pub async fn decompose_all(
        &self,
        premise: &str,
        outline: &Outline,
    ) -> Result<Vec<SubEvent>, PlanError> {
        let topo_order = outline.topological_order()?;
        let per_event = try_join_all(
            outline
                .iter()
                .map(|event| self.decompose_event(premise, event)),
        )
        .await?;

        let mut by_parent: FxHashMap<String, Vec<SubEvent>> = FxHashMap::default();
        for (event, subs) in outline.iter().zip(per_event) {
            by_parent.insert(event.event_id.clone(), subs);
        }

        let mut rank: u64 = 0;
        let mut all = Vec::new();
        for event_id in &topo_order {
            if let Some(subs) = by_parent.remove(event_id) {
                for mut sub in subs {
                    sub.causal_rank = rank;
                    rank += 1;
                    all.push(sub);
                }
            }
        }
        info!(sub_events = all.len(), "decomposition finished");
        Ok(all)
    }

    /// Decompose a single event; at least one sub-event is required.
    async fn decompose_event(&self, premise: &str, event: &Event) -> Result<Vec<SubEvent>, PlanError> {
        let parent_json =
            serde_json::to_string(event).unwrap_or_else(|_| event.event_id.clone());
        let request = CompletionRequest::new(
            agents::SUBTASKER,
            prompts::SUBTASKER_SYSTEM,
            prompts::subtasker_user(premise, &parent_json),
        );
        let raw: Vec<RawSubEvent> =
            request_structured_list(self.client.as_ref(), &request, &self.retry).await?;
        if raw.is_empty() {
            return Err(PlanError::EmptyDecomposition {
                event_id: event.event_id.clone(),
            });
        }
        let subs: Vec<SubEvent> = raw
            .into_iter()
            .enumerate()
            .map(|(index, r)| SubEvent {
                sub_event_id: format!("{}_S{}", event.event_id, index + 1),
                parent_event_id: event.event_id.clone(),
                title: if r.title.is_empty() {
                    format!("{} (part {})", event.title, index + 1)
                } else {
                    r.title
                },
                summary: r.summary,
                // Placeholder until the whole set is ranked.
                causal_rank: 0,
            })
            .collect();
        debug!(event_id = %event.event_id, count = subs.len(), "event decomposed");
        Ok(subs)
    }
}
