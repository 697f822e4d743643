//! Draft-and-revise passage generation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{instrument, warn};

use super::{ContextSnapshot, Passage, RevisionResult, RevisionVerdict, WriteError};
use crate::client::{
    CompletionRequest, GenerationClient, RetryPolicy, agents, complete_with_retry,
    structured::request_structured,
};
use crate::prompts;

/// Writes one passage per reveal position: a writer draft followed by a
/// reviser pass that checks the draft against the snapshot for leaks and
/// continuity breaks.
pub struct WritingAgent {
    client: Arc<dyn GenerationClient>,
    retry: RetryPolicy,
}

impl WritingAgent {
    pub fn new(client: Arc<dyn GenerationClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    #[instrument(skip_all, fields(sub_event = %snapshot.sub_event_id, chapter = snapshot.chapter_id))]
    pub async fn write_passage(
        &self,
        premise: &str,
        snapshot: ContextSnapshot,
    ) -> Result<Passage, WriteError> {
        let recap = render_recap(&snapshot);
        let threads = render_threads(&snapshot);

        let draft_request = CompletionRequest::new(
            agents::WRITER,
            prompts::WRITER_SYSTEM,
            prompts::writer_user(
                premise,
                &snapshot.chapter_title,
                &snapshot.chapter_summary,
                &snapshot.sub_event_summary,
                &recap,
                &threads,
            ),
        );
        let raw_text =
            complete_with_retry(self.client.as_ref(), &draft_request, &self.retry).await?;

        let revise_request = CompletionRequest::new(
            agents::REVISER,
            prompts::REVISER_SYSTEM,
            prompts::reviser_user(
                &snapshot.chapter_summary,
                &snapshot.sub_event_summary,
                &recap,
                &threads,
                &raw_text,
            ),
        );
        let revision_result: RevisionResult =
            request_structured(self.client.as_ref(), &revise_request, &self.retry).await?;
        let revision_result = revision_result.normalized();

        if revision_result.verdict == RevisionVerdict::Flag {
            warn!(
                sub_event = %snapshot.sub_event_id,
                notes = %revision_result.notes,
                "reviser flagged passage for manual attention"
            );
        }

        Ok(Passage {
            sub_event_id: snapshot.sub_event_id.clone(),
            context_snapshot: snapshot,
            raw_text,
            revision_result,
            timestamp: Utc::now(),
        })
    }
}

fn render_recap(snapshot: &ContextSnapshot) -> String {
    if snapshot.recent.is_empty() {
        return "(this is the opening passage, nothing has been read yet)".to_string();
    }
    snapshot
        .recent
        .iter()
        .map(|d| format!("[{}] {}", d.sub_event_id, d.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_threads(snapshot: &ContextSnapshot) -> String {
    if snapshot.open_threads.is_empty() {
        return "(none)".to_string();
    }
    snapshot
        .open_threads
        .iter()
        .map(|t| format!("[{}] {}", t.sub_event_id, t.summary))
        .collect::<Vec<_>>()
        .join("\n")
}
