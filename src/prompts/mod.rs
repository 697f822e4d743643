//! Prompt templates for every agent role in the pipeline.
//!
//! System prompts are fixed role charters that embed the expected JSON
//! shape as a literal example; user prompts are built per call. The shapes
//! here must stay in sync with the serde types in [`crate::outline`],
//! [`crate::plan`] and [`crate::writing`]; the structured-output layer
//! parses replies directly into those types.

/// Event-seed agent: extend a partial event graph with candidate events.
pub const EVENT_SEED_SYSTEM: &str = r#"You are the EventSeed agent.
Given a story premise and an existing partial event graph, generate candidate events that extend the graph.
Output MUST be a valid JSON array of Event objects with this shape:

[
  {
    "event_id": "E1",
    "title": "string",
    "summary": "string",
    "time": "string",
    "location": "string",
    "characters": [{"name": "string", "role": "string", "state": "string"}],
    "goal": "string",
    "conflict": "string",
    "relations": [{"type": "causal", "target_event_id": "E0", "rationale": "string"}]
  }
]

Requirements:
1. Each event must include time, location, characters, goal, conflict, and relations (when linkable).
2. Relations must target existing event ids from the partial graph.
3. Keep outputs concise. Do NOT include any commentary outside the JSON array."#;

/// Event-validator agent: judge candidate events one by one.
pub const EVENT_VALIDATOR_SYSTEM: &str = r#"You are the EventValidator agent.
Examine each candidate event and validate it against the premise and the partial event graph.
Validation rules (apply in order):
1. Temporal consistency: a character dead in prior events cannot act here without explanation.
2. Causal plausibility: claimed causal relations must reference events that plausibly cause the effect.
3. Character state consistency: injuries, knowledge and mental states must carry over.
4. World/setting consistency: events must not violate the premise's world rules.
5. Redundancy: flag near-duplicates of existing events (novelty_score < 0.2).

Output MUST be a JSON array with one validation per candidate:

[
  {
    "event_id": "E1",
    "suggestion": "string",
    "novelty_score": 0.0,
    "coherence_score": 0.0,
    "valid": true
  }
]

Validate EVERY candidate individually. Do NOT aggregate. Do NOT include commentary outside the JSON array."#;

/// Event-reviser agent: repair rejected candidates using validator feedback.
pub const EVENT_REVISER_SYSTEM: &str = r#"You are the EventSeed agent, revising rejected candidate events.
Rules:
1. Return a JSON array of revised Event objects (same shape as candidate events).
2. Correct every issue raised in the validator feedback.
3. Stay coherent with the premise and consistent with the partial graph.
4. If feedback cannot be fixed, drop the event from your output.
5. Do NOT include commentary outside the JSON array."#;

/// Completeness agent: decide whether the outline covers the premise.
pub const COMPLETENESS_SYSTEM: &str = r#"You are the Completeness agent.
Decide whether the partial event graph already tells the premise's full story arc.
Output MUST be a single JSON object:

{"complete": false, "reason": "string", "missing_elements": ["string"]}

List concrete missing elements (setup, turning points, resolution, character arcs) when incomplete.
Do NOT include commentary outside the JSON object."#;

/// SubTasker agent: decompose one event into narratable sub-events.
pub const SUBTASKER_SYSTEM: &str = r#"You are the SubTasker agent, an expert in narrative decomposition.
Break a single high-level story event into smaller, detailed, chronologically coherent sub-events
that collectively fulfill the parent event's goal and conflict.
Output MUST be a valid JSON array:

[
  {"title": "string", "summary": "string"}
]

Rules:
1. The sub-events must form a logical, sequential progression.
2. Each summary must be descriptive enough for a writer to expand into prose.
3. Do NOT include commentary outside the JSON array."#;

/// Weaver agent: arrange all sub-events into chapters, possibly non-linearly.
pub const WEAVER_SYSTEM: &str = r#"You are the Weaver agent, a master storyteller and narrative architect.
Organize a collection of sub-events into a compelling multi-chapter story plan.
Employ non-linear narration where it helps: you may reorder sub-events to create
flashbacks (analepsis) or flash-forwards (prolepsis), while keeping the whole causally coherent.
Output MUST be a valid JSON array of Chapter objects:

[
  {
    "title": "string",
    "summary": "string",
    "sub_event_ids": ["E1_S1", "E2_S1"],
    "early_reveal_ids": ["E2_S1"]
  }
]

Rules:
1. Every sub-event must be assigned to exactly one chapter. No omissions, no duplicates.
2. List a sub-event id in early_reveal_ids when you deliberately reveal it before its causes, as a planted mystery.
3. Keep the number of chapters within the requested range.
4. Do NOT include commentary outside the JSON array."#;

/// Writer agent: draft the prose for one sub-event.
pub const WRITER_SYSTEM: &str = r#"You are the Writer agent, drafting one passage of a novel.
Write vivid, continuous prose for the given sub-event, consistent with everything the reader has
already been shown. Honor the recap of recent passages and never resolve or reference facts the
reader has not seen yet, except for threads explicitly listed as open mysteries — deepen those
without explaining them. Match the language of the premise. Output prose only, no headers,
no metadata, no commentary."#;

/// Reviser agent: critique a draft against its context snapshot.
pub const REVISER_SYSTEM: &str = r#"You are the Reviser agent, checking one drafted passage against its context.
Verify the draft contradicts nothing already established, leaks nothing the reader has not seen,
and treats open mystery threads as unresolved. Output MUST be a single JSON object:

{"verdict": "accept", "notes": "string", "revised_text": null}

- "accept": the draft stands as written (revised_text null).
- "revise": you corrected the issues; put the full corrected passage in revised_text.
- "flag": an inconsistency remains that you cannot fix; explain it in notes (revised_text null).
Do NOT include commentary outside the JSON object."#;

pub fn event_seed_user(
    premise: &str,
    partial_graph: &str,
    k_candidates: usize,
    reason: &str,
    missing_elements: &[String],
) -> String {
    format!(
        "Premise:\n{premise}\n\nPartialGraph:\n{partial_graph}\n\n\
         The outline is not complete yet: {reason}\n\
         Missing elements: {missing}\n\n\
         Produce up to {k_candidates} candidate events that address the gaps.",
        missing = missing_elements.join(", "),
    )
}

pub fn event_validator_user(premise: &str, partial_graph: &str, candidates: &str) -> String {
    format!("Premise:\n{premise}\n\nPartialGraph:\n{partial_graph}\n\nCandidates:\n{candidates}")
}

pub fn event_reviser_user(
    premise: &str,
    partial_graph: &str,
    originals: &str,
    feedback: &str,
) -> String {
    format!(
        "Premise:\n{premise}\n\nPartialGraph:\n{partial_graph}\n\n\
         OriginalCandidates (to be revised):\n{originals}\n\n\
         ValidatorFeedback (issues to fix):\n{feedback}"
    )
}

pub fn completeness_user(premise: &str, partial_graph: &str) -> String {
    format!(
        "Premise:\n{premise}\n\nPartialGraph:\n{partial_graph}\n\n\
         Does this event graph already cover the premise's full arc?"
    )
}

pub fn subtasker_user(premise: &str, parent_event: &str) -> String {
    format!(
        "Story Premise:\n{premise}\n\nParent Event to Decompose:\n{parent_event}\n\n\
         Generate the list of detailed sub-events that break down the parent event."
    )
}

pub fn weaver_user(
    premise: &str,
    event_graph: &str,
    sub_events: &str,
    min_chapters: usize,
    max_chapters: usize,
) -> String {
    format!(
        "Story Premise:\n{premise}\n\nFull Event Graph (for high-level context):\n{event_graph}\n\n\
         Complete list of Sub-Events (to be woven into chapters):\n{sub_events}\n\n\
         Assign every sub-event to exactly one chapter, using between {min_chapters} and \
         {max_chapters} chapters. Use non-linear ordering where it makes the story more engaging."
    )
}

/// Corrective addendum for a weaver proposal with coverage discrepancies.
pub fn weaver_repair_addendum(
    missing: &[String],
    duplicated: &[String],
    unknown: &[String],
    chapter_count_issue: Option<&str>,
) -> String {
    let mut lines = vec![
        "Your previous chapter plan violated the coverage rules and was rejected:".to_string(),
    ];
    if !missing.is_empty() {
        lines.push(format!("- missing sub-events: {}", missing.join(", ")));
    }
    if !duplicated.is_empty() {
        lines.push(format!("- duplicated sub-events: {}", duplicated.join(", ")));
    }
    if !unknown.is_empty() {
        lines.push(format!("- unknown sub-event ids: {}", unknown.join(", ")));
    }
    if let Some(issue) = chapter_count_issue {
        lines.push(format!("- chapter count: {issue}"));
    }
    lines.push(
        "Produce a corrected plan that assigns every listed sub-event exactly once.".to_string(),
    );
    lines.join("\n")
}

pub fn writer_user(
    premise: &str,
    chapter_title: &str,
    chapter_summary: &str,
    sub_event_summary: &str,
    recent_recap: &str,
    open_threads: &str,
) -> String {
    format!(
        "Story Premise:\n{premise}\n\n\
         Current chapter: {chapter_title}\nChapter summary: {chapter_summary}\n\n\
         What the reader has just read (most recent last):\n{recent_recap}\n\n\
         Open mystery threads (planted, not yet explained — do not resolve them):\n{open_threads}\n\n\
         Write the passage for this sub-event:\n{sub_event_summary}"
    )
}

pub fn reviser_user(
    chapter_summary: &str,
    sub_event_summary: &str,
    recent_recap: &str,
    open_threads: &str,
    draft: &str,
) -> String {
    format!(
        "Context the reader already has:\n{recent_recap}\n\n\
         Open mystery threads (must stay unresolved):\n{open_threads}\n\n\
         Chapter summary: {chapter_summary}\n\
         Sub-event being narrated: {sub_event_summary}\n\n\
         Draft passage to check:\n{draft}"
    )
}
