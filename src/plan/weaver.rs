//! Chapter weaving: the whole-graph arrangement of sub-events into a
//! reveal order.
//!
//! The weaver agent proposes chapter structure (titles, summaries, ordered
//! sub-event ids); which orders are *allowed* is decided here, not in the
//! prompt. Early-reveal flags are derived deterministically from the
//! prerequisite analysis (the model's own marks are advisory), so
//! resolvability is a checked invariant rather than a hoped-for property.
//! Coverage violations in a proposal trigger a corrective re-prompt with
//! the exact discrepancy lists; after bounded attempts the run fails with
//! [`PlanError::Infeasible`], never with a silently relaxed plan.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{Chapter, ChapterEntry, PlanError, StoryPlan, SubEvent, prerequisite_map};
use crate::client::{
    CompletionRequest, GenerationClient, RetryPolicy, agents, request_structured_list,
};
use crate::outline::Outline;
use crate::prompts;

/// Chapter-count bounds and retry budget for the weaving stage.
#[derive(Clone, Debug)]
pub struct WeaveConfig {
    pub min_chapters: usize,
    pub max_chapters: usize,
    /// Proposal attempts before the plan is declared infeasible.
    pub max_weave_attempts: u32,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            min_chapters: 4,
            max_chapters: 12,
            max_weave_attempts: 3,
        }
    }
}

impl WeaveConfig {
    /// Force an exact chapter count.
    #[must_use]
    pub fn with_exact_chapters(mut self, count: usize) -> Self {
        self.min_chapters = count;
        self.max_chapters = count;
        self
    }
}

/// Shape of one proposed chapter from the weaver agent.
#[derive(Debug, Deserialize)]
struct RawChapter {
    title: String,
    summary: String,
    sub_event_ids: Vec<String>,
    #[serde(default)]
    #[allow(dead_code)]
    early_reveal_ids: Vec<String>,
}

/// Coverage discrepancies in one proposal, fed back verbatim.
struct CoverageReport {
    missing: Vec<String>,
    duplicated: Vec<String>,
    unknown: Vec<String>,
    chapter_count_issue: Option<String>,
}

/// Weaves the complete sub-event set into a validated story plan.
pub struct ChapterWeaver {
    client: Arc<dyn GenerationClient>,
    config: WeaveConfig,
    retry: RetryPolicy,
}

impl ChapterWeaver {
    pub fn new(client: Arc<dyn GenerationClient>, config: WeaveConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }

    /// Produce a story plan satisfying coverage and resolvability, or fail
    /// with [`PlanError::Infeasible`].
    #[instrument(skip_all, fields(sub_events = sub_events.len()))]
    pub async fn weave(
        &self,
        premise: &str,
        outline: &Outline,
        sub_events: Vec<SubEvent>,
    ) -> Result<StoryPlan, PlanError> {
        if self.config.max_chapters == 0 {
            if sub_events.is_empty() {
                return Ok(StoryPlan::default());
            }
            return Err(PlanError::Infeasible {
                sub_events: sub_events.len(),
                max_chapters: 0,
                detail: "no chapters available for a non-empty sub-event set".into(),
            });
        }

        let prereqs = prerequisite_map(outline, &sub_events)?;
        let base_user = prompts::weaver_user(
            premise,
            &to_json(&outline.events),
            &to_json(&sub_events),
            self.config.min_chapters,
            self.config.max_chapters,
        );

        let mut addendum: Option<String> = None;
        for attempt in 1..=self.config.max_weave_attempts.max(1) {
            let user = match &addendum {
                Some(repair) => format!("{base_user}\n\n{repair}"),
                None => base_user.clone(),
            };
            let request = CompletionRequest::new(agents::WEAVER, prompts::WEAVER_SYSTEM, user);
            let raw: Vec<RawChapter> =
                request_structured_list(self.client.as_ref(), &request, &self.retry).await?;

            match self.assemble(raw, &sub_events, &prereqs) {
                Ok(chapters) => {
                    let plan = StoryPlan {
                        sub_events,
                        chapters,
                    };
                    validate_plan(&plan, outline)?;
                    info!(
                        chapters = plan.chapters.len(),
                        attempt, "chapter plan accepted"
                    );
                    return Ok(plan);
                }
                Err(report) => {
                    warn!(
                        attempt,
                        missing = report.missing.len(),
                        duplicated = report.duplicated.len(),
                        unknown = report.unknown.len(),
                        "chapter proposal rejected"
                    );
                    addendum = Some(prompts::weaver_repair_addendum(
                        &report.missing,
                        &report.duplicated,
                        &report.unknown,
                        report.chapter_count_issue.as_deref(),
                    ));
                }
            }
        }

        Err(PlanError::Infeasible {
            sub_events: sub_events.len(),
            max_chapters: self.config.max_chapters,
            detail: format!(
                "no covering chapter assignment found in {} attempts",
                self.config.max_weave_attempts.max(1)
            ),
        })
    }

    /// Turn a raw proposal into chapters, or report its coverage gaps.
    fn assemble(
        &self,
        raw: Vec<RawChapter>,
        sub_events: &[SubEvent],
        prereqs: &FxHashMap<String, FxHashSet<String>>,
    ) -> Result<Vec<Chapter>, CoverageReport> {
        let known: FxHashSet<&str> = sub_events.iter().map(|s| s.sub_event_id.as_str()).collect();

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut duplicated = Vec::new();
        let mut unknown = Vec::new();
        for id in raw.iter().flat_map(|c| c.sub_event_ids.iter()) {
            if !known.contains(id.as_str()) {
                unknown.push(id.clone());
            } else if !seen.insert(id.as_str()) {
                duplicated.push(id.clone());
            }
        }
        let missing: Vec<String> = sub_events
            .iter()
            .filter(|s| !seen.contains(s.sub_event_id.as_str()))
            .map(|s| s.sub_event_id.clone())
            .collect();

        let chapter_count_issue = if raw.len() < self.config.min_chapters
            || raw.len() > self.config.max_chapters
        {
            Some(format!(
                "you produced {} chapters, required between {} and {}",
                raw.len(),
                self.config.min_chapters,
                self.config.max_chapters
            ))
        } else {
            None
        };

        if !missing.is_empty()
            || !duplicated.is_empty()
            || !unknown.is_empty()
            || chapter_count_issue.is_some()
        {
            return Err(CoverageReport {
                missing,
                duplicated,
                unknown,
                chapter_count_issue,
            });
        }

        let mut chapters: Vec<Chapter> = raw
            .into_iter()
            .enumerate()
            .map(|(i, c)| Chapter {
                chapter_id: (i + 1) as u32,
                title: c.title,
                summary: c.summary,
                entries: c
                    .sub_event_ids
                    .into_iter()
                    .map(|sub_event_id| ChapterEntry {
                        sub_event_id,
                        early_reveal: false,
                    })
                    .collect(),
            })
            .collect();
        mark_early_reveals(&mut chapters, prereqs);
        Ok(chapters)
    }
}

/// Derive early-reveal flags from prerequisite analysis.
///
/// Walking the global reveal order, an entry whose prerequisites have not
/// all been revealed yet is an early reveal; the entry itself then counts
/// as revealed for everything after it.
pub fn mark_early_reveals(
    chapters: &mut [Chapter],
    prereqs: &FxHashMap<String, FxHashSet<String>>,
) {
    let mut revealed: FxHashSet<String> = FxHashSet::default();
    for chapter in chapters.iter_mut() {
        for entry in chapter.entries.iter_mut() {
            entry.early_reveal = prereqs
                .get(&entry.sub_event_id)
                .is_some_and(|p| !p.is_subset(&revealed));
            revealed.insert(entry.sub_event_id.clone());
        }
    }
}

/// Validate the two hard planning constraints on a finished plan.
///
/// Coverage: the multiset of ids across chapters equals the sub-event set
/// exactly once each. Resolvability: every entry without an early-reveal
/// flag has all prerequisites at strictly earlier reveal positions.
pub fn validate_plan(plan: &StoryPlan, outline: &Outline) -> Result<(), PlanError> {
    let known: FxHashSet<&str> = plan
        .sub_events
        .iter()
        .map(|s| s.sub_event_id.as_str())
        .collect();

    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut duplicated = Vec::new();
    let mut unknown = Vec::new();
    for (_, _, entry) in plan.reveal_order() {
        let id = entry.sub_event_id.as_str();
        if !known.contains(id) {
            unknown.push(entry.sub_event_id.clone());
        } else if !seen.insert(id) {
            duplicated.push(entry.sub_event_id.clone());
        }
    }
    let missing: Vec<String> = plan
        .sub_events
        .iter()
        .filter(|s| !seen.contains(s.sub_event_id.as_str()))
        .map(|s| s.sub_event_id.clone())
        .collect();
    if !missing.is_empty() || !duplicated.is_empty() || !unknown.is_empty() {
        return Err(PlanError::Coverage {
            missing,
            duplicated,
            unknown,
        });
    }

    let prereqs = prerequisite_map(outline, &plan.sub_events)?;
    let mut revealed: FxHashSet<&str> = FxHashSet::default();
    for (position, (_, _, entry)) in plan.reveal_order().enumerate() {
        if !entry.early_reveal {
            if let Some(p) = prereqs.get(&entry.sub_event_id) {
                let unmet: Vec<String> = p
                    .iter()
                    .filter(|id| !revealed.contains(id.as_str()))
                    .cloned()
                    .collect();
                if !unmet.is_empty() {
                    return Err(PlanError::Resolvability {
                        sub_event_id: entry.sub_event_id.clone(),
                        position,
                        missing_prerequisites: unmet,
                    });
                }
            }
        }
        revealed.insert(entry.sub_event_id.as_str());
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::test_support::{bare_event, outline_of};

    fn sub(id: &str, parent: &str, rank: u64) -> SubEvent {
        SubEvent {
            sub_event_id: id.to_string(),
            parent_event_id: parent.to_string(),
            title: id.to_string(),
            summary: format!("summary of {id}"),
            causal_rank: rank,
        }
    }

    fn chapter(id: u32, entries: &[(&str, bool)]) -> Chapter {
        Chapter {
            chapter_id: id,
            title: format!("Chapter {id}"),
            summary: String::new(),
            entries: entries
                .iter()
                .map(|(sid, early)| ChapterEntry {
                    sub_event_id: (*sid).to_string(),
                    early_reveal: *early,
                })
                .collect(),
        }
    }

    /// Event B depends on A; revealing B's sub-event first without a flag
    /// must be rejected by the validator.
    #[test]
    fn unflagged_early_reveal_is_rejected() {
        let outline = outline_of(vec![bare_event("A", &[]), bare_event("B", &["A"])]);
        let plan = StoryPlan {
            sub_events: vec![sub("A_S1", "A", 0), sub("B_S1", "B", 1)],
            chapters: vec![chapter(1, &[("B_S1", false), ("A_S1", false)])],
        };
        match validate_plan(&plan, &outline) {
            Err(PlanError::Resolvability {
                sub_event_id,
                position,
                missing_prerequisites,
            }) => {
                assert_eq!(sub_event_id, "B_S1");
                assert_eq!(position, 0);
                assert_eq!(missing_prerequisites, vec!["A_S1".to_string()]);
            }
            other => panic!("expected Resolvability error, got {other:?}"),
        }
    }

    #[test]
    fn flagged_early_reveal_is_accepted() {
        let outline = outline_of(vec![bare_event("A", &[]), bare_event("B", &["A"])]);
        let plan = StoryPlan {
            sub_events: vec![sub("A_S1", "A", 0), sub("B_S1", "B", 1)],
            chapters: vec![chapter(1, &[("B_S1", true), ("A_S1", false)])],
        };
        validate_plan(&plan, &outline).unwrap();
    }

    #[test]
    fn duplicated_and_missing_ids_violate_coverage() {
        let outline = outline_of(vec![bare_event("A", &[])]);
        let plan = StoryPlan {
            sub_events: vec![sub("A_S1", "A", 0), sub("A_S2", "A", 1)],
            chapters: vec![chapter(1, &[("A_S1", false), ("A_S1", false)])],
        };
        match validate_plan(&plan, &outline) {
            Err(PlanError::Coverage {
                missing,
                duplicated,
                unknown,
            }) => {
                assert_eq!(missing, vec!["A_S2".to_string()]);
                assert_eq!(duplicated, vec!["A_S1".to_string()]);
                assert!(unknown.is_empty());
            }
            other => panic!("expected Coverage error, got {other:?}"),
        }
    }

    #[test]
    fn derived_flags_make_any_permutation_valid() {
        let outline = outline_of(vec![bare_event("A", &[]), bare_event("B", &["A"])]);
        let subs = vec![sub("A_S1", "A", 0), sub("A_S2", "A", 1), sub("B_S1", "B", 2)];
        let prereqs = prerequisite_map(&outline, &subs).unwrap();

        // Worst case: full reverse of causal order.
        let mut chapters = vec![chapter(
            1,
            &[("B_S1", false), ("A_S2", false), ("A_S1", false)],
        )];
        mark_early_reveals(&mut chapters, &prereqs);
        assert!(chapters[0].entries[0].early_reveal);
        assert!(chapters[0].entries[1].early_reveal);
        assert!(!chapters[0].entries[2].early_reveal);

        let plan = StoryPlan {
            sub_events: subs,
            chapters,
        };
        validate_plan(&plan, &outline).unwrap();
    }

    #[test]
    fn causal_order_needs_no_flags() {
        let outline = outline_of(vec![bare_event("A", &[]), bare_event("B", &["A"])]);
        let subs = vec![sub("A_S1", "A", 0), sub("B_S1", "B", 1)];
        let prereqs = prerequisite_map(&outline, &subs).unwrap();
        let mut chapters = vec![chapter(1, &[("A_S1", false), ("B_S1", false)])];
        mark_early_reveals(&mut chapters, &prereqs);
        assert!(chapters[0].entries.iter().all(|e| !e.early_reveal));
    }
}
