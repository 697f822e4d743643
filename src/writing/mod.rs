//! The writing data model: passages, revision verdicts, chapter sets.
//!
//! A [`Passage`] is created once, in strict reveal order, and never edited
//! after a later passage has consumed its summary; the [`ChapterSet`]
//! enforces that append-only discipline. Each passage embeds the
//! [`ContextSnapshot`] it was written from, which is the only place
//! snapshots are persisted.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::{ChapterEntry, StoryPlan};

pub mod agent;
pub mod context;

pub use agent::WritingAgent;
pub use context::{ContextAssembler, SnapshotConfig, condense};

/// A condensed record of one already-committed passage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PassageDigest {
    pub sub_event_id: String,
    pub summary: String,
}

/// A planted mystery still unresolved at some reveal position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForeshadowThread {
    /// The early-revealed sub-event that opened the thread.
    pub sub_event_id: String,
    pub summary: String,
    /// Prerequisites the reader has not seen yet.
    pub missing_prerequisites: Vec<String>,
}

/// Everything the writer may know at one reveal position, and nothing
/// from any later position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub chapter_id: u32,
    pub chapter_title: String,
    pub chapter_summary: String,
    pub sub_event_id: String,
    pub sub_event_summary: String,
    /// Bounded recency window over prior passages, reveal order, oldest
    /// first.
    pub recent: Vec<PassageDigest>,
    pub open_threads: Vec<ForeshadowThread>,
}

/// Outcome of the self-revision pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionVerdict {
    /// Draft stands as written.
    Accept,
    /// Draft was corrected; `revised_text` holds the replacement.
    Revise,
    /// An inconsistency remains that the reviser could not fix; the
    /// passage is still committed, with the problem visible downstream.
    Flag,
}

/// Structured critique plus decision from the reviser agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevisionResult {
    pub verdict: RevisionVerdict,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub revised_text: Option<String>,
}

impl RevisionResult {
    /// A `revise` verdict without replacement text cannot be honored;
    /// downgrade it to `accept` and keep the critique visible.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.verdict == RevisionVerdict::Revise && self.revised_text.is_none() {
            self.verdict = RevisionVerdict::Accept;
        }
        self
    }
}

/// The committed text (plus drafting metadata) for one sub-event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub sub_event_id: String,
    pub context_snapshot: ContextSnapshot,
    pub raw_text: String,
    pub revision_result: RevisionResult,
    pub timestamp: DateTime<Utc>,
}

impl Passage {
    /// The revised text when revision occurred, else the raw draft.
    pub fn canonical_text(&self) -> &str {
        self.revision_result
            .revised_text
            .as_deref()
            .unwrap_or(&self.raw_text)
    }
}

/// One planned chapter hydrated with its committed passages.
///
/// `passages` is always a prefix of `entries`, in reveal order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChapterText {
    pub chapter_id: u32,
    pub title: String,
    pub summary: String,
    pub entries: Vec<ChapterEntry>,
    #[serde(default)]
    pub passages: Vec<Passage>,
}

/// The final artifact: the story plan with every entry hydrated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterSet {
    pub chapters: Vec<ChapterText>,
}

impl ChapterSet {
    /// Start an empty chapter set mirroring a frozen plan.
    pub fn from_plan(plan: &StoryPlan) -> Self {
        Self {
            chapters: plan
                .chapters
                .iter()
                .map(|c| ChapterText {
                    chapter_id: c.chapter_id,
                    title: c.title.clone(),
                    summary: c.summary.clone(),
                    entries: c.entries.clone(),
                    passages: Vec::new(),
                })
                .collect(),
        }
    }

    /// Whether this set's chapter structure matches a plan, entry for
    /// entry. Used to reject resuming against a diverged plan.
    pub fn matches_plan(&self, plan: &StoryPlan) -> bool {
        self.chapters.len() == plan.chapters.len()
            && self
                .chapters
                .iter()
                .zip(&plan.chapters)
                .all(|(ct, c)| ct.chapter_id == c.chapter_id && ct.entries == c.entries)
    }

    /// All committed passages in reveal order.
    pub fn committed_passages(&self) -> Vec<&Passage> {
        self.chapters.iter().flat_map(|c| c.passages.iter()).collect()
    }

    pub fn committed_count(&self) -> usize {
        self.chapters.iter().map(|c| c.passages.len()).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.chapters
            .iter()
            .all(|c| c.passages.len() == c.entries.len())
    }

    /// The next reveal position awaiting a passage:
    /// `(chapter_index, entry_index, global_position)`.
    pub fn next_position(&self) -> Option<(usize, usize, usize)> {
        let mut global = 0;
        for (ci, chapter) in self.chapters.iter().enumerate() {
            if chapter.passages.len() < chapter.entries.len() {
                return Some((ci, chapter.passages.len(), global + chapter.passages.len()));
            }
            global += chapter.entries.len();
        }
        None
    }

    /// Append a passage at the next open position of a chapter.
    ///
    /// The passage must target exactly the sub-event planned for that
    /// position; anything else is an out-of-order commit.
    pub fn commit(&mut self, chapter_index: usize, passage: Passage) -> Result<(), WriteError> {
        let chapter = self
            .chapters
            .get_mut(chapter_index)
            .ok_or_else(|| WriteError::OutOfOrderCommit {
                expected: "a valid chapter index".into(),
                got: format!("chapter index {chapter_index}"),
            })?;
        let slot = chapter.passages.len();
        let expected = chapter.entries.get(slot).map(|e| e.sub_event_id.as_str());
        match expected {
            Some(id) if id == passage.sub_event_id => {
                chapter.passages.push(passage);
                Ok(())
            }
            Some(id) => Err(WriteError::OutOfOrderCommit {
                expected: id.to_string(),
                got: passage.sub_event_id,
            }),
            None => Err(WriteError::OutOfOrderCommit {
                expected: format!("no open slot in chapter {}", chapter.chapter_id),
                got: passage.sub_event_id,
            }),
        }
    }
}

/// Errors from the writing stage.
#[derive(Debug, Error, Diagnostic)]
pub enum WriteError {
    /// A passage was committed out of reveal order.
    #[error("out-of-order passage commit: expected {expected}, got {got}")]
    #[diagnostic(
        code(storyloom::writing::out_of_order),
        help("Passages must be committed in strict reveal order, one per planned entry.")
    )]
    OutOfOrderCommit { expected: String, got: String },

    /// A snapshot was requested for a position that does not exist.
    #[error("reveal position {position} is outside the plan ({total} entries)")]
    #[diagnostic(code(storyloom::writing::position_out_of_range))]
    PositionOutOfRange { position: usize, total: usize },

    /// Snapshot construction was handed fewer or more committed passages
    /// than the target position implies.
    #[error("snapshot for position {position} requires exactly {position} committed passages, got {committed}")]
    #[diagnostic(
        code(storyloom::writing::snapshot_mismatch),
        help("Commit passages strictly in reveal order before assembling the next snapshot.")
    )]
    SnapshotMismatch { position: usize, committed: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] crate::plan::PlanError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Generation(#[from] crate::client::GenerationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Chapter;

    fn snapshot(id: &str) -> ContextSnapshot {
        ContextSnapshot {
            chapter_id: 1,
            chapter_title: "One".into(),
            chapter_summary: String::new(),
            sub_event_id: id.into(),
            sub_event_summary: String::new(),
            recent: vec![],
            open_threads: vec![],
        }
    }

    fn passage(id: &str) -> Passage {
        Passage {
            sub_event_id: id.into(),
            context_snapshot: snapshot(id),
            raw_text: format!("draft for {id}"),
            revision_result: RevisionResult {
                verdict: RevisionVerdict::Accept,
                notes: String::new(),
                revised_text: None,
            },
            timestamp: Utc::now(),
        }
    }

    fn plan_two_chapters() -> StoryPlan {
        StoryPlan {
            sub_events: vec![],
            chapters: vec![
                Chapter {
                    chapter_id: 1,
                    title: "One".into(),
                    summary: String::new(),
                    entries: vec![
                        ChapterEntry {
                            sub_event_id: "A".into(),
                            early_reveal: false,
                        },
                        ChapterEntry {
                            sub_event_id: "B".into(),
                            early_reveal: false,
                        },
                    ],
                },
                Chapter {
                    chapter_id: 2,
                    title: "Two".into(),
                    summary: String::new(),
                    entries: vec![ChapterEntry {
                        sub_event_id: "C".into(),
                        early_reveal: false,
                    }],
                },
            ],
        }
    }

    #[test]
    fn canonical_text_prefers_revision() {
        let mut p = passage("A");
        assert_eq!(p.canonical_text(), "draft for A");
        p.revision_result = RevisionResult {
            verdict: RevisionVerdict::Revise,
            notes: "tightened".into(),
            revised_text: Some("better text".into()),
        };
        assert_eq!(p.canonical_text(), "better text");
    }

    #[test]
    fn revise_without_text_normalizes_to_accept() {
        let r = RevisionResult {
            verdict: RevisionVerdict::Revise,
            notes: "wanted changes".into(),
            revised_text: None,
        }
        .normalized();
        assert_eq!(r.verdict, RevisionVerdict::Accept);
        assert_eq!(r.notes, "wanted changes");
    }

    #[test]
    fn commits_walk_positions_in_reveal_order() {
        let plan = plan_two_chapters();
        let mut set = ChapterSet::from_plan(&plan);
        assert!(set.matches_plan(&plan));

        assert_eq!(set.next_position(), Some((0, 0, 0)));
        set.commit(0, passage("A")).unwrap();
        assert_eq!(set.next_position(), Some((0, 1, 1)));
        set.commit(0, passage("B")).unwrap();
        assert_eq!(set.next_position(), Some((1, 0, 2)));
        set.commit(1, passage("C")).unwrap();
        assert_eq!(set.next_position(), None);
        assert!(set.is_complete());
        assert_eq!(set.committed_count(), 3);
    }

    #[test]
    fn out_of_order_commit_is_rejected() {
        let plan = plan_two_chapters();
        let mut set = ChapterSet::from_plan(&plan);
        let err = set.commit(0, passage("B")).unwrap_err();
        assert!(matches!(err, WriteError::OutOfOrderCommit { .. }));
        // Nothing was appended.
        assert_eq!(set.committed_count(), 0);
    }

    #[test]
    fn diverged_plan_is_detected() {
        let plan = plan_two_chapters();
        let set = ChapterSet::from_plan(&plan);
        let mut other = plan.clone();
        other.chapters[0].entries.reverse();
        assert!(!set.matches_plan(&other));
    }

    #[test]
    fn verdict_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RevisionVerdict::Flag).unwrap(),
            "\"flag\""
        );
        let back: RevisionVerdict = serde_json::from_str("\"revise\"").unwrap();
        assert_eq!(back, RevisionVerdict::Revise);
    }
}
