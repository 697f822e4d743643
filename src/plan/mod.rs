//! The planning data model: sub-events, chapters, story plans.
//!
//! Two orderings coexist here and are deliberately kept apart. A
//! [`SubEvent`]'s `causal_rank` is derived from the event graph and never
//! changes; its reveal position is wherever the weaver placed it in the
//! chapter sequence. Prerequisite logic ([`prerequisite_map`]) keys off
//! causal structure, while everything the writing stage does keys off
//! reveal positions.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outline::{Outline, OutlineError};

pub mod decomposer;
pub mod weaver;

pub use decomposer::EventDecomposer;
pub use weaver::{ChapterWeaver, WeaveConfig, mark_early_reveals, validate_plan};

/// A narratable decomposition unit of one event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubEvent {
    /// Globally unique id, `{event_id}_S{index}` with a 1-based index.
    pub sub_event_id: String,
    pub parent_event_id: String,
    pub title: String,
    pub summary: String,
    /// Global position in causal order: parent events in topological
    /// order, then intra-event index. Derived once, immutable.
    pub causal_rank: u64,
}

/// One sub-event placed at one position inside one chapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChapterEntry {
    pub sub_event_id: String,
    /// True when this entry is deliberately revealed before all of its
    /// causal prerequisites: a planted mystery, not a coherence error.
    #[serde(default)]
    pub early_reveal: bool,
}

/// An ordered grouping of sub-events presented together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Sequential from 1.
    pub chapter_id: u32,
    pub title: String,
    pub summary: String,
    /// Reveal order within the chapter.
    pub entries: Vec<ChapterEntry>,
}

impl Chapter {
    pub fn sub_event_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.sub_event_id.as_str())
    }
}

/// The frozen product of the planning stage.
///
/// Chapter membership and reveal order never change once writing begins;
/// the writing stage only appends passages.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryPlan {
    pub sub_events: Vec<SubEvent>,
    pub chapters: Vec<Chapter>,
}

impl StoryPlan {
    pub fn sub_event(&self, id: &str) -> Option<&SubEvent> {
        self.sub_events.iter().find(|s| s.sub_event_id == id)
    }

    /// Total number of reveal positions.
    pub fn total_entries(&self) -> usize {
        self.chapters.iter().map(|c| c.entries.len()).sum()
    }

    /// All entries in global reveal order: `(chapter_index, entry_index,
    /// entry)`, chapter order then position within chapter.
    pub fn reveal_order(&self) -> impl Iterator<Item = (usize, usize, &ChapterEntry)> {
        self.chapters
            .iter()
            .enumerate()
            .flat_map(|(ci, chapter)| {
                chapter
                    .entries
                    .iter()
                    .enumerate()
                    .map(move |(ei, entry)| (ci, ei, entry))
            })
    }
}

/// Map each sub-event id to the ids that must be revealed before it can be
/// narrated without an early-reveal flag.
///
/// Prerequisites are the sub-events of the owning event's direct causal
/// predecessors, plus earlier siblings within the same event.
pub fn prerequisite_map(
    outline: &Outline,
    sub_events: &[SubEvent],
) -> Result<FxHashMap<String, FxHashSet<String>>, PlanError> {
    let mut by_parent: FxHashMap<&str, Vec<&SubEvent>> = FxHashMap::default();
    for sub in sub_events {
        by_parent
            .entry(sub.parent_event_id.as_str())
            .or_default()
            .push(sub);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by_key(|s| s.causal_rank);
    }

    let mut map = FxHashMap::default();
    for sub in sub_events {
        let parent = outline
            .get(&sub.parent_event_id)
            .ok_or_else(|| PlanError::UnknownParentEvent {
                sub_event_id: sub.sub_event_id.clone(),
                event_id: sub.parent_event_id.clone(),
            })?;
        let mut prereqs = FxHashSet::default();
        for pred in parent.causal_predecessors() {
            if let Some(pred_subs) = by_parent.get(pred) {
                prereqs.extend(pred_subs.iter().map(|s| s.sub_event_id.clone()));
            }
        }
        if let Some(siblings) = by_parent.get(sub.parent_event_id.as_str()) {
            prereqs.extend(
                siblings
                    .iter()
                    .filter(|s| s.causal_rank < sub.causal_rank)
                    .map(|s| s.sub_event_id.clone()),
            );
        }
        map.insert(sub.sub_event_id.clone(), prereqs);
    }
    Ok(map)
}

/// Errors from decomposition, weaving and plan validation.
#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    /// No chapter assignment satisfying coverage and resolvability exists
    /// within the configured chapter bounds.
    #[error("planning infeasible: {detail} ({sub_events} sub-events, {max_chapters} chapter max)")]
    #[diagnostic(
        code(storyloom::plan::infeasible),
        help("Widen the chapter count range in WeaveConfig and retry.")
    )]
    Infeasible {
        sub_events: usize,
        max_chapters: usize,
        detail: String,
    },

    /// The plan does not cover the sub-event set exactly once each.
    #[error(
        "plan violates coverage: missing [{}], duplicated [{}], unknown [{}]",
        missing.join(", "), duplicated.join(", "), unknown.join(", ")
    )]
    #[diagnostic(code(storyloom::plan::coverage))]
    Coverage {
        missing: Vec<String>,
        duplicated: Vec<String>,
        unknown: Vec<String>,
    },

    /// An unflagged entry is scheduled before its causal prerequisites.
    #[error(
        "sub-event {sub_event_id} at reveal position {position} lacks an early-reveal flag but \
         precedes its prerequisites: {}",
        missing_prerequisites.join(", ")
    )]
    #[diagnostic(
        code(storyloom::plan::resolvability),
        help("Either reorder the entry after its prerequisites or flag it as an early reveal.")
    )]
    Resolvability {
        sub_event_id: String,
        position: usize,
        missing_prerequisites: Vec<String>,
    },

    /// Decomposition produced zero sub-events for an event.
    #[error("event {event_id} decomposed into zero sub-events")]
    #[diagnostic(code(storyloom::plan::empty_decomposition))]
    EmptyDecomposition { event_id: String },

    /// A sub-event references an event missing from the outline.
    #[error("sub-event {sub_event_id} references unknown event {event_id}")]
    #[diagnostic(code(storyloom::plan::unknown_parent))]
    UnknownParentEvent {
        sub_event_id: String,
        event_id: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Outline(#[from] OutlineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Generation(#[from] crate::client::GenerationError),
}
