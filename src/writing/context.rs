//! Context snapshot assembly.
//!
//! The assembler replaces any notion of a shared, evolving "what the
//! reader knows" object with a fresh, immutable [`ContextSnapshot`]
//! computed per write position from the frozen plan and the committed
//! passages. By construction it can only see passages at strictly earlier
//! reveal positions, because the caller hands it exactly the committed
//! prefix. That is what prevents future-information leakage in a
//! non-linear narrative.

use rustc_hash::{FxHashMap, FxHashSet};

use super::{ContextSnapshot, ForeshadowThread, Passage, PassageDigest, WriteError};
use crate::outline::Outline;
use crate::plan::{ChapterEntry, PlanError, StoryPlan, prerequisite_map};

/// Bounds for snapshot construction.
///
/// Neither default is claimed "correct"; both exist to keep prompt size
/// stable and are expected to be tuned per model.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// How many immediately preceding passages are digested.
    pub recency_window: usize,
    /// Character budget per condensed passage summary.
    pub excerpt_len: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            recency_window: 5,
            excerpt_len: 480,
        }
    }
}

/// Builds per-position context snapshots against a frozen plan.
pub struct ContextAssembler<'a> {
    plan: &'a StoryPlan,
    config: SnapshotConfig,
    prereqs: FxHashMap<String, FxHashSet<String>>,
    /// `(chapter_index, entry)` per global reveal position.
    slots: Vec<(usize, &'a ChapterEntry)>,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(
        plan: &'a StoryPlan,
        outline: &Outline,
        config: SnapshotConfig,
    ) -> Result<Self, PlanError> {
        let prereqs = prerequisite_map(outline, &plan.sub_events)?;
        let slots = plan.reveal_order().map(|(ci, _, e)| (ci, e)).collect();
        Ok(Self {
            plan,
            config,
            prereqs,
            slots,
        })
    }

    /// Build the snapshot for `position`, given exactly the passages
    /// committed before it (reveal order, oldest first).
    pub fn snapshot(
        &self,
        committed: &[&Passage],
        position: usize,
    ) -> Result<ContextSnapshot, WriteError> {
        let (chapter_index, entry) =
            *self
                .slots
                .get(position)
                .ok_or(WriteError::PositionOutOfRange {
                    position,
                    total: self.slots.len(),
                })?;
        if committed.len() != position {
            return Err(WriteError::SnapshotMismatch {
                position,
                committed: committed.len(),
            });
        }

        let chapter = &self.plan.chapters[chapter_index];
        let sub_event_summary = self
            .plan
            .sub_event(&entry.sub_event_id)
            .map(|s| s.summary.clone())
            .unwrap_or_default();

        let recent = committed
            .iter()
            .rev()
            .take(self.config.recency_window)
            .rev()
            .map(|p| PassageDigest {
                sub_event_id: p.sub_event_id.clone(),
                summary: condense(p.canonical_text(), self.config.excerpt_len),
            })
            .collect();

        Ok(ContextSnapshot {
            chapter_id: chapter.chapter_id,
            chapter_title: chapter.title.clone(),
            chapter_summary: chapter.summary.clone(),
            sub_event_id: entry.sub_event_id.clone(),
            sub_event_summary,
            recent,
            open_threads: self.open_threads(position),
        })
    }

    /// Threads opened by early reveals before `position` whose
    /// prerequisites are still not all revealed.
    fn open_threads(&self, position: usize) -> Vec<ForeshadowThread> {
        let revealed: FxHashSet<&str> = self.slots[..position]
            .iter()
            .map(|(_, e)| e.sub_event_id.as_str())
            .collect();
        self.slots[..position]
            .iter()
            .filter(|(_, e)| e.early_reveal)
            .filter_map(|(_, e)| {
                let missing: Vec<String> = self
                    .prereqs
                    .get(&e.sub_event_id)?
                    .iter()
                    .filter(|id| !revealed.contains(id.as_str()))
                    .cloned()
                    .collect();
                if missing.is_empty() {
                    return None;
                }
                Some(ForeshadowThread {
                    sub_event_id: e.sub_event_id.clone(),
                    summary: self
                        .plan
                        .sub_event(&e.sub_event_id)
                        .map(|s| s.summary.clone())
                        .unwrap_or_default(),
                    missing_prerequisites: missing,
                })
            })
            .collect()
    }
}

/// Deterministic condensation: a bounded excerpt cut at a word boundary.
///
/// Operates on characters, not bytes, so multi-byte scripts are safe.
pub fn condense(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    // Back off to the last whitespace when one exists past the halfway
    // point; CJK text typically has none, so the hard cut stands.
    let boundary = cut
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .map(|(i, _)| i)
        .next_back()
        .filter(|&i| i > cut.len() / 2);
    let mut excerpt = match boundary {
        Some(i) => cut[..i].to_string(),
        None => cut,
    };
    excerpt.push('…');
    excerpt
}
