//! The event graph (outline) data model.
//!
//! An [`Outline`] is an arena of [`Event`]s in insertion order, with causal
//! structure expressed through id-typed [`Relation`]s rather than object
//! references, so partial persistence and resumption can reload entities by
//! id. The causal relation graph must be a DAG; [`Outline::validate`]
//! enforces that along with referential integrity, and
//! [`Outline::topological_order`] supplies the causal ranks the planning
//! stage keys off.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod builder;

pub use builder::{OutlineBuilder, OutlineConfig};

/// A character participating in an event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Name, e.g. "Winston Smith".
    pub name: String,
    /// Narrative role, e.g. "protagonist".
    pub role: String,
    /// State within this event, e.g. "wounded".
    pub state: String,
}

/// A typed, directed edge from an event to one of its predecessors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation type; causal edges participate in ordering constraints.
    #[serde(rename = "type")]
    pub kind: String,
    /// Id of the predecessor event this relation points at.
    pub target_event_id: String,
    /// Why the relation holds.
    pub rationale: String,
}

impl Relation {
    pub const CAUSAL: &'static str = "causal";

    pub fn is_causal(&self) -> bool {
        self.kind.eq_ignore_ascii_case(Self::CAUSAL)
    }
}

/// A top-level causal unit of the story.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Stable id, e.g. "E1".
    pub event_id: String,
    pub title: String,
    pub summary: String,
    pub time: String,
    pub location: String,
    #[serde(default)]
    pub characters: Vec<Character>,
    pub goal: String,
    pub conflict: String,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Event {
    /// Ids of the events that must be narratively resolvable before this
    /// event's consequences make sense.
    pub fn causal_predecessors(&self) -> impl Iterator<Item = &str> {
        self.relations
            .iter()
            .filter(|r| r.is_causal())
            .map(|r| r.target_event_id.as_str())
    }
}

/// Structured completeness verdict from the completeness agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Completeness {
    pub complete: bool,
    pub reason: String,
    #[serde(default)]
    pub missing_elements: Vec<String>,
}

/// Structured per-candidate verdict from the validator agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventValidation {
    pub event_id: String,
    pub suggestion: String,
    pub novelty_score: f32,
    pub coherence_score: f32,
    pub valid: bool,
}

/// The frozen product of the outline stage: all events, insertion-ordered.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub events: Vec<Event>,
}

impl Outline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.events.iter().any(|e| e.event_id == event_id)
    }

    pub fn get(&self, event_id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.event_id == event_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Append an event, suffixing its id if it collides with an existing one.
    ///
    /// Returns the id the event was stored under.
    pub fn push_resolving_id(&mut self, mut event: Event) -> String {
        if self.contains(&event.event_id) {
            let base = event.event_id.clone();
            let mut suffix = 1;
            while self.contains(&format!("{base}_{suffix}")) {
                suffix += 1;
            }
            event.event_id = format!("{base}_{suffix}");
        }
        let id = event.event_id.clone();
        self.events.push(event);
        id
    }

    /// Check the outline contract: non-empty, unique ids, every relation
    /// target resolvable, and an acyclic causal graph.
    pub fn validate(&self) -> Result<(), OutlineError> {
        if self.events.is_empty() {
            return Err(OutlineError::Empty);
        }
        let mut seen = FxHashSet::default();
        for event in &self.events {
            if !seen.insert(event.event_id.as_str()) {
                return Err(OutlineError::DuplicateEventId {
                    id: event.event_id.clone(),
                });
            }
        }
        for event in &self.events {
            for relation in &event.relations {
                if !self.contains(&relation.target_event_id) {
                    return Err(OutlineError::UnknownRelationTarget {
                        event_id: event.event_id.clone(),
                        target: relation.target_event_id.clone(),
                    });
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Deterministic topological order over causal predecessors.
    ///
    /// Among events whose prerequisites are all emitted, insertion order
    /// breaks ties, so the result is stable across runs. A causal cycle is
    /// reported with the ids still unplaced.
    pub fn topological_order(&self) -> Result<Vec<String>, OutlineError> {
        let mut placed: FxHashSet<&str> = FxHashSet::default();
        let mut order = Vec::with_capacity(self.events.len());
        while order.len() < self.events.len() {
            let mut progressed = false;
            for event in &self.events {
                if placed.contains(event.event_id.as_str()) {
                    continue;
                }
                let ready = event
                    .causal_predecessors()
                    // Dangling targets are caught by validate(); here they
                    // must not wedge the sort.
                    .filter(|id| self.contains(id))
                    .all(|id| placed.contains(id));
                if ready {
                    placed.insert(event.event_id.as_str());
                    order.push(event.event_id.clone());
                    progressed = true;
                }
            }
            if !progressed {
                let involved = self
                    .events
                    .iter()
                    .filter(|e| !placed.contains(e.event_id.as_str()))
                    .map(|e| e.event_id.clone())
                    .collect();
                return Err(OutlineError::CycleDetected { involved });
            }
        }
        Ok(order)
    }

    /// Map each event id to its position in the topological order.
    pub fn causal_ranks(&self) -> Result<FxHashMap<String, usize>, OutlineError> {
        Ok(self
            .topological_order()?
            .into_iter()
            .enumerate()
            .map(|(rank, id)| (id, rank))
            .collect())
    }
}

/// Errors from outline construction and validation.
#[derive(Debug, Error, Diagnostic)]
pub enum OutlineError {
    /// The builder produced no events at all.
    #[error("outline contains no events")]
    #[diagnostic(
        code(storyloom::outline::empty),
        help("The generation loop accepted zero events; check the premise and model output.")
    )]
    Empty,

    /// Two events share an id.
    #[error("duplicate event id: {id}")]
    #[diagnostic(code(storyloom::outline::duplicate_id))]
    DuplicateEventId { id: String },

    /// A relation points at an event that does not exist.
    #[error("event {event_id} has a relation to unknown event {target}")]
    #[diagnostic(
        code(storyloom::outline::unknown_relation_target),
        help("All relation targets must reference existing event ids.")
    )]
    UnknownRelationTarget { event_id: String, target: String },

    /// The causal relation graph contains a cycle.
    #[error("causal graph contains a cycle involving: {}", involved.join(", "))]
    #[diagnostic(
        code(storyloom::outline::cycle),
        help("A cyclic outline is rejected and regenerated rather than silently broken.")
    )]
    CycleDetected { involved: Vec<String> },

    /// A generation call failed while building the outline.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Generation(#[from] crate::client::GenerationError),
}
