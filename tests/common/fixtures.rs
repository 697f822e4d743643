#![allow(dead_code)]

use storyloom::outline::{Event, Outline, Relation};
use storyloom::plan::{Chapter, ChapterEntry, StoryPlan, SubEvent};

/// An event with just enough substance to exercise the graph logic.
pub fn event(id: &str, title: &str, causal_predecessors: &[&str]) -> Event {
    Event {
        event_id: id.to_string(),
        title: title.to_string(),
        summary: format!("{title}."),
        time: "unspecified".to_string(),
        location: "unspecified".to_string(),
        characters: vec![],
        goal: String::new(),
        conflict: String::new(),
        relations: causal_predecessors
            .iter()
            .map(|target| Relation {
                kind: Relation::CAUSAL.to_string(),
                target_event_id: (*target).to_string(),
                rationale: String::new(),
            })
            .collect(),
    }
}

/// Two-event outline: E1 causes E2.
pub fn storm_outline() -> Outline {
    Outline {
        events: vec![
            event("E1", "Rivals are stranded by the storm", &[]),
            event("E2", "A fragile truce saves them", &["E1"]),
        ],
    }
}

pub fn sub_event(id: &str, parent: &str, rank: u64) -> SubEvent {
    SubEvent {
        sub_event_id: id.to_string(),
        parent_event_id: parent.to_string(),
        title: id.to_string(),
        summary: format!("what happens in {id}"),
        causal_rank: rank,
    }
}

pub fn entry(id: &str, early_reveal: bool) -> ChapterEntry {
    ChapterEntry {
        sub_event_id: id.to_string(),
        early_reveal,
    }
}

/// A causally ordered plan over [`storm_outline`]: three sub-events,
/// two chapters, no early reveals.
pub fn storm_plan() -> StoryPlan {
    StoryPlan {
        sub_events: vec![
            sub_event("E1_S1", "E1", 0),
            sub_event("E1_S2", "E1", 1),
            sub_event("E2_S1", "E2", 2),
        ],
        chapters: vec![
            Chapter {
                chapter_id: 1,
                title: "Landfall".to_string(),
                summary: "The storm strands the rivals.".to_string(),
                entries: vec![entry("E1_S1", false), entry("E1_S2", false)],
            },
            Chapter {
                chapter_id: 2,
                title: "Truce".to_string(),
                summary: "Cooperation wins out.".to_string(),
                entries: vec![entry("E2_S1", false)],
            },
        ],
    }
}
