mod common;

use common::{entry, event, storm_outline, storm_plan, sub_event};
use proptest::prelude::*;
use storyloom::outline::Outline;
use storyloom::plan::{
    Chapter, PlanError, StoryPlan, mark_early_reveals, prerequisite_map, validate_plan,
};

#[test]
fn causally_ordered_plan_is_valid() {
    validate_plan(&storm_plan(), &storm_outline()).unwrap();
}

#[test]
fn missing_sub_event_fails_coverage() {
    let outline = storm_outline();
    let mut plan = storm_plan();
    plan.chapters[0].entries.pop();

    let err = validate_plan(&plan, &outline).unwrap_err();
    match err {
        PlanError::Coverage { missing, .. } => assert_eq!(missing, vec!["E1_S2".to_string()]),
        other => panic!("expected coverage failure, got {other:?}"),
    }
}

#[test]
fn duplicated_sub_event_fails_coverage() {
    let outline = storm_outline();
    let mut plan = storm_plan();
    let dup = plan.chapters[0].entries[0].clone();
    plan.chapters[1].entries.push(dup);

    assert!(matches!(
        validate_plan(&plan, &outline),
        Err(PlanError::Coverage { .. })
    ));
}

/// An effect revealed before its cause without an early-reveal flag is a
/// resolvability failure; with the flag it is a planted mystery.
#[test]
fn unflagged_effect_before_cause_is_rejected() {
    let outline = storm_outline();
    let mut plan = StoryPlan {
        sub_events: storm_plan().sub_events,
        chapters: vec![Chapter {
            chapter_id: 1,
            title: "Mystery first".to_string(),
            summary: String::new(),
            entries: vec![
                entry("E2_S1", false),
                entry("E1_S1", false),
                entry("E1_S2", false),
            ],
        }],
    };

    let err = validate_plan(&plan, &outline).unwrap_err();
    match err {
        PlanError::Resolvability {
            sub_event_id,
            position,
            ..
        } => {
            assert_eq!(sub_event_id, "E2_S1");
            assert_eq!(position, 0);
        }
        other => panic!("expected resolvability failure, got {other:?}"),
    }

    plan.chapters[0].entries[0].early_reveal = true;
    validate_plan(&plan, &outline).unwrap();
}

/// Flags are derived from reveal order, never trusted as given.
#[test]
fn mark_early_reveals_matches_the_validator() {
    let outline = storm_outline();
    let plan = storm_plan();
    let prereqs = prerequisite_map(&outline, &plan.sub_events).unwrap();

    let mut chapters = vec![Chapter {
        chapter_id: 1,
        title: String::new(),
        summary: String::new(),
        entries: vec![
            entry("E2_S1", false),
            entry("E1_S2", false),
            entry("E1_S1", false),
        ],
    }];
    mark_early_reveals(&mut chapters, &prereqs);

    // E2_S1 precedes everything it depends on; E1_S2 precedes its earlier
    // sibling; E1_S1 closes both threads.
    assert!(chapters[0].entries[0].early_reveal);
    assert!(chapters[0].entries[1].early_reveal);
    assert!(!chapters[0].entries[2].early_reveal);

    let marked = StoryPlan {
        sub_events: plan.sub_events,
        chapters,
    };
    validate_plan(&marked, &outline).unwrap();
}

/// A linear chain of five events, one sub-event each.
fn chain_fixture() -> (Outline, Vec<storyloom::plan::SubEvent>) {
    let outline = Outline {
        events: vec![
            event("E1", "Spark", &[]),
            event("E2", "Fire", &["E1"]),
            event("E3", "Flight", &["E2"]),
            event("E4", "Refuge", &["E3"]),
            event("E5", "Reckoning", &["E4"]),
        ],
    };
    let subs = (0..5)
        .map(|i| sub_event(&format!("E{}_S1", i + 1), &format!("E{}", i + 1), i as u64))
        .collect();
    (outline, subs)
}

proptest! {
    /// Any permutation of reveal order becomes a valid plan once flags
    /// are derived from prerequisite analysis.
    #[test]
    fn every_permutation_validates_after_marking(seed in proptest::collection::vec(0usize..1000, 5)) {
        let (outline, subs) = chain_fixture();

        // Order the five sub-events by the random keys.
        let mut order: Vec<usize> = (0..5).collect();
        order.sort_by_key(|&i| seed[i]);

        let mut chapters = vec![Chapter {
            chapter_id: 1,
            title: String::new(),
            summary: String::new(),
            entries: order
                .iter()
                .map(|&i| entry(&format!("E{}_S1", i + 1), false))
                .collect(),
        }];
        let prereqs = prerequisite_map(&outline, &subs).unwrap();
        mark_early_reveals(&mut chapters, &prereqs);

        let plan = StoryPlan { sub_events: subs, chapters };
        prop_assert!(validate_plan(&plan, &outline).is_ok());

        // Causal order needs no flags at all.
        let flags: Vec<bool> = plan.chapters[0].entries.iter().map(|e| e.early_reveal).collect();
        if order == (0..5).collect::<Vec<_>>() {
            prop_assert!(flags.iter().all(|f| !f));
        }
    }
}
