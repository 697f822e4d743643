mod common;

use std::sync::Arc;

use common::{ScriptedClient, event, sub_event};
use storyloom::client::{RetryPolicy, agents};
use storyloom::outline::Outline;
use storyloom::plan::{ChapterWeaver, PlanError, WeaveConfig, validate_plan};

const PREMISE: &str = "two rivals must cooperate to survive a storm";

/// Two events with no causal link can share one chapter in either order
/// without any early-reveal flags.
#[tokio::test]
async fn independent_events_fit_one_chapter_unflagged() {
    let outline = Outline {
        events: vec![
            event("E1", "The storm makes landfall", &[]),
            event("E2", "A rescue boat is lost", &[]),
        ],
    };
    let subs = vec![sub_event("E1_S1", "E1", 0), sub_event("E2_S1", "E2", 1)];

    let client = Arc::new(ScriptedClient::new().with_reply(
        agents::WEAVER,
        r#"[{"title":"Landfall","summary":"Both disasters strike.","sub_event_ids":["E2_S1","E1_S1"]}]"#,
    ));
    let weaver = ChapterWeaver::new(
        client,
        WeaveConfig::default().with_exact_chapters(1),
        RetryPolicy::default(),
    );
    let plan = weaver.weave(PREMISE, &outline, subs).await.unwrap();

    assert_eq!(plan.chapters.len(), 1);
    assert_eq!(plan.chapters[0].sub_event_ids().collect::<Vec<_>>(), vec!["E2_S1", "E1_S1"]);
    assert!(plan.chapters[0].entries.iter().all(|e| !e.early_reveal));
    validate_plan(&plan, &outline).unwrap();
}

/// A chapter budget of zero cannot hold any sub-event.
#[tokio::test]
async fn zero_chapters_with_content_is_infeasible() {
    let outline = Outline {
        events: vec![event("E1", "The storm makes landfall", &[])],
    };
    let subs = vec![sub_event("E1_S1", "E1", 0)];

    let client = Arc::new(ScriptedClient::new());
    let config = WeaveConfig {
        min_chapters: 0,
        max_chapters: 0,
        ..WeaveConfig::default()
    };
    let weaver = ChapterWeaver::new(client.clone(), config, RetryPolicy::default());
    let err = weaver.weave(PREMISE, &outline, subs).await.unwrap_err();

    assert!(matches!(err, PlanError::Infeasible { .. }));
    // Infeasibility is decided locally, no generation calls are spent.
    assert_eq!(client.total_calls(), 0);
}

/// Zero chapters and zero sub-events is trivially an empty plan.
#[tokio::test]
async fn zero_chapters_without_content_is_empty_plan() {
    let outline = Outline::new();
    let config = WeaveConfig {
        min_chapters: 0,
        max_chapters: 0,
        ..WeaveConfig::default()
    };
    let weaver = ChapterWeaver::new(
        Arc::new(ScriptedClient::new()),
        config,
        RetryPolicy::default(),
    );
    let plan = weaver.weave(PREMISE, &outline, vec![]).await.unwrap();
    assert!(plan.chapters.is_empty());
    assert!(plan.sub_events.is_empty());
}

/// A proposal that drops a sub-event is re-prompted with the discrepancy
/// spelled out, and the corrected proposal is accepted.
#[tokio::test]
async fn dropped_sub_event_triggers_a_repair_round() {
    let outline = Outline {
        events: vec![event("E1", "The storm makes landfall", &[])],
    };
    let subs = vec![sub_event("E1_S1", "E1", 0), sub_event("E1_S2", "E1", 1)];

    let client = Arc::new(
        ScriptedClient::new()
            .with_reply(
                agents::WEAVER,
                r#"[{"title":"Landfall","summary":"s","sub_event_ids":["E1_S1"]}]"#,
            )
            .with_reply(
                agents::WEAVER,
                r#"[{"title":"Landfall","summary":"s","sub_event_ids":["E1_S1","E1_S2"]}]"#,
            ),
    );
    let weaver = ChapterWeaver::new(
        client.clone(),
        WeaveConfig::default().with_exact_chapters(1),
        RetryPolicy::default(),
    );
    let plan = weaver.weave(PREMISE, &outline, subs).await.unwrap();

    assert_eq!(client.calls_for(agents::WEAVER), 2);
    assert_eq!(plan.chapters[0].sub_event_ids().collect::<Vec<_>>(), vec!["E1_S1", "E1_S2"]);
    validate_plan(&plan, &outline).unwrap();
}

/// Proposals that never reach coverage exhaust the attempt budget.
#[tokio::test]
async fn persistent_coverage_failure_is_infeasible() {
    let outline = Outline {
        events: vec![event("E1", "The storm makes landfall", &[])],
    };
    let subs = vec![sub_event("E1_S1", "E1", 0), sub_event("E1_S2", "E1", 1)];

    let bad = r#"[{"title":"Landfall","summary":"s","sub_event_ids":["E1_S1"]}]"#;
    let client = Arc::new(
        ScriptedClient::new()
            .with_reply(agents::WEAVER, bad)
            .with_reply(agents::WEAVER, bad)
            .with_reply(agents::WEAVER, bad),
    );
    let weaver = ChapterWeaver::new(
        client.clone(),
        WeaveConfig::default().with_exact_chapters(1),
        RetryPolicy::default(),
    );
    let err = weaver
        .weave(PREMISE, &outline, subs)
        .await
        .unwrap_err();

    assert!(matches!(err, PlanError::Infeasible { .. }));
    assert_eq!(client.calls_for(agents::WEAVER), 3);
}
